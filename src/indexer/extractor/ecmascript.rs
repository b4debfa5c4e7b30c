//! JavaScript / TypeScript adapter (JSX and TSX included).
//!
//! Picks up class, function and method declarations, arrow functions and
//! function expressions bound by `const` / `let` / `var`, and on the
//! TypeScript side interfaces, type aliases and enums. Function bodies are
//! not searched for further definitions, and neither are anonymous
//! callbacks or object literals; class bodies are, with the class name
//! pushed onto the qualification scope.

use tree_sitter::{Node, Tree};

use super::{
    canonical_node_types, depth_error, field_text, is_damaged, line_of, node_text, qualify,
    raw_symbol, walk_tree, CallSite, FileReferences, ImportRef, ImportedName, RawSymbol,
    SymbolExtractor, MAX_WALK_DEPTH,
};
use crate::error::Result;
use crate::types::SymbolKind;

/// Subtrees that never contain declarations worth indexing.
const OPAQUE: &[&str] = &[
    "comment",
    "string",
    "template_string",
    "regex",
    "number",
    "binary_expression",
    "jsx_text",
    "import_statement",
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
    "object",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct EcmaScriptExtractor;

impl SymbolExtractor for EcmaScriptExtractor {
    fn name(&self) -> &'static str {
        "ecmascript"
    }

    fn extract_symbols(
        &self,
        tree: &Tree,
        relative_path: &str,
        source: &[u8],
    ) -> Result<Vec<RawSymbol>> {
        let root = tree.root_node();
        let mut walker = Walker {
            source,
            relative_path,
            symbols: Vec::new(),
            scope: Vec::new(),
        };
        walker.walk(root, 0)?;
        Ok(walker.symbols)
    }

    fn extract_references(&self, tree: &Tree, source: &[u8]) -> FileReferences {
        let mut refs = FileReferences::default();
        walk_tree(tree.root_node(), |node| match node.kind() {
            "import_statement" => {
                if let Some(import) = import_statement(node, source) {
                    refs.imports.push(import);
                }
            }
            "variable_declarator" => {
                if let Some(import) = require_declarator(node, source) {
                    refs.imports.push(import);
                }
            }
            "call_expression" => {
                if let Some(call) = call_expression(node, source) {
                    refs.calls.push(call);
                }
            }
            "new_expression" => {
                if let Some(ctor) = node
                    .child_by_field_name("constructor")
                    .filter(|c| c.kind() == "identifier")
                {
                    refs.calls.push(CallSite {
                        callee: node_text(ctor, source),
                        receiver: None,
                        line: line_of(node),
                    });
                }
            }
            _ => {}
        });
        refs
    }
}

struct Walker<'s> {
    source: &'s [u8],
    relative_path: &'s str,
    symbols: Vec<RawSymbol>,
    scope: Vec<String>,
}

impl Walker<'_> {
    /// Scan `node`'s subtree in pre-order, stopping at declarations. Only
    /// class bodies count towards the depth limit.
    fn walk(&mut self, node: Node<'_>, depth: usize) -> Result<()> {
        if depth > MAX_WALK_DEPTH {
            return Err(depth_error(self.relative_path, depth));
        }
        let mut stack = named_children_rev(node);
        while let Some(current) = stack.pop() {
            if is_damaged(current) {
                continue;
            }
            match current.kind() {
                "class_declaration" | "abstract_class_declaration" => {
                    self.class(current, depth)?
                }
                "function_declaration" | "generator_function_declaration" => {
                    self.callable(current, SymbolKind::Function)
                }
                "method_definition" => self.callable(current, SymbolKind::Method),
                "lexical_declaration" | "variable_declaration" => self.bindings(current),
                "interface_declaration" => self.named(current, SymbolKind::Interface),
                "type_alias_declaration" => self.named(current, SymbolKind::TypeAlias),
                "enum_declaration" => self.named(current, SymbolKind::Enum),
                kind if OPAQUE.contains(&kind) => {}
                _ => stack.extend(named_children_rev(current)),
            }
        }
        Ok(())
    }

    fn class(&mut self, node: Node<'_>, depth: usize) -> Result<()> {
        let Some(name) = field_text(node, "name", self.source) else {
            return Ok(());
        };
        self.push(node, SymbolKind::Class, name.clone());
        if let Some(body) = node.child_by_field_name("body") {
            self.scope.push(name);
            let result = self.walk(body, depth + 1);
            self.scope.pop();
            result?;
        }
        Ok(())
    }

    fn callable(&mut self, node: Node<'_>, kind: SymbolKind) {
        if let Some(name) = field_text(node, "name", self.source) {
            self.push(node, kind, name);
        }
    }

    fn named(&mut self, node: Node<'_>, kind: SymbolKind) {
        if let Some(name) = field_text(node, "name", self.source) {
            self.push(node, kind, name);
        }
    }

    /// `const f = () => {}` / `var g = function () {}`.
    fn bindings(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let declarators: Vec<Node<'_>> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "variable_declarator")
            .collect();
        let single = declarators.len() == 1;

        for declarator in declarators {
            let (Some(name_node), Some(value)) = (
                declarator.child_by_field_name("name"),
                declarator.child_by_field_name("value"),
            ) else {
                continue;
            };
            if name_node.kind() != "identifier"
                || !matches!(
                    value.kind(),
                    "arrow_function" | "function_expression" | "function" | "generator_function"
                )
            {
                continue;
            }
            let span_node = if single { node } else { declarator };
            let name = node_text(name_node, self.source);
            let mut symbol = raw_symbol(
                span_node,
                SymbolKind::Function,
                name.clone(),
                Some(qualify(&self.scope, &name)),
                jsdoc(span_node, self.source),
                self.source,
            );
            symbol.node_types = canonical_node_types(value);
            self.symbols.push(symbol);
        }
    }

    fn push(&mut self, node: Node<'_>, kind: SymbolKind, name: String) {
        let qualified = qualify(&self.scope, &name);
        let docstring = jsdoc(node, self.source);
        self.symbols.push(raw_symbol(
            node,
            kind,
            name,
            Some(qualified),
            docstring,
            self.source,
        ));
    }
}

fn named_children_rev<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let mut children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    children.reverse();
    children
}

/// The `/** ... */` block directly preceding a declaration (or its
/// `export` wrapper), with comment markers removed.
fn jsdoc(node: Node<'_>, source: &[u8]) -> Option<String> {
    let anchor = match node.parent() {
        Some(parent) if parent.kind() == "export_statement" => parent,
        _ => node,
    };
    let prev = anchor.prev_named_sibling()?;
    if prev.kind() != "comment" {
        return None;
    }
    let raw = node_text(prev, source);
    let inner = raw.strip_prefix("/**")?.strip_suffix("*/")?;
    let cleaned: Vec<&str> = inner
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

fn unquote(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

fn is_relative_specifier(spec: &str) -> bool {
    spec == "." || spec == ".." || spec.starts_with("./") || spec.starts_with("../")
}

/// `import x from './a'`, `import { a, b as c } from './m'`,
/// `import * as ns from './m'`, `import './side-effect'`.
fn import_statement(node: Node<'_>, source: &[u8]) -> Option<ImportRef> {
    let module_path = unquote(&field_text(node, "source", source)?);
    let mut import = ImportRef {
        is_relative: is_relative_specifier(&module_path),
        module_path,
        imported_names: Vec::new(),
        alias: None,
        is_wildcard: false,
        line: line_of(node),
    };

    let mut cursor = node.walk();
    let clause = node
        .named_children(&mut cursor)
        .find(|c| c.kind() == "import_clause");
    if let Some(clause) = clause {
        let mut cursor = clause.walk();
        for part in clause.named_children(&mut cursor) {
            match part.kind() {
                // Default import: assume the export shares the local name.
                "identifier" => import.imported_names.push(ImportedName {
                    name: node_text(part, source),
                    alias: None,
                }),
                "namespace_import" => {
                    let mut c = part.walk();
                    import.alias = part
                        .named_children(&mut c)
                        .find(|n| n.kind() == "identifier")
                        .map(|n| node_text(n, source));
                    import.is_wildcard = true;
                }
                "named_imports" => {
                    let mut c = part.walk();
                    for spec in part
                        .named_children(&mut c)
                        .filter(|n| n.kind() == "import_specifier")
                    {
                        if let Some(name) = field_text(spec, "name", source) {
                            import.imported_names.push(ImportedName {
                                name,
                                alias: field_text(spec, "alias", source),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
    }
    Some(import)
}

/// `const x = require('./m')` and `const { a, b: c } = require('./m')`.
fn require_declarator(node: Node<'_>, source: &[u8]) -> Option<ImportRef> {
    let value = node.child_by_field_name("value")?;
    if value.kind() != "call_expression" {
        return None;
    }
    let function = value.child_by_field_name("function")?;
    if node_text(function, source) != "require" {
        return None;
    }
    let args = value.child_by_field_name("arguments")?;
    let spec = args.named_child(0).filter(|a| a.kind() == "string")?;
    let module_path = unquote(&node_text(spec, source));

    let target = node.child_by_field_name("name")?;
    let mut import = ImportRef {
        is_relative: is_relative_specifier(&module_path),
        module_path,
        imported_names: Vec::new(),
        alias: None,
        is_wildcard: false,
        line: line_of(node),
    };
    match target.kind() {
        "identifier" => import.alias = Some(node_text(target, source)),
        "object_pattern" => {
            let mut cursor = target.walk();
            for prop in target.named_children(&mut cursor) {
                match prop.kind() {
                    "shorthand_property_identifier_pattern" | "shorthand_property_identifier" => {
                        import.imported_names.push(ImportedName {
                            name: node_text(prop, source),
                            alias: None,
                        })
                    }
                    "pair_pattern" => {
                        if let Some(name) = field_text(prop, "key", source) {
                            import.imported_names.push(ImportedName {
                                name,
                                alias: field_text(prop, "value", source),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => return None,
    }
    Some(import)
}

fn call_expression(node: Node<'_>, source: &[u8]) -> Option<CallSite> {
    let function = node.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => {
            let callee = node_text(function, source);
            (callee != "require").then(|| CallSite {
                callee,
                receiver: None,
                line: line_of(node),
            })
        }
        "member_expression" => Some(CallSite {
            callee: field_text(function, "property", source)?,
            receiver: field_text(function, "object", source),
            line: line_of(node),
        }),
        _ => None,
    }
}
