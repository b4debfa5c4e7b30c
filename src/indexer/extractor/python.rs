//! Python adapter.
//!
//! Classes and functions are collected from statement-level positions
//! (module body, class bodies, and compound statements such as `if` / `try`
//! / `with`). Function bodies are not entered, so nested helper functions
//! belong to their enclosing function's span only. A function directly
//! inside a class scope is a method and is qualified as `Class.method`.

use tree_sitter::{Node, Tree};

use super::{
    depth_error, field_text, is_damaged, line_of, node_text, qualify, raw_symbol, walk_tree,
    CallSite, FileReferences, ImportRef, ImportedName, RawSymbol, SymbolExtractor, MAX_WALK_DEPTH,
};
use crate::error::Result;
use crate::types::SymbolKind;

/// Statement containers that may hold definitions.
const CONTAINERS: &[&str] = &[
    "module",
    "block",
    "decorated_definition",
    "if_statement",
    "elif_clause",
    "else_clause",
    "for_statement",
    "while_statement",
    "try_statement",
    "except_clause",
    "except_group_clause",
    "finally_clause",
    "with_statement",
    "match_statement",
    "case_clause",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonExtractor;

impl SymbolExtractor for PythonExtractor {
    fn name(&self) -> &'static str {
        "python"
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
            in_class: false,
        };
        walker.walk(root, 0)?;
        Ok(walker.symbols)
    }

    fn extract_references(&self, tree: &Tree, source: &[u8]) -> FileReferences {
        let mut refs = FileReferences::default();
        walk_tree(tree.root_node(), |node| match node.kind() {
            "import_statement" => refs.imports.extend(import_statement(node, source)),
            "import_from_statement" => {
                if let Some(import) = import_from_statement(node, source) {
                    refs.imports.push(import);
                }
            }
            "call" => {
                if let Some(call) = call_site(node, source) {
                    refs.calls.push(call);
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
    /// Innermost scope is a class body.
    in_class: bool,
}

impl Walker<'_> {
    fn walk(&mut self, node: Node<'_>, depth: usize) -> Result<()> {
        if depth > MAX_WALK_DEPTH {
            return Err(depth_error(self.relative_path, depth));
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if is_damaged(child) {
                continue;
            }
            match child.kind() {
                "class_definition" => self.class(child, depth)?,
                "function_definition" => self.function(child),
                kind if CONTAINERS.contains(&kind) => self.walk(child, depth + 1)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn class(&mut self, node: Node<'_>, depth: usize) -> Result<()> {
        let Some(name) = field_text(node, "name", self.source) else {
            return Ok(());
        };
        let qualified = qualify(&self.scope, &name);
        let docstring = docstring(node, self.source);
        self.symbols.push(raw_symbol(
            node,
            SymbolKind::Class,
            name.clone(),
            Some(qualified),
            docstring,
            self.source,
        ));

        if let Some(body) = node.child_by_field_name("body") {
            let was_in_class = std::mem::replace(&mut self.in_class, true);
            self.scope.push(name);
            let result = self.walk(body, depth + 1);
            self.scope.pop();
            self.in_class = was_in_class;
            result?;
        }
        Ok(())
    }

    fn function(&mut self, node: Node<'_>) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let kind = if self.in_class {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };
        let qualified = qualify(&self.scope, &name);
        let docstring = docstring(node, self.source);
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

/// First statement of the body when it is a bare string literal.
fn docstring(node: Node<'_>, source: &[u8]) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    Some(strip_string_literal(&node_text(expr, source)))
}

fn strip_string_literal(raw: &str) -> String {
    let unprefixed = raw.trim_start_matches(|c: char| "rRbBuUfF".contains(c));
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if unprefixed.len() >= 2 * quote.len()
            && unprefixed.starts_with(quote)
            && unprefixed.ends_with(quote)
        {
            return unprefixed[quote.len()..unprefixed.len() - quote.len()]
                .trim()
                .to_string();
        }
    }
    unprefixed.trim().to_string()
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// `import a.b`, `import a.b as c` (one ref per imported module).
fn import_statement(node: Node<'_>, source: &[u8]) -> Vec<ImportRef> {
    let mut cursor = node.walk();
    node.children_by_field_name("name", &mut cursor)
        .filter_map(|child| {
            let (module, alias) = match child.kind() {
                "dotted_name" => (node_text(child, source), None),
                "aliased_import" => (
                    field_text(child, "name", source)?,
                    field_text(child, "alias", source),
                ),
                _ => return None,
            };
            Some(ImportRef {
                module_path: module,
                imported_names: Vec::new(),
                alias,
                is_relative: false,
                is_wildcard: false,
                line: line_of(node),
            })
        })
        .collect()
}

/// `from x import a, b as c`, `from . import y`, `from m import *`.
fn import_from_statement(node: Node<'_>, source: &[u8]) -> Option<ImportRef> {
    let module = node.child_by_field_name("module_name")?;
    let module_path = node_text(module, source);
    let is_relative = module.kind() == "relative_import";

    let mut imported_names = Vec::new();
    let mut cursor = node.walk();
    for child in node.children_by_field_name("name", &mut cursor) {
        match child.kind() {
            "dotted_name" | "identifier" => imported_names.push(ImportedName {
                name: node_text(child, source),
                alias: None,
            }),
            "aliased_import" => {
                if let Some(name) = field_text(child, "name", source) {
                    imported_names.push(ImportedName {
                        name,
                        alias: field_text(child, "alias", source),
                    });
                }
            }
            _ => {}
        }
    }

    let mut cursor = node.walk();
    let is_wildcard = node
        .named_children(&mut cursor)
        .any(|c| c.kind() == "wildcard_import");

    Some(ImportRef {
        module_path,
        imported_names,
        alias: None,
        is_relative,
        is_wildcard,
        line: line_of(node),
    })
}

fn call_site(node: Node<'_>, source: &[u8]) -> Option<CallSite> {
    let function = node.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => Some(CallSite {
            callee: node_text(function, source),
            receiver: None,
            line: line_of(node),
        }),
        "attribute" => Some(CallSite {
            callee: field_text(function, "attribute", source)?,
            receiver: field_text(function, "object", source),
            line: line_of(node),
        }),
        _ => None,
    }
}
