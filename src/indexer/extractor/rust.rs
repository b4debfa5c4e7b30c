//! Rust adapter.
//!
//! Items inside `impl` and `trait` blocks are methods qualified by the
//! implementing type (`Stack.push`); items inside inline `mod` blocks are
//! qualified by the module name. Function bodies are not searched.

use tree_sitter::{Node, Tree};

use super::{
    depth_error, field_text, is_damaged, node_text, qualify, raw_symbol, RawSymbol,
    SymbolExtractor, MAX_WALK_DEPTH,
};
use crate::error::Result;
use crate::types::SymbolKind;

#[derive(Debug, Clone, Copy, Default)]
pub struct RustExtractor;

impl SymbolExtractor for RustExtractor {
    fn name(&self) -> &'static str {
        "rust"
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
        walker.items(root, false, 0)?;
        Ok(walker.symbols)
    }
}

struct Walker<'s> {
    source: &'s [u8],
    relative_path: &'s str,
    symbols: Vec<RawSymbol>,
    scope: Vec<String>,
}

impl Walker<'_> {
    /// Visit the items of a `source_file` or `declaration_list`.
    fn items(&mut self, node: Node<'_>, in_impl: bool, depth: usize) -> Result<()> {
        if depth > MAX_WALK_DEPTH {
            return Err(depth_error(self.relative_path, depth));
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children.into_iter().filter(|c| !is_damaged(*c)) {
            match child.kind() {
                "function_item" | "function_signature_item" => {
                    let kind = if in_impl {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    };
                    self.leaf(child, kind);
                }
                "struct_item" | "union_item" => self.leaf(child, SymbolKind::Struct),
                "enum_item" => self.leaf(child, SymbolKind::Enum),
                "type_item" => self.leaf(child, SymbolKind::TypeAlias),
                "trait_item" => {
                    if let Some(name) = field_text(child, "name", self.source) {
                        self.nested(child, SymbolKind::Trait, name, true, depth)?;
                    }
                }
                "impl_item" => {
                    if let Some(ty) = field_text(child, "type", self.source) {
                        let name = ty.split('<').next().unwrap_or(&ty).trim().to_string();
                        self.nested(child, SymbolKind::Impl, name, true, depth)?;
                    }
                }
                "mod_item" => {
                    if let Some(name) = field_text(child, "name", self.source) {
                        self.nested(child, SymbolKind::Module, name, false, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn leaf(&mut self, node: Node<'_>, kind: SymbolKind) {
        if let Some(name) = field_text(node, "name", self.source) {
            self.push(node, kind, name);
        }
    }

    fn nested(
        &mut self,
        node: Node<'_>,
        kind: SymbolKind,
        name: String,
        methods: bool,
        depth: usize,
    ) -> Result<()> {
        self.push(node, kind, name.clone());
        let Some(body) = node.child_by_field_name("body") else {
            return Ok(());
        };
        self.scope.push(name);
        let result = self.items(body, methods, depth + 1);
        self.scope.pop();
        result
    }

    fn push(&mut self, node: Node<'_>, kind: SymbolKind, name: String) {
        let qualified = qualify(&self.scope, &name);
        let docstring = doc_comment(node, self.source);
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

/// Consecutive `///` lines above an item, attributes in between ignored.
fn doc_comment(node: Node<'_>, source: &[u8]) -> Option<String> {
    let mut lines = Vec::new();
    let mut prev = node.prev_named_sibling();
    while let Some(sibling) = prev {
        match sibling.kind() {
            "attribute_item" => {}
            "line_comment" => {
                let text = node_text(sibling, source);
                match text.strip_prefix("///") {
                    Some(rest) if !rest.starts_with('/') => {
                        lines.push(rest.strip_prefix(' ').unwrap_or(rest).trim_end().to_string())
                    }
                    _ => break,
                }
            }
            _ => break,
        }
        prev = sibling.prev_named_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::parser::CodeParser;
    use crate::types::Language;
    use pretty_assertions::assert_eq;

    const STACK: &str = r#"/// A bounded stack.
#[derive(Debug)]
pub struct Stack<T> {
    items: Vec<T>,
}

impl<T> Stack<T> {
    /// Push an item.
    pub fn push(&mut self, item: T) {
        fn helper() {}
        self.items.push(item);
    }
}

pub trait Shape {
    fn area(&self) -> f64;
}

mod util {
    pub fn clamp(x: i32) -> i32 { x }
}

pub enum Color { Red }
type Id = u64;
"#;

    fn extract(src: &str) -> Vec<RawSymbol> {
        let tree = CodeParser::new().parse(src.as_bytes(), Language::Rust).unwrap();
        RustExtractor
            .extract_symbols(&tree, "src/lib.rs", src.as_bytes())
            .unwrap()
    }

    #[test]
    fn items_and_qualification() {
        let symbols = extract(STACK);
        let got: Vec<(SymbolKind, &str)> = symbols
            .iter()
            .map(|s| (s.kind, s.qualified_name.as_deref().unwrap()))
            .collect();
        assert_eq!(
            got,
            vec![
                (SymbolKind::Struct, "Stack"),
                (SymbolKind::Impl, "Stack"),
                (SymbolKind::Method, "Stack.push"),
                (SymbolKind::Trait, "Shape"),
                (SymbolKind::Method, "Shape.area"),
                (SymbolKind::Module, "util"),
                (SymbolKind::Function, "util.clamp"),
                (SymbolKind::Enum, "Color"),
                (SymbolKind::TypeAlias, "Id"),
            ]
        );
    }

    #[test]
    fn doc_comments_skip_attributes() {
        let symbols = extract(STACK);
        assert_eq!(symbols[0].docstring.as_deref(), Some("A bounded stack."));
        assert_eq!(symbols[2].docstring.as_deref(), Some("Push an item."));
        assert_eq!(symbols[3].docstring, None);
    }

    #[test]
    fn spans_are_one_indexed() {
        let symbols = extract(STACK);
        let push = &symbols[2];
        assert_eq!((push.start_line, push.end_line), (9, 12));
        assert_eq!(push.signature, "pub fn push(&mut self, item: T) {");
    }

    #[test]
    fn items_survive_a_trailing_syntax_error() {
        let src = format!("{STACK}\nfn broken( {{\n");
        let names: Vec<String> = extract(&src)
            .into_iter()
            .filter_map(|s| s.qualified_name)
            .collect();
        assert!(names.iter().any(|n| n == "Stack.push"), "{names:?}");
        assert!(names.iter().any(|n| n == "util.clamp"), "{names:?}");
    }

    #[test]
    fn excessive_module_nesting_is_an_extraction_error() {
        let depth = MAX_WALK_DEPTH + 2;
        let src = format!("{}{}", "mod m { ".repeat(depth), "} ".repeat(depth));
        let tree = CodeParser::new().parse(src.as_bytes(), Language::Rust).unwrap();
        let err = RustExtractor
            .extract_symbols(&tree, "src/deep.rs", src.as_bytes())
            .unwrap_err();
        assert!(matches!(err, crate::error::RepoGraphError::Extraction { .. }));
    }
}
