//! Flattened syntax tree: a single arena of nodes addressed by integer
//! handles instead of `tree_sitter::Node<'tree>`, so the rest of the
//! pipeline never has to thread tree-sitter's tree lifetime through the
//! analyzer, collector, and metadata passes.

use tree_sitter::{Parser, TreeCursor};

use crate::diagnostics::Diagnostics;

/// Handle into a `SyntaxTree`'s node arena. Index 0 is always the root.
pub type NodeId = u32;

#[derive(Debug, Clone)]
pub struct SyntaxNodeData {
    pub kind: &'static str,
    pub is_named: bool,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    /// Field name this node is attached under on its parent, e.g. `name`,
    /// `body`, `declaration` — mirrors tree-sitter's field API.
    pub field_name: Option<&'static str>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

pub struct SyntaxTree {
    pub file: String,
    pub source: String,
    nodes: Vec<SyntaxNodeData>,
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("failed to set tree-sitter language for {file}: {source}")]
    Language {
        file: String,
        #[source]
        source: tree_sitter::LanguageError,
    },
    #[error("tree-sitter produced no tree for {0}")]
    NoTree(String),
}

impl SyntaxTree {
    /// Parses `source` as a TypeScript module and flattens the resulting
    /// tree-sitter tree into this arena. Parse errors inside the source
    /// (tree-sitter's ERROR nodes) are not rejected here; they surface
    /// later as `unresolved-reference`/`unparseable-source` diagnostics
    /// once the facade tries to resolve declarations against them.
    pub fn parse(file: &str, source: String, diagnostics: &mut Diagnostics) -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        let language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT;
        parser
            .set_language(&language.into())
            .map_err(|source| ParseError::Language { file: file.to_string(), source })?;

        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| ParseError::NoTree(file.to_string()))?;

        let mut nodes = Vec::new();
        let mut cursor = tree.walk();
        flatten(&mut cursor, &mut nodes, None, None);

        if tree.root_node().has_error() {
            diagnostics.report(
                crate::diagnostics::Severity::Warning,
                crate::diagnostics::DiagnosticKind::UnparseableSource,
                file.to_string(),
                1,
                1,
                String::new(),
                "source contains syntax the parser could not fully recover from".to_string(),
            );
        }

        Ok(SyntaxTree { file: file.to_string(), source, nodes })
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNodeData {
        &self.nodes[id as usize]
    }

    pub fn text(&self, id: NodeId) -> &str {
        let n = self.node(id);
        &self.source[n.start_byte..n.end_byte]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// First child carrying the given tree-sitter field name, if any.
    pub fn child_by_field(&self, id: NodeId, field: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.node(c).field_name == Some(field))
    }

    pub fn children_by_field<'a>(&'a self, id: NodeId, field: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id).iter().copied().filter(move |&c| self.node(c).field_name == Some(field))
    }

    /// Descendants in pre-order, including `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev());
        }
        out
    }

    pub fn line_of(&self, id: NodeId) -> usize {
        self.node(id).start_line + 1
    }
}

fn flatten(
    cursor: &mut TreeCursor,
    nodes: &mut Vec<SyntaxNodeData>,
    parent: Option<NodeId>,
    field_name: Option<&'static str>,
) -> NodeId {
    let node = cursor.node();
    let id = nodes.len() as NodeId;
    nodes.push(SyntaxNodeData {
        kind: node.kind(),
        is_named: node.is_named(),
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        start_line: node.start_position().row,
        field_name,
        parent,
        children: Vec::new(),
    });

    if cursor.goto_first_child() {
        loop {
            let fname = cursor.field_name();
            let child_id = flatten(cursor, nodes, Some(id), fname);
            nodes[id as usize].children.push(child_id);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }

    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_an_interface_declaration() {
        let mut diagnostics = Diagnostics::new();
        let tree = SyntaxTree::parse(
            "a.ts",
            "export interface Foo { bar: string }".to_string(),
            &mut diagnostics,
        )
        .unwrap();
        assert!(diagnostics.is_empty());
        let root_children = tree.children(tree.root());
        assert_eq!(root_children.len(), 1);
        assert_eq!(tree.node(root_children[0]).kind, "export_statement");
    }
}
