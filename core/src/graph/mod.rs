//! The AST graph: arena-allocated `AstSymbol`/`AstDeclaration` nodes
//! addressed by integer handles. Neither type owns a pointer to the
//! other directly — both live in `Vec`s owned by `AstGraph`, and cross
//! references are plain indices. This is what lets a symbol's
//! declarations reference the symbol itself and vice versa without a
//! borrow-checker fight or an `Rc<RefCell<_>>` maze.

use std::collections::HashMap;

use crate::facade::{FileId, NodeId, SymbolRef};
use crate::metadata::{DeclarationMetadata, SymbolMetadata};

pub type AstSymbolId = u32;
pub type AstDeclarationId = u32;

#[derive(Debug)]
pub struct AstSymbol {
    pub local_name: String,
    /// Declared outside the package (or otherwise not backed by a
    /// syntax node we can show the user) — always false for this
    /// same-package binder; kept for parity with the richer data model
    /// a multi-package analyzer would need.
    pub nominal: bool,
    /// Reached only via an import/re-export alias rather than declared
    /// directly in the module being analyzed.
    pub imported: bool,
    pub declarations: Vec<AstDeclarationId>,
    pub analyzed: bool,
    pub metadata: Option<SymbolMetadata>,
}

#[derive(Debug)]
pub struct AstDeclaration {
    pub symbol: AstSymbolId,
    pub syntax_node: (FileId, NodeId),
    pub parent: Option<AstDeclarationId>,
    pub children: Vec<AstDeclarationId>,
    pub references: Vec<AstSymbolId>,
    pub metadata: Option<DeclarationMetadata>,
}

#[derive(Default)]
pub struct AstGraph {
    symbols: Vec<AstSymbol>,
    declarations: Vec<AstDeclaration>,
    symbol_by_ref: HashMap<SymbolRef, AstSymbolId>,
    symbol_refs: Vec<SymbolRef>,
    frozen: bool,
}

impl AstGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing `AstSymbol` for `symbol_ref` or creates one.
    /// One compiler symbol maps to exactly one `AstSymbol` for the life
    /// of the graph, regardless of how many aliases reach it.
    pub fn ensure_symbol(&mut self, symbol_ref: SymbolRef, local_name: String, imported: bool) -> AstSymbolId {
        if let Some(&id) = self.symbol_by_ref.get(&symbol_ref) {
            return id;
        }
        assert!(!self.frozen, "cannot create symbols after the graph is frozen");
        let id = self.symbols.len() as AstSymbolId;
        self.symbols.push(AstSymbol {
            local_name,
            nominal: false,
            imported,
            declarations: Vec::new(),
            analyzed: false,
            metadata: None,
        });
        self.symbol_by_ref.insert(symbol_ref, id);
        self.symbol_refs.push(symbol_ref);
        id
    }

    pub fn symbol_ref_for(&self, id: AstSymbolId) -> SymbolRef {
        self.symbol_refs[id as usize]
    }

    pub fn symbol(&self, id: AstSymbolId) -> &AstSymbol {
        &self.symbols[id as usize]
    }

    pub fn symbol_mut(&mut self, id: AstSymbolId) -> &mut AstSymbol {
        &mut self.symbols[id as usize]
    }

    pub fn declaration(&self, id: AstDeclarationId) -> &AstDeclaration {
        &self.declarations[id as usize]
    }

    pub fn declaration_mut(&mut self, id: AstDeclarationId) -> &mut AstDeclaration {
        &mut self.declarations[id as usize]
    }

    /// Creates a declaration for `symbol`, attached under `parent` if
    /// given. Mirrors syntactic nesting; intermediate non-declaration
    /// syntax kinds are never represented here.
    pub fn add_declaration(
        &mut self,
        symbol: AstSymbolId,
        syntax_node: (FileId, NodeId),
        parent: Option<AstDeclarationId>,
    ) -> AstDeclarationId {
        assert!(!self.frozen, "cannot add declarations after the graph is frozen");
        if let Some(p) = parent {
            assert!((p as usize) < self.declarations.len(), "parent declaration does not exist");
        }
        let id = self.declarations.len() as AstDeclarationId;
        self.declarations.push(AstDeclaration {
            symbol,
            syntax_node,
            parent,
            children: Vec::new(),
            references: Vec::new(),
            metadata: None,
        });
        if let Some(p) = parent {
            self.declarations[p as usize].children.push(id);
        }
        self.symbols[symbol as usize].declarations.push(id);
        id
    }

    /// Records that `from` references `to`. No-ops for self-references
    /// and references to a symbol already owning one of `from`'s
    /// ancestor declarations, and dedupes by identity.
    pub fn add_reference(&mut self, from: AstDeclarationId, to: AstSymbolId) {
        assert!(!self.frozen, "cannot add references after the graph is frozen");
        if self.points_to_self_or_ancestor(from, to) {
            return;
        }
        let refs = &mut self.declarations[from as usize].references;
        if !refs.contains(&to) {
            refs.push(to);
        }
    }

    fn points_to_self_or_ancestor(&self, from: AstDeclarationId, to: AstSymbolId) -> bool {
        let mut cursor = Some(from);
        while let Some(d) = cursor {
            if self.declarations[d as usize].symbol == to {
                return true;
            }
            cursor = self.declarations[d as usize].parent;
        }
        false
    }

    pub fn children(&self, id: AstDeclarationId) -> &[AstDeclarationId] {
        &self.declarations[id as usize].children
    }

    pub fn referenced_ast_symbols(&self, id: AstDeclarationId) -> &[AstSymbolId] {
        &self.declarations[id as usize].references
    }

    pub fn for_each_declaration_recursive(&self, root: AstDeclarationId, mut f: impl FnMut(AstDeclarationId)) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            f(id);
            stack.extend(self.children(id).iter().rev());
        }
    }

    /// Marks every symbol analyzed and freezes the graph against further
    /// mutation. Called once, after all entry points have been walked.
    pub fn freeze(&mut self) {
        for symbol in &mut self.symbols {
            symbol.analyzed = true;
        }
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn symbol_ids(&self) -> impl Iterator<Item = AstSymbolId> {
        0..self.symbols.len() as AstSymbolId
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symref(file: FileId, node: NodeId) -> SymbolRef {
        SymbolRef { file, node }
    }

    #[test]
    fn ensure_symbol_is_idempotent_by_identity() {
        let mut graph = AstGraph::new();
        let a = graph.ensure_symbol(symref(0, 1), "Foo".into(), false);
        let b = graph.ensure_symbol(symref(0, 1), "Foo".into(), false);
        assert_eq!(a, b);
        let c = graph.ensure_symbol(symref(0, 2), "Bar".into(), false);
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_self_and_ancestor_references() {
        let mut graph = AstGraph::new();
        let sym_a = graph.ensure_symbol(symref(0, 1), "A".into(), false);
        let sym_b = graph.ensure_symbol(symref(0, 2), "B".into(), false);
        let decl_a = graph.add_declaration(sym_a, (0, 1), None);
        let decl_b = graph.add_declaration(sym_b, (0, 2), Some(decl_a));

        graph.add_reference(decl_b, sym_a); // ancestor, rejected
        assert!(graph.referenced_ast_symbols(decl_b).is_empty());

        graph.add_reference(decl_b, sym_b); // self, rejected
        assert!(graph.referenced_ast_symbols(decl_b).is_empty());

        let sym_c = graph.ensure_symbol(symref(0, 3), "C".into(), false);
        graph.add_reference(decl_b, sym_c);
        graph.add_reference(decl_b, sym_c); // dedup
        assert_eq!(graph.referenced_ast_symbols(decl_b), &[sym_c]);
    }

    #[test]
    fn freeze_marks_all_symbols_analyzed() {
        let mut graph = AstGraph::new();
        let sym = graph.ensure_symbol(symref(0, 1), "A".into(), false);
        graph.freeze();
        assert!(graph.symbol(sym).analyzed);
        assert!(graph.is_frozen());
    }

    #[test]
    #[should_panic]
    fn panics_on_mutation_after_freeze() {
        let mut graph = AstGraph::new();
        graph.freeze();
        graph.ensure_symbol(symref(0, 9), "X".into(), false);
    }
}
