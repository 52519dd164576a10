//! Symbol Analyzer (C3).
//!
//! Walks declarations outward from each entry-point export, builds the
//! `AstGraph`'s symbol/declaration nesting, and records cross-symbol
//! references discovered while visiting each declaration's syntax
//! subtree. A symbol reached only through a reference (never exported)
//! still gets an `AstSymbol` here — the forgotten-export naming and
//! diagnostic are the Collector's job (C4), not this pass's.

use std::collections::HashSet;

use crate::diagnostics::{DiagnosticKind, Diagnostics, Severity};
use crate::facade::program::{FileId, Program, SymbolRef};
use crate::facade::syntax::NodeId;
use crate::graph::{AstDeclarationId, AstGraph, AstSymbolId};
use crate::names::{MEMBER_DECLARATION_KINDS, declaration_display_name, is_ast_declaration_kind, is_bare_enum_member};

/// Output of a full analysis pass: the frozen graph, plus the ordered
/// `(export_name, symbol)` pairs for the entry module in declaration
/// order — the Collector's admission order for exported entities.
pub struct AnalysisResult {
    pub graph: AstGraph,
    pub entry_exports: Vec<(String, AstSymbolId)>,
}

/// Runs the full analyzer algorithm (§5.3): entry exports first, in
/// declaration order; their transitive references discovered
/// depth-first; the graph frozen once every entry point is processed.
pub fn analyze(program: &Program, diagnostics: &mut Diagnostics) -> AnalysisResult {
    let mut graph = AstGraph::new();
    let mut visited = HashSet::new();
    let mut entry_exports = Vec::new();

    for (export_name, symbol_ref) in program.exported_symbols(program.entry()) {
        let imported = symbol_ref.file != program.entry();
        let id = ensure_symbol_built(program, &mut graph, symbol_ref, imported, diagnostics, &mut visited);
        entry_exports.push((export_name, id));
    }

    graph.freeze();
    AnalysisResult { graph, entry_exports }
}

/// Ensures `symbol_ref` has an `AstSymbol`, following the same rule as
/// `AstGraph::ensure_symbol`: idempotent by compiler-symbol identity.
/// The *first* time a symbol is seen, this also walks its declaration
/// sites and builds their child declaration/reference subtrees; later
/// calls (from a reference elsewhere in the graph) just return the
/// existing id, which is what makes mutually-referencing declarations
/// (a class whose method returns the class itself) terminate.
fn ensure_symbol_built(
    program: &Program,
    graph: &mut AstGraph,
    symbol_ref: SymbolRef,
    imported: bool,
    diagnostics: &mut Diagnostics,
    visited: &mut HashSet<AstSymbolId>,
) -> AstSymbolId {
    let tree = program.tree(symbol_ref.file);
    let local_name = declaration_display_name(tree, symbol_ref.node);
    let id = graph.ensure_symbol(symbol_ref, local_name, imported);
    if !visited.insert(id) {
        return id;
    }

    let sites = program.declaration_sites(symbol_ref).to_vec();
    for node in sites {
        let decl = graph.add_declaration(id, (symbol_ref.file, node), None);
        visit_children(program, graph, symbol_ref.file, node, decl, diagnostics, visited);
    }
    id
}

/// Builds a nested declaration (a class/interface member, or a further
/// declaration inside a namespace body) as its own symbol, attached as
/// a child of `parent`. Identity is the syntax node itself — nested
/// declarations have no cross-file aliasing to follow.
fn build_nested(
    program: &Program,
    graph: &mut AstGraph,
    file: FileId,
    node: NodeId,
    parent: AstDeclarationId,
    diagnostics: &mut Diagnostics,
    visited: &mut HashSet<AstSymbolId>,
) {
    let symbol_ref = SymbolRef { file, node };
    let tree = program.tree(file);
    let local_name = declaration_display_name(tree, node);
    let id = graph.ensure_symbol(symbol_ref, local_name, false);
    if !visited.insert(id) {
        // A syntax node can only ever be visited once (it has exactly
        // one declaration site), so this only guards against a
        // malformed re-walk, not real reuse.
        return;
    }
    let decl = graph.add_declaration(id, (file, node), Some(parent));
    visit_children(program, graph, file, node, decl, diagnostics, visited);
}

/// Walks `node`'s children looking for nested declaration-eligible
/// syntax (new child `AstDeclaration`s) and `type_identifier`
/// references to other symbols in the package (recorded against
/// `decl`). Wrapper kinds that are neither — bodies, parameter lists,
/// clauses — are recursed into transparently so declarations and
/// references nested arbitrarily deep are still found.
fn visit_children(
    program: &Program,
    graph: &mut AstGraph,
    file: FileId,
    node: NodeId,
    decl: AstDeclarationId,
    diagnostics: &mut Diagnostics,
    visited: &mut HashSet<AstSymbolId>,
) {
    let children = program.tree(file).children(node).to_vec();
    for child in children {
        let tree = program.tree(file);
        let kind = tree.node(child).kind;

        if kind == "comment" {
            continue;
        }

        if is_bare_enum_member(tree, child) || MEMBER_DECLARATION_KINDS.contains(&kind) {
            build_nested(program, graph, file, child, decl, diagnostics, visited);
            continue;
        }

        // A namespace/module body re-declaring further exported
        // declarations: unwrap the `export_statement` to the inner
        // declaration, which becomes a new nested symbol (unlike a
        // member, it keeps its own full declaration-eligible kind).
        if kind == "export_statement"
            && let Some(inner) = tree.child_by_field(child, "declaration")
                && is_ast_declaration_kind(tree.node(inner).kind) {
                    build_nested(program, graph, file, inner, decl, diagnostics, visited);
                    continue;
                }

        if kind == "type_identifier" && tree.node(child).field_name != Some("name") {
            resolve_reference(program, graph, file, child, decl, diagnostics, visited);
        }

        visit_children(program, graph, file, child, decl, diagnostics, visited);
    }
}

/// Resolves a `type_identifier` against the façade's same-package
/// binder and records a reference edge on success. A plain lowercase
/// `identifier` (parameter uses, expression operands) is not treated
/// as a type reference here — the façade does no type inference, and
/// without it there is no principled way to tell a value use from a
/// name that merely collides with a declared type.
fn resolve_reference(
    program: &Program,
    graph: &mut AstGraph,
    file: FileId,
    ident_node: NodeId,
    decl: AstDeclarationId,
    diagnostics: &mut Diagnostics,
    visited: &mut HashSet<AstSymbolId>,
) {
    let tree = program.tree(file);
    let name = tree.text(ident_node).to_string();
    match program.resolve_local(file, &name) {
        Some(target_ref) => {
            let imported = target_ref.file != file;
            let target_id = ensure_symbol_built(program, graph, target_ref, imported, diagnostics, visited);
            graph.add_reference(decl, target_id);
        }
        None => {
            diagnostics.report(
                Severity::Warning,
                DiagnosticKind::UnresolvedReference,
                tree.file.clone(),
                tree.line_of(ident_node),
                1,
                name.clone(),
                format!("could not resolve reference to `{name}`"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::program::Program;

    fn analyze_src(src: &str) -> (Program, AnalysisResult) {
        let mut diagnostics = Diagnostics::new();
        let files = vec![("index".to_string(), "index.ts".to_string(), src.to_string())];
        let program = Program::build(files, "index", &mut diagnostics).unwrap();
        let result = analyze(&program, &mut diagnostics);
        (program, result)
    }

    #[test]
    fn overloaded_function_yields_one_symbol_three_declarations() {
        let (_program, result) = analyze_src(
            "export function f(a: string): string;\nexport function f(a: number): number;\nexport function f(a: any): any { return a; }",
        );
        assert_eq!(result.entry_exports.len(), 1);
        let (name, symbol) = &result.entry_exports[0];
        assert_eq!(name, "f");
        assert_eq!(result.graph.symbol(*symbol).declarations.len(), 3);
    }

    #[test]
    fn merged_interface_yields_one_symbol_two_declarations() {
        let (_program, result) = analyze_src("export interface I { a: string }\nexport interface I { b: number }");
        assert_eq!(result.entry_exports.len(), 1);
        let (_name, symbol) = &result.entry_exports[0];
        assert_eq!(result.graph.symbol(*symbol).declarations.len(), 2);
    }

    #[test]
    fn forgotten_export_becomes_a_symbol_via_reference() {
        let (_program, result) =
            analyze_src("interface IHidden { x: number }\nexport class C { method(): IHidden { return { x: 1 }; } }");
        assert_eq!(result.entry_exports.len(), 1);
        let (_name, c_symbol) = &result.entry_exports[0];
        let c_decl = result.graph.symbol(*c_symbol).declarations[0];
        // `C`'s only child declaration is `method`; it references `IHidden`.
        let method_decl = result.graph.children(c_decl)[0];
        let refs = result.graph.referenced_ast_symbols(method_decl);
        assert_eq!(refs.len(), 1);
        assert_eq!(result.graph.symbol(refs[0]).local_name, "IHidden");
    }

    #[test]
    fn class_members_nest_under_the_class_declaration() {
        let (_program, result) =
            analyze_src("export class C {\n  constructor(x: number) {}\n  method(): void {}\n  prop: string = \"x\";\n}");
        let (_name, symbol) = &result.entry_exports[0];
        let decl = result.graph.symbol(*symbol).declarations[0];
        let children = result.graph.children(decl);
        assert_eq!(children.len(), 3);
    }

    #[test]
    fn enum_members_are_nested_declarations() {
        let (_program, result) = analyze_src("export enum Color { Red, Green = 2 }");
        let (_name, symbol) = &result.entry_exports[0];
        let decl = result.graph.symbol(*symbol).declarations[0];
        assert_eq!(result.graph.children(decl).len(), 2);
    }

    #[test]
    fn nested_namespace_member_becomes_its_own_symbol() {
        let (_program, result) = analyze_src("export namespace NS {\n  export interface Inner { a: number }\n}");
        let (_name, ns_symbol) = &result.entry_exports[0];
        let ns_decl = result.graph.symbol(*ns_symbol).declarations[0];
        let children = result.graph.children(ns_decl);
        assert_eq!(children.len(), 1);
        let inner_symbol = result.graph.declaration(children[0]).symbol;
        assert_eq!(result.graph.symbol(inner_symbol).local_name, "Inner");
    }

    #[test]
    fn unresolved_type_reference_is_dropped_with_a_warning() {
        let mut diagnostics = Diagnostics::new();
        let files = vec![("index".to_string(), "index.ts".to_string(), "export function f(): NotDeclared { return null as any; }".to_string())];
        let program = Program::build(files, "index", &mut diagnostics).unwrap();
        let result = analyze(&program, &mut diagnostics);
        let (_name, symbol) = &result.entry_exports[0];
        let decl = result.graph.symbol(*symbol).declarations[0];
        assert!(result.graph.referenced_ast_symbols(decl).is_empty());
        assert!(diagnostics.entries().iter().any(|d| d.kind == DiagnosticKind::UnresolvedReference));
    }
}
