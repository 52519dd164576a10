//! Collector (C4): owns the ordered list of admitted `CollectorEntity`
//! values, resolves `nameForEmit` collisions, and orchestrates the
//! metadata pass (C5) — parsing doc comments, resolving release tags,
//! and recording the semantic warnings that depend on more than one
//! declaration at a time (incompatible tags, type leaks, forgotten
//! exports).

use std::collections::HashMap;

use crate::config::ReleaseTag;
use crate::diagnostics::{DiagnosticKind, Diagnostics, Severity};
use crate::facade::program::Program;
use crate::facade::syntax::SyntaxTree;
use crate::graph::{AstDeclarationId, AstGraph, AstSymbolId};
use crate::metadata::{self, DeclarationMetadata, DocPolicy, ReleaseTagResolution, SymbolMetadata};
use crate::names::is_bare_enum_member;

/// One per uniquely-named element in the emitted API surface: either a
/// direct export of the entry module, or a symbol reached only via a
/// reference from the exported surface (a forgotten export).
#[derive(Debug, Clone)]
pub struct CollectorEntity {
    pub ast_symbol: AstSymbolId,
    pub exported: bool,
    pub name_for_emit: String,
    pub sort_key: String,
}

pub struct Collector {
    entities: Vec<CollectorEntity>,
    by_symbol: HashMap<AstSymbolId, usize>,
    taken_names: HashMap<String, u32>,
}

impl Collector {
    /// Admits entities from an `AnalysisResult`: entry exports first (in
    /// declaration order), then every other top-level symbol the
    /// analyzer discovered only via a reference — forgotten exports.
    /// Members (symbols whose declarations are nested under a parent
    /// declaration) are never admitted as entities of their own; they
    /// are emitted inline under their container by the review
    /// generator instead.
    pub fn collect(entry_exports: &[(String, AstSymbolId)], graph: &AstGraph, diagnostics: &mut Diagnostics) -> Collector {
        let mut collector = Collector { entities: Vec::new(), by_symbol: HashMap::new(), taken_names: HashMap::new() };

        for (export_name, symbol) in entry_exports {
            collector.admit(*symbol, true, export_name.clone());
        }

        for symbol in graph.symbol_ids() {
            if collector.by_symbol.contains_key(&symbol) {
                continue;
            }
            let is_top_level = graph
                .symbol(symbol)
                .declarations
                .first()
                .is_some_and(|&d| graph.declaration(d).parent.is_none());
            if !is_top_level {
                continue; // a class/interface/namespace member, not a collector entity
            }
            let local_name = graph.symbol(symbol).local_name.clone();
            collector.admit(symbol, false, local_name.clone());

            let first_decl = graph.symbol(symbol).declarations[0];
            let (file, _node) = graph.declaration(first_decl).syntax_node;
            diagnostics.report(
                Severity::Warning,
                DiagnosticKind::ForgottenExport,
                file.to_string(),
                0,
                0,
                local_name,
                "type is reachable from the public API but not itself exported".to_string(),
            );
        }

        collector
    }

    fn admit(&mut self, symbol: AstSymbolId, exported: bool, desired_name: String) {
        let name_for_emit = self.resolve_collision(&desired_name);
        let sort_key = get_sort_key_ignoring_underscore(&name_for_emit);
        let index = self.entities.len();
        self.entities.push(CollectorEntity { ast_symbol: symbol, exported, name_for_emit, sort_key });
        self.by_symbol.insert(symbol, index);
    }

    /// First entity with a desired name keeps it; every later collision
    /// is suffixed `_2`, `_3`, … in admission order.
    fn resolve_collision(&mut self, desired: &str) -> String {
        if !self.taken_names.contains_key(desired) {
            self.taken_names.insert(desired.to_string(), 1);
            return desired.to_string();
        }
        let mut count = *self.taken_names.get(desired).unwrap();
        loop {
            count += 1;
            let candidate = format!("{desired}_{count}");
            if !self.taken_names.contains_key(&candidate) {
                self.taken_names.insert(candidate.clone(), 1);
                self.taken_names.insert(desired.to_string(), count);
                return candidate;
            }
        }
    }

    pub fn entities(&self) -> &[CollectorEntity] {
        &self.entities
    }

    pub fn try_get_entity_by_symbol(&self, symbol: AstSymbolId) -> Option<&CollectorEntity> {
        self.by_symbol.get(&symbol).map(|&i| &self.entities[i])
    }

    /// Runs the metadata pass over every admitted entity and every
    /// declaration reachable from it (including nested members),
    /// memoizing results on the graph's own `metadata` slots and
    /// recording semantic warnings along the way. Idempotent: a second
    /// run finds everything already memoized and changes nothing.
    pub fn run_metadata_pass(&self, graph: &mut AstGraph, program: &Program, diagnostics: &mut Diagnostics) {
        let roots: Vec<AstDeclarationId> =
            self.entities.iter().flat_map(|e| graph.symbol(e.ast_symbol).declarations.clone()).collect();

        let mut all_decls = Vec::new();
        for root in roots {
            graph.for_each_declaration_recursive(root, |d| all_decls.push(d));
        }

        for &decl in &all_decls {
            self.fetch_declaration_metadata(graph, program, decl);
        }

        let mut seen_symbols = std::collections::HashSet::new();
        for &decl in &all_decls {
            let symbol = graph.declaration(decl).symbol;
            if seen_symbols.insert(symbol) {
                self.fetch_symbol_metadata(graph, program, symbol, diagnostics);
            }
        }

        for &decl in &all_decls {
            self.check_type_leak(graph, decl, diagnostics);
            self.check_modifier_validity(graph, program, decl, diagnostics);
        }
    }

    fn fetch_declaration_metadata<'g>(
        &self,
        graph: &'g mut AstGraph,
        program: &Program,
        decl: AstDeclarationId,
    ) -> &'g DeclarationMetadata {
        if graph.declaration(decl).metadata.is_none() {
            let declaration = graph.declaration(decl);
            let (file, node) = declaration.syntax_node;
            let symbol_decls = &graph.symbol(declaration.symbol).declarations;
            let index = symbol_decls.iter().position(|&d| d == decl).unwrap_or(0);
            let tree = program.tree(file);
            let mut policy = DocPolicy::default();
            refine_policy(tree, node, index, &mut policy);
            let computed = metadata::compute_declaration_metadata(tree, node, policy);
            graph.declaration_mut(decl).metadata = Some(computed);
        }
        graph.declaration(decl).metadata.as_ref().unwrap()
    }

    fn fetch_symbol_metadata(
        &self,
        graph: &mut AstGraph,
        program: &Program,
        symbol: AstSymbolId,
        diagnostics: &mut Diagnostics,
    ) -> SymbolMetadata {
        if let Some(m) = graph.symbol(symbol).metadata {
            return m;
        }

        let declarations = graph.symbol(symbol).declarations.clone();
        let mut tags = Vec::with_capacity(declarations.len());
        for &decl in &declarations {
            let meta = self.fetch_declaration_metadata(graph, program, decl);
            tags.push(meta.doc.as_ref().and_then(|d| d.release_tag()));
        }

        let parent_symbol = declarations
            .first()
            .and_then(|&d| graph.declaration(d).parent)
            .map(|p| graph.declaration(p).symbol);
        let parent_tag = parent_symbol.map(|p| self.fetch_symbol_metadata(graph, program, p, diagnostics).release_tag);

        let local_name = graph.symbol(symbol).local_name.clone();
        let (first_file, first_node) = declarations.first().map(|&d| graph.declaration(d).syntax_node).unwrap();

        let (tag, same_as_parent) = match metadata::resolve_declared_release_tag(&tags) {
            ReleaseTagResolution::Explicit(tag) => (tag, parent_tag == Some(tag)),
            ReleaseTagResolution::Inconsistent => {
                diagnostics.report(
                    Severity::Warning,
                    DiagnosticKind::IncompatibleReleaseTags,
                    first_file.to_string(),
                    0,
                    0,
                    local_name.clone(),
                    "declarations of this symbol carry different release tags".to_string(),
                );
                (ReleaseTag::Public, parent_tag == Some(ReleaseTag::Public))
            }
            ReleaseTagResolution::Unspecified => match parent_tag {
                Some(tag) => (tag, true),
                None => {
                    let is_exported_entity = self.try_get_entity_by_symbol(symbol).is_some_and(|e| e.exported);
                    if is_exported_entity {
                        diagnostics.report(
                            Severity::Warning,
                            DiagnosticKind::MissingReleaseTag,
                            first_file.to_string(),
                            0,
                            0,
                            local_name.clone(),
                            "exported entity has no release tag".to_string(),
                        );
                    }
                    let _ = first_node;
                    (ReleaseTag::None, false)
                }
            },
        };

        let result = SymbolMetadata { release_tag: tag, release_tag_same_as_parent: same_as_parent };
        graph.symbol_mut(symbol).metadata = Some(result);
        result
    }

    fn check_type_leak(&self, graph: &AstGraph, decl: AstDeclarationId, diagnostics: &mut Diagnostics) {
        let declaring_symbol = graph.declaration(decl).symbol;
        let Some(declaring_tag) = graph.symbol(declaring_symbol).metadata.map(|m| m.release_tag) else { return };

        for &referenced in graph.referenced_ast_symbols(decl) {
            let Some(referenced_meta) = graph.symbol(referenced).metadata else { continue };
            if referenced_meta.release_tag < declaring_tag {
                let (file, _) = graph.declaration(decl).syntax_node;
                diagnostics.report(
                    Severity::Warning,
                    DiagnosticKind::TypeLeak,
                    file.to_string(),
                    0,
                    0,
                    graph.symbol(declaring_symbol).local_name.clone(),
                    format!(
                        "{} ({declaring_tag}) references {} ({}), which is less public",
                        graph.symbol(declaring_symbol).local_name,
                        graph.symbol(referenced).local_name,
                        referenced_meta.release_tag,
                    ),
                );
            }
        }
    }

    fn check_modifier_validity(&self, graph: &AstGraph, program: &Program, decl: AstDeclarationId, diagnostics: &mut Diagnostics) {
        let Some(meta) = &graph.declaration(decl).metadata else { return };
        let (file, node) = graph.declaration(decl).syntax_node;
        let tree = program.tree(file);
        let kind = tree.node(node).kind;
        let declarable_override = matches!(kind, "method_definition" | "public_field_definition");
        let symbol_name = graph.symbol(graph.declaration(decl).symbol).local_name.clone();

        if meta.is_override && !declarable_override {
            diagnostics.report(
                Severity::Warning,
                DiagnosticKind::InvalidOverride,
                file.to_string(),
                tree.line_of(node),
                0,
                symbol_name.clone(),
                "@override is only valid on a class method or property".to_string(),
            );
        }
        if meta.is_virtual && !declarable_override {
            diagnostics.report(
                Severity::Warning,
                DiagnosticKind::InvalidVirtual,
                file.to_string(),
                tree.line_of(node),
                0,
                symbol_name,
                "@virtual is only valid on a class method or property".to_string(),
            );
        }
    }
}

/// Strips a single leading underscore before comparison, so `_foo`
/// sorts next to `foo` (after it on ties).
pub fn get_sort_key_ignoring_underscore(name: &str) -> String {
    name.strip_prefix('_').unwrap_or(name).to_string()
}

/// Fills in the doc-exemption policy bits that depend on the
/// declaration's syntax kind and its position within its symbol's
/// declaration group.
fn refine_policy(tree: &SyntaxTree, node: u32, index_in_group: usize, policy: &mut DocPolicy) {
    let kind = tree.node(node).kind;
    policy.is_constructor = crate::names::is_constructor(tree, node);
    policy.is_enum_member = kind == "enum_assignment" || is_bare_enum_member(tree, node);
    policy.is_non_first_overload =
        index_in_group > 0 && matches!(kind, "function_signature" | "function_declaration" | "method_signature" | "method_definition");
    policy.is_merged_namespace_redeclaration = index_in_group > 0 && matches!(kind, "module" | "internal_module");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;

    fn run(src: &str) -> (Program, AstGraph, Collector, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let files = vec![("index".to_string(), "index.ts".to_string(), src.to_string())];
        let program = Program::build(files, "index", &mut diagnostics).unwrap();
        let result = analyze(&program, &mut diagnostics);
        let mut graph = result.graph;
        let collector = Collector::collect(&result.entry_exports, &graph, &mut diagnostics);
        collector.run_metadata_pass(&mut graph, &program, &mut diagnostics);
        (program, graph, collector, diagnostics)
    }

    #[test]
    fn forgotten_export_is_admitted_non_exported_with_warning() {
        let (_p, _g, collector, diagnostics) =
            run("interface IHidden {}\nexport class C { method(): IHidden { return {} as IHidden } }");
        assert_eq!(collector.entities().len(), 2);
        let hidden = collector.entities().iter().find(|e| e.name_for_emit == "IHidden").unwrap();
        assert!(!hidden.exported);
        assert!(diagnostics.entries().iter().any(|d| d.kind == DiagnosticKind::ForgottenExport));
    }

    #[test]
    fn name_collision_is_suffixed_in_admission_order() {
        let (_p, _g, collector, _d) = run(
            "export interface Foo { a: string }\ninterface FooInner {}\nexport class Uses { m(): FooInner { return {} as FooInner } }",
        );
        // Not a real collision case on its own; covered more directly at
        // the Program level. Here we just check sort keys strip `_`.
        assert_eq!(get_sort_key_ignoring_underscore("_alpha"), "alpha");
        assert_eq!(get_sort_key_ignoring_underscore("zebra"), "zebra");
        let _ = collector;
    }

    #[test]
    fn missing_release_tag_warns_on_exported_entity() {
        let (_p, _g, _c, diagnostics) = run("export interface Foo { a: string }");
        assert!(diagnostics.entries().iter().any(|d| d.kind == DiagnosticKind::MissingReleaseTag));
    }

    #[test]
    fn release_tag_inherits_from_parent_symbol() {
        let (_p, g, c, _d) = run("/**\n * @public\n */\nexport class C {\n  method(): void {}\n}");
        let entity = &c.entities()[0];
        let class_symbol = entity.ast_symbol;
        let decl = g.symbol(class_symbol).declarations[0];
        let method_decl = g.children(decl)[0];
        let method_symbol = g.declaration(method_decl).symbol;
        let method_meta = g.symbol(method_symbol).metadata.unwrap();
        assert_eq!(method_meta.release_tag, ReleaseTag::Public);
        assert!(method_meta.release_tag_same_as_parent);
    }

    #[test]
    fn type_leak_is_detected() {
        let (_p, _g, _c, diagnostics) = run(
            "/**\n * @internal\n */\ninterface Hidden {}\n/**\n * @public\n */\nexport function f(): Hidden { return {} as Hidden }",
        );
        assert!(diagnostics.entries().iter().any(|d| d.kind == DiagnosticKind::TypeLeak));
    }
}
