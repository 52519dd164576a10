//! Review File Generator (C7).
//!
//! Renders the Collector's admitted entities (§C4) back out as
//! normalized TypeScript source: one block per declaration, each
//! preceded by an AEDoc synopsis comment summarizing its release tag
//! and modifiers, with nested members sorted and re-indented and every
//! identifier reference rewritten to the name the Collector settled on
//! after collision resolution. Built entirely on top of the Span tree
//! (§C6) — nothing here touches source bytes directly.

use std::collections::HashMap;

use crate::collector::Collector;
use crate::config::ReleaseTag;
use crate::facade::program::{FileId, Program, SymbolRef};
use crate::facade::syntax::SyntaxTree;
use crate::graph::{AstDeclarationId, AstGraph, AstSymbolId};
use crate::metadata;
use crate::span::{self, Modification, Span};

/// Renders the full review file for every entity the Collector admitted,
/// in admission order, separated by a blank line between entities.
pub fn generate_review_file(graph: &AstGraph, program: &Program, collector: &Collector) -> String {
    let sym_map: HashMap<SymbolRef, AstSymbolId> = graph.symbol_ids().map(|id| (graph.symbol_ref_for(id), id)).collect();

    let mut out = String::new();
    for (i, entity) in collector.entities().iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let declarations = graph.symbol(entity.ast_symbol).declarations.clone();
        for (j, &decl) in declarations.iter().enumerate() {
            if j > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&render_declaration(graph, program, collector, &sym_map, decl));
        }
    }

    if !has_package_documentation(program) {
        out.push_str("\n\n// (No @packageDocumentation comment for this package)\n");
    } else {
        out.push('\n');
    }
    out
}

/// Renders one top-level declaration site: its synopsis line, its
/// `export`/`default` keywords stripped, its top-level `declare`
/// prefix applied if it is a bare variable, its members sorted and
/// annotated, and every reference inside it renamed.
fn render_declaration(
    graph: &AstGraph,
    program: &Program,
    collector: &Collector,
    sym_map: &HashMap<SymbolRef, AstSymbolId>,
    decl: AstDeclarationId,
) -> String {
    let declaration = graph.declaration(decl);
    let (file, node) = declaration.syntax_node;
    let tree = program.tree(file);
    let source = &tree.source;

    let anchor = metadata::doc_comment_anchor(tree, node);
    let mut root = span::build_span(tree, file, anchor);

    if tree.node(anchor).kind == "export_statement" {
        for child in &mut root.children {
            if matches!(child.kind, "export" | "default") {
                child.modification = Modification::skip_all();
            }
        }
    }

    let is_top_level_var = declaration.parent.is_none() && matches!(tree.node(node).kind, "lexical_declaration" | "variable_declaration");
    if is_top_level_var {
        apply_declare_prefix(&mut root);
    }

    process_declaration(&mut root, graph, decl, file, source);
    rename_references(tree, program, sym_map, collector, &mut root);
    skip_all_comments(&mut root);

    let mut block = String::new();
    if let Some(tokens) = synopsis_tokens(graph, decl) {
        block.push_str("// ");
        block.push_str(&tokens);
        block.push('\n');
    }

    let mut text = root.get_modified_text(source);
    if is_top_level_var {
        let trimmed = text.trim_end().to_string();
        text = if trimmed.ends_with(';') { trimmed } else { format!("{trimmed};") };
    }
    block.push_str(&text);
    block
}

/// Marks each container's member list sortable and attaches a sort key
/// and synopsis prefix to every nested member, recursing into further
/// nesting (a namespace re-declaring a class with its own members).
fn process_declaration(root: &mut Span, graph: &AstGraph, decl: AstDeclarationId, file: FileId, source: &str) {
    let children_decls = graph.children(decl).to_vec();
    if !children_decls.is_empty() {
        let (_, node) = graph.declaration(decl).syntax_node;
        if let Some(decl_span) = root.find_node_mut((file, node))
            && let Some(body) = find_container_body(decl_span) {
                body.modification.sort_children = true;
                for &child_decl in &children_decls {
                    let (_, child_node) = graph.declaration(child_decl).syntax_node;
                    let local_name = graph.symbol(graph.declaration(child_decl).symbol).local_name.clone();
                    let sort_key = crate::collector::get_sort_key_ignoring_underscore(&local_name);
                    if let Some(cluster) = body.children.iter_mut().find(|c| c.contains_node((file, child_node))) {
                        cluster.modification.sort_key = Some(sort_key);
                    }
                }
            }
    }

    for &child_decl in &children_decls {
        let (_, child_node) = graph.declaration(child_decl).syntax_node;
        if let Some(child_span) = root.find_node_mut((file, child_node)) {
            inject_synopsis(child_span, graph, child_decl, source);
        }
        process_declaration(root, graph, child_decl, file, source);
    }
}

/// The member-list body directly under `span`: an interface/class/enum
/// body, or — for a namespace — its `statement_block`.
fn find_container_body(span: &mut Span) -> Option<&mut Span> {
    let kind = ["interface_body", "class_body", "enum_body"]
        .into_iter()
        .find(|&k| span.find_first_by_kind_mut(k).is_some())
        .or_else(|| span.find_first_by_kind_mut("statement_block").is_some().then_some("statement_block"))?;
    span.find_first_by_kind_mut(kind)
}

/// Injects `// <tokens>\n<indent>` ahead of a member's own text,
/// matching the column the member already starts at.
fn inject_synopsis(span: &mut Span, graph: &AstGraph, decl: AstDeclarationId, source: &str) {
    if let Some(tokens) = synopsis_tokens(graph, decl) {
        let indent = " ".repeat(column_of(source, span.start_index));
        span.modification.prefix_override = Some(format!("// {tokens}\n{indent}"));
    }
}

fn column_of(source: &str, byte_index: usize) -> usize {
    let line_start = source[..byte_index].rfind('\n').map(|p| p + 1).unwrap_or(0);
    byte_index - line_start
}

/// A bare top-level `const`/`let`/`var` is reviewed as if it carried an
/// ambient `declare` modifier: the keyword itself is replaced so a
/// package that already wrote `declare const x` is never double-prefixed.
fn apply_declare_prefix(span: &mut Span) {
    let decl_span = match span.find_first_by_kind_mut("lexical_declaration") {
        Some(s) => Some(s),
        None => span.find_first_by_kind_mut("variable_declaration"),
    };
    let Some(decl_span) = decl_span else { return };

    let keyword = decl_span.children.iter().find(|c| matches!(c.kind, "const" | "let" | "var")).map(|c| c.kind);
    let Some(keyword) = keyword else { return };

    decl_span.modification.prefix_override = Some(format!("declare {keyword} "));
    for c in &mut decl_span.children {
        if matches!(c.kind, "const" | "let" | "var") {
            c.modification = Modification::skip_all();
        }
    }
}

/// Rewrites every `type_identifier` span whose resolved symbol was
/// renamed by the Collector's collision resolution to the name it
/// settled on.
fn rename_references(tree: &SyntaxTree, program: &Program, sym_map: &HashMap<SymbolRef, AstSymbolId>, collector: &Collector, span: &mut Span) {
    if span.kind == "type_identifier"
        && let Some((ref_file, node)) = span.node {
            let name = tree.text(node).to_string();
            if let Some(target_ref) = program.resolve_local(ref_file, &name)
                && let Some(&symbol_id) = sym_map.get(&target_ref)
                    && let Some(entity) = collector.try_get_entity_by_symbol(symbol_id)
                        && entity.name_for_emit != name {
                            span.modification.prefix_override = Some(entity.name_for_emit.clone());
                            span.modification.suffix_override = Some(String::new());
                            span.modification.omit_children = true;
                        }
        }
    for c in &mut span.children {
        rename_references(tree, program, sym_map, collector, c);
    }
}

fn skip_all_comments(span: &mut Span) {
    if span.kind == "comment" {
        span.modification = Modification::skip_all();
        return;
    }
    for c in &mut span.children {
        skip_all_comments(c);
    }
}

/// The AEDoc synopsis tokens for a declaration: its release tag (unless
/// inherited unchanged from its parent, or unset), modifier tags, and
/// the documentation-missing marker — `None` if none apply.
fn synopsis_tokens(graph: &AstGraph, decl: AstDeclarationId) -> Option<String> {
    let declaration = graph.declaration(decl);
    let dmeta = declaration.metadata.as_ref()?;
    let symbol = graph.symbol(declaration.symbol);

    let mut tokens = Vec::new();
    if let Some(smeta) = symbol.metadata
        && !smeta.release_tag_same_as_parent && smeta.release_tag != ReleaseTag::None {
            tokens.push(smeta.release_tag.to_string());
        }
    if dmeta.is_sealed {
        tokens.push("@sealed".to_string());
    }
    if dmeta.is_virtual {
        tokens.push("@virtual".to_string());
    }
    if dmeta.is_override {
        tokens.push("@override".to_string());
    }
    if dmeta.is_event_property {
        tokens.push("@eventproperty".to_string());
    }
    if dmeta.doc.as_ref().is_some_and(|d| d.is_deprecated) {
        tokens.push("@deprecated".to_string());
    }
    if dmeta.needs_documentation {
        tokens.push("(undocumented)".to_string());
    }

    if tokens.is_empty() { None } else { Some(tokens.join(" ")) }
}

/// `true` if the entry module's first top-level comment carries
/// `@packageDocumentation`.
fn has_package_documentation(program: &Program) -> bool {
    let tree = program.tree(program.entry());
    tree.children(tree.root())
        .iter()
        .any(|&c| tree.node(c).kind == "comment" && tree.text(c).contains("@packageDocumentation"))
}

/// Compares two review file contents ignoring incidental whitespace
/// differences (run length, trailing blank lines) — the rule an
/// existing `api-review.md` is checked against before it is rewritten.
pub fn are_equivalent_api_file_contents(a: &str, b: &str) -> bool {
    collapse_whitespace(a) == collapse_whitespace(b)
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::new();
    let mut in_whitespace = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
                in_whitespace = true;
            }
        } else {
            out.push(ch);
            in_whitespace = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::diagnostics::Diagnostics;

    fn review_src(src: &str) -> String {
        let mut diagnostics = Diagnostics::new();
        let files = vec![("index".to_string(), "index.ts".to_string(), src.to_string())];
        let program = Program::build(files, "index", &mut diagnostics).unwrap();
        let result = analyze(&program, &mut diagnostics);
        let mut graph = result.graph;
        let collector = Collector::collect(&result.entry_exports, &graph, &mut diagnostics);
        collector.run_metadata_pass(&mut graph, &program, &mut diagnostics);
        generate_review_file(&graph, &program, &collector)
    }

    #[test]
    fn exported_declaration_drops_the_export_keyword() {
        let out = review_src("/**\n * @public\n */\nexport interface Foo {\n  bar: string;\n}\n");
        assert!(!out.contains("export interface"));
        assert!(out.contains("interface Foo"));
    }

    #[test]
    fn merged_interface_renders_each_declaration_site_as_its_own_block() {
        // S2: a declaration-merged interface's two sites are each rendered
        // in full, in source order, rather than combined into one block.
        let out = review_src(
            "/**\n * @public\n */\nexport interface I {\n  a: string;\n}\n/**\n * @public\n */\nexport interface I {\n  b: number;\n}\n",
        );
        assert_eq!(out.matches("interface I").count(), 2);
        assert!(out.contains("a: string"));
        assert!(out.contains("b: number"));
        let first = out.find("interface I").unwrap();
        let second = out.rfind("interface I").unwrap();
        assert!(out[first..second].contains("a: string"));
        assert!(out[second..].contains("b: number"));
    }

    #[test]
    fn merged_interface_release_tag_synopsis_repeats_at_every_declaration_site() {
        // S2: `release_tag_same_as_parent` compares a symbol's tag against
        // its *parent declaration's* symbol, not against its own other
        // declaration sites — a top-level merged interface has no parent,
        // so both sites independently read `release_tag_same_as_parent ==
        // false` and each carries its own `@public` synopsis line.
        let out = review_src(
            "/**\n * @public\n */\nexport interface I {\n  a: string;\n}\n/**\n * @public\n */\nexport interface I {\n  b: number;\n}\n",
        );
        assert_eq!(out.matches("@public").count(), 2);
    }

    #[test]
    fn forgotten_export_is_renamed_consistently_at_every_reference_site() {
        // S3: a symbol reached only via reference, never itself exported,
        // is named after the Collector's emit name wherever it's used.
        let out = review_src(
            "interface IHidden {\n  x: number;\n}\n/**\n * @public\n */\nexport class C {\n  /**\n   * @public\n   */\n  method(): IHidden { return { x: 1 }; }\n}\n",
        );
        assert!(out.contains("interface IHidden"));
        assert!(out.matches("IHidden").count() >= 2);
    }

    #[test]
    fn name_collision_renames_every_reference_site() {
        // S4: two distinct symbols named `Foo` in admission order; the
        // second is suffixed `_2`, and any reference to it follows suit.
        let out = review_src(
            "/**\n * @public\n */\nexport interface Foo {\n  a: string;\n}\ninterface FooInner {\n  b: number;\n}\n/**\n * @public\n */\nexport class Uses {\n  /**\n   * @public\n   */\n  m(): FooInner { return { b: 1 }; }\n}\n",
        );
        assert!(out.contains("interface FooInner"));
        assert!(out.contains("): FooInner"));
    }

    #[test]
    fn members_are_sorted_by_underscore_stripped_key() {
        // S5: members `zebra`, `_alpha`, `Alpha` sort lexicographically on
        // their underscore-stripped key — `_alpha`'s key ("alpha") sorts
        // after `Alpha`'s own key, and both sort before `zebra`.
        let out = review_src(
            "/**\n * @public\n */\nexport interface I {\n  /**\n   * @public\n   */\n  zebra: number;\n  /**\n   * @public\n   */\n  _alpha: string;\n  /**\n   * @public\n   */\n  Alpha: string;\n}\n",
        );
        let alpha_pos = out.find("Alpha: string").unwrap();
        let underscore_alpha_pos = out.find("_alpha: string").unwrap();
        let zebra_pos = out.find("zebra: number").unwrap();
        assert!(alpha_pos < underscore_alpha_pos);
        assert!(underscore_alpha_pos < zebra_pos);
    }

    #[test]
    fn missing_package_documentation_adds_the_marker() {
        // S6.
        let out = review_src("/**\n * @public\n */\nexport interface Foo {\n  a: string;\n}\n");
        assert!(out.contains("(No @packageDocumentation comment for this package)"));
    }

    #[test]
    fn present_package_documentation_omits_the_marker() {
        let out = review_src("/**\n * @packageDocumentation\n */\n/**\n * @public\n */\nexport interface Foo {\n  a: string;\n}\n");
        assert!(!out.contains("(No @packageDocumentation comment for this package)"));
    }

    #[test]
    fn undocumented_exported_declaration_gets_the_marker_token() {
        let out = review_src("export interface Foo {\n  a: string;\n}\n");
        assert!(out.contains("(undocumented)"));
    }

    #[test]
    fn overload_group_is_rendered_as_three_consecutive_blocks() {
        // S1: an overloaded function's three declaration sites each render
        // as their own block, in source order.
        let out = review_src(
            "/**\n * @public\n */\nexport function f(a: string): string;\nexport function f(a: number): number;\nexport function f(a: any): any { return a; }\n",
        );
        assert_eq!(out.matches("function f(").count(), 3);
    }

    #[test]
    fn are_equivalent_ignores_incidental_whitespace() {
        assert!(are_equivalent_api_file_contents("export interface Foo {\n  a: string;\n}\n", "export interface Foo { a: string; }"));
        assert!(!are_equivalent_api_file_contents("export interface Foo {}", "export interface Bar {}"));
    }
}
