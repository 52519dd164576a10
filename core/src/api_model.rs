//! Api Model Builder (C8).
//!
//! Walks the Collector's admitted entities and the graph nesting beneath
//! them into a serializable tree of documented items — the machine-
//! readable counterpart to the review file (§C7). Every item carries a
//! `canonical_reference` composed hierarchically (`(name:kind)` per
//! level), so downstream documentation tooling can cross-link a
//! `Reference` excerpt token back to the item it names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::collector::Collector;
use crate::config::ReleaseTag;
use crate::facade::program::{FileId, Program, SymbolRef};
use crate::facade::syntax::{NodeId, SyntaxTree};
use crate::graph::{AstDeclarationId, AstGraph, AstSymbolId};
use crate::metadata;
use crate::names::is_constructor;
use crate::span::{self, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ApiItemKind {
    Package,
    EntryPoint,
    Class,
    Interface,
    Namespace,
    Method,
    MethodSignature,
    Property,
    PropertySignature,
    Function,
    Enum,
    EnumMember,
    Constructor,
    ConstructorSignature,
    IndexSignature,
    CallSignature,
    TypeAlias,
}

impl ApiItemKind {
    /// The lowercase `kind` token used inside a canonical reference's
    /// `(name:kind)` segment.
    fn reference_token(self) -> &'static str {
        match self {
            ApiItemKind::Package => "package",
            ApiItemKind::EntryPoint => "entry-point",
            ApiItemKind::Class => "class",
            ApiItemKind::Interface => "interface",
            ApiItemKind::Namespace => "namespace",
            ApiItemKind::Method => "member",
            ApiItemKind::MethodSignature => "member",
            ApiItemKind::Property => "member",
            ApiItemKind::PropertySignature => "member",
            ApiItemKind::Function => "function",
            ApiItemKind::Enum => "enum",
            ApiItemKind::EnumMember => "member",
            ApiItemKind::Constructor => "member",
            ApiItemKind::ConstructorSignature => "member",
            ApiItemKind::IndexSignature => "member",
            ApiItemKind::CallSignature => "member",
            ApiItemKind::TypeAlias => "type",
        }
    }

    fn is_container(self) -> bool {
        matches!(self, ApiItemKind::Package | ApiItemKind::EntryPoint | ApiItemKind::Class | ApiItemKind::Interface | ApiItemKind::Namespace)
    }
}

/// One alternating fragment of a declaration's excerpt: either literal
/// source text, or a cross-link to the item that a type reference
/// inside it resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "PascalCase")]
pub enum ExcerptToken {
    Content { text: String },
    Reference { text: String, canonical_reference: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiItem {
    pub kind: ApiItemKind,
    pub name: String,
    pub canonical_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_tag: Option<ReleaseTag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ApiItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excerpt_tokens: Vec<ExcerptToken>,
}

/// Builds the root `Package` item: one `EntryPoint` child holding every
/// entity the Collector admitted, each recursively expanded into its own
/// nested members.
pub fn build_api_model(graph: &AstGraph, program: &Program, collector: &Collector, package_name: &str) -> ApiItem {
    let sym_map: HashMap<SymbolRef, AstSymbolId> = graph.symbol_ids().map(|id| (graph.symbol_ref_for(id), id)).collect();
    let canonical_refs = assign_canonical_references(graph, program, collector, package_name);

    let package_ref = format!("({package_name}:package)");
    let entry_name = program.display_path(program.entry()).to_string();
    let entry_ref = format!("{package_ref}.({entry_name}:entry-point)");

    let members = collector
        .entities()
        .iter()
        .map(|entity| build_entity_item(graph, program, collector, &sym_map, &canonical_refs, entity.ast_symbol))
        .collect();

    ApiItem {
        kind: ApiItemKind::Package,
        name: package_name.to_string(),
        canonical_reference: package_ref.clone(),
        doc_comment: None,
        release_tag: None,
        members: vec![ApiItem {
            kind: ApiItemKind::EntryPoint,
            name: entry_name,
            canonical_reference: entry_ref,
            doc_comment: None,
            release_tag: None,
            members,
            excerpt_tokens: Vec::new(),
        }],
        excerpt_tokens: Vec::new(),
    }
}

/// Precomputes every admitted entity's and every nested member's
/// canonical reference ahead of time, so excerpt tokens can cross-link
/// to a symbol regardless of whether its own item has been built yet.
fn assign_canonical_references(
    graph: &AstGraph,
    program: &Program,
    collector: &Collector,
    package_name: &str,
) -> HashMap<AstSymbolId, String> {
    let entry_ref = format!("({package_name}:package).({}:entry-point)", program.display_path(program.entry()));
    let mut refs = HashMap::new();
    for entity in collector.entities() {
        let decl0 = graph.symbol(entity.ast_symbol).declarations[0];
        let Some(kind) = classify(graph, program, decl0) else { continue };
        let own_ref = format!("{entry_ref}.({}:{})", entity.name_for_emit, kind.reference_token());
        refs.insert(entity.ast_symbol, own_ref.clone());
        assign_nested_canonical_references(graph, program, decl0, &own_ref, &mut refs);
    }
    refs
}

fn assign_nested_canonical_references(graph: &AstGraph, program: &Program, decl: AstDeclarationId, parent_ref: &str, refs: &mut HashMap<AstSymbolId, String>) {
    for &child_decl in graph.children(decl) {
        let child = graph.declaration(child_decl);
        let Some(kind) = classify(graph, program, child_decl) else { continue };
        let local_name = graph.symbol(child.symbol).local_name.clone();
        let member_name = if local_name.is_empty() { member_positional_name(program, child_decl, graph) } else { local_name };
        let own_ref = format!("{parent_ref}.({member_name}:{})", kind.reference_token());
        refs.entry(child.symbol).or_insert_with(|| own_ref.clone());
        assign_nested_canonical_references(graph, program, child_decl, &own_ref, refs);
    }
}

fn member_positional_name(program: &Program, decl: AstDeclarationId, graph: &AstGraph) -> String {
    let (file, node) = graph.declaration(decl).syntax_node;
    program.tree(file).node(node).kind.to_string()
}

/// Maps a declaration's syntax kind to its API item kind. `None` for
/// syntax the variant set does not cover (a bare top-level variable),
/// which is then omitted from the model entirely.
fn classify(graph: &AstGraph, program: &Program, decl: AstDeclarationId) -> Option<ApiItemKind> {
    let (file, node) = graph.declaration(decl).syntax_node;
    let tree = program.tree(file);
    let kind = tree.node(node).kind;
    Some(match kind {
        "interface_declaration" => ApiItemKind::Interface,
        "class_declaration" | "abstract_class_declaration" => ApiItemKind::Class,
        "internal_module" | "module" => ApiItemKind::Namespace,
        "function_declaration" | "function_signature" | "generator_function_declaration" => ApiItemKind::Function,
        "enum_declaration" => ApiItemKind::Enum,
        "type_alias_declaration" => ApiItemKind::TypeAlias,
        "method_signature" => ApiItemKind::MethodSignature,
        "property_signature" => ApiItemKind::PropertySignature,
        "public_field_definition" => ApiItemKind::Property,
        "method_definition" => {
            if is_constructor(tree, node) {
                ApiItemKind::Constructor
            } else {
                ApiItemKind::Method
            }
        }
        "index_signature" => ApiItemKind::IndexSignature,
        "call_signature" => ApiItemKind::CallSignature,
        "construct_signature" => ApiItemKind::ConstructorSignature,
        "enum_assignment" | "property_identifier" => ApiItemKind::EnumMember,
        _ => return None,
    })
}

fn build_entity_item(
    graph: &AstGraph,
    program: &Program,
    collector: &Collector,
    sym_map: &HashMap<SymbolRef, AstSymbolId>,
    canonical_refs: &HashMap<AstSymbolId, String>,
    symbol: AstSymbolId,
) -> ApiItem {
    let entity = collector.try_get_entity_by_symbol(symbol).expect("entity admitted by the Collector");
    let declarations = graph.symbol(symbol).declarations.clone();
    let decl0 = declarations[0];

    let kind = classify(graph, program, decl0).unwrap_or(ApiItemKind::TypeAlias);
    let canonical_reference = canonical_refs.get(&symbol).cloned().unwrap_or_else(|| entity.name_for_emit.clone());
    let release_tag = graph.symbol(symbol).metadata.map(|m| m.release_tag).filter(|t| *t != ReleaseTag::None);
    let doc_comment = doc_comment_for(program, graph.declaration(decl0).syntax_node);

    let mut members = Vec::new();
    if kind.is_container() {
        let mut seen = std::collections::HashSet::new();
        for &decl in &declarations {
            for &child_decl in graph.children(decl) {
                let child_symbol = graph.declaration(child_decl).symbol;
                if !seen.insert(child_symbol) {
                    continue;
                }
                members.push(build_member_item(graph, program, sym_map, collector, canonical_refs, child_decl));
            }
        }
    }

    let excerpt_tokens = build_excerpt_tokens(graph, program, sym_map, collector, canonical_refs, decl0);

    ApiItem { kind, name: entity.name_for_emit.clone(), canonical_reference, doc_comment, release_tag, members, excerpt_tokens }
}

fn build_member_item(
    graph: &AstGraph,
    program: &Program,
    sym_map: &HashMap<SymbolRef, AstSymbolId>,
    collector: &Collector,
    canonical_refs: &HashMap<AstSymbolId, String>,
    decl: AstDeclarationId,
) -> ApiItem {
    let declaration = graph.declaration(decl);
    let symbol = declaration.symbol;
    let kind = classify(graph, program, decl).unwrap_or(ApiItemKind::Property);
    let name = graph.symbol(symbol).local_name.clone();
    let canonical_reference = canonical_refs.get(&symbol).cloned().unwrap_or_else(|| name.clone());
    let release_tag = graph.symbol(symbol).metadata.map(|m| m.release_tag).filter(|t| *t != ReleaseTag::None);
    let doc_comment = doc_comment_for(program, declaration.syntax_node);

    let mut members = Vec::new();
    if kind.is_container() {
        for &child_decl in graph.children(decl) {
            members.push(build_member_item(graph, program, sym_map, collector, canonical_refs, child_decl));
        }
    }

    let excerpt_tokens = build_excerpt_tokens(graph, program, sym_map, collector, canonical_refs, decl);

    ApiItem { kind, name, canonical_reference, doc_comment, release_tag, members, excerpt_tokens }
}

fn doc_comment_for(program: &Program, graph_node: (FileId, NodeId)) -> Option<String> {
    let (file, node) = graph_node;
    let tree = program.tree(file);
    metadata::leading_doc_comment(tree, node).map(str::to_string)
}

/// Renders a declaration's own span as alternating `Content`/`Reference`
/// tokens: a type-identifier resolving to another admitted entity or
/// member becomes a `Reference`, everything else stays literal text.
fn build_excerpt_tokens(
    graph: &AstGraph,
    program: &Program,
    sym_map: &HashMap<SymbolRef, AstSymbolId>,
    collector: &Collector,
    canonical_refs: &HashMap<AstSymbolId, String>,
    decl: AstDeclarationId,
) -> Vec<ExcerptToken> {
    let (file, node) = graph.declaration(decl).syntax_node;
    let tree = program.tree(file);
    let span = span::build_span(tree, file, node);

    let mut tokens = Vec::new();
    let mut buf = String::new();
    walk_excerpt(tree, program, sym_map, collector, canonical_refs, &span, &tree.source, &mut buf, &mut tokens);
    if !buf.is_empty() {
        tokens.push(ExcerptToken::Content { text: buf });
    }
    tokens
}

fn walk_excerpt(
    tree: &SyntaxTree,
    program: &Program,
    sym_map: &HashMap<SymbolRef, AstSymbolId>,
    collector: &Collector,
    canonical_refs: &HashMap<AstSymbolId, String>,
    span: &Span,
    source: &str,
    buf: &mut String,
    tokens: &mut Vec<ExcerptToken>,
) {
    if span.kind == "type_identifier" {
        if let Some((ref_file, node)) = span.node
            && let Some(reference) = resolve_reference_token(tree, program, sym_map, collector, canonical_refs, ref_file, node) {
                if !buf.is_empty() {
                    tokens.push(ExcerptToken::Content { text: std::mem::take(buf) });
                }
                tokens.push(reference);
                return;
            }
        buf.push_str(&span.get_text(source));
        return;
    }

    buf.push_str(span.prefix_text(source));
    for c in &span.children {
        walk_excerpt(tree, program, sym_map, collector, canonical_refs, c, source, buf, tokens);
    }
    buf.push_str(span.suffix_text(source));
    buf.push_str(span.separator_text(source));
}

fn resolve_reference_token(
    tree: &SyntaxTree,
    program: &Program,
    sym_map: &HashMap<SymbolRef, AstSymbolId>,
    collector: &Collector,
    canonical_refs: &HashMap<AstSymbolId, String>,
    ref_file: FileId,
    node: NodeId,
) -> Option<ExcerptToken> {
    let name = tree.text(node).to_string();
    let target_ref = program.resolve_local(ref_file, &name)?;
    let symbol_id = *sym_map.get(&target_ref)?;
    let entity = collector.try_get_entity_by_symbol(symbol_id)?;
    let canonical_reference = canonical_refs.get(&symbol_id).cloned().unwrap_or_else(|| entity.name_for_emit.clone());
    Some(ExcerptToken::Reference { text: entity.name_for_emit.clone(), canonical_reference })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::diagnostics::Diagnostics;

    fn build_src(src: &str) -> ApiItem {
        let mut diagnostics = Diagnostics::new();
        let files = vec![("index".to_string(), "index.ts".to_string(), src.to_string())];
        let program = Program::build(files, "index", &mut diagnostics).unwrap();
        let result = analyze(&program, &mut diagnostics);
        let mut graph = result.graph;
        let collector = Collector::collect(&result.entry_exports, &graph, &mut diagnostics);
        collector.run_metadata_pass(&mut graph, &program, &mut diagnostics);
        build_api_model(&graph, &program, &collector, "test-pkg")
    }

    #[test]
    fn root_is_a_package_with_one_entry_point() {
        let model = build_src("/**\n * @public\n */\nexport interface Foo {\n  a: string;\n}\n");
        assert_eq!(model.kind, ApiItemKind::Package);
        assert_eq!(model.members.len(), 1);
        assert_eq!(model.members[0].kind, ApiItemKind::EntryPoint);
    }

    #[test]
    fn interface_item_has_member_properties_and_a_public_release_tag() {
        let model = build_src("/**\n * @public\n */\nexport interface Foo {\n  /**\n   * @public\n   */\n  a: string;\n}\n");
        let entry = &model.members[0];
        let foo = entry.members.iter().find(|m| m.name == "Foo").unwrap();
        assert_eq!(foo.kind, ApiItemKind::Interface);
        assert_eq!(foo.release_tag, Some(ReleaseTag::Public));
        assert_eq!(foo.members.len(), 1);
        assert_eq!(foo.members[0].kind, ApiItemKind::PropertySignature);
    }

    #[test]
    fn reference_to_a_forgotten_export_becomes_a_cross_link_token() {
        let model = build_src(
            "interface IHidden {\n  x: number;\n}\n/**\n * @public\n */\nexport class C {\n  /**\n   * @public\n   */\n  method(): IHidden { return { x: 1 }; }\n}\n",
        );
        let entry = &model.members[0];
        let c = entry.members.iter().find(|m| m.name == "C").unwrap();
        let method = &c.members[0];
        let has_reference = method.excerpt_tokens.iter().any(|t| matches!(t, ExcerptToken::Reference { text, .. } if text == "IHidden"));
        assert!(has_reference, "expected a Reference token pointing at IHidden, got {:?}", method.excerpt_tokens);
    }

    #[test]
    fn model_round_trips_through_json() {
        let model = build_src("/**\n * @public\n */\nexport interface Foo {\n  a: string;\n}\n");
        let json = serde_json::to_string(&model).unwrap();
        let back: ApiItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, model.name);
        assert_eq!(back.members[0].members.len(), model.members[0].members.len());
    }
}
