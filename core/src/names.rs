//! Syntax-kind tables shared by the binder, analyzer, and review
//! generator: which tree-sitter node kinds count as declarations, and
//! how to read a human name back out of one.

use crate::facade::syntax::{NodeId, SyntaxTree};

pub const DECLARATION_KINDS: &[&str] = &[
    "interface_declaration",
    "class_declaration",
    "abstract_class_declaration",
    "function_declaration",
    "function_signature",
    "generator_function_declaration",
    "enum_declaration",
    "type_alias_declaration",
    "module",
    "internal_module",
    "ambient_declaration",
];

/// Syntax kinds that directly expose a `name` field naming them.
const NAMED_MEMBER_KINDS: &[&str] =
    &["property_signature", "method_signature", "public_field_definition", "method_definition"];

/// Member-level syntax kinds that are declaration-eligible: each gets its
/// own `AstDeclaration` nested under its containing class/interface/enum
/// `AstDeclaration`, per the data model's "signature, property, method,
/// constructor, index/call signature, enum member" list.
pub const MEMBER_DECLARATION_KINDS: &[&str] = &[
    "property_signature",
    "method_signature",
    "public_field_definition",
    "method_definition",
    "index_signature",
    "call_signature",
    "construct_signature",
    "enum_assignment",
];

/// `true` for any syntax kind that is declaration-eligible, at top level
/// or nested: class, interface, enum, namespace, function, method,
/// property, signature, variable, type-alias, constructor, index/call
/// signature, enum member. Intermediate wrapper kinds (bodies, lists,
/// blocks) are not declaration-eligible and are skipped over.
pub fn is_ast_declaration_kind(kind: &str) -> bool {
    DECLARATION_KINDS.contains(&kind)
        || MEMBER_DECLARATION_KINDS.contains(&kind)
        || matches!(kind, "lexical_declaration" | "variable_declaration")
}

/// A bare identifier, possibly nested inside an `enum_assignment`, that
/// names an unadorned enum member (`Red` in `enum Color { Red, Green }`).
pub fn is_bare_enum_member(tree: &SyntaxTree, node: NodeId) -> bool {
    tree.node(node).kind == "property_identifier"
        && tree.node(node).parent.is_some_and(|p| tree.node(p).kind == "enum_body")
}

/// Reads the declared name of a declaration-eligible node: a top-level
/// declaration, or a class/interface/enum member. Returns an empty
/// string for anonymous member kinds (index/call signatures), which
/// callers label positionally instead.
pub fn declaration_display_name(tree: &SyntaxTree, node: NodeId) -> String {
    let kind = tree.node(node).kind;
    if NAMED_MEMBER_KINDS.contains(&kind) {
        return tree.child_by_field(node, "name").map(|n| tree.text(n).to_string()).unwrap_or_default();
    }
    match kind {
        "property_identifier" => tree.text(node).to_string(),
        "enum_assignment" => tree.child_by_field(node, "name").map(|n| tree.text(n).to_string()).unwrap_or_default(),
        "index_signature" => "[index]".to_string(),
        "call_signature" => "()".to_string(),
        "construct_signature" => "new".to_string(),
        "lexical_declaration" | "variable_declaration" => tree
            .children(node)
            .iter()
            .copied()
            .find(|&c| tree.node(c).kind == "variable_declarator")
            .and_then(|d| tree.child_by_field(d, "name"))
            .map(|n| tree.text(n).to_string())
            .unwrap_or_default(),
        _ => tree.child_by_field(node, "name").map(|n| tree.text(n).to_string()).unwrap_or_default(),
    }
}

pub fn is_constructor(tree: &SyntaxTree, node: NodeId) -> bool {
    tree.node(node).kind == "method_definition" && declaration_display_name(tree, node) == "constructor"
}
