//! Doc-comment parsing and the release-tag resolution rule. Kept free of
//! `AstGraph`/`Collector` so it can be unit tested on bare source
//! snippets: callers own the graph walk and turn this module's pure
//! results into diagnostics and the memoized metadata slots.

use std::collections::HashSet;

use crate::config::ReleaseTag;
use crate::facade::syntax::{NodeId, SyntaxTree};

const MODIFIER_TAGS: &[&str] = &[
    "@public",
    "@beta",
    "@alpha",
    "@internal",
    "@sealed",
    "@virtual",
    "@override",
    "@eventProperty",
    "@readonly",
    "@packageDocumentation",
    "@preapproved",
    "@betaDocumentation",
];

const BLOCK_TAGS: &[&str] = &[
    "@remarks",
    "@param",
    "@returns",
    "@example",
    "@deprecated",
    "@privateRemarks",
    "@internalRemarks",
    "@defaultValue",
    "@link",
    "@inheritDoc",
];

#[derive(Debug, Default, Clone)]
pub struct ParsedDocComment {
    pub has_summary: bool,
    pub modifiers: HashSet<&'static str>,
    pub is_deprecated: bool,
}

impl ParsedDocComment {
    pub fn has_modifier(&self, tag: &str) -> bool {
        self.modifiers.contains(tag)
    }

    pub fn release_tag(&self) -> Option<ReleaseTag> {
        if self.has_modifier("@public") {
            Some(ReleaseTag::Public)
        } else if self.has_modifier("@beta") {
            Some(ReleaseTag::Beta)
        } else if self.has_modifier("@alpha") {
            Some(ReleaseTag::Alpha)
        } else if self.has_modifier("@internal") {
            Some(ReleaseTag::Internal)
        } else {
            None
        }
    }
}

/// Parses a `/** ... */` block comment's body into recognized tags. Text
/// outside any tag, before the first tag line, is the summary.
pub fn parse_doc_comment(raw: &str) -> ParsedDocComment {
    let inner = raw.trim_start_matches("/**").trim_end_matches("*/");
    let mut modifiers = HashSet::new();
    let mut is_deprecated = false;
    let mut has_summary = false;
    let mut seen_tag = false;

    for line in inner.lines() {
        let trimmed = line.trim().trim_start_matches('*').trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(&tag) = MODIFIER_TAGS.iter().find(|&&t| trimmed == t || trimmed.starts_with(&format!("{t} "))) {
            modifiers.insert(tag);
            seen_tag = true;
            continue;
        }
        if let Some(&tag) = BLOCK_TAGS.iter().find(|&&t| trimmed.starts_with(t)) {
            if tag == "@deprecated" {
                is_deprecated = true;
            }
            seen_tag = true;
            continue;
        }
        if !seen_tag {
            has_summary = true;
        }
    }

    ParsedDocComment { has_summary, modifiers, is_deprecated }
}

/// The syntax node whose preceding sibling comment, if any, documents
/// `node`: an `export_statement` wrapping `node` is the real anchor,
/// since the doc comment precedes `export`, not the inner declaration.
pub fn doc_comment_anchor(tree: &SyntaxTree, node: NodeId) -> NodeId {
    if let Some(parent) = tree.node(node).parent
        && tree.node(parent).kind == "export_statement" && tree.child_by_field(parent, "declaration") == Some(node) {
            return parent;
        }
    node
}

pub fn leading_doc_comment(tree: &SyntaxTree, node: NodeId) -> Option<&str> {
    let anchor = doc_comment_anchor(tree, node);
    let parent = tree.node(anchor).parent?;
    let siblings = tree.children(parent);
    let idx = siblings.iter().position(|&s| s == anchor)?;
    if idx == 0 {
        return None;
    }
    let prev = siblings[idx - 1];
    let text = tree.text(prev);
    (tree.node(prev).kind == "comment" && text.starts_with("/**")).then_some(text)
}

/// Inputs a caller supplies about *why* a declaration might be exempt
/// from requiring documentation, independent of whether it has any.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocPolicy {
    pub is_constructor: bool,
    pub is_enum_member: bool,
    pub is_non_first_overload: bool,
    pub is_merged_namespace_redeclaration: bool,
}

impl DocPolicy {
    fn undocumented_by_policy(&self) -> bool {
        self.is_constructor || self.is_enum_member || self.is_non_first_overload || self.is_merged_namespace_redeclaration
    }
}

#[derive(Debug, Clone)]
pub struct DeclarationMetadata {
    pub doc: Option<ParsedDocComment>,
    pub is_sealed: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_event_property: bool,
    pub is_preapproved: bool,
    pub is_package_documentation: bool,
    pub needs_documentation: bool,
}

pub fn compute_declaration_metadata(tree: &SyntaxTree, node: NodeId, policy: DocPolicy) -> DeclarationMetadata {
    let doc = leading_doc_comment(tree, node).map(parse_doc_comment);
    let is_internal = doc.as_ref().is_some_and(|d| d.has_modifier("@internal"));
    let has_summary = doc.as_ref().is_some_and(|d| d.has_summary);
    let needs_documentation = !(policy.undocumented_by_policy() || has_summary || is_internal);

    DeclarationMetadata {
        is_sealed: doc.as_ref().is_some_and(|d| d.has_modifier("@sealed")),
        is_virtual: doc.as_ref().is_some_and(|d| d.has_modifier("@virtual")),
        is_override: doc.as_ref().is_some_and(|d| d.has_modifier("@override")),
        is_event_property: doc.as_ref().is_some_and(|d| d.has_modifier("@eventProperty")),
        is_preapproved: doc.as_ref().is_some_and(|d| d.has_modifier("@preapproved")),
        is_package_documentation: doc.as_ref().is_some_and(|d| d.has_modifier("@packageDocumentation")),
        needs_documentation,
        doc,
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ReleaseTagResolution {
    Explicit(ReleaseTag),
    /// More than one distinct tag across the symbol's declarations.
    Inconsistent,
    /// No declaration carries a tag; caller must inherit from an
    /// ancestor or fall back to `ReleaseTag::None`.
    Unspecified,
}

pub fn resolve_declared_release_tag(tags: &[Option<ReleaseTag>]) -> ReleaseTagResolution {
    let distinct: HashSet<ReleaseTag> = tags.iter().filter_map(|t| *t).collect();
    match distinct.len() {
        0 => ReleaseTagResolution::Unspecified,
        1 => ReleaseTagResolution::Explicit(*distinct.iter().next().unwrap()),
        _ => ReleaseTagResolution::Inconsistent,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SymbolMetadata {
    pub release_tag: ReleaseTag,
    pub release_tag_same_as_parent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summary_and_modifier() {
        let doc = parse_doc_comment("/**\n * Computes the area.\n * @public\n */");
        assert!(doc.has_summary);
        assert!(doc.has_modifier("@public"));
        assert_eq!(doc.release_tag(), Some(ReleaseTag::Public));
    }

    #[test]
    fn block_tag_does_not_count_as_summary() {
        let doc = parse_doc_comment("/**\n * @param x a number\n */");
        assert!(!doc.has_summary);
    }

    #[test]
    fn deprecated_flag_is_recognized() {
        let doc = parse_doc_comment("/**\n * Old thing.\n * @deprecated use NewThing\n */");
        assert!(doc.is_deprecated);
    }

    #[test]
    fn release_tag_resolution_variants() {
        assert!(matches!(resolve_declared_release_tag(&[]), ReleaseTagResolution::Unspecified));
        assert!(matches!(
            resolve_declared_release_tag(&[Some(ReleaseTag::Public)]),
            ReleaseTagResolution::Explicit(ReleaseTag::Public)
        ));
        assert!(matches!(
            resolve_declared_release_tag(&[Some(ReleaseTag::Public), Some(ReleaseTag::Beta)]),
            ReleaseTagResolution::Inconsistent
        ));
    }
}
