//! Span Tree & Rewriter (C6).
//!
//! A `Span` wraps one syntax node and covers its exact source-text
//! range via four segments emitted in order — prefix, children,
//! suffix, separator — so that `prefix + Σ child.get_text() + suffix +
//! separator`, applied recursively, reproduces the original source
//! exactly. A `Modification` attached to any span lets the review
//! generator (C7) skip it, override its prefix/suffix, or reorder its
//! children, without ever touching the underlying text buffer.
//!
//! Member containers (`interface_body`, `class_body`, `enum_body`, and
//! a namespace's `statement_block`) are special-cased at construction:
//! their opening/closing braces fold into the container span's own
//! prefix/suffix, and each member (plus its trailing `;`/`,` and any
//! leading doc comment) becomes one *cluster* child span — the
//! tree-sitter analogue of the compiler's `SyntaxList` node, which is
//! what `sort_children` reorders.

use crate::facade::program::FileId;
use crate::facade::syntax::{NodeId, SyntaxTree};
use crate::names::{MEMBER_DECLARATION_KINDS, is_bare_enum_member};

#[derive(Debug, Default, Clone)]
pub struct Modification {
    pub prefix_override: Option<String>,
    pub suffix_override: Option<String>,
    pub omit_children: bool,
    pub omit_separator_after: bool,
    pub sort_children: bool,
    pub sort_key: Option<String>,
}

impl Modification {
    /// The "JSDoc comment" / `export` / `default` keyword rule: emit
    /// nothing for this span, and do not recurse into its children.
    pub fn skip_all() -> Modification {
        Modification {
            prefix_override: Some(String::new()),
            suffix_override: Some(String::new()),
            omit_children: true,
            omit_separator_after: true,
            sort_children: false,
            sort_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Span {
    /// Syntax kind of the wrapped node; `"cluster"` for a synthetic
    /// grouping span with no node of its own (a member plus its
    /// trailing delimiter and/or leading doc comment).
    pub kind: &'static str,
    pub node: Option<(FileId, NodeId)>,
    pub start_index: usize,
    pub end_index: usize,
    pub children: Vec<Span>,
    /// Byte range of trailing trivia bridging to the next lexical
    /// token, assigned during construction. `(0, 0)` means empty/unset.
    separator: (usize, usize),
    pub modification: Modification,
}

/// Builds a `Span` for `node`, recursing into children. Member
/// containers get the clustering treatment described above; everything
/// else is a direct 1:1 mapping of tree-sitter's own children.
pub fn build_span(tree: &SyntaxTree, file: FileId, node: NodeId) -> Span {
    if is_member_container(tree, node) {
        let kids = tree.children(node);
        if kids.len() >= 2 {
            return build_container_span(tree, file, node);
        }
    }
    build_generic_span(tree, file, node)
}

fn build_generic_span(tree: &SyntaxTree, file: FileId, node: NodeId) -> Span {
    let data = tree.node(node);
    let children: Vec<Span> = tree.children(node).iter().map(|&c| build_span(tree, file, c)).collect();
    let mut span = Span {
        kind: data.kind,
        node: Some((file, node)),
        start_index: data.start_byte,
        end_index: data.end_byte,
        children,
        separator: (0, 0),
        modification: Modification::default(),
    };
    assign_child_separators(&mut span);
    span
}

fn is_member_container(tree: &SyntaxTree, node: NodeId) -> bool {
    let kind = tree.node(node).kind;
    if matches!(kind, "interface_body" | "class_body" | "enum_body") {
        return true;
    }
    kind == "statement_block"
        && tree.node(node).parent.is_some_and(|p| matches!(tree.node(p).kind, "internal_module" | "module"))
}

fn is_container_member(tree: &SyntaxTree, node: NodeId) -> bool {
    let kind = tree.node(node).kind;
    is_bare_enum_member(tree, node) || MEMBER_DECLARATION_KINDS.contains(&kind) || kind == "export_statement"
}

/// Builds the span for a member-container node: the opening/closing
/// delimiter tokens fold into this span's own prefix/suffix (they are
/// not children, so they are never disturbed by `sort_children`), and
/// every member between them — together with its trailing delimiter
/// and any leading doc comment — becomes one cluster child.
fn build_container_span(tree: &SyntaxTree, file: FileId, node: NodeId) -> Span {
    let data = tree.node(node);
    let kids = tree.children(node).to_vec();
    let inner = &kids[1..kids.len() - 1];

    let mut clusters: Vec<Vec<NodeId>> = Vec::new();
    let mut pending: Vec<NodeId> = Vec::new();
    for &k in inner {
        if tree.node(k).kind == "comment" {
            pending.push(k);
            continue;
        }
        if is_container_member(tree, k) {
            let mut cluster = std::mem::take(&mut pending);
            cluster.push(k);
            clusters.push(cluster);
        } else if let Some(last) = clusters.last_mut() {
            last.push(k); // trailing delimiter (`;`, `,`) for the preceding member
        } else {
            pending.push(k); // stray token before the first member
        }
    }
    if !pending.is_empty() {
        if let Some(last) = clusters.last_mut() {
            last.extend(pending);
        } else {
            // No members at all (only stray comments/tokens): fall back
            // to a single opaque cluster so coverage still holds.
            clusters.push(pending);
        }
    }

    let children: Vec<Span> = clusters.iter().map(|c| build_cluster_span(tree, file, c)).collect();
    let mut span = Span {
        kind: data.kind,
        node: Some((file, node)),
        start_index: data.start_byte,
        end_index: data.end_byte,
        children,
        separator: (0, 0),
        modification: Modification::default(),
    };
    assign_child_separators(&mut span);
    span
}

fn build_cluster_span(tree: &SyntaxTree, file: FileId, cluster: &[NodeId]) -> Span {
    let children: Vec<Span> = cluster.iter().map(|&n| build_span(tree, file, n)).collect();
    let start_index = children.first().map(|c| c.start_index).unwrap();
    let end_index = children.last().map(|c| c.end_index).unwrap();
    let mut span =
        Span { kind: "cluster", node: None, start_index, end_index, children, separator: (0, 0), modification: Modification::default() };
    assign_child_separators(&mut span);
    span
}

/// Assigns the gaps between `span`'s own direct children as trailing
/// separators, pushed down to the deepest preceding descendant that
/// has no content of its own past its last child (no "non-empty
/// suffix"), bottoming out at a leaf.
fn assign_child_separators(span: &mut Span) {
    for i in 0..span.children.len().saturating_sub(1) {
        let gap_start = span.children[i].end_index;
        let gap_end = span.children[i + 1].start_index;
        if gap_end > gap_start {
            assign_gap(&mut span.children[i], gap_start, gap_end);
        }
    }
}

fn assign_gap(span: &mut Span, start: usize, end: usize) {
    let has_own_suffix = span.children.last().is_some_and(|last| span.end_index > last.end_index);
    if span.children.is_empty() || has_own_suffix {
        span.separator = (start, end);
    } else {
        let last = span.children.len() - 1;
        assign_gap(&mut span.children[last], start, end);
    }
}

impl Span {
    /// Public view of this span's own text not covered by any child —
    /// the leading delimiter of a container, or the whole leaf if it has
    /// no children. Used by the API model builder to walk a span without
    /// going through `get_text`/`get_modified_text`.
    pub fn prefix_text<'a>(&self, source: &'a str) -> &'a str {
        self.raw_prefix(source)
    }

    pub fn suffix_text<'a>(&self, source: &'a str) -> &'a str {
        self.raw_suffix(source)
    }

    pub fn separator_text<'a>(&self, source: &'a str) -> &'a str {
        self.own_separator_text(source)
    }

    fn raw_prefix<'a>(&self, source: &'a str) -> &'a str {
        match self.children.first() {
            Some(first) => &source[self.start_index..first.start_index],
            None => &source[self.start_index..self.end_index],
        }
    }

    fn raw_suffix<'a>(&self, source: &'a str) -> &'a str {
        match self.children.last() {
            Some(last) => &source[last.end_index..self.end_index],
            None => "",
        }
    }

    fn own_separator_text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.separator.0..self.separator.1]
    }

    /// This span's own separator if non-empty, else recursively that
    /// of its last child (empty if childless).
    fn last_inner_separator<'a>(&self, source: &'a str) -> &'a str {
        let own = self.own_separator_text(source);
        if !own.is_empty() {
            return own;
        }
        match self.children.last() {
            Some(c) => c.last_inner_separator(source),
            None => "",
        }
    }

    /// Reproduces the original source text of this span's extent,
    /// including its own assigned separator, ignoring all
    /// modifications. Used to verify the round-trip invariant.
    pub fn get_text(&self, source: &str) -> String {
        let mut out = String::with_capacity(self.end_index - self.start_index);
        out.push_str(self.raw_prefix(source));
        for c in &self.children {
            out.push_str(&c.get_text(source));
        }
        out.push_str(self.raw_suffix(source));
        out.push_str(self.own_separator_text(source));
        out
    }

    /// Emits this span applying every modification recorded on it and
    /// its descendants, per §5.6's post-order algorithm.
    pub fn get_modified_text(&self, source: &str) -> String {
        self.emit(source, None)
    }

    fn emit(&self, source: &str, separator_override: Option<&str>) -> String {
        let mut out = String::new();

        match &self.modification.prefix_override {
            Some(p) => out.push_str(p),
            None => out.push_str(self.raw_prefix(source)),
        }

        if !self.modification.omit_children {
            if self.modification.sort_children && self.children.len() >= 2 {
                out.push_str(&self.emit_sorted_children(source));
            } else {
                let n = self.children.len();
                for (i, c) in self.children.iter().enumerate() {
                    let child_override = if i + 1 == n { separator_override } else { None };
                    out.push_str(&c.emit(source, child_override));
                }
            }
        }

        match &self.modification.suffix_override {
            Some(s) => out.push_str(s),
            None => out.push_str(self.raw_suffix(source)),
        }

        let own_sep = self.own_separator_text(source);
        let is_leaf = self.children.is_empty();
        match separator_override {
            Some(ov) if !own_sep.is_empty() || is_leaf => out.push_str(ov),
            Some(_) => {} // delegated to the last child's own emission above
            None => {
                if !self.modification.omit_separator_after {
                    out.push_str(own_sep);
                }
            }
        }
        out
    }

    fn emit_sorted_children(&self, source: &str) -> String {
        let first_sep = self.children.first().unwrap().last_inner_separator(source).to_string();
        let last_sep = self.children.last().unwrap().last_inner_separator(source).to_string();

        let mut order: Vec<usize> = (0..self.children.len()).collect();
        order.sort_by(|&a, &b| {
            let ka = &self.children[a].modification.sort_key;
            let kb = &self.children[b].modification.sort_key;
            match (ka, kb) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        });

        let mut out = String::new();
        let n = order.len();
        for (pos, &idx) in order.iter().enumerate() {
            let override_sep = if pos + 1 == n { &last_sep } else { &first_sep };
            out.push_str(&self.children[idx].emit(source, Some(override_sep)));
        }
        out
    }

    /// Finds the first descendant (pre-order, including `self`) whose
    /// underlying node is `target`. Used by the review generator to
    /// locate e.g. the `export`/`default` keyword spans to skip, or an
    /// identifier span to rename.
    pub fn find_node_mut(&mut self, target: (FileId, NodeId)) -> Option<&mut Span> {
        if self.node == Some(target) {
            return Some(self);
        }
        for c in &mut self.children {
            if let Some(found) = c.find_node_mut(target) {
                return Some(found);
            }
        }
        None
    }

    /// The first descendant span (pre-order, including `self`) whose
    /// kind equals `kind`.
    pub fn find_first_by_kind_mut(&mut self, kind: &str) -> Option<&mut Span> {
        if self.kind == kind {
            return Some(self);
        }
        for c in &mut self.children {
            if let Some(found) = c.find_first_by_kind_mut(kind) {
                return Some(found);
            }
        }
        None
    }

    /// `true` if `self` or any descendant wraps exactly `(file, node)`.
    pub fn contains_node(&self, target: (FileId, NodeId)) -> bool {
        self.node == Some(target) || self.children.iter().any(|c| c.contains_node(target))
    }

    /// All descendant spans (pre-order, including `self`) whose node
    /// kind equals `kind`.
    pub fn find_all_by_kind(&self, kind: &str) -> Vec<&Span> {
        let mut out = Vec::new();
        self.collect_by_kind(kind, &mut out);
        out
    }

    fn collect_by_kind<'a>(&'a self, kind: &str, out: &mut Vec<&'a Span>) {
        if self.kind == kind {
            out.push(self);
        }
        for c in &self.children {
            c.collect_by_kind(kind, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;

    fn span_for(src: &str) -> (String, Span) {
        let mut diagnostics = Diagnostics::new();
        let tree = SyntaxTree::parse("a.ts", src.to_string(), &mut diagnostics).unwrap();
        let root = tree.root();
        let span = build_span(&tree, 0, root);
        (src.to_string(), span)
    }

    #[test]
    fn round_trips_plain_source() {
        let (src, span) = span_for("export interface Foo {\n  bar: string;\n  baz(): void;\n}\n");
        assert_eq!(span.get_text(&src), src);
    }

    #[test]
    fn round_trips_class_with_members() {
        let (src, span) = span_for("export class C {\n  constructor(x: number) {}\n  method(): void {}\n  prop: string = \"x\";\n}\n");
        assert_eq!(span.get_text(&src), src);
    }

    #[test]
    fn round_trips_enum_and_namespace() {
        let (src, span) = span_for("export enum Color { Red, Green = 2 }\nexport namespace NS {\n  export interface Inner { a: number }\n}\n");
        assert_eq!(span.get_text(&src), src);
    }

    #[test]
    fn unmodified_span_emits_same_text_as_get_text() {
        let (src, span) = span_for("export interface Foo {\n  bar: string;\n  baz(): void;\n}\n");
        assert_eq!(span.get_modified_text(&src), span.get_text(&src));
    }

    #[test]
    fn sort_children_reorders_by_key_and_keeps_stability_on_ties() {
        let (src, mut span) = span_for("interface I {\n  zebra: number;\n  _alpha: string;\n  Alpha: string;\n}\n");
        let body = span.find_first_by_kind_mut("interface_body").unwrap();
        assert_eq!(body.children.len(), 3);
        for child in &mut body.children {
            // Each cluster's first child is the `property_signature` itself.
            let name = child.children[0].get_text(&src);
            let name = name.split(':').next().unwrap().trim().to_string();
            child.modification.sort_key = Some(crate::collector::get_sort_key_ignoring_underscore(&name));
        }
        body.modification.sort_children = true;
        let out = span.get_modified_text(&src);
        let alpha_pos = out.find("Alpha: string").unwrap();
        let underscore_alpha_pos = out.find("_alpha: string").unwrap();
        let zebra_pos = out.find("zebra: number").unwrap();
        assert!(alpha_pos < underscore_alpha_pos);
        assert!(underscore_alpha_pos < zebra_pos);
    }

    #[test]
    fn skip_all_omits_prefix_children_and_suffix() {
        let (src, mut span) = span_for("export interface Foo { bar: string }");
        let export_kw = span.find_first_by_kind_mut("export").unwrap();
        export_kw.modification = Modification::skip_all();
        let out = span.get_modified_text(&src);
        assert!(!out.trim_start().starts_with("export"));
        assert_eq!(out, "interface Foo { bar: string }");
    }

    #[test]
    fn coverage_is_contiguous_and_matches_source_length() {
        let (src, span) = span_for("export function f(a: string): string { return a; }\n");
        fn max_covered(span: &Span) -> usize {
            let own = span.end_index.max(span.separator.1.max(span.start_index));
            span.children.iter().map(max_covered).fold(own, usize::max)
        }
        assert!(max_covered(&span) <= src.len());
    }
}
