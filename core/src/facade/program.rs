//! The compiler façade: a same-package binder over a set of parsed
//! [`SyntaxTree`]s. It answers the two questions the analyzer needs —
//! "what does this module export?" and "what declaration does this
//! identifier refer to?" — without doing real type inference. Imports
//! from outside the package resolve to `None` and the analyzer treats
//! the reference as nominal (a name, not a declaration to emit).

use std::collections::HashMap;

use crate::diagnostics::Diagnostics;
use crate::error::CoreError;
use crate::facade::syntax::{NodeId, SyntaxTree};
use crate::names::{DECLARATION_KINDS, declaration_display_name};

pub type FileId = u32;

/// Identity of a declaration: which file it lives in, and which syntax
/// node (the declaration itself, not an `export_statement` wrapper)
/// introduces it. Two references that resolve to the same `SymbolRef`
/// are the same logical symbol, regardless of which alias reached it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SymbolRef {
    pub file: FileId,
    pub node: NodeId,
}

struct Import {
    imported_name: String,
    source: String,
}

pub struct Program {
    files: Vec<SyntaxTree>,
    module_keys: Vec<String>,
    file_index: HashMap<String, FileId>,
    /// All declaration sites sharing a name, in source order — merged
    /// interfaces, reopened namespaces, and function overload groups all
    /// land as more than one entry here under the same key.
    declarations_by_name: HashMap<(FileId, String), Vec<NodeId>>,
    /// Maps the first node of a declaration group back to its name, so a
    /// `SymbolRef` (which only carries that first node) can recover the
    /// rest of the group.
    anchor_to_name: HashMap<(FileId, NodeId), String>,
    imports: HashMap<(FileId, String), Import>,
    /// `(file, export_name, local_name)` in source order, per file.
    export_order: Vec<(FileId, String, String)>,
    entry: FileId,
}

impl Program {
    /// Builds a program from `(module_key, display_path, source)` triples.
    /// `module_key` is the import-resolvable path (unix-separated, no
    /// extension, relative to the package root), e.g. `"foo/bar"`.
    pub fn build(
        files: Vec<(String, String, String)>,
        entry_module_key: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<Program, CoreError> {
        let mut trees = Vec::new();
        let mut module_keys = Vec::new();
        let mut file_index = HashMap::new();

        for (module_key, display_path, source) in files {
            let id = trees.len() as FileId;
            trees.push(SyntaxTree::parse(&display_path, source, diagnostics)?);
            file_index.insert(module_key.clone(), id);
            module_keys.push(module_key);
        }

        let entry = *file_index
            .get(entry_module_key)
            .ok_or_else(|| CoreError::MissingEntryPoint(entry_module_key.to_string()))?;

        let mut program = Program {
            files: trees,
            module_keys,
            file_index,
            declarations_by_name: HashMap::new(),
            anchor_to_name: HashMap::new(),
            imports: HashMap::new(),
            export_order: Vec::new(),
            entry,
        };
        program.bind();
        Ok(program)
    }

    pub fn entry(&self) -> FileId {
        self.entry
    }

    pub fn tree(&self, file: FileId) -> &SyntaxTree {
        &self.files[file as usize]
    }

    pub fn display_path(&self, file: FileId) -> &str {
        &self.tree(file).file
    }

    fn bind(&mut self) {
        for file in 0..self.files.len() as FileId {
            let top_level: Vec<NodeId> = self.tree(file).children(self.tree(file).root()).to_vec();
            for stmt in top_level {
                self.bind_top_level_statement(file, stmt);
            }
        }
    }

    fn bind_top_level_statement(&mut self, file: FileId, stmt: NodeId) {
        let tree = self.tree(file);
        let kind = tree.node(stmt).kind;

        if kind == "import_statement" {
            self.bind_import(file, stmt);
            return;
        }

        if kind == "export_statement" {
            self.bind_export(file, stmt);
            return;
        }

        if let Some(name) = self.declaration_name(file, stmt) {
            self.declare(file, name, stmt);
        }
    }

    /// Adds `node` to the declaration group named `name` in `file`,
    /// preserving source order within the group. Returns `true` when
    /// this is the group's first member.
    fn declare(&mut self, file: FileId, name: String, node: NodeId) -> bool {
        let key = (file, name.clone());
        let is_first = !self.declarations_by_name.contains_key(&key);
        self.declarations_by_name.entry(key).or_default().push(node);
        if is_first {
            self.anchor_to_name.insert((file, node), name);
        }
        is_first
    }

    fn bind_export(&mut self, file: FileId, stmt: NodeId) {
        enum Action {
            DeclDirect(NodeId, String),
            DefaultIdent(String),
            ReExport { alias: String, imported_name: String, source: String },
            ExportLocal { alias: String, name: String },
        }

        let actions: Vec<Action> = {
            let tree = self.tree(file);
            let mut actions = Vec::new();

            if let Some(decl) = tree.child_by_field(stmt, "declaration") {
                if let Some(name) = self.declaration_name(file, decl) {
                    actions.push(Action::DeclDirect(decl, name));
                }
                actions
            } else if let Some(value) = tree.child_by_field(stmt, "value") {
                // `export default <expr>`; only the identifier case resolves
                // to something nameable in this same-package binder.
                if tree.node(value).kind == "identifier" {
                    actions.push(Action::DefaultIdent(tree.text(value).to_string()));
                }
                actions
            } else {
                // `export { a, b as c }` and `export { a } from "./x"`.
                let source = tree.child_by_field(stmt, "source").map(|s| strip_quotes(tree.text(s)));
                let clause = tree.children(stmt).iter().copied().find(|&c| tree.node(c).kind == "export_clause");
                let Some(clause) = clause else { return };
                for spec in tree.children(clause).iter().copied().filter(|&c| tree.node(c).kind == "export_specifier") {
                    let Some(name) = tree.child_by_field(spec, "name").map(|n| tree.text(n).to_string()) else { continue };
                    let alias = tree.child_by_field(spec, "alias").map(|n| tree.text(n).to_string()).unwrap_or_else(|| name.clone());
                    match &source {
                        Some(source) => actions.push(Action::ReExport { alias, imported_name: name, source: source.clone() }),
                        None => actions.push(Action::ExportLocal { alias, name }),
                    }
                }
                actions
            }
        };

        for action in actions {
            match action {
                Action::DeclDirect(decl, name) => {
                    let is_first = self.declare(file, name.clone(), decl);
                    if is_first {
                        self.export_order.push((file, name.clone(), name));
                    }
                }
                Action::DefaultIdent(local) => {
                    self.export_order.push((file, "default".to_string(), local));
                }
                Action::ReExport { alias, imported_name, source } => {
                    self.imports.insert((file, alias.clone()), Import { imported_name, source });
                    self.export_order.push((file, alias.clone(), alias));
                }
                Action::ExportLocal { alias, name } => {
                    self.export_order.push((file, alias, name));
                }
            }
        }
    }

    fn bind_import(&mut self, file: FileId, stmt: NodeId) {
        let imports: Vec<(String, Import)> = {
            let tree = self.tree(file);
            let Some(source_node) = tree.child_by_field(stmt, "source") else { return };
            let source = strip_quotes(tree.text(source_node));
            let Some(clause) = tree.child_by_field(stmt, "import_clause") else { return };

            let mut found = Vec::new();
            for child in tree.children(clause).iter().copied() {
                match tree.node(child).kind {
                    "identifier" => {
                        let local = tree.text(child).to_string();
                        found.push((local, Import { imported_name: "default".to_string(), source: source.clone() }));
                    }
                    "named_imports" => {
                        for spec in tree.children(child).iter().copied().filter(|&c| tree.node(c).kind == "import_specifier") {
                            let Some(name) = tree.child_by_field(spec, "name").map(|n| tree.text(n).to_string()) else { continue };
                            let alias = tree.child_by_field(spec, "alias").map(|n| tree.text(n).to_string()).unwrap_or_else(|| name.clone());
                            found.push((alias, Import { imported_name: name, source: source.clone() }));
                        }
                    }
                    "namespace_import" => {
                        // `import * as ns from "./x"` — not a nameable single
                        // declaration in this binder; references through a
                        // namespace import stay nominal.
                    }
                    _ => {}
                }
            }
            found
        };

        for (local, import) in imports {
            self.imports.insert((file, local), import);
        }
    }

    fn declaration_name(&self, file: FileId, node: NodeId) -> Option<String> {
        let tree = self.tree(file);
        let kind = tree.node(node).kind;
        if !DECLARATION_KINDS.contains(&kind) && !matches!(kind, "lexical_declaration" | "variable_declaration") {
            return None;
        }
        let name = declaration_display_name(tree, node);
        (!name.is_empty()).then_some(name)
    }

    fn resolve_module_path(&self, from: FileId, spec: &str) -> Option<FileId> {
        if !spec.starts_with('.') {
            return None; // bare specifier: outside the package
        }
        let from_key = &self.module_keys[from as usize];
        let base_dir = match from_key.rfind('/') {
            Some(idx) => &from_key[..idx],
            None => "",
        };
        let joined = normalize_path(base_dir, spec);
        self.file_index.get(&joined).copied()
    }

    /// Resolves `name` as seen from `file`'s top-level scope, following
    /// import aliases across files. Returns `None` when the name is
    /// undeclared locally or the chain leaves the package.
    pub fn resolve_local(&self, file: FileId, name: &str) -> Option<SymbolRef> {
        self.resolve_local_inner(file, name, 0)
    }

    fn resolve_local_inner(&self, file: FileId, name: &str, depth: u32) -> Option<SymbolRef> {
        if depth > 32 {
            return None;
        }
        if let Some(nodes) = self.declarations_by_name.get(&(file, name.to_string())) {
            return Some(SymbolRef { file, node: nodes[0] });
        }
        if let Some(import) = self.imports.get(&(file, name.to_string())) {
            let target = self.resolve_module_path(file, &import.source)?;
            return self.resolve_local_inner(target, &import.imported_name, depth + 1);
        }
        None
    }

    /// Exported `(export_name, symbol)` pairs for `file`, in declaration
    /// order. Exports that resolve to nothing (re-exports of an external
    /// package) are dropped.
    pub fn exported_symbols(&self, file: FileId) -> Vec<(String, SymbolRef)> {
        let mut out = Vec::new();
        for (f, export_name, local_name) in &self.export_order {
            if *f != file {
                continue;
            }
            if let Some(sym) = self.resolve_local(*f, local_name) {
                out.push((export_name.clone(), sym));
            }
        }
        out
    }

    /// All declarations in `file` not reachable from any of its exports
    /// — candidates for the forgotten-export warning.
    pub fn unexported_declarations(&self, file: FileId) -> Vec<(String, SymbolRef)> {
        let exported: std::collections::HashSet<NodeId> =
            self.exported_symbols(file).into_iter().map(|(_, s)| s.node).collect();
        self.declarations_by_name
            .iter()
            .filter(|((f, _), _)| *f == file)
            .filter(|(_, nodes)| !exported.contains(&nodes[0]))
            .map(|((_, name), nodes)| (name.clone(), SymbolRef { file, node: nodes[0] }))
            .collect()
    }

    /// All syntax nodes declaring the same logical symbol as `symbol`,
    /// in source order — a merged interface or a function-overload
    /// group yields more than one.
    pub fn declaration_sites(&self, symbol: SymbolRef) -> &[NodeId] {
        let name = &self.anchor_to_name[&(symbol.file, symbol.node)];
        &self.declarations_by_name[&(symbol.file, name.clone())]
    }
}

fn strip_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '\'' || c == '"').to_string()
}

fn normalize_path(base_dir: &str, spec: &str) -> String {
    let mut parts: Vec<&str> = if base_dir.is_empty() { Vec::new() } else { base_dir.split('/').collect() };
    for segment in spec.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    joined.strip_suffix(".ts").map(str::to_string).unwrap_or(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;

    fn build(files: &[(&str, &str)], entry: &str) -> Program {
        let mut diagnostics = Diagnostics::new();
        let files = files
            .iter()
            .map(|(k, s)| (k.to_string(), format!("{k}.ts"), s.to_string()))
            .collect();
        Program::build(files, entry, &mut diagnostics).unwrap()
    }

    #[test]
    fn resolves_direct_export() {
        let program = build(&[("index", "export interface Foo { bar: string }")], "index");
        let exports = program.exported_symbols(program.entry());
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].0, "Foo");
    }

    #[test]
    fn follows_re_export_across_files() {
        let program = build(
            &[
                ("shapes", "export interface Shape { area(): number }"),
                ("index", "export { Shape } from './shapes'"),
            ],
            "index",
        );
        let exports = program.exported_symbols(program.entry());
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].0, "Shape");
        assert_eq!(program.display_path(exports[0].1.file), "shapes.ts");
    }

    #[test]
    fn missing_entry_point_is_a_core_error_not_a_panic() {
        let mut diagnostics = Diagnostics::new();
        let files = vec![("index".to_string(), "index.ts".to_string(), "export const x = 1;".to_string())];
        match Program::build(files, "nope", &mut diagnostics) {
            Err(CoreError::MissingEntryPoint(name)) => assert_eq!(name, "nope"),
            other => panic!("expected MissingEntryPoint, got {}", other.is_ok()),
        }
    }

    #[test]
    fn merges_function_overloads_into_one_declaration_group() {
        let program = build(
            &[(
                "index",
                "export function f(a: number): void;\nexport function f(a: string): void;\nexport function f(a: any): void {}",
            )],
            "index",
        );
        let exports = program.exported_symbols(program.entry());
        assert_eq!(exports.len(), 1);
        let sites = program.declaration_sites(exports[0].1);
        assert_eq!(sites.len(), 3);
    }

    #[test]
    fn finds_unexported_declarations() {
        let program = build(
            &[("index", "interface Hidden {} \n export function f(): Hidden { return {} as Hidden }")],
            "index",
        );
        let hidden = program.unexported_declarations(program.entry());
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden[0].0, "Hidden");
    }
}
