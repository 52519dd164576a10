//! Parses TypeScript source into a flattened syntax arena and binds a
//! same-package import/export graph over it. This is the only layer that
//! talks to tree-sitter; everything downstream works with [`NodeId`]s,
//! [`SymbolRef`]s and text slices.

pub mod program;
pub mod syntax;

pub use program::{FileId, Program, SymbolRef};
pub use syntax::{NodeId, ParseError, SyntaxNodeData, SyntaxTree};
