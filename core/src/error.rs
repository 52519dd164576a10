//! Input-level errors (§8): conditions that abort processing of a whole
//! package rather than being collected as a per-declaration diagnostic.
//! Everything recoverable goes through [`crate::diagnostics::Diagnostics`]
//! instead — this type is only for "there is no package to analyze".

use crate::facade::syntax::ParseError;

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse package source: {0}")]
    Parse(#[from] ParseError),
    #[error("entry point `{0}` is not among the package's files")]
    MissingEntryPoint(String),
}
