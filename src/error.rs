//! Error types for the filter compiler

use thiserror::Error;

use crate::config::ConfigError;
use crate::es_compiler::BuildError;
use crate::parser::ParseError;
use crate::request::RequestError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The filter string does not match the grammar.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The AST cannot be lowered into a query.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid request: {0}")]
    Request(#[from] RequestError),
}
