//! Compiles boolean filter expressions into nested-document search queries.
//!
//! ```
//! use serde_json::json;
//!
//! let query = es_filter::build("(f1='v1') and (components.type=ocp)").unwrap();
//! assert_eq!(
//!     query,
//!     json!({
//!         "bool": {
//!             "filter": [
//!                 { "term": { "f1": "v1" } },
//!                 { "nested": { "path": "components", "query": { "term": { "components.type": "ocp" } } } }
//!             ]
//!         }
//!     })
//! );
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod es_compiler;
pub mod lexer;
pub mod parser;
pub mod request;
pub mod token;

use std::sync::OnceLock;

pub use ast::Node;
pub use error::{Error, Result};
pub use es_compiler::QueryCompiler;
pub use parser::{parse, ParseError};

static DEFAULT_COMPILER: OnceLock<QueryCompiler> = OnceLock::new();

/// Compiler with the default configuration, built on first use.
pub fn default_compiler() -> &'static QueryCompiler {
    DEFAULT_COMPILER.get_or_init(QueryCompiler::new)
}

/// Parse `input` and compile it with the default configuration.
pub fn build(input: &str) -> Result<serde_json::Value> {
    default_compiler().build(input)
}
