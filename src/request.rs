//! Assembles a complete search request body around a compiled filter.
//!
//! The compiled filter only covers the `query` clause. Pagination, sorting,
//! a time window on the timestamp field and `_source` projection are layered
//! on top here.

use crate::es_compiler::QueryCompiler;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("invalid sort specification `{0}`")]
    InvalidSort(String),

    #[error("page size {size} exceeds the maximum of {max}")]
    SizeTooLarge { size: usize, max: usize },

    #[error("time window needs at least one bound")]
    EmptyTimeWindow,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// A sort on a single field, written `field` (ascending) or `-field`
/// (descending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl FromStr for SortSpec {
    type Err = RequestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (order, field) = match trimmed.strip_prefix('-') {
            Some(field) => (SortOrder::Desc, field),
            None => (SortOrder::Asc, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let valid = !field.is_empty()
            && field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !valid {
            return Err(RequestError::InvalidSort(s.to_string()));
        }

        Ok(SortSpec {
            field: field.to_string(),
            order,
        })
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order {
            SortOrder::Asc => write!(f, "{}", self.field),
            SortOrder::Desc => write!(f, "-{}", self.field),
        }
    }
}

/// Bounds of the time window, both inclusive. Values are passed through
/// untouched in the configured date format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub gte: Option<String>,
    pub lte: Option<String>,
}

/// Result-shaping options supplied next to the filter string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub offset: usize,
    /// Falls back to the configured default size.
    pub size: Option<usize>,
    /// `field` or `-field`.
    pub sort: Option<String>,
    pub time_window: Option<TimeWindow>,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

pub struct SearchRequestBuilder<'c> {
    compiler: &'c QueryCompiler,
}

impl<'c> SearchRequestBuilder<'c> {
    pub fn new(compiler: &'c QueryCompiler) -> Self {
        Self { compiler }
    }

    /// Build the request body. A blank or missing filter matches everything
    /// inside the time window.
    pub fn build(&self, filter: Option<&str>, options: &SearchOptions) -> Result<Value> {
        let config = self.compiler.config();

        let size = options.size.unwrap_or(config.default_size);
        if size > config.max_size {
            return Err(RequestError::SizeTooLarge {
                size,
                max: config.max_size,
            }
            .into());
        }

        let mut filters = Vec::new();
        if let Some(window) = &options.time_window {
            filters.push(self.time_range(window)?);
        }
        if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
            filters.push(self.compiler.build(filter)?);
        }

        let query = match filters.len() {
            0 => json!({ "match_all": {} }),
            1 => filters.remove(0),
            _ => json!({ "bool": { "filter": filters } }),
        };

        let mut body = Map::new();
        body.insert("from".to_string(), json!(options.offset));
        body.insert("size".to_string(), json!(size));
        body.insert("query".to_string(), query);

        if let Some(sort) = &options.sort {
            let spec: SortSpec = sort.parse()?;
            body.insert("sort".to_string(), self.sort_clause(&spec));
        }

        if !options.includes.is_empty() || !options.excludes.is_empty() {
            body.insert(
                "_source".to_string(),
                json!({ "includes": options.includes, "excludes": options.excludes }),
            );
        }

        tracing::debug!(
            from = options.offset,
            size,
            sort = options.sort.as_deref(),
            "assembled search request"
        );
        Ok(Value::Object(body))
    }

    fn sort_clause(&self, spec: &SortSpec) -> Value {
        let field = spec.field.as_str();
        let format = &self.compiler.config().date_format;
        json!([{ field: { "order": spec.order.as_str(), "format": format } }])
    }

    fn time_range(&self, window: &TimeWindow) -> std::result::Result<Value, RequestError> {
        if window.gte.is_none() && window.lte.is_none() {
            return Err(RequestError::EmptyTimeWindow);
        }

        let config = self.compiler.config();
        let mut bounds = Map::new();
        if let Some(gte) = &window.gte {
            bounds.insert("gte".to_string(), json!(gte));
        }
        if let Some(lte) = &window.lte {
            bounds.insert("lte".to_string(), json!(lte));
        }
        bounds.insert("format".to_string(), json!(config.date_format));

        let field = config.timestamp_field.as_str();
        Ok(json!({ "range": { field: bounds } }))
    }
}
