//! Query compiler that lowers a filter AST into a search-engine boolean query.
//!
//! Leaves become `term` / `terms` / `range` / `regexp` clauses, `And` becomes
//! `bool.filter` and `Or` becomes `bool.should`. Fields with a dotted path live
//! in nested documents, so their clauses are wrapped in `nested` queries.
//!
//! Nesting is tracked as the currently open nested path (the *scope*). A leaf
//! whose nested path equals the scope is emitted bare; any other dotted leaf
//! gets its own `nested` wrapper. When every operand of a group is a leaf and
//! their nested paths share a leading segment, a single wrapper is opened at
//! the longest common path instead of one per leaf. Leaves below it are
//! grouped by their next path segment and nested one level further:
//!
//! ```text
//! (tests.name=a) and (tests.suites.name=b) and (tests.suites.cases.name=c)
//!
//! nested tests
//! └─ bool.filter
//!    ├─ term tests.name
//!    └─ nested tests.suites
//!       └─ bool.filter
//!          ├─ term tests.suites.name
//!          └─ nested tests.suites.cases
//!             └─ term tests.suites.cases.name
//! ```
//!
//! Parenthesized sub-groups are opaque: `(c.a=1) and ((c.b=2) and (c.c=3))`
//! opens one scope for `c.a` and a separate one for the inner group, so the
//! two never have to match the same nested document.

use crate::ast::{CompOp, Field, MembershipOp, Node};
use crate::config::CompilerConfig;
use crate::parser::{self, MAX_NESTING};
use serde_json::{json, Value};
use thiserror::Error;

/// Deepest tree accepted by [`QueryCompiler::compile`]. Every tree the parser
/// accepts fits: each parenthesis level adds at most an `Or` and an `And`.
pub const MAX_TREE_DEPTH: usize = 2 * MAX_NESTING + 1;

/// Raised when an AST cannot be lowered. The parser never produces such trees;
/// they can only come from hand-built nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("`{0}` group has no operands")]
    EmptyGroup(&'static str),

    #[error("membership test on `{0}` has no values")]
    EmptyMembership(String),

    #[error("tree depth {depth} exceeds the maximum of {max}")]
    TooDeep { depth: usize, max: usize },
}

/// Compiles filter ASTs into search queries.
#[derive(Debug, Clone, Default)]
pub struct QueryCompiler {
    config: CompilerConfig,
}

impl QueryCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Parse a filter string and compile it.
    pub fn build(&self, input: &str) -> crate::Result<Value> {
        let node = parser::parse(input)?;
        tracing::debug!(filter = %node, "parsed filter");
        let query = self.compile(&node)?;
        Ok(query)
    }

    /// Compile a filter AST into a query clause.
    pub fn compile(&self, node: &Node) -> Result<Value, BuildError> {
        let depth = node.depth();
        if depth > MAX_TREE_DEPTH {
            return Err(BuildError::TooDeep {
                depth,
                max: MAX_TREE_DEPTH,
            });
        }
        self.compile_node(node, None)
    }

    fn compile_node(&self, node: &Node, scope: Option<&str>) -> Result<Value, BuildError> {
        match node {
            Node::Comparison { field, op, value } => {
                let clause = self.comparison_clause(field, *op, value);
                Ok(wrap_leaf(field, clause, scope))
            }
            Node::Membership { field, op, values } => {
                let clause = membership_clause(field, *op, values)?;
                Ok(wrap_leaf(field, clause, scope))
            }
            Node::And(children) => self.compile_and(&children.iter().collect::<Vec<_>>(), scope),
            Node::Or(children) => self.compile_or(&children.iter().collect::<Vec<_>>(), scope),
        }
    }

    /// `And` collects every operand into one `bool.filter`.
    fn compile_and(&self, children: &[&Node], scope: Option<&str>) -> Result<Value, BuildError> {
        match children {
            [] => Err(BuildError::EmptyGroup("and")),
            [only] => self.compile_node(only, scope),
            _ => match shared_nested_path(children) {
                Some(path) => {
                    // Leaves sitting directly at `path` are emitted bare; the rest are
                    // grouped by the path one segment below and compiled per group.
                    let mut filter = Vec::new();
                    let mut groups: Vec<(&str, Vec<&Node>)> = Vec::new();
                    for &child in children {
                        match leaf_nested_path(child) {
                            Some(own) if own != path => {
                                let below = child_path(own, path);
                                match groups.iter_mut().find(|(group, _)| *group == below) {
                                    Some((_, members)) => members.push(child),
                                    None => groups.push((below, vec![child])),
                                }
                            }
                            _ => filter.push(self.compile_node(child, Some(path))?),
                        }
                    }
                    for (_, members) in &groups {
                        filter.push(self.compile_and(members, Some(path))?);
                    }

                    tracing::trace!(path, operands = children.len(), "and-group shares nested path");
                    Ok(enter_scope(path, scope, json!({ "bool": { "filter": filter } })))
                }
                None => {
                    let filter = children
                        .iter()
                        .map(|child| self.compile_node(child, scope))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(json!({ "bool": { "filter": filter } }))
                }
            },
        }
    }

    /// `Or` splits once, at the first operand: `[a, b, c]` becomes
    /// `should[a, should[b, c]]`.
    fn compile_or(&self, children: &[&Node], scope: Option<&str>) -> Result<Value, BuildError> {
        match children {
            [] => Err(BuildError::EmptyGroup("or")),
            [only] => self.compile_node(only, scope),
            [left, rest @ ..] => {
                let shared = match rest {
                    [right] => shared_nested_path(&[*left, *right]),
                    _ => None,
                };

                match shared {
                    Some(path) => {
                        let should = vec![
                            self.compile_node(left, Some(path))?,
                            self.compile_or(rest, Some(path))?,
                        ];
                        tracing::trace!(path, "or-group shares nested path");
                        Ok(enter_scope(path, scope, json!({ "bool": { "should": should } })))
                    }
                    None => {
                        let should = vec![
                            self.compile_node(left, scope)?,
                            self.compile_or(rest, scope)?,
                        ];
                        Ok(json!({ "bool": { "should": should } }))
                    }
                }
            }
        }
    }

    fn comparison_clause(&self, field: &Field, op: CompOp, value: &str) -> Value {
        let field = field.as_str();
        match op {
            CompOp::Eq => json!({ "term": { field: value } }),
            CompOp::NotEq => json!({ "bool": { "must_not": { "term": { field: value } } } }),
            CompOp::Lt => range_clause(field, "lt", value),
            CompOp::Lte => range_clause(field, "lte", value),
            CompOp::Gt => range_clause(field, "gt", value),
            CompOp::Gte => range_clause(field, "gte", value),
            CompOp::Match => {
                let flags = &self.config.regexp_flags;
                let case_insensitive = self.config.regexp_case_insensitive;
                json!({
                    "regexp": {
                        field: {
                            "value": value,
                            "flags": flags,
                            "case_insensitive": case_insensitive,
                        }
                    }
                })
            }
        }
    }
}

fn range_clause(field: &str, bound: &str, value: &str) -> Value {
    json!({ "range": { field: { bound: value } } })
}

fn membership_clause(field: &Field, op: MembershipOp, values: &[String]) -> Result<Value, BuildError> {
    if values.is_empty() {
        return Err(BuildError::EmptyMembership(field.to_string()));
    }

    let field = field.as_str();
    let clause = match op {
        MembershipOp::In => json!({ "terms": { field: values } }),
        MembershipOp::NotIn => json!({ "bool": { "must_not": { "terms": { field: values } } } }),
    };
    Ok(clause)
}

fn nested(path: &str, query: Value) -> Value {
    json!({ "nested": { "path": path, "query": query } })
}

/// Wrap a leaf clause unless its nested path is the one already open.
fn wrap_leaf(field: &Field, clause: Value, scope: Option<&str>) -> Value {
    match field.nested_path() {
        Some(path) if Some(path) != scope => nested(path, clause),
        _ => clause,
    }
}

/// Open `path` around `body` unless it is already the current scope.
fn enter_scope(path: &str, scope: Option<&str>, body: Value) -> Value {
    if scope == Some(path) {
        body
    } else {
        nested(path, body)
    }
}

fn leaf_nested_path(node: &Node) -> Option<&str> {
    node.field().and_then(Field::nested_path)
}

/// The longest nested path containing every operand's nested path, if any.
///
/// Every operand has to be a leaf on a dotted field, and their nested paths
/// must share at least the first segment.
fn shared_nested_path<'n>(operands: &[&'n Node]) -> Option<&'n str> {
    let paths = operands
        .iter()
        .map(|node| leaf_nested_path(*node))
        .collect::<Option<Vec<_>>>()?;
    let (&first, rest) = paths.split_first()?;

    let mut common = first;
    for path in rest {
        while !is_within(path, common) {
            common = common.rsplit_once('.').map(|(parent, _)| parent)?;
        }
    }
    Some(common)
}

/// The ancestor of `path` one segment below `parent`: `a.b.c` below `a` is `a.b`.
fn child_path<'p>(path: &'p str, parent: &str) -> &'p str {
    let start = parent.len() + 1;
    match path[start..].find('.') {
        Some(offset) => &path[..start + offset],
        None => path,
    }
}

/// `a.b.c` is within `a.b` and within itself, but not within `a.bc`.
fn is_within(path: &str, root: &str) -> bool {
    match path.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}
