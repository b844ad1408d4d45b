use std::fmt;

/// 字段引用，例如 `components.type`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field(pub String);

impl Field {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 字段所在的嵌套文档路径，即最后一个 `.` 之前的部分
    ///
    /// `tests.testsuites.name` 的嵌套路径为 `tests.testsuites`；
    /// 不含 `.` 的字段没有嵌套路径。
    pub fn nested_path(&self) -> Option<&str> {
        self.0
            .rfind('.')
            .map(|idx| &self.0[..idx])
            .filter(|path| !path.is_empty())
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field(s.to_string())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// AST 节点，代表一个完整的过滤表达式或其中的一部分
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// 比较运算, 例如：`f1 = v1`
    Comparison {
        field: Field,
        op: CompOp,
        value: String,
    },
    /// 成员运算, 例如：`name in [a, b]`
    Membership {
        field: Field,
        op: MembershipOp,
        values: Vec<String>,
    },
    /// 逻辑与运算，n 元
    And(Vec<Node>),
    /// 逻辑或运算，n 元
    Or(Vec<Node>),
}

impl Node {
    /// 叶子节点（比较或成员运算）引用的字段
    pub fn field(&self) -> Option<&Field> {
        match self {
            Node::Comparison { field, .. } | Node::Membership { field, .. } => Some(field),
            Node::And(_) | Node::Or(_) => None,
        }
    }

    /// 树的深度，叶子节点为 1；迭代计算，不依赖调用栈
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((node, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            if let Node::And(children) | Node::Or(children) = node {
                pending.extend(children.iter().map(|child| (child, depth + 1)));
            }
        }
        deepest
    }

    /// 由一条平铺的链构造节点
    ///
    /// `runs` 是按 `or` 切分后的各段，每段内部由 `and` 连接。
    /// 只有一个元素的段或链直接返回该元素本身。
    pub fn from_chain(runs: Vec<Vec<Node>>) -> Node {
        let runs = runs.into_iter().map(|run| collapse(run, Node::And)).collect();
        collapse(runs, Node::Or)
    }
}

fn collapse(nodes: Vec<Node>, wrap: fn(Vec<Node>) -> Node) -> Node {
    match <[Node; 1]>::try_from(nodes) {
        Ok([node]) => node,
        Err(nodes) => wrap(nodes),
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompOp {
    Eq,    // =
    NotEq, // !=
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=
    Match, // =~
}

impl CompOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompOp::Eq => "=",
            CompOp::NotEq => "!=",
            CompOp::Gt => ">",
            CompOp::Lt => "<",
            CompOp::Gte => ">=",
            CompOp::Lte => "<=",
            CompOp::Match => "=~",
        }
    }
}

/// 成员运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipOp {
    In,    // in
    NotIn, // not_in
}

impl MembershipOp {
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipOp::In => "in",
            MembershipOp::NotIn => "not_in",
        }
    }
}

/// 输出完全加括号的规范形式，重新解析后得到相同的 AST
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Comparison { field, op, value } => {
                write!(f, "{}{}'{}'", field, op.as_str(), value)
            }
            Node::Membership { field, op, values } => {
                write!(f, "{} {} [", field, op.as_str())?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{}'", value)?;
                }
                f.write_str("]")
            }
            Node::And(children) => write_joined(f, children, "and"),
            Node::Or(children) => write_joined(f, children, "or"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Node], connective: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", connective)?;
        }
        write!(f, "({})", child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(field: &str, value: &str) -> Node {
        Node::Comparison {
            field: field.into(),
            op: CompOp::Eq,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_nested_path() {
        assert_eq!(Field::from("name").nested_path(), None);
        assert_eq!(Field::from("components.type").nested_path(), Some("components"));
        assert_eq!(
            Field::from("tests.testsuites.testcases.name").nested_path(),
            Some("tests.testsuites.testcases")
        );
        assert_eq!(Field::from(".name").nested_path(), None);
    }

    #[test]
    fn test_from_chain_single_operand() {
        let node = Node::from_chain(vec![vec![eq("a", "1")]]);
        assert_eq!(node, eq("a", "1"));
    }

    #[test]
    fn test_from_chain_groups_and_runs_under_or() {
        // a and b or c
        let node = Node::from_chain(vec![vec![eq("a", "1"), eq("b", "2")], vec![eq("c", "3")]]);
        assert_eq!(
            node,
            Node::Or(vec![Node::And(vec![eq("a", "1"), eq("b", "2")]), eq("c", "3")])
        );
    }

    #[test]
    fn test_display() {
        let node = Node::Or(vec![
            Node::And(vec![
                eq("a", "1"),
                Node::Membership {
                    field: "b".into(),
                    op: MembershipOp::NotIn,
                    values: vec!["x".to_string(), "y z".to_string()],
                },
            ]),
            Node::Comparison {
                field: "c.d".into(),
                op: CompOp::Match,
                value: "v.*".to_string(),
            },
        ]);
        assert_eq!(
            node.to_string(),
            "((a='1') and (b not_in ['x', 'y z'])) or (c.d=~'v.*')"
        );
    }

    #[test]
    fn test_depth() {
        assert_eq!(eq("a", "1").depth(), 1);
        let node = Node::Or(vec![Node::And(vec![eq("a", "1"), eq("b", "2")]), eq("c", "3")]);
        assert_eq!(node.depth(), 3);
    }
}
