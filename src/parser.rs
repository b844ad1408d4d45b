//! Filter的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ parse_query()
//!   │    ├─ "(" → 递归调用 parse_query()，期望 ")"
//!   │    │         └─ 遇到 and / or 时继续解析下一个操作数
//!   │    └─ 其他 → parse_condition()（单个裸条件，之后不能再接 and / or）
//!   │              ├─ 解析字段名 (Field)
//!   │              ├─ 比较运算符 → 标量值
//!   │              └─ in / not_in → parse_list()
//!   │
//!   └─ 检查输入是否已全部消费
//! ```
//!
//! ## 语法
//!
//! ```text
//! query      := "(" query ")" ( ("and" | "or") query )?
//!             | condition
//! condition  := field comp_op value
//!             | field ("in" | "not_in") "[" value ("," value)* "]"
//! comp_op    := "=" | "!=" | "<" | "<=" | ">" | ">=" | "=~"
//! ```
//!
//! `and` / `or` 的右侧是一个完整的 `query`，因此
//! `(a=1) and (b=2) or (c=3)` 被解析成一条平铺的链
//! `[a=1, and, b=2, or, c=3]`，再按 `or` 切分为
//! `Or[And[a=1, b=2], c=3]`。
//!
//! ## 解析示例
//!
//! ```text
//! f1=v1
//! (f1='v1') and (f2='v2')
//! ((f1=v1) and ((f2=v2) or (f2=v22))) or (f3=v3)
//! (team.name not_in [telcoci, RedHat])
//! ```

use crate::ast::{CompOp, Field, MembershipOp, Node};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};
use thiserror::Error;

/// 括号的最大嵌套层数
pub const MAX_NESTING: usize = 128;

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    depth: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self {
            message,
            span: Some(span),
        }
    }
}

/// 连接两个操作数的逻辑运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Or,
}

/// 对字符串进行词法和语法分析，返回 AST
pub fn parse(input: &str) -> Result<Node, ParseError> {
    let tokens: Vec<_> = Lexer::new(input).collect();
    Parser::new(&tokens).parse()
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenKind) -> Result<&'a Token<'a>, ParseError> {
        match self.peek() {
            Some(token)
                if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) =>
            {
                self.position += 1;
                Ok(token)
            }
            Some(token) => Err(ParseError::at_position(
                format!("Expected {:?}, found {:?}", expected, token.kind),
                token.span,
            )),
            None => Err(ParseError::new(
                format!("Expected {:?}, but reached end of input", expected),
                None,
            )),
        }
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    pub fn parse(&mut self) -> Result<Node, ParseError> {
        let node = self.parse_query()?;

        // 必须消费全部输入
        if let Some(token) = self.peek() {
            return Err(ParseError::at_position(
                format!("Unexpected token after end of query: {:?}", token.kind),
                token.span,
            ));
        }

        Ok(node)
    }

    /// 解析一条由 and / or 连接的链
    ///
    /// 链中的 `and` 段先被收集，遇到 `or` 时开始新的一段；
    /// 右侧递归解析出的操作数直接并入当前链，不额外嵌套。
    fn parse_query(&mut self) -> Result<Node, ParseError> {
        let mut runs = Vec::new();
        let mut current = Vec::new();

        loop {
            if let Some(open) = self.peek().filter(|token| token.kind == TokenKind::LParen) {
                self.advance(); // 消费 (
                if self.depth == MAX_NESTING {
                    return Err(ParseError::at_position(
                        format!("Parentheses nested deeper than {} levels", MAX_NESTING),
                        open.span,
                    ));
                }

                self.depth += 1;
                let inner = self.parse_query()?;
                self.depth -= 1;
                self.expect(TokenKind::RParen)?;
                current.push(inner);

                match self.parse_connective() {
                    Some(Connective::And) => continue,
                    Some(Connective::Or) => {
                        runs.push(std::mem::take(&mut current));
                        continue;
                    }
                    None => break,
                }
            } else {
                // 裸条件只能作为链的最后一个操作数
                current.push(self.parse_condition()?);
                break;
            }
        }

        runs.push(current);
        Ok(Node::from_chain(runs))
    }

    /// 如果当前 token 是 and / or，消费并返回
    fn parse_connective(&mut self) -> Option<Connective> {
        let connective = match self.peek()?.kind {
            TokenKind::And => Connective::And,
            TokenKind::Or => Connective::Or,
            _ => return None,
        };
        self.advance();
        Some(connective)
    }

    /// 解析比较运算或成员运算
    fn parse_condition(&mut self) -> Result<Node, ParseError> {
        let field = self.parse_field()?;

        let Some(token) = self.advance() else {
            return Err(ParseError::new(
                format!("Expected operator after field '{}', but reached end of input", field),
                None,
            ));
        };

        match &token.kind {
            TokenKind::In => Ok(Node::Membership {
                field,
                op: MembershipOp::In,
                values: self.parse_list()?,
            }),
            TokenKind::NotIn => Ok(Node::Membership {
                field,
                op: MembershipOp::NotIn,
                values: self.parse_list()?,
            }),
            kind => {
                let op = comparison_operator(kind).ok_or_else(|| {
                    ParseError::at_position(
                        format!("Expected comparison or membership operator, found {:?}", kind),
                        token.span,
                    )
                })?;
                let value = self.parse_value()?;
                Ok(Node::Comparison { field, op, value })
            }
        }
    }

    fn parse_field(&mut self) -> Result<Field, ParseError> {
        let token = self.expect(TokenKind::Field(""))?;
        match &token.kind {
            TokenKind::Field(name) => Ok(Field(name.to_string())),
            _ => Err(ParseError::at_position(
                "Expected field name".to_string(),
                token.span,
            )),
        }
    }

    fn parse_value(&mut self) -> Result<String, ParseError> {
        let token = self.expect(TokenKind::Value(""))?;
        match &token.kind {
            TokenKind::Value(value) => Ok(value.to_string()),
            _ => Err(ParseError::at_position(
                "Expected value".to_string(),
                token.span,
            )),
        }
    }

    /// 解析 `[v1, v2, ...]`，至少包含一个元素
    fn parse_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(TokenKind::LBracket)?;

        let mut values = vec![self.parse_value()?];
        while self.match_token(&TokenKind::Comma) {
            self.advance(); // 消费 ,
            values.push(self.parse_value()?);
        }

        self.expect(TokenKind::RBracket)?;
        Ok(values)
    }
}

fn comparison_operator(kind: &TokenKind) -> Option<CompOp> {
    let op = match kind {
        TokenKind::Eq => CompOp::Eq,
        TokenKind::NotEq => CompOp::NotEq,
        TokenKind::Gt => CompOp::Gt,
        TokenKind::Lt => CompOp::Lt,
        TokenKind::Gte => CompOp::Gte,
        TokenKind::Lte => CompOp::Lte,
        TokenKind::Match => CompOp::Match,
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(field: &str, op: CompOp, value: &str) -> Node {
        Node::Comparison {
            field: field.into(),
            op,
            value: value.to_string(),
        }
    }

    fn eq(field: &str, value: &str) -> Node {
        cmp(field, CompOp::Eq, value)
    }

    #[test]
    fn test_bare_comparison() {
        assert_eq!(parse("f1=v1").unwrap(), eq("f1", "v1"));
    }

    #[test]
    fn test_parenthesized_comparison_is_transparent() {
        assert_eq!(parse("(f1=v1)").unwrap(), eq("f1", "v1"));
        assert_eq!(parse("((f1=v1))").unwrap(), eq("f1", "v1"));
    }

    #[test]
    fn test_quoting_is_irrelevant() {
        assert_eq!(parse("f1='v1'").unwrap(), parse("f1=v1").unwrap());
        assert_eq!(
            parse("name in ['a','b']").unwrap(),
            parse("name in [a, b]").unwrap()
        );
    }

    #[test]
    fn test_all_comparison_operators() {
        for (input, op) in [
            ("a=1", CompOp::Eq),
            ("a!=1", CompOp::NotEq),
            ("a>1", CompOp::Gt),
            ("a<1", CompOp::Lt),
            ("a>=1", CompOp::Gte),
            ("a<=1", CompOp::Lte),
            ("a=~1", CompOp::Match),
        ] {
            assert_eq!(parse(input).unwrap(), cmp("a", op, "1"), "input: {input}");
        }
    }

    #[test]
    fn test_and_chain() {
        let result = parse("(f1=v1) and (f2=v2)").unwrap();
        assert_eq!(result, Node::And(vec![eq("f1", "v1"), eq("f2", "v2")]));
    }

    #[test]
    fn test_long_and_chain_is_flat() {
        let result = parse("(f1=v1) and (f2=v2) and (f3=v3) and (f4=v4)").unwrap();
        assert_eq!(
            result,
            Node::And(vec![
                eq("f1", "v1"),
                eq("f2", "v2"),
                eq("f3", "v3"),
                eq("f4", "v4"),
            ])
        );
    }

    #[test]
    fn test_grouped_and_or() {
        let result = parse("((f1=v1) and (f2=v2)) or (f3=v3)").unwrap();
        assert_eq!(
            result,
            Node::Or(vec![
                Node::And(vec![eq("f1", "v1"), eq("f2", "v2")]),
                eq("f3", "v3"),
            ])
        );
    }

    #[test]
    fn test_mixed_chain_splits_on_or() {
        let result = parse("(a=1) and (b=2) or (c=3) or (d=4) and (e=5)").unwrap();
        assert_eq!(
            result,
            Node::Or(vec![
                Node::And(vec![eq("a", "1"), eq("b", "2")]),
                eq("c", "3"),
                Node::And(vec![eq("d", "4"), eq("e", "5")]),
            ])
        );
    }

    #[test]
    fn test_deeply_nested_groups() {
        let result =
            parse("((f1=v1) and ((f2=v2) or (f2=v22))) or ((f3=v3) and ((f4=v4) or (f4=v44)))")
                .unwrap();
        assert_eq!(
            result,
            Node::Or(vec![
                Node::And(vec![
                    eq("f1", "v1"),
                    Node::Or(vec![eq("f2", "v2"), eq("f2", "v22")]),
                ]),
                Node::And(vec![
                    eq("f3", "v3"),
                    Node::Or(vec![eq("f4", "v4"), eq("f4", "v44")]),
                ]),
            ])
        );
    }

    #[test]
    fn test_membership() {
        let result = parse("(f1=v1) and (name not_in [lol, kikoolol, lolipop])").unwrap();
        assert_eq!(
            result,
            Node::And(vec![
                eq("f1", "v1"),
                Node::Membership {
                    field: "name".into(),
                    op: MembershipOp::NotIn,
                    values: vec![
                        "lol".to_string(),
                        "kikoolol".to_string(),
                        "lolipop".to_string(),
                    ],
                },
            ])
        );
    }

    #[test]
    fn test_bare_condition_may_end_a_chain() {
        let result = parse("(a=1) and b=2").unwrap();
        assert_eq!(result, Node::And(vec![eq("a", "1"), eq("b", "2")]));
    }

    #[test]
    fn test_invalid_queries() {
        for input in [
            "toto",
            "(toto=titi) and (lol=mdr",
            "",
            "()",
            "a=",
            "a ~ b",
            "(a=1) xor (b=2)",
            "(a=1) and",
            "(a=1))",
            "name in []",
            "name in [a,]",
            "name in [a",
            "name in a",
            "a='unterminated",
            "f1=v1 and f2=v2",
        ] {
            assert!(parse(input).is_err(), "should fail: {input:?}");
        }
    }

    #[test]
    fn test_error_reports_position() {
        let err = parse("(a=1) and (b=2))").unwrap_err();
        assert_eq!(err.span, Some(Span::new(15, 16)));

        let err = parse("(a=1").unwrap_err();
        assert_eq!(err.span, None);
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}a=1{}", "(".repeat(depth), ")".repeat(depth));

        assert_eq!(parse(&nested(MAX_NESTING)).unwrap(), eq("a", "1"));

        let err = parse(&nested(MAX_NESTING + 1)).unwrap_err();
        assert_eq!(err.span, Some(Span::new(MAX_NESTING, MAX_NESTING + 1)));

        // 超深输入返回错误而不是耗尽栈
        assert!(parse(&nested(200_000)).is_err());
    }

    #[test]
    fn test_display_reparses_to_same_ast() {
        let input = "((f1=v1) and ((f2=v2) or (f2=v22))) or (tags in [a, 'b c'])";
        let node = parse(input).unwrap();
        assert_eq!(parse(&node.to_string()).unwrap(), node);
    }
}
