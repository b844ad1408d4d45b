//! Filter的词法分析器
//!
//! 词法分析依赖上下文：比较运算符之后读取的是值，`in` / `not_in` 之后的
//! `[...]` 内读取的是列表元素，其余位置读取字段名、关键字和标点。

use crate::token::{Span, Token, TokenKind};

/// 词法分析器当前所处的模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// 字段名、关键字、运算符和括号
    Normal,
    /// 比较运算符之后，下一个 token 是标量值
    Value,
    /// 成员运算符之后，等待 `[`
    ListStart,
    /// `[` 与 `]` 之间
    List,
}

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
    mode: Mode,
}

/// 字段名允许的字符
fn is_field_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// 未加引号的标量值允许的字符
fn is_value_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            ' ' | '_' | '-' | '%' | '.' | ':' | '\\' | '*' | '?' | '+' | '{' | '}' | '[' | ']'
        )
}

/// 未加引号的列表元素允许的字符
fn is_list_item_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':' | ' ')
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            mode: Mode::Normal,
        }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    /// 读取满足条件的连续字符，去掉末尾空白后作为值返回
    fn read_run(&mut self, start: usize, accept: fn(char) -> bool) -> Token<'a> {
        while let Some(c) = self.peek() {
            if accept(c) {
                self.bump();
            } else {
                break;
            }
        }
        let value = self.input[start..self.position].trim_end();
        Token {
            kind: TokenKind::Value(value),
            span: Span::new(start, start + value.len()),
        }
    }

    /// 读取单引号包围的值，引号内除 `'` 外的字符原样保留（不处理转义）
    /// 注意：开始的引号已经被调用者消费
    fn read_quoted(&mut self, start: usize) -> Token<'a> {
        let content_start = self.position;
        while let Some(c) = self.peek() {
            if c == '\'' {
                break;
            }
            self.bump();
        }
        let content_end = self.position;
        if self.bump().is_none() {
            // 缺少结束引号
            return self.token(TokenKind::Illegal, start);
        }

        let content = &self.input[content_start..content_end];
        self.token(TokenKind::Value(content), start)
    }

    /// 读取字段名或关键字
    fn read_word(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if is_field_char(c) {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        self.token(match_keyword(literal), start)
    }

    /// 值模式：读取比较运算符右侧的标量
    fn next_value(&mut self, start: usize) -> Option<Token<'a>> {
        match self.peek()? {
            '\'' => {
                self.bump();
                Some(self.read_quoted(start))
            }
            c if is_value_char(c) => Some(self.read_run(start, is_value_char)),
            // 交给普通模式处理，由语法分析器报告缺少值
            _ => self.next_normal(start),
        }
    }

    /// 列表模式：读取 `[` 与 `]` 之间的元素和逗号
    fn next_list_item(&mut self, start: usize) -> Option<Token<'a>> {
        let c = self.bump()?;
        let token = match c {
            ',' => self.token(TokenKind::Comma, start),
            ']' => {
                self.mode = Mode::Normal;
                self.token(TokenKind::RBracket, start)
            }
            '\'' => self.read_quoted(start),
            c if is_list_item_char(c) => self.read_run(start, is_list_item_char),
            _ => self.token(TokenKind::Illegal, start),
        };
        Some(token)
    }

    fn next_normal(&mut self, start: usize) -> Option<Token<'a>> {
        let c = self.bump()?;
        let token = match c {
            '(' => self.token(TokenKind::LParen, start),
            ')' => self.token(TokenKind::RParen, start),
            '[' => self.token(TokenKind::LBracket, start),
            ']' => self.token(TokenKind::RBracket, start),
            ',' => self.token(TokenKind::Comma, start),
            '=' => {
                if self.peek() == Some('~') {
                    self.bump();
                    self.token(TokenKind::Match, start)
                } else {
                    self.token(TokenKind::Eq, start)
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Lte, start)
                } else {
                    self.token(TokenKind::Lt, start)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Gte, start)
                } else {
                    self.token(TokenKind::Gt, start)
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::NotEq, start)
                } else {
                    self.token(TokenKind::Illegal, start)
                }
            }
            c if is_field_char(c) => self.read_word(start),
            _ => self.token(TokenKind::Illegal, start),
        };
        Some(token)
    }
}

/// 关键字区分大小写：`AND` 是普通字段名
fn match_keyword(s: &str) -> TokenKind<'_> {
    match s {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "in" => TokenKind::In,
        "not_in" => TokenKind::NotIn,
        _ => TokenKind::Field(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;

        let token = match self.mode {
            Mode::Value => {
                self.mode = Mode::Normal;
                self.next_value(start)?
            }
            Mode::List => self.next_list_item(start)?,
            Mode::ListStart => {
                let token = self.next_normal(start)?;
                self.mode = if token.kind == TokenKind::LBracket {
                    Mode::List
                } else {
                    Mode::Normal
                };
                return Some(token);
            }
            Mode::Normal => self.next_normal(start)?,
        };

        if token.kind.is_comparison_operator() {
            self.mode = Mode::Value;
        } else if token.kind.is_membership_operator() {
            self.mode = Mode::ListStart;
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        Lexer::new(input).map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_comparison() {
        let input = "f1='v1'";
        let mut lexer = Lexer::new(input);

        assert_eq!(lexer.next().unwrap().kind, TokenKind::Field("f1"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Eq);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Value("v1"));
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_all_operators() {
        for (input, op) in [
            ("a=b", TokenKind::Eq),
            ("a!=b", TokenKind::NotEq),
            ("a>b", TokenKind::Gt),
            ("a<b", TokenKind::Lt),
            ("a>=b", TokenKind::Gte),
            ("a<=b", TokenKind::Lte),
            ("a=~b", TokenKind::Match),
        ] {
            assert_eq!(
                kinds(input),
                vec![TokenKind::Field("a"), op, TokenKind::Value("b")],
                "input: {input}"
            );
        }
    }

    #[test]
    fn test_unquoted_value_keeps_inner_spaces() {
        let input = "(name = hello world ) and (x=1)";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::LParen,
                TokenKind::Field("name"),
                TokenKind::Eq,
                TokenKind::Value("hello world"),
                TokenKind::RParen,
                TokenKind::And,
                TokenKind::LParen,
                TokenKind::Field("x"),
                TokenKind::Eq,
                TokenKind::Value("1"),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_value_span_excludes_trailing_blanks() {
        let tokens: Vec<_> = Lexer::new("a=xy  )").collect();
        assert_eq!(tokens[2].kind, TokenKind::Value("xy"));
        assert_eq!(tokens[2].span, Span::new(2, 4));
        assert_eq!(tokens[3].span, Span::new(6, 7));
    }

    #[test]
    fn test_regex_value_is_not_unescaped() {
        let input = r"version=~'v24\.02.*'";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Field("version"),
                TokenKind::Match,
                TokenKind::Value(r"v24\.02.*"),
            ]
        );
    }

    #[test]
    fn test_value_charset_allows_brackets_and_braces() {
        assert_eq!(
            kinds("a=~[a-z]{2}+"),
            vec![
                TokenKind::Field("a"),
                TokenKind::Match,
                TokenKind::Value("[a-z]{2}+"),
            ]
        );
    }

    #[test]
    fn test_quoted_value_may_contain_any_character() {
        assert_eq!(
            kinds("title='a (b) & c'"),
            vec![
                TokenKind::Field("title"),
                TokenKind::Eq,
                TokenKind::Value("a (b) & c"),
            ]
        );
    }

    #[test]
    fn test_membership_list() {
        let input = "team.name not_in [telcoci, 'Red Hat', v1.2-3]";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Field("team.name"),
                TokenKind::NotIn,
                TokenKind::LBracket,
                TokenKind::Value("telcoci"),
                TokenKind::Comma,
                TokenKind::Value("Red Hat"),
                TokenKind::Comma,
                TokenKind::Value("v1.2-3"),
                TokenKind::RBracket,
            ]
        );
    }

    #[test]
    fn test_list_rejects_characters_outside_its_charset() {
        let kinds = kinds("name in [a*]");
        assert!(kinds.contains(&TokenKind::Illegal));
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(
            kinds("and or in not_in AND Or"),
            vec![
                TokenKind::And,
                TokenKind::Or,
                TokenKind::In,
                TokenKind::NotIn,
                TokenKind::Field("AND"),
                TokenKind::Field("Or"),
            ]
        );
    }

    #[test]
    fn test_unterminated_quote_is_illegal() {
        let kinds = kinds("a='oops");
        assert_eq!(kinds.last(), Some(&TokenKind::Illegal));
    }

    #[test]
    fn test_missing_value_falls_back_to_normal_lexing() {
        assert_eq!(
            kinds("(a=)"),
            vec![
                TokenKind::LParen,
                TokenKind::Field("a"),
                TokenKind::Eq,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_lone_bang_is_illegal() {
        assert_eq!(
            kinds("a!b"),
            vec![TokenKind::Field("a"), TokenKind::Illegal, TokenKind::Field("b")]
        );
    }
}
