//! LDAP 过滤器的词法分析器
//!
//! 扫描是上下文相关的：同一个字符在不同位置含义不同，由 `last_kind`
//! （最近一个有意义的 token 类型）决定。
//!
//! - `&` `|` `!` 只有紧跟在 `(` 之后才是运算符
//! - `=` `>=` `<=` `~=` 只有紧跟在属性名之后才是比较运算符
//! - 空白只有跟在 `)` `&` `|` `!` 之后才单独成为 token，其他位置并入属性/值或未知文本
//!
//! 扫描器从不报错：最坏情况下返回 `Unknown` 或 `Eof`，由语法分析器决定如何标记错误。

use crate::token::{Token, TokenKind};

pub struct Scanner {
    input: String,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
    /// 最近一个影响上下文的 token 类型，`Whitespace`、`Unknown`、`Eof` 不会更新它
    last_kind: TokenKind,
    /// 迭代器是否已经返回过 `Eof`
    finished: bool,
}

impl Scanner {
    pub fn new(input: &str) -> Self {
        Scanner {
            input: input.to_string(),
            position: 0,
            last_kind: TokenKind::New,
            finished: false,
        }
    }

    /// 用新的输入重新初始化所有扫描状态
    pub fn reset(&mut self, input: &str) {
        self.input.clear();
        self.input.push_str(input);
        self.position = 0;
        self.last_kind = TokenKind::New;
        self.finished = false;
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回当前位置之后第 n 个字符，不推进位置
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input[self.position..].chars().nth(n)
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if predicate(c) {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 以 `start..position` 的原文构造 token，不改变上下文
    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, &self.input[start..self.position], start)
    }

    /// 构造 token 并把它记为新的上下文
    fn emit(&mut self, kind: TokenKind, start: usize) -> Token {
        self.last_kind = kind;
        self.token(kind, start)
    }

    /// 返回下一个 token。到达末尾后会一直返回 `Eof`。
    pub fn next_token(&mut self) -> Token {
        let start = self.position;

        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, "", self.input.len());
        };

        if c.is_whitespace()
            && matches!(
                self.last_kind,
                TokenKind::RParen | TokenKind::And | TokenKind::Or | TokenKind::Not
            )
        {
            self.eat_while(char::is_whitespace);
            return self.token(TokenKind::Whitespace, start);
        }

        if let Some(token) = self.read_special(c, start) {
            return token;
        }

        let token = match self.last_kind {
            TokenKind::LParen => self.read_attribute(start),
            TokenKind::Equal | TokenKind::Greater | TokenKind::Less | TokenKind::Approx => {
                self.read_value(start, false)
            }
            TokenKind::Substring => self.read_value(start, true),
            TokenKind::ExtensibleDnAttrColon => self.read_dn_attr(start),
            TokenKind::ExtensibleMatchingRuleOidColon => self.read_matching_rule(start),
            _ => None,
        };

        token.unwrap_or_else(|| self.read_unknown(start))
    }

    /// 读取结构字符和运算符
    fn read_special(&mut self, c: char, start: usize) -> Option<Token> {
        let kind = match c {
            '(' => TokenKind::LParen,
            // 比较运算符之后的 `)` 先留给值（可能是空值）
            ')' if !matches!(
                self.last_kind,
                TokenKind::Equal
                    | TokenKind::Greater
                    | TokenKind::Less
                    | TokenKind::Approx
                    | TokenKind::Substring
            ) =>
            {
                TokenKind::RParen
            }
            '&' if self.last_kind == TokenKind::LParen => TokenKind::And,
            '|' if self.last_kind == TokenKind::LParen => TokenKind::Or,
            '!' if self.last_kind == TokenKind::LParen => TokenKind::Not,
            '=' => return self.read_equals(start),
            '>' | '<' | '~'
                if self.last_kind == TokenKind::Attribute && self.peek_nth(1) == Some('=') =>
            {
                self.bump();
                match c {
                    '>' => TokenKind::Greater,
                    '<' => TokenKind::Less,
                    _ => TokenKind::Approx,
                }
            }
            ':' => return self.read_colon(start),
            _ => return None,
        };
        self.bump();
        Some(self.emit(kind, start))
    }

    /// 读取 `=`，区分 present (`=*`)、substring 和 equal
    fn read_equals(&mut self, start: usize) -> Option<Token> {
        match self.last_kind {
            TokenKind::Attribute => {
                let rest = &self.input[self.position + 1..];
                if let Some(after) = rest.strip_prefix('*') {
                    if matches!(after.chars().next(), None | Some(')')) {
                        self.position += 2;
                        return Some(self.emit(TokenKind::Present, start));
                    }
                }

                // 一直看到 `)` 或末尾，出现 `*` 就是 substring
                let assertion = &rest[..rest.find(')').unwrap_or(rest.len())];
                let kind = if assertion.contains('*') {
                    TokenKind::Substring
                } else {
                    TokenKind::Equal
                };
                self.bump();
                Some(self.emit(kind, start))
            }
            TokenKind::ExtensibleEqualsColon => {
                self.bump();
                Some(self.emit(TokenKind::Equal, start))
            }
            // 重复的运算符，例如 `(cn==)`，交给语法分析器标记
            kind if kind.is_filter_type() && kind != TokenKind::Present => {
                self.bump();
                Some(self.emit(TokenKind::Equal, start))
            }
            _ => None,
        }
    }

    /// 读取可扩展匹配中的 `:`，用后面三个字符判断它的角色
    fn read_colon(&mut self, start: usize) -> Option<Token> {
        let t1 = self.peek_nth(1);
        let t2 = self.peek_nth(2);
        let t3 = self.peek_nth(3);
        let is_dn =
            matches!(t1, Some('d' | 'D')) && matches!(t2, Some('n' | 'N')) && t3 == Some(':');

        let kind = match self.last_kind {
            TokenKind::LParen | TokenKind::ExtensibleAttribute if is_dn => {
                TokenKind::ExtensibleDnAttrColon
            }
            TokenKind::ExtensibleAttribute
            | TokenKind::ExtensibleDnAttr
            | TokenKind::ExtensibleMatchingRuleOid
            | TokenKind::ExtensibleMatchingRuleOidColon
                if t1 == Some('=') =>
            {
                TokenKind::ExtensibleEqualsColon
            }
            TokenKind::LParen
            | TokenKind::ExtensibleAttribute
            | TokenKind::ExtensibleDnAttr
            | TokenKind::ExtensibleDnAttrColon => TokenKind::ExtensibleMatchingRuleOidColon,
            _ => return None,
        };
        self.bump();
        Some(self.emit(kind, start))
    }

    /// 读取属性名，以 `:` 结尾时是可扩展匹配的属性
    fn read_attribute(&mut self, start: usize) -> Option<Token> {
        self.eat_while(is_descriptor_char);
        if self.position == start {
            return None;
        }
        let kind = if self.peek() == Some(':') {
            TokenKind::ExtensibleAttribute
        } else {
            TokenKind::Attribute
        };
        Some(self.emit(kind, start))
    }

    /// 读取值，一直到 `)` 或末尾。
    ///
    /// 值中的换行不会结束扫描。普通值不能含 `*` 和 `(`，substring 值不能含 `(`，
    /// 含有这些字符时返回 `None`，由调用者按未知文本处理。
    fn read_value(&mut self, start: usize, substring: bool) -> Option<Token> {
        let rest = &self.input[start..];
        let len = rest.find(')').unwrap_or(rest.len());
        let value = &rest[..len];

        let forbidden = if substring {
            value.contains('(') || value.is_empty()
        } else {
            value.contains(|c: char| c == '*' || c == '(')
        };
        if forbidden {
            return None;
        }

        self.position += len;
        Some(self.emit(TokenKind::Value, start))
    }

    /// 读取 `:dn:` 中的 `dn`
    fn read_dn_attr(&mut self, start: usize) -> Option<Token> {
        let is_dn = matches!(self.peek(), Some('d' | 'D'))
            && matches!(self.peek_nth(1), Some('n' | 'N'))
            && matches!(self.peek_nth(2), None | Some(':'));
        if !is_dn {
            return None;
        }
        self.bump();
        self.bump();
        Some(self.emit(TokenKind::ExtensibleDnAttr, start))
    }

    /// 读取匹配规则 OID 或名称
    fn read_matching_rule(&mut self, start: usize) -> Option<Token> {
        self.eat_while(is_descriptor_char);
        if self.position == start {
            return None;
        }
        Some(self.emit(TokenKind::ExtensibleMatchingRuleOid, start))
    }

    /// 兜底：把直到下一个括号的原始文本作为 `Unknown`
    fn read_unknown(&mut self, start: usize) -> Token {
        self.eat_while(|c| c != '(' && c != ')');
        if self.position == start && self.peek() == Some(')') {
            // 保证每次调用都有进展
            self.bump();
            return self.emit(TokenKind::RParen, start);
        }
        self.token(TokenKind::Unknown, start)
    }
}

fn is_descriptor_char(c: char) -> bool {
    !matches!(c, ':' | '=' | '<' | '>' | '~' | '(' | ')') && !c.is_whitespace()
}

impl Iterator for Scanner {
    type Item = Token;

    /// 依次返回所有 token，最后一个是 `Eof`
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.finished = true;
        }
        Some(token)
    }
}
