//! LDAP 过滤器的 token 定义。

use serde::Serialize;

/// token 是过滤器字符串中的一个最小单元，带有类型、原文和位置。
///
/// `text` 是输入中的原样子串，这一层不做任何转义或反转义处理。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

/// token 的类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    /// 扫描器的初始状态，永远不会出现在输出中
    New,

    // 结构
    LParen, // (
    RParen, // )
    And,    // &
    Or,     // |
    Not,    // !

    // 简单项
    Attribute,
    Equal,     // =
    Greater,   // >=
    Less,      // <=
    Approx,    // ~=
    Present,   // =*
    Substring, // = (值中含有 *)
    Value,

    Whitespace,

    // 可扩展匹配 attr:dn:oid:=value
    ExtensibleAttribute,
    ExtensibleDnAttrColon,          // :dn 前面的 :
    ExtensibleDnAttr,               // dn
    ExtensibleMatchingRuleOidColon, // oid 前面的 :
    ExtensibleMatchingRuleOid,
    ExtensibleEqualsColon, // := 中的 :

    // 特殊
    Unknown, // 无法识别的原始文本
    Error,   // 语法分析器生成的错误标记
    Eof,
}

impl TokenKind {
    /// 是否为简单项的比较运算符（其后可以跟值）
    pub fn is_filter_type(self) -> bool {
        matches!(
            self,
            TokenKind::Equal
                | TokenKind::Greater
                | TokenKind::Less
                | TokenKind::Approx
                | TokenKind::Present
                | TokenKind::Substring
        )
    }
}

/// 输入字符串中的一个字节区间 `[start, end)`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// 位置是否落在区间内，不含 `end`
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        let text = text.into();
        let span = Span::new(offset, offset + text.len());
        Self { kind, text, span }
    }

    /// 用出错 token 的原文和位置构造一个 `Error` token
    pub fn error_from(token: &Token) -> Self {
        Self {
            kind: TokenKind::Error,
            text: token.text.clone(),
            span: token.span,
        }
    }

    pub fn offset(&self) -> usize {
        self.span.start
    }

    pub fn len(&self) -> usize {
        self.span.len()
    }

    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_span_follows_text() {
        let token = Token::new(TokenKind::Attribute, "objectClass", 1);
        assert_eq!(token.offset(), 1);
        assert_eq!(token.len(), 11);
        assert_eq!(token.span, Span::new(1, 12));
        assert!(token.span.contains(1));
        assert!(token.span.contains(11));
        assert!(!token.span.contains(12));
        assert!(!Span::new(3, 3).contains(3));
    }

    #[test]
    fn test_error_token_keeps_position() {
        let token = Token::new(TokenKind::Equal, "=", 4);
        let error = Token::error_from(&token);
        assert_eq!(error.kind, TokenKind::Error);
        assert_eq!(error.text, "=");
        assert_eq!(error.offset(), 4);
    }

    #[test]
    fn test_filter_type_kinds() {
        assert!(TokenKind::Present.is_filter_type());
        assert!(TokenKind::Substring.is_filter_type());
        assert!(!TokenKind::Value.is_filter_type());
        assert!(!TokenKind::ExtensibleEqualsColon.is_filter_type());
    }
}
