//! LDAP 过滤器的语法分析器
//!
//! ## 解析流程
//!
//! ```text
//! parse()
//!   ├─ 前导部分：第一个 `(` 之前的 token 全部作为错误挂到根节点
//!   ├─ 主循环：按 token 类型操作栈顶（最内层未闭合）的节点
//!   │   ├─ `(`         → 栈顶组件接受子过滤器则入栈，否则作为普通 token 挂上
//!   │   ├─ `)`         → 出栈并闭合，挂到新的栈顶组件下
//!   │   ├─ `&` `|` `!` → 设置逻辑组件
//!   │   ├─ 属性        → 设置简单项组件
//!   │   ├─ 运算符/值   → 填充简单项或可扩展匹配的下一部分
//!   │   └─ 其他        → 错误
//!   └─ 尾随部分：根节点闭合之后的 token 全部作为错误挂到根节点
//! ```
//!
//! ## 错误处理
//!
//! 分析器从不中止。任何不符合语法的 token 都会变成一个 `Error` token，
//! 挂在出错时栈顶节点的 `trailing_tokens` 上，然后继续分析。
//! 调用者通过检查 `Error` token 和未闭合的节点判断过滤器是否有效。
//!
//! ## 语法 (RFC 4515)
//!
//! ```text
//! filter     = "(" filtercomp ")"
//! filtercomp = and / or / not / item
//! and        = "&" filterlist
//! or         = "|" filterlist
//! not        = "!" filter
//! filterlist = 1*filter
//! item       = simple / present / substring / extensible
//! simple     = attr filtertype value
//! present    = attr "=*"
//! substring  = attr "=" [initial] "*" *(value "*") [final]
//! extensible = attr [":dn"] [":" matchingrule] ":=" value
//!            / [":dn"] ":" matchingrule ":=" value
//! ```

use tracing::{debug, trace, warn};

use crate::filter::{
    ExtensibleComponent, Filter, FilterComponent, ItemComponent, LogicalComponent,
};
use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};

pub struct Parser {
    scanner: Scanner,
    /// 未闭合的节点，栈顶是最内层。节点闭合时才挂到父节点下。
    stack: Vec<Filter>,
    model: Filter,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            scanner: Scanner::new(""),
            stack: Vec::new(),
            model: Filter::new(),
        }
    }

    /// 最近一次分析的结果
    pub fn model(&self) -> &Filter {
        &self.model
    }

    /// 分析整个过滤器字符串，替换之前的结果
    pub fn parse(&mut self, input: &str) -> &Filter {
        self.stack.clear();
        self.scanner.reset(input);
        self.model = Filter::new();

        // 第一个 `(` 之前的内容都是错误
        let mut token = self.scanner.next_token();
        while !matches!(token.kind, TokenKind::LParen | TokenKind::Eof) {
            self.model.add_error(&token);
            token = self.scanner.next_token();
        }

        if token.kind == TokenKind::LParen {
            let mut root = std::mem::take(&mut self.model);
            root.set_start_token(token);
            self.stack.push(root);

            while !self.stack.is_empty() {
                let token = self.scanner.next_token();
                let at_eof = token.kind == TokenKind::Eof;
                self.handle(token);
                if at_eof {
                    break;
                }
            }

            // 输入结束时仍未闭合的节点依次挂回父节点
            while let Some(node) = self.stack.pop() {
                self.close(node);
            }
        }

        // 根节点闭合之后的内容也都是错误
        loop {
            let token = self.scanner.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            self.model.add_error(&token);
        }

        debug!(
            input_len = input.len(),
            errors = self.model.error_tokens().len(),
            closed = self.model.is_closed(),
            "parsed ldap filter"
        );
        &self.model
    }

    /// 栈顶节点；栈为空时退回根节点
    fn current(&mut self) -> &mut Filter {
        match self.stack.last_mut() {
            Some(filter) => filter,
            None => &mut self.model,
        }
    }

    fn root(&mut self) -> &mut Filter {
        match self.stack.first_mut() {
            Some(filter) => filter,
            None => &mut self.model,
        }
    }

    /// 闭合的节点挂到父组件下，栈底的节点就是新的根
    fn close(&mut self, node: Filter) {
        match self.stack.last_mut() {
            Some(parent) => {
                if let Err(orphan) = parent.add_child(node) {
                    warn!(
                        offset = ?orphan.start_token.as_ref().map(Token::offset),
                        "closed filter has no container to attach to"
                    );
                }
            }
            None => self.model = node,
        }
    }

    fn handle(&mut self, token: Token) {
        trace!(kind = ?token.kind, offset = token.offset(), text = %token.text, "token");

        let accepted = match token.kind {
            TokenKind::LParen => {
                let current = self.current();
                if current
                    .component
                    .as_ref()
                    .is_some_and(FilterComponent::accepts_filters)
                {
                    self.stack.push(Filter::with_start_token(token));
                } else {
                    current.add_trailing_token(token);
                }
                return;
            }
            TokenKind::RParen => {
                let Some(mut node) = self.stack.pop() else {
                    // 主循环只在栈非空时运行，多余的 `)` 会在尾随部分报告
                    self.model.add_error(&token);
                    return;
                };
                if !node.set_stop_token(token.clone()) {
                    node.add_error(&token);
                }
                self.close(node);
                return;
            }
            TokenKind::And | TokenKind::Or | TokenKind::Not => {
                let logical = LogicalComponent::new(token.clone());
                let component = match token.kind {
                    TokenKind::And => FilterComponent::And(logical),
                    TokenKind::Or => FilterComponent::Or(logical),
                    _ => FilterComponent::Not(logical),
                };
                self.current().set_component(component).is_ok()
            }
            TokenKind::Attribute => {
                let item = ItemComponent::new(token.clone());
                self.current()
                    .set_component(FilterComponent::Item(item))
                    .is_ok()
            }
            TokenKind::Value => match self.current().component.as_mut() {
                Some(FilterComponent::Item(item)) => item.set_value_token(&token),
                Some(FilterComponent::Extensible(ext)) => ext.set_value_token(&token),
                _ => false,
            },
            TokenKind::Equal
            | TokenKind::Greater
            | TokenKind::Less
            | TokenKind::Approx
            | TokenKind::Present
            | TokenKind::Substring => match self.current().component.as_mut() {
                Some(FilterComponent::Item(item)) => item.set_filter_type_token(&token),
                Some(FilterComponent::Extensible(ext)) => ext.set_equals_token(&token),
                _ => false,
            },
            TokenKind::Whitespace => {
                self.current().add_trailing_token(token);
                return;
            }
            TokenKind::ExtensibleAttribute => {
                let ext = ExtensibleComponent::with_attribute(token.clone());
                self.current()
                    .set_component(FilterComponent::Extensible(ext))
                    .is_ok()
            }
            TokenKind::ExtensibleDnAttrColon | TokenKind::ExtensibleMatchingRuleOidColon => {
                self.handle_extensible_colon(&token)
            }
            TokenKind::ExtensibleDnAttr => {
                self.with_extensible(|ext| ext.set_dn_attr_token(&token))
            }
            TokenKind::ExtensibleMatchingRuleOid => {
                self.with_extensible(|ext| ext.set_matching_rule_token(&token))
            }
            TokenKind::ExtensibleEqualsColon => {
                self.with_extensible(|ext| ext.set_equals_colon_token(&token))
            }
            TokenKind::Eof => {
                self.root().add_trailing_token(token);
                return;
            }
            TokenKind::Unknown | TokenKind::Error | TokenKind::New => false,
        };

        if !accepted {
            self.current().add_error(&token);
        }
    }

    /// 没有属性的可扩展匹配以 `:` 开头，这时才创建组件
    fn handle_extensible_colon(&mut self, token: &Token) -> bool {
        let set_colon = |ext: &mut ExtensibleComponent| match token.kind {
            TokenKind::ExtensibleDnAttrColon => ext.set_dn_attr_colon_token(token),
            _ => ext.set_matching_rule_colon_token(token),
        };

        let current = self.current();
        if current.component.is_none() {
            let mut ext = ExtensibleComponent::default();
            let accepted = set_colon(&mut ext);
            return accepted && current.set_component(FilterComponent::Extensible(ext)).is_ok();
        }
        self.with_extensible(set_colon)
    }

    fn with_extensible(&mut self, set: impl FnOnce(&mut ExtensibleComponent) -> bool) -> bool {
        match self.current().component.as_mut() {
            Some(FilterComponent::Extensible(ext)) => set(ext),
            _ => false,
        }
    }
}
