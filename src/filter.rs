//! 过滤器语法树
//!
//! 每个 `Filter` 节点对应一对括号，里面最多有一个 `FilterComponent`。
//! 树保留了所有 token 的位置，包括不属于任何组件的空白、垃圾文本和错误标记，
//! 编辑器可以据此高亮错误或把光标位置映射回节点。

use serde::Serialize;

use crate::token::{Span, Token, TokenKind};

/// 一个括号包围的过滤器（或者最外层的隐式根节点）
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Filter {
    /// 开始的 `(`
    pub start_token: Option<Token>,
    /// 结束的 `)`，节点未闭合时为空
    pub stop_token: Option<Token>,
    pub component: Option<FilterComponent>,
    /// 不属于组件的 token：空白、多余的括号以及 `Error` token
    pub trailing_tokens: Vec<Token>,
}

/// 过滤器的逻辑内容
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterComponent {
    /// `&` filterlist
    And(LogicalComponent),
    /// `|` filterlist
    Or(LogicalComponent),
    /// `!` filter
    Not(LogicalComponent),
    /// 简单比较、present 和 substring
    Item(ItemComponent),
    /// 可扩展匹配 `attr:dn:oid:=value`
    Extensible(ExtensibleComponent),
}

/// `&`、`|`、`!` 共用的容器
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicalComponent {
    pub start_token: Token,
    pub filters: Vec<Filter>,
}

/// `attr filtertype value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemComponent {
    pub attribute_token: Token,
    pub filter_type_token: Option<Token>,
    pub value_token: Option<Token>,
}

/// `[attr] [":dn"] [":" matchingrule] ":=" value`，所有部分按语法顺序填充
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ExtensibleComponent {
    pub attribute_token: Option<Token>,
    pub dn_attr_colon_token: Option<Token>,
    pub dn_attr_token: Option<Token>,
    pub matching_rule_colon_token: Option<Token>,
    pub matching_rule_token: Option<Token>,
    pub equals_colon_token: Option<Token>,
    pub equals_token: Option<Token>,
    pub value_token: Option<Token>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_token(token: Token) -> Self {
        Self {
            start_token: Some(token),
            ..Self::default()
        }
    }

    pub fn set_start_token(&mut self, token: Token) {
        self.start_token = Some(token);
    }

    /// 记录结束的 `)`。空括号 `()` 也会记录，但返回 `false`。
    pub fn set_stop_token(&mut self, token: Token) -> bool {
        self.stop_token = Some(token);
        self.component.is_some()
    }

    /// 设置组件。组件一旦设置就不能替换，失败时把传入的组件原样返回。
    pub fn set_component(&mut self, component: FilterComponent) -> Result<(), FilterComponent> {
        if self.component.is_some() {
            return Err(component);
        }
        self.component = Some(component);
        Ok(())
    }

    /// 把子过滤器交给组件，只有 `&`、`|`、`!` 接受
    pub fn add_child(&mut self, child: Filter) -> Result<(), Filter> {
        match self.component.as_mut() {
            Some(component) => component.add_filter(child),
            None => Err(child),
        }
    }

    pub fn add_trailing_token(&mut self, token: Token) {
        self.trailing_tokens.push(token);
    }

    /// 在当前节点上记录一个语法错误
    pub fn add_error(&mut self, token: &Token) {
        self.trailing_tokens.push(Token::error_from(token));
    }

    pub fn component(&self) -> Option<&FilterComponent> {
        self.component.as_ref()
    }

    /// 逻辑组件的子过滤器，其他情况为空
    pub fn children(&self) -> &[Filter] {
        match &self.component {
            Some(component) => component.filters(),
            None => &[],
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stop_token.is_some()
    }

    /// 子树中是否有 `Error` token
    pub fn has_errors(&self) -> bool {
        self.trailing_tokens.iter().any(|t| t.kind == TokenKind::Error)
            || self.children().iter().any(Filter::has_errors)
    }

    /// 结构完整：有组件、已闭合，并且整棵树没有错误标记
    pub fn is_well_formed(&self) -> bool {
        self.component.is_some() && self.is_closed() && !self.has_errors()
    }

    /// 在结构完整的基础上，要求每个组件的各部分都已填齐
    pub fn is_valid(&self) -> bool {
        self.start_token.is_some()
            && self.is_closed()
            && !self.trailing_tokens.iter().any(|t| t.kind == TokenKind::Error)
            && self.component.as_ref().is_some_and(FilterComponent::is_valid)
    }

    /// 最内层的无效节点。整个过滤器有效时为空。
    pub fn invalid_filters(&self) -> Vec<&Filter> {
        if self.is_valid() {
            return Vec::new();
        }
        let nested: Vec<_> = self
            .children()
            .iter()
            .flat_map(Filter::invalid_filters)
            .collect();
        if nested.is_empty() {
            vec![self]
        } else {
            nested
        }
    }

    /// 已打开但没有闭合的节点，从外到内
    pub fn open_filters(&self) -> Vec<&Filter> {
        let mut open = Vec::new();
        if self.start_token.is_some() && !self.is_closed() {
            open.push(self);
        }
        open.extend(self.children().iter().flat_map(Filter::open_filters));
        open
    }

    /// 子树中的全部 token（包括空白和错误标记），按位置排序
    pub fn tokens(&self) -> Vec<&Token> {
        let mut tokens = Vec::new();
        self.collect_tokens(&mut tokens);
        tokens.sort_by_key(|t| t.offset());
        tokens
    }

    /// 子树中的 `Error` token，按位置排序
    pub fn error_tokens(&self) -> Vec<&Token> {
        self.tokens()
            .into_iter()
            .filter(|t| t.kind == TokenKind::Error)
            .collect()
    }

    fn collect_tokens<'a>(&'a self, tokens: &mut Vec<&'a Token>) {
        tokens.extend(self.start_token.iter());
        if let Some(component) = &self.component {
            component.collect_tokens(tokens);
        }
        tokens.extend(self.trailing_tokens.iter());
        tokens.extend(self.stop_token.iter());
    }

    /// 包含光标位置的最内层节点
    pub fn filter_at(&self, offset: usize) -> Option<&Filter> {
        let start = self.start_token.as_ref()?;
        // 未闭合的节点一直延伸到输入末尾之后
        let end = self.stop_token.as_ref().map_or(usize::MAX, |t| t.span.end);
        if !Span::new(start.offset(), end).contains(offset) {
            return None;
        }
        self.children()
            .iter()
            .find_map(|child| child.filter_at(offset))
            .or(Some(self))
    }
}

impl FilterComponent {
    pub fn start_token(&self) -> Option<&Token> {
        match self {
            FilterComponent::And(c) | FilterComponent::Or(c) | FilterComponent::Not(c) => {
                Some(&c.start_token)
            }
            FilterComponent::Item(c) => Some(&c.attribute_token),
            FilterComponent::Extensible(c) => c.tokens().next(),
        }
    }

    pub fn accepts_filters(&self) -> bool {
        matches!(
            self,
            FilterComponent::And(_) | FilterComponent::Or(_) | FilterComponent::Not(_)
        )
    }

    /// 添加子过滤器。`!` 在语法上只有一个子过滤器，这里同样接受多余的子过滤器。
    pub fn add_filter(&mut self, filter: Filter) -> Result<(), Filter> {
        match self {
            FilterComponent::And(c) | FilterComponent::Or(c) | FilterComponent::Not(c) => {
                c.filters.push(filter);
                Ok(())
            }
            FilterComponent::Item(_) | FilterComponent::Extensible(_) => Err(filter),
        }
    }

    pub fn filters(&self) -> &[Filter] {
        match self {
            FilterComponent::And(c) | FilterComponent::Or(c) | FilterComponent::Not(c) => {
                &c.filters
            }
            FilterComponent::Item(_) | FilterComponent::Extensible(_) => &[],
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            FilterComponent::And(c) | FilterComponent::Or(c) | FilterComponent::Not(c) => {
                !c.filters.is_empty() && c.filters.iter().all(Filter::is_valid)
            }
            FilterComponent::Item(c) => c.is_complete(),
            FilterComponent::Extensible(c) => c.is_complete(),
        }
    }

    fn collect_tokens<'a>(&'a self, tokens: &mut Vec<&'a Token>) {
        match self {
            FilterComponent::And(c) | FilterComponent::Or(c) | FilterComponent::Not(c) => {
                tokens.push(&c.start_token);
                for filter in &c.filters {
                    filter.collect_tokens(tokens);
                }
            }
            FilterComponent::Item(c) => {
                tokens.push(&c.attribute_token);
                tokens.extend(c.filter_type_token.iter());
                tokens.extend(c.value_token.iter());
            }
            FilterComponent::Extensible(c) => tokens.extend(c.tokens()),
        }
    }
}

impl LogicalComponent {
    pub fn new(start_token: Token) -> Self {
        Self {
            start_token,
            filters: Vec::new(),
        }
    }
}

impl ItemComponent {
    pub fn new(attribute_token: Token) -> Self {
        Self {
            attribute_token,
            filter_type_token: None,
            value_token: None,
        }
    }

    pub fn set_filter_type_token(&mut self, token: &Token) -> bool {
        if self.filter_type_token.is_some() || !token.kind.is_filter_type() {
            return false;
        }
        self.filter_type_token = Some(token.clone());
        true
    }

    /// present (`=*`) 没有值
    pub fn set_value_token(&mut self, token: &Token) -> bool {
        let expects_value = self
            .filter_type_token
            .as_ref()
            .is_some_and(|t| t.kind != TokenKind::Present);
        if !expects_value || self.value_token.is_some() {
            return false;
        }
        self.value_token = Some(token.clone());
        true
    }

    pub fn filter_type(&self) -> Option<TokenKind> {
        self.filter_type_token.as_ref().map(|t| t.kind)
    }

    pub fn is_present(&self) -> bool {
        self.filter_type() == Some(TokenKind::Present)
    }

    pub fn is_substring(&self) -> bool {
        self.filter_type() == Some(TokenKind::Substring)
    }

    pub fn is_complete(&self) -> bool {
        self.is_present() || (self.filter_type_token.is_some() && self.value_token.is_some())
    }
}

impl ExtensibleComponent {
    pub fn with_attribute(token: Token) -> Self {
        Self {
            attribute_token: Some(token),
            ..Self::default()
        }
    }

    fn set(slot: &mut Option<Token>, token: &Token, allowed: bool) -> bool {
        if !allowed || slot.is_some() {
            return false;
        }
        *slot = Some(token.clone());
        true
    }

    /// `:dn` 的 dn 已经读到，或者根本没有 `:dn`
    fn dn_attr_settled(&self) -> bool {
        self.dn_attr_colon_token.is_none() || self.dn_attr_token.is_some()
    }

    fn matching_rule_settled(&self) -> bool {
        self.matching_rule_colon_token.is_none() || self.matching_rule_token.is_some()
    }

    pub fn set_dn_attr_colon_token(&mut self, token: &Token) -> bool {
        let allowed =
            self.matching_rule_colon_token.is_none() && self.equals_colon_token.is_none();
        Self::set(&mut self.dn_attr_colon_token, token, allowed)
    }

    pub fn set_dn_attr_token(&mut self, token: &Token) -> bool {
        let allowed = self.dn_attr_colon_token.is_some();
        Self::set(&mut self.dn_attr_token, token, allowed)
    }

    pub fn set_matching_rule_colon_token(&mut self, token: &Token) -> bool {
        let allowed = self.dn_attr_settled() && self.equals_colon_token.is_none();
        Self::set(&mut self.matching_rule_colon_token, token, allowed)
    }

    pub fn set_matching_rule_token(&mut self, token: &Token) -> bool {
        let allowed = self.matching_rule_colon_token.is_some();
        Self::set(&mut self.matching_rule_token, token, allowed)
    }

    /// `:=` 之前必须有属性或匹配规则
    pub fn set_equals_colon_token(&mut self, token: &Token) -> bool {
        let allowed = self.dn_attr_settled()
            && self.matching_rule_settled()
            && (self.attribute_token.is_some() || self.matching_rule_token.is_some());
        Self::set(&mut self.equals_colon_token, token, allowed)
    }

    pub fn set_equals_token(&mut self, token: &Token) -> bool {
        let allowed = self.equals_colon_token.is_some() && token.kind == TokenKind::Equal;
        Self::set(&mut self.equals_token, token, allowed)
    }

    pub fn set_value_token(&mut self, token: &Token) -> bool {
        let allowed = self.equals_token.is_some();
        Self::set(&mut self.value_token, token, allowed)
    }

    pub fn is_complete(&self) -> bool {
        self.value_token.is_some()
    }

    /// 已填充的各部分，按语法顺序
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        [
            &self.attribute_token,
            &self.dn_attr_colon_token,
            &self.dn_attr_token,
            &self.matching_rule_colon_token,
            &self.matching_rule_token,
            &self.equals_colon_token,
            &self.equals_token,
            &self.value_token,
        ]
        .into_iter()
        .flatten()
    }
}
