//! 把语法树中的错误转换成人可读的形式，供命令行和 REPL 输出使用。

use crate::filter::{Filter, FilterComponent};
use crate::token::{Token, TokenKind};

/// 在输入下方画一行 `^`，标出每个错误 token 和未闭合过滤器的位置。
///
/// 没有任何问题时返回空字符串。
pub fn render_markers(input: &str, filter: &Filter) -> String {
    let width = input.chars().count() + 1;
    let mut line = vec![' '; width];

    let mut mark = |start: usize, end: usize| {
        let from = column(input, start);
        let to = column(input, end).max(from + 1);
        for slot in line.iter_mut().take(to.min(width)).skip(from) {
            *slot = '^';
        }
    };

    for token in filter.error_tokens() {
        mark(token.span.start, token.span.end);
    }
    if !filter.open_filters().is_empty() {
        mark(input.len(), input.len());
    }

    line.into_iter().collect::<String>().trim_end().to_string()
}

/// 每个问题一条描述，按位置排序
pub fn describe(filter: &Filter) -> Vec<String> {
    let mut messages: Vec<(usize, String)> = filter
        .error_tokens()
        .into_iter()
        .map(|token| (token.offset(), describe_error(token)))
        .collect();

    for open in filter.open_filters() {
        if let Some(start) = &open.start_token {
            messages.push((
                start.offset(),
                format!("位置 {} 打开的过滤器没有闭合", start.offset()),
            ));
        }
    }

    messages.sort_by_key(|(offset, _)| *offset);
    messages.into_iter().map(|(_, message)| message).collect()
}

fn describe_error(token: &Token) -> String {
    if token.text.is_empty() {
        format!("位置 {}：意外的输入", token.offset())
    } else {
        format!("位置 {}：意外的 `{}`", token.offset(), token.text.escape_debug())
    }
}

/// 缩进的树形概览，每个节点一行
pub fn outline(filter: &Filter) -> String {
    let mut lines = Vec::new();
    outline_into(filter, 0, &mut lines);
    lines.join("\n")
}

fn outline_into(filter: &Filter, depth: usize, lines: &mut Vec<String>) {
    let mut line = format!("{}{}", "  ".repeat(depth), summary(filter.component()));
    if filter.start_token.is_some() && !filter.is_closed() {
        line.push_str(" [未闭合]");
    }
    let errors = filter
        .trailing_tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Error)
        .count();
    if errors > 0 {
        line.push_str(&format!(" [{errors} 个错误]"));
    }
    lines.push(line);

    for child in filter.children() {
        outline_into(child, depth + 1, lines);
    }
}

fn summary(component: Option<&FilterComponent>) -> String {
    let text = |token: &Option<Token>| token.as_ref().map_or("", |t| t.text.as_str()).to_string();
    match component {
        None => "<空>".to_string(),
        Some(FilterComponent::Item(item)) => format!(
            "{} {} {}",
            item.attribute_token.text,
            text(&item.filter_type_token),
            text(&item.value_token)
        )
        .trim_end()
        .to_string(),
        Some(FilterComponent::Extensible(ext)) => {
            ext.tokens().map(|t| t.text.as_str()).collect::<String>()
        }
        // `&` `|` `!`
        Some(logical) => logical
            .start_token()
            .map_or_else(String::new, |t| t.text.clone()),
    }
}

/// 字节偏移转换为字符列
fn column(input: &str, offset: usize) -> usize {
    input
        .get(..offset)
        .map_or_else(|| input.chars().count(), |prefix| prefix.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn parse_string(input: &str) -> Filter {
        Parser::new().parse(input).clone()
    }

    #[test]
    fn test_markers_for_valid_filter_are_empty() {
        let input = "(&(cn=John)(sn=Doe))";
        let filter = parse_string(input);
        assert_eq!(render_markers(input, &filter), "");
        assert!(describe(&filter).is_empty());
    }

    #[test]
    fn test_marker_under_doubled_operator() {
        let input = "(cn==)";
        let filter = parse_string(input);
        assert_eq!(render_markers(input, &filter), "    ^");
        assert_eq!(describe(&filter), vec!["位置 4：意外的 `=`".to_string()]);
    }

    #[test]
    fn test_marker_for_unclosed_filter() {
        let input = "(&(cn=a)";
        let filter = parse_string(input);
        assert_eq!(render_markers(input, &filter), "        ^");
        assert_eq!(
            describe(&filter),
            vec!["位置 0 打开的过滤器没有闭合".to_string()]
        );
    }

    #[test]
    fn test_markers_use_character_columns() {
        let input = "é(cn=x)";
        let filter = parse_string(input);
        assert_eq!(render_markers(input, &filter), "^");
    }

    #[test]
    fn test_outline() {
        let filter = parse_string("(&(cn=John)(!(sn=*))(cn:dn:=x)");
        assert_eq!(
            outline(&filter),
            ["& [未闭合]", "  cn = John", "  !", "    sn =*", "  cn:dn:=x"].join("\n")
        );

        let filter = parse_string("()");
        assert_eq!(outline(&filter), "<空> [1 个错误]");
    }
}
