//! Custom MiniJinja filters for test generation
//!
//! - Case conversion (PascalCase, camelCase, snake_case)
//! - String escaping for double-quoted literals
//! - Indentation and line comments

use crate::util;
use minijinja::Environment;

/// Register all custom filters with the environment
pub fn register_filters(env: &mut Environment<'_>) {
    env.add_filter("pascal_case", filter_pascal_case);
    env.add_filter("camel_case", filter_camel_case);
    env.add_filter("snake_case", filter_snake_case);
    env.add_filter("upper_snake_case", filter_upper_snake_case);
    env.add_filter("indent", indent);
    env.add_filter("escape_string", escape_string);
    env.add_filter("one_line", one_line);
}

fn filter_pascal_case(value: &str) -> String {
    util::to_pascal_case(value)
}

fn filter_camel_case(value: &str) -> String {
    util::to_camel_case(value)
}

fn filter_snake_case(value: &str) -> String {
    util::to_snake_case(value)
}

fn filter_upper_snake_case(value: &str) -> String {
    util::to_upper_snake_case(value)
}

/// Add indentation to each line
fn indent(value: &str, spaces: usize) -> String {
    let indent_str = " ".repeat(spaces);
    value
        .lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", indent_str, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape for a double-quoted literal
///
/// Only escapes every target shares are used; other control characters are
/// dropped.
fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Collapse whitespace so text fits in a line comment
fn one_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
