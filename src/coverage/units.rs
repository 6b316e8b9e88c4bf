//! Test-function splitting with tree-sitter
//!
//! Each language has its own notion of "a test": annotated methods (Java,
//! C#), attributed functions (Rust), naming conventions (Python, Go) or
//! registration calls (TypeScript/JavaScript `it`/`test`).

use crate::lang::Language;
use regex::Regex;
use std::sync::OnceLock;
use tree_sitter::{Node, Parser};

/// One test function found in a source unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFunction {
    pub name: String,
    /// Full source text of the function (or registration call)
    pub text: String,
    /// 1-based line of the declaration
    pub line: usize,
}

/// Why a unit could not be split
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    Grammar(String),
    Unparseable,
    SyntaxErrors,
    NoTests,
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitError::Grammar(e) => write!(f, "grammar unavailable: {}", e),
            SplitError::Unparseable => f.write_str("parser produced no tree"),
            SplitError::SyntaxErrors => f.write_str("source has syntax errors"),
            SplitError::NoTests => f.write_str("no test functions found"),
        }
    }
}

/// Split a source unit into its test functions
pub fn split_tests(language: Language, source: &str) -> Result<Vec<TestFunction>, SplitError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .map_err(|e| SplitError::Grammar(e.to_string()))?;

    let tree = parser.parse(source, None).ok_or(SplitError::Unparseable)?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(SplitError::SyntaxErrors);
    }

    let mut tests = Vec::new();
    find_tests(language, root, source, &mut tests);

    if tests.is_empty() {
        Err(SplitError::NoTests)
    } else {
        Ok(tests)
    }
}

fn find_tests(language: Language, node: Node, source: &str, tests: &mut Vec<TestFunction>) {
    if let Some(name) = test_name(language, node, source) {
        tests.push(TestFunction {
            name,
            text: text(node, source).to_string(),
            line: node.start_position().row + 1,
        });
        // Nested `it` blocks and local helpers belong to the enclosing test
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        find_tests(language, child, source, tests);
    }
}

fn text<'s>(node: Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn field_text(node: Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| text(n, source).to_string())
}

fn test_name(language: Language, node: Node, source: &str) -> Option<String> {
    match language {
        Language::Java => java_test(node, source),
        Language::CSharp => csharp_test(node, source),
        Language::Python => python_test(node, source),
        Language::Rust => rust_test(node, source),
        Language::Go => go_test(node, source),
        Language::TypeScript => ts_test(node, source),
    }
}

fn java_test(node: Node, source: &str) -> Option<String> {
    if node.kind() != "method_declaration" {
        return None;
    }
    let mut cursor = node.walk();
    let annotated = node
        .children(&mut cursor)
        .filter(|c| c.kind() == "modifiers")
        .any(|m| java_test_annotation().is_match(text(m, source)));
    if annotated {
        field_text(node, "name", source)
    } else {
        None
    }
}

fn java_test_annotation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@(?:org\.testng\.annotations\.|org\.junit\.(?:jupiter\.api\.)?)?(?:Test|ParameterizedTest)\b")
            .expect("valid regex")
    })
}

fn csharp_test(node: Node, source: &str) -> Option<String> {
    if node.kind() != "method_declaration" {
        return None;
    }
    let mut cursor = node.walk();
    let attributed = node
        .children(&mut cursor)
        .filter(|c| c.kind() == "attribute_list")
        .any(|a| csharp_test_attribute().is_match(text(a, source)));
    if attributed {
        field_text(node, "name", source)
    } else {
        None
    }
}

fn csharp_test_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:Fact|Test|TestMethod|Theory|TestCase)\b").expect("valid regex"))
}

fn python_test(node: Node, source: &str) -> Option<String> {
    if node.kind() != "function_definition" {
        return None;
    }
    field_text(node, "name", source).filter(|name| name.starts_with("test"))
}

fn rust_test(node: Node, source: &str) -> Option<String> {
    if node.kind() != "function_item" {
        return None;
    }
    // Attributes are preceding siblings, possibly interleaved with comments
    let mut sibling = node.prev_sibling();
    while let Some(s) = sibling {
        match s.kind() {
            "attribute_item" => {
                if rust_test_attribute().is_match(text(s, source)) {
                    return field_text(node, "name", source);
                }
            }
            "line_comment" | "block_comment" => {}
            _ => break,
        }
        sibling = s.prev_sibling();
    }
    None
}

fn rust_test_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#\[\s*(?:[\w:]+::)?(?:test|rstest)\b").expect("valid regex"))
}

fn go_test(node: Node, source: &str) -> Option<String> {
    if node.kind() != "function_declaration" {
        return None;
    }
    field_text(node, "name", source).filter(|name| name.starts_with("Test"))
}

fn ts_test(node: Node, source: &str) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    let callee = field_text(node, "function", source)?;
    let registrar = callee.split('.').next().unwrap_or("");
    if registrar != "it" && registrar != "test" {
        return None;
    }
    let args = node.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let title = args
        .named_children(&mut cursor)
        .next()
        .filter(|a| matches!(a.kind(), "string" | "template_string"))?;
    Some(
        text(title, source)
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .to_string(),
    )
}
