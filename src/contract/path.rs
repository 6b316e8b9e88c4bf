//! Path template normalization and matching
//!
//! Contracts and test code spell path parameters many ways (`{id}`, `:id`,
//! `<int:id>`, `{id:[0-9]+}`). Everything is reduced to the canonical `{id}`
//! form so endpoint identities compare stably.

use regex::Regex;
use std::sync::OnceLock;

/// One segment of a canonical path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Param(&'a str),
}

fn colon_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^:([A-Za-z_][A-Za-z0-9_]*)$").expect("valid regex"))
}

fn angle_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^<\s*(?:[A-Za-z_]+\s*:\s*)?([A-Za-z_][A-Za-z0-9_]*)\s*>$").expect("valid regex")
    })
}

fn brace_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\{\s*([A-Za-z_][A-Za-z0-9_\-]*)\s*(?::[^}]*)?\}$").expect("valid regex")
    })
}

/// Normalize a path template to canonical form
///
/// # Examples
/// ```
/// use gapgen::contract::normalize_path;
/// assert_eq!(normalize_path("orders/:orderId/"), "/orders/{orderId}");
/// assert_eq!(normalize_path("/users/<int:user_id>"), "/users/{user_id}");
/// assert_eq!(normalize_path("//items/{ id:[0-9]+ }"), "/items/{id}");
/// ```
pub fn normalize_path(raw: &str) -> String {
    let segments: Vec<String> = raw
        .trim()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(normalize_segment)
        .collect();

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn normalize_segment(segment: &str) -> String {
    let segment = segment.trim();
    for re in [brace_param(), colon_param(), angle_param()] {
        if let Some(caps) = re.captures(segment) {
            return format!("{{{}}}", &caps[1]);
        }
    }
    segment.to_string()
}

/// Split a canonical template into segments
pub fn segments(template: &str) -> Vec<Segment<'_>> {
    template
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.starts_with('{') && s.ends_with('}') && s.len() > 2 {
                Segment::Param(&s[1..s.len() - 1])
            } else {
                Segment::Literal(s)
            }
        })
        .collect()
}

/// Names of the path parameters in a canonical template, in order
pub fn path_params(template: &str) -> Vec<&str> {
    segments(template)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Param(name) => Some(name),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Whether a concrete (or partially templated) request path matches a
/// canonical template
///
/// Literal segments must be equal; template segments accept any non-empty
/// segment, including placeholders the test code left unresolved.
pub fn matches_template(template: &str, request_path: &str) -> bool {
    let normalized = normalize_path(request_path);
    let tpl = segments(template);
    let req: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

    if tpl.len() != req.len() {
        return false;
    }

    tpl.iter().zip(req.iter()).all(|(t, r)| match t {
        Segment::Param(_) => !r.is_empty(),
        Segment::Literal(lit) => lit == r,
    })
}

/// Substitute path parameter values into a template
///
/// Parameters missing from `values` leave an empty segment behind, which is
/// how a missing path parameter is exercised.
pub fn fill_template<F>(template: &str, mut value_of: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let parts: Vec<String> = segments(template)
        .into_iter()
        .map(|s| match s {
            Segment::Literal(lit) => lit.to_string(),
            Segment::Param(name) => value_of(name).unwrap_or_default(),
        })
        .collect();

    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_brace_styles() {
        assert_eq!(normalize_path("/orders/{orderId}"), "/orders/{orderId}");
        assert_eq!(normalize_path("/orders/{ orderId }"), "/orders/{orderId}");
        assert_eq!(normalize_path("/orders/:orderId"), "/orders/{orderId}");
        assert_eq!(normalize_path("/orders/<orderId>"), "/orders/{orderId}");
        assert_eq!(normalize_path("/orders/{orderId:int}"), "/orders/{orderId}");
    }

    #[test]
    fn test_normalize_slashes() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("cart/items/"), "/cart/items");
        assert_eq!(normalize_path("/cart//items"), "/cart/items");
    }

    #[test]
    fn test_path_params() {
        assert_eq!(
            path_params("/users/{userId}/orders/{orderId}"),
            vec!["userId", "orderId"]
        );
        assert!(path_params("/products").is_empty());
    }

    #[test]
    fn test_matches_template() {
        assert!(matches_template("/orders/{orderId}", "/orders/42"));
        assert!(matches_template("/orders/{orderId}", "/orders/{id}"));
        assert!(matches_template("/orders/{orderId}", "orders/:id/"));
        assert!(!matches_template("/orders/{orderId}", "/orders"));
        assert!(!matches_template("/orders", "/orders/42"));
        assert!(!matches_template("/cart/items/{itemId}", "/cart/other/1"));
    }

    #[test]
    fn test_fill_template() {
        let filled = fill_template("/orders/{orderId}/items/{itemId}", |name| {
            (name == "orderId").then(|| "7".to_string())
        });
        assert_eq!(filled, "/orders/7/items/");
    }
}
