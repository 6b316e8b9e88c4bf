//! Shared utility functions
//!
//! Case conversion works on words, so inputs may mix conventions
//! (`orderId`, `cart-items`, `test_GET_products`).

/// Split an identifier-ish string into lowercase words
///
/// Splits on any non-alphanumeric character, on lower→upper transitions and
/// at the end of an acronym (`HTTPStatus` → `http`, `status`).
///
/// # Examples
/// ```
/// use gapgen::util::words;
/// assert_eq!(words("testGetOrders_Unauthorized_401"), ["test", "get", "orders", "unauthorized", "401"]);
/// assert_eq!(words("/cart/{itemId}"), ["cart", "item", "id"]);
/// ```
pub fn words(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower);
            if boundary {
                out.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Convert to PascalCase
///
/// # Examples
/// ```
/// use gapgen::util::to_pascal_case;
/// assert_eq!(to_pascal_case("hello_world"), "HelloWorld");
/// assert_eq!(to_pascal_case("orderId"), "OrderId");
/// ```
pub fn to_pascal_case(s: &str) -> String {
    words(s).iter().map(|w| capitalize(w)).collect()
}

/// Convert to camelCase
///
/// # Examples
/// ```
/// use gapgen::util::to_camel_case;
/// assert_eq!(to_camel_case("hello_world"), "helloWorld");
/// assert_eq!(to_camel_case("foo"), "foo");
/// ```
pub fn to_camel_case(s: &str) -> String {
    let words = words(s);
    let mut out = String::new();
    for (i, w) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(w);
        } else {
            out.push_str(&capitalize(w));
        }
    }
    out
}

/// Convert to snake_case
///
/// # Examples
/// ```
/// use gapgen::util::to_snake_case;
/// assert_eq!(to_snake_case("HelloWorld"), "hello_world");
/// assert_eq!(to_snake_case("fooBar"), "foo_bar");
/// ```
pub fn to_snake_case(s: &str) -> String {
    words(s).join("_")
}

/// Convert to UPPER_SNAKE_CASE
pub fn to_upper_snake_case(s: &str) -> String {
    to_snake_case(s).to_uppercase()
}
