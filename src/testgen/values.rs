//! Parameter value synthesis: canonical valid values and deliberate violations

use crate::contract::{ParamLocation, ParamType, Parameter};
use serde_json::{json, Value};

/// Payload used by the creative security template
pub const SQL_INJECTION: &str = "' OR '1'='1' --";

/// Ids that should never exist
pub const MISSING_INT_ID: i64 = 999_999;
pub const MISSING_STR_ID: &str = "does-not-exist";

/// Longest string or array a generated case will carry
pub const MAX_SYNTHESIZED_LEN: u64 = 65_536;

/// Integers beyond this magnitude are not exact in an f64 bound
const EXACT_F64_INT: f64 = 9_007_199_254_740_992.0;

/// JSON integer for `v`, or `None` outside the i64/u64 range
fn int_value(v: i128) -> Option<Value> {
    if let Ok(i) = i64::try_from(v) {
        Some(json!(i))
    } else {
        u64::try_from(v).ok().map(|u| json!(u))
    }
}

/// Step that moves an integer strictly past a bound read as f64
fn int_step(bound: f64) -> i128 {
    if bound.abs() < EXACT_F64_INT {
        1
    } else {
        // The declared bound may sit anywhere within half an ulp of `bound`
        (bound.next_up() - bound) as i128
    }
}

/// Lowest integer an inclusive or exclusive lower bound admits
fn int_floor(min: f64, exclusive: bool) -> i128 {
    if exclusive {
        min.floor() as i128 + 1
    } else {
        min.ceil() as i128
    }
}

/// Highest integer an inclusive or exclusive upper bound admits
fn int_ceil(max: f64, exclusive: bool) -> i128 {
    if exclusive {
        max.ceil() as i128 - 1
    } else {
        max.floor() as i128
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn bounded_len(n: u64) -> Option<u64> {
    (n <= MAX_SYNTHESIZED_LEN).then_some(n)
}

/// A value the contract accepts for this parameter
pub fn canonical(param: &Parameter) -> Value {
    if let Some(first) = param.enum_values.first() {
        return first.clone();
    }
    if let Some(default) = &param.default {
        if param.param_type.accepts(default) {
            return default.clone();
        }
    }

    let b = &param.bounds;
    match param.param_type {
        ParamType::Integer => {
            let mut v: i128 = 1;
            if let Some(min) = b.minimum.and_then(finite) {
                v = v.max(int_floor(min, b.exclusive_minimum));
            }
            if let Some(max) = b.maximum.and_then(finite) {
                v = v.min(int_ceil(max, b.exclusive_maximum));
            }
            int_value(v).unwrap_or_else(|| Value::from(v as f64))
        }
        ParamType::Number => {
            let mut v = 1.0_f64;
            if let Some(min) = b.minimum.and_then(finite) {
                let floor = if b.exclusive_minimum { min + 1.0 } else { min };
                v = v.max(floor);
            }
            if let Some(max) = b.maximum.and_then(finite) {
                let ceil = if b.exclusive_maximum { max - 1.0 } else { max };
                v = v.min(ceil);
            }
            Value::from(v)
        }
        ParamType::String if param.location == ParamLocation::Path && !param.restricts_content() => {
            json!("1")
        }
        ParamType::String => Value::String(canonical_string(param)),
        ParamType::Boolean => json!(true),
        ParamType::Array => {
            let mut count = b.min_items.unwrap_or(1).max(1);
            if let Some(max) = b.max_items {
                count = count.min(max);
            }
            array_of(param, count.min(MAX_SYNTHESIZED_LEN))
        }
        ParamType::Object => json!({}),
    }
}

fn canonical_string(param: &Parameter) -> String {
    let formatted = match param.format.as_deref() {
        Some("email") => Some("user@example.com"),
        Some("uuid") => Some("123e4567-e89b-12d3-a456-426614174000"),
        Some("date") => Some("2024-01-01"),
        Some("date-time") => Some("2024-01-01T00:00:00Z"),
        Some("uri") | Some("url") => Some("https://example.com"),
        _ => None,
    };
    let base = formatted.unwrap_or("sample");
    let len = base.chars().count() as u64;
    let min = param.bounds.min_length.unwrap_or(0).min(MAX_SYNTHESIZED_LEN);
    let max = param.bounds.max_length.unwrap_or(u64::MAX);

    if (min..=max).contains(&len) {
        return base.to_string();
    }
    if len < min {
        let mut s = base.to_string();
        s.push_str(&"x".repeat((min - len) as usize));
        return s;
    }
    base.chars().take(usize::try_from(max).unwrap_or(usize::MAX)).collect()
}

fn item_value(item_type: Option<ParamType>) -> Value {
    match item_type.unwrap_or(ParamType::String) {
        ParamType::Integer => json!(1),
        ParamType::Number => json!(1.0),
        ParamType::String => json!("sample"),
        ParamType::Boolean => json!(true),
        ParamType::Array => json!([]),
        ParamType::Object => json!({}),
    }
}

fn array_of(param: &Parameter, count: u64) -> Value {
    Value::Array(
        (0..count)
            .map(|_| item_value(param.item_type))
            .collect(),
    )
}

/// Numeric value just under the lower bound
fn number_below(param: &Parameter) -> Option<Value> {
    let b = &param.bounds;
    let min = b.minimum.and_then(finite)?;
    if param.param_type == ParamType::Integer {
        let floor = int_floor(min, b.exclusive_minimum);
        return floor.checked_sub(int_step(min)).and_then(int_value);
    }
    let below = if min - 1.0 < min { min - 1.0 } else { min.next_down() };
    finite(below).map(Value::from)
}

/// Numeric value just over the upper bound
fn number_above(param: &Parameter) -> Option<Value> {
    let b = &param.bounds;
    let max = b.maximum.and_then(finite)?;
    if param.param_type == ParamType::Integer {
        let ceil = int_ceil(max, b.exclusive_maximum);
        return ceil.checked_add(int_step(max)).and_then(int_value);
    }
    let above = if max + 1.0 > max { max + 1.0 } else { max.next_up() };
    finite(above).map(Value::from)
}

/// Length or item count one short of the declared minimum
fn count_below(min: Option<u64>) -> Option<u64> {
    min.filter(|n| *n > 0).map(|n| n - 1).and_then(bounded_len)
}

/// Length or item count one past the declared maximum
fn count_above(max: Option<u64>) -> Option<u64> {
    max.and_then(|n| n.checked_add(1)).and_then(bounded_len)
}

/// Whether a value under the lower bound can be synthesized
pub fn can_undercut(param: &Parameter) -> bool {
    let b = &param.bounds;
    match param.param_type {
        ParamType::Integer | ParamType::Number => number_below(param).is_some(),
        ParamType::String => count_below(b.min_length).is_some(),
        ParamType::Array => count_below(b.min_items).is_some(),
        _ => false,
    }
}

/// Whether a value over the upper bound can be synthesized
pub fn can_exceed(param: &Parameter) -> bool {
    let b = &param.bounds;
    match param.param_type {
        ParamType::Integer | ParamType::Number => number_above(param).is_some(),
        ParamType::String => count_above(b.max_length).is_some(),
        ParamType::Array => count_above(b.max_items).is_some(),
        _ => false,
    }
}

/// A value just under the declared lower bound
///
/// `None` when the bound is absent or its violation cannot be represented:
/// an integer beyond the 64-bit JSON range or a length over
/// [`MAX_SYNTHESIZED_LEN`].
pub fn below_minimum(param: &Parameter) -> Option<Value> {
    let b = &param.bounds;
    match param.param_type {
        ParamType::Integer | ParamType::Number => number_below(param),
        ParamType::String => count_below(b.min_length).map(|n| Value::String("x".repeat(n as usize))),
        ParamType::Array => count_below(b.min_items).map(|n| array_of(param, n)),
        _ => None,
    }
}

/// A value just over the declared upper bound
pub fn above_maximum(param: &Parameter) -> Option<Value> {
    let b = &param.bounds;
    match param.param_type {
        ParamType::Integer | ParamType::Number => number_above(param),
        ParamType::String => count_above(b.max_length).map(|n| Value::String("x".repeat(n as usize))),
        ParamType::Array => count_above(b.max_items).map(|n| array_of(param, n)),
        _ => None,
    }
}

/// A value of the wrong JSON type
pub fn wrong_type(param: &Parameter) -> Value {
    match param.param_type {
        ParamType::Integer | ParamType::Number => json!("not-a-number"),
        ParamType::Boolean => json!("not-a-boolean"),
        ParamType::String => json!(12345),
        ParamType::Array => json!("not-an-array"),
        ParamType::Object => json!("not-an-object"),
    }
}

/// An identifier that should not resolve to an existing resource
pub fn missing_id(param: &Parameter) -> Value {
    if param.param_type.is_numeric() {
        json!(MISSING_INT_ID)
    } else {
        json!(MISSING_STR_ID)
    }
}

/// Whether a value satisfies the parameter's type and bounds
pub fn conforms(param: &Parameter, value: &Value) -> bool {
    if !param.param_type.accepts(value) {
        return false;
    }
    if !param.enum_values.is_empty() && !param.enum_values.contains(value) {
        return false;
    }
    let b = &param.bounds;
    match value {
        Value::Number(n) => {
            let Some(v) = n.as_f64() else {
                return false;
            };
            let above_min = b.minimum.is_none_or(|m| if b.exclusive_minimum { v > m } else { v >= m });
            let below_max = b.maximum.is_none_or(|m| if b.exclusive_maximum { v < m } else { v <= m });
            above_min && below_max
        }
        Value::String(s) => {
            let len = s.chars().count() as u64;
            b.min_length.is_none_or(|m| len >= m) && b.max_length.is_none_or(|m| len <= m)
        }
        Value::Array(items) => {
            let len = items.len() as u64;
            b.min_items.is_none_or(|m| len >= m) && b.max_items.is_none_or(|m| len <= m)
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Bounds, ParamLocation};
    use proptest::prelude::*;
    use rstest::rstest;

    fn param(param_type: ParamType, bounds: Bounds) -> Parameter {
        let mut p = Parameter::simple("p", ParamLocation::Query, param_type);
        p.bounds = bounds;
        p
    }

    fn int_range(min: Option<f64>, max: Option<f64>) -> Parameter {
        param(
            ParamType::Integer,
            Bounds {
                minimum: min,
                maximum: max,
                ..Bounds::default()
            },
        )
    }

    #[rstest]
    #[case(None, None, 1)]
    #[case(Some(1.0), Some(100.0), 1)]
    #[case(Some(5.0), None, 5)]
    #[case(None, Some(0.0), 0)]
    fn test_canonical_integer_clamps(#[case] min: Option<f64>, #[case] max: Option<f64>, #[case] expected: i64) {
        assert_eq!(canonical(&int_range(min, max)), json!(expected));
    }

    #[test]
    fn test_page_bounds() {
        let page = int_range(Some(1.0), Some(100.0));
        assert_eq!(below_minimum(&page), Some(json!(0)));
        assert_eq!(above_maximum(&page), Some(json!(101)));
        assert_eq!(wrong_type(&page), json!("not-a-number"));
    }

    #[test]
    fn test_string_lengths() {
        let p = param(
            ParamType::String,
            Bounds {
                min_length: Some(8),
                max_length: Some(12),
                ..Bounds::default()
            },
        );
        assert_eq!(canonical(&p), json!("samplexx"));
        assert_eq!(below_minimum(&p), Some(json!("xxxxxxx")));
        assert_eq!(above_maximum(&p).unwrap().as_str().unwrap().len(), 13);
    }

    #[test]
    fn test_format_aware_strings() {
        let mut p = param(ParamType::String, Bounds::default());
        p.format = Some("email".into());
        assert_eq!(canonical(&p), json!("user@example.com"));
    }

    #[test]
    fn test_enum_and_default_win() {
        let mut p = param(ParamType::String, Bounds::default());
        p.default = Some(json!("asc"));
        assert_eq!(canonical(&p), json!("asc"));
        p.enum_values = vec![json!("desc"), json!("asc")];
        assert_eq!(canonical(&p), json!("desc"));
    }

    #[test]
    fn test_path_ids() {
        let id = Parameter::simple("orderId", ParamLocation::Path, ParamType::String);
        assert_eq!(canonical(&id), json!("1"));
        assert_eq!(missing_id(&id), json!("does-not-exist"));
        let num = Parameter::simple("orderId", ParamLocation::Path, ParamType::Integer);
        assert_eq!(missing_id(&num), json!(999999));
    }

    #[test]
    fn test_arrays() {
        let mut p = param(
            ParamType::Array,
            Bounds {
                min_items: Some(2),
                max_items: Some(3),
                ..Bounds::default()
            },
        );
        p.item_type = Some(ParamType::Integer);
        assert_eq!(canonical(&p), json!([1, 1]));
        assert_eq!(below_minimum(&p), Some(json!([1])));
        assert_eq!(above_maximum(&p), Some(json!([1, 1, 1, 1])));
    }

    #[test]
    fn test_int64_bounds_are_exceeded_beyond_rounding() {
        let p = int_range(Some(0.0), Some(i64::MAX as f64));
        let above = above_maximum(&p).unwrap();
        assert!(above.is_u64());
        assert!(above.as_u64().unwrap() > i64::MAX as u64);
        assert!(!conforms(&p, &above));
        assert!(conforms(&p, &canonical(&p)));
    }

    #[test]
    fn test_bounds_past_the_json_integer_range_have_no_violation() {
        let p = int_range(Some(i64::MIN as f64), Some(u64::MAX as f64));
        assert_eq!(below_minimum(&p), None);
        assert_eq!(above_maximum(&p), None);
        assert!(!can_undercut(&p));
        assert!(!can_exceed(&p));
    }

    #[test]
    fn test_huge_number_bounds_move_by_an_ulp() {
        let p = param(
            ParamType::Number,
            Bounds {
                minimum: Some(-1e300),
                maximum: Some(1e300),
                ..Bounds::default()
            },
        );
        assert!(!conforms(&p, &below_minimum(&p).unwrap()));
        assert!(!conforms(&p, &above_maximum(&p).unwrap()));

        let edge = param(
            ParamType::Number,
            Bounds {
                maximum: Some(f64::MAX),
                ..Bounds::default()
            },
        );
        assert_eq!(above_maximum(&edge), None);
    }

    #[rstest]
    #[case(Some(u64::MAX), None)]
    #[case(Some(1_000_000_000_000), None)]
    #[case(Some(MAX_SYNTHESIZED_LEN), None)]
    #[case(Some(MAX_SYNTHESIZED_LEN - 1), Some(MAX_SYNTHESIZED_LEN as usize))]
    fn test_length_violations_are_capped(#[case] max_length: Option<u64>, #[case] expected: Option<usize>) {
        let p = param(
            ParamType::String,
            Bounds {
                max_length,
                ..Bounds::default()
            },
        );
        let len = above_maximum(&p).map(|v| v.as_str().unwrap().len());
        assert_eq!(len, expected);
        assert_eq!(can_exceed(&p), expected.is_some());
    }

    #[test]
    fn test_huge_item_minimum_is_not_materialized() {
        let p = param(
            ParamType::Array,
            Bounds {
                min_items: Some(u64::MAX),
                ..Bounds::default()
            },
        );
        assert_eq!(below_minimum(&p), None);
        let items = canonical(&p);
        assert_eq!(items.as_array().unwrap().len() as u64, MAX_SYNTHESIZED_LEN);
    }

    proptest! {
        #[test]
        fn prop_int_violations_hold_across_the_i32_range(min in i32::MIN as i64..i32::MAX as i64, span in 0i64..1_000_000) {
            let p = int_range(Some(min as f64), Some((min + span) as f64));
            prop_assert!(conforms(&p, &canonical(&p)));
            prop_assert!(!conforms(&p, &below_minimum(&p).unwrap()));
            prop_assert!(!conforms(&p, &above_maximum(&p).unwrap()));
        }

        #[test]
        fn prop_canonical_conforms_and_violations_do_not(min in -50i64..50, span in 0i64..100) {
            let p = int_range(Some(min as f64), Some((min + span) as f64));
            prop_assert!(conforms(&p, &canonical(&p)));
            prop_assert!(!conforms(&p, &below_minimum(&p).unwrap()));
            prop_assert!(!conforms(&p, &above_maximum(&p).unwrap()));
            prop_assert!(!conforms(&p, &wrong_type(&p)));
        }
    }
}
