use serde_json::json;
use trelliscore::condition::{evaluate, Comparison, Operator};
use trelliscore::template::{interpolate_value, placeholders};
use trelliscore::{interpolate, into_payload, lookup_path, ConditionEvaluator, GuardFallback, Payload};

fn data(value: serde_json::Value) -> Payload {
    into_payload(value)
}

#[test]
fn test_interpolates_nested_path() {
    let data = data(json!({ "a": { "b": "x" } }));
    assert_eq!(interpolate("{{a.b}}", &data), "x");
}

#[test]
fn test_unresolved_placeholder_is_left_verbatim() {
    let data = data(json!({ "a": { "b": "x" } }));
    let template = "Hello {{user.name}}, {{a.b}}";

    let once = interpolate(template, &data);
    assert_eq!(once, "Hello {{user.name}}, x");
    assert_eq!(interpolate(&once, &data), once);
}

#[test]
fn test_non_string_values_render_as_json() {
    let data = data(json!({ "count": 3, "ok": true, "tags": ["a", "b"], "none": null }));
    assert_eq!(
        interpolate("{{count}} {{ok}} {{tags}} {{none}}", &data),
        r#"3 true ["a","b"] null"#
    );
}

#[test]
fn test_whitespace_inside_braces_and_array_indices() {
    let data = data(json!({ "items": [{ "sku": "A-1" }] }));
    assert_eq!(interpolate("{{ items.0.sku }}", &data), "A-1");
    assert_eq!(lookup_path(&data, "items.1.sku"), None);
}

#[test]
fn test_interpolate_value_recurses() {
    let data = data(json!({ "name": "Ada" }));
    let value = json!({ "greeting": "Hi {{name}}", "list": ["{{name}}", 1] });
    assert_eq!(
        interpolate_value(&value, &data),
        json!({ "greeting": "Hi Ada", "list": ["Ada", 1] })
    );
    assert_eq!(placeholders("{{ a }} and {{b.c}}"), vec!["a", "b.c"]);
}

#[test]
fn test_operator_priority() {
    let parsed = Comparison::parse("a != b").unwrap();
    assert_eq!(parsed.operator, Operator::Ne);

    // `==` is tried before `>`, so this splits on `==`.
    let parsed = Comparison::parse("x == >").unwrap();
    assert_eq!(parsed.operator, Operator::Eq);
    assert_eq!(parsed.right, ">");
}

#[test]
fn test_equality_compares_strings() {
    let data = data(json!({ "status": "paid", "flag": true }));
    assert!(evaluate("{{status}} == paid", &data));
    assert!(evaluate("{{status}} != refunded", &data));
    assert!(evaluate("{{flag}} == true", &data));
    assert!(!evaluate("1.0 == 1", &data));
}

#[test]
fn test_ordering_compares_numbers() {
    let data = data(json!({ "amount": 150, "limit": "99.5" }));
    assert!(evaluate("{{amount}} > {{limit}}", &data));
    assert!(!evaluate("{{amount}} < 100", &data));
    assert!(!evaluate("abc > 1", &data));
}

#[test]
fn test_ordering_reads_leading_number() {
    let data = data(json!({ "price": "100 USD", "weight": "3.5kg" }));
    assert!(evaluate("{{price}} > 50", &data));
    assert!(evaluate("{{weight}} < 4", &data));
    assert!(evaluate("1e3x > 999", &data));
    assert!(evaluate("2- < 3", &data));
    assert!(!evaluate("USD 100 > 50", &data));
    assert!(!evaluate("{{missing}} > 1", &data));
}

#[test]
fn test_missing_operator_uses_fallback() {
    let data = Payload::new();
    assert!(evaluate("just some words", &data));
    assert!(ConditionEvaluator::new(GuardFallback::Allow).evaluate("nonsense", &data));
    assert!(!ConditionEvaluator::new(GuardFallback::Block).evaluate("nonsense", &data));
}
