use serde_json::{json, Value};
use tessera::{Engine, ErrorKind};

fn render(source: &str, data: Value) -> String {
    Engine::new().compile(source).unwrap().render(data).unwrap()
}

fn render_err(source: &str, data: Value) -> tessera::Error {
    Engine::new().compile(source).unwrap().render(data).unwrap_err()
}

#[test]
fn builtin_strings() {
    let data = json!({ "name": "jOHN smith" });
    assert_eq!(render("{{ upper(name) }}", data.clone()), "JOHN SMITH");
    assert_eq!(render("{{ lower(name) }}", data.clone()), "john smith");
    assert_eq!(render("{{ capitalize(name) }}", data.clone()), "John smith");
    assert_eq!(render("{{ length(name) }}", data), "10");
}

#[test]
fn builtin_collections() {
    let data = json!({ "xs": [3, 1, 2], "map": { "a": 1, "b": 2 } });
    assert_eq!(render("{{ length(xs) }} {{ length(map) }}", data.clone()), "3 2");
    assert_eq!(render("{{ first(xs) }} {{ last(xs) }}", data.clone()), "3 2");
    assert_eq!(render("{{ sort(xs) }}", data.clone()), "[1,2,3]");
    assert_eq!(render("{{ max(xs) }} {{ min(xs) }}", data.clone()), "3 1");
    assert_eq!(render(r#"{{ join(xs, "-") }}"#, data.clone()), "3-1-2");
    assert_eq!(render("{{ at(xs, 1) }}", data.clone()), "1");
    assert_eq!(render(r#"{{ at(map, "b") }}"#, data.clone()), "2");
    assert_eq!(render("{{ range(4) }}", data), "[0,1,2,3]");
}

#[test]
fn builtin_sort_keeps_length() {
    let arrays = [
        json!([]),
        json!([1]),
        json!([3, 1, 2, 1]),
        json!(["b", "a", "c"]),
        json!([3, "a", null, true, [1], {}, 1.5]),
    ];
    for xs in arrays {
        assert_eq!(
            render("{{ length(sort(xs)) == length(xs) }}", json!({ "xs": xs })),
            "true"
        );
    }
}

#[test]
fn builtin_sort_mixed_types_orders_by_type() {
    let data = json!({ "xs": ["a", [1], {}, 3, true, null] });
    assert_eq!(render("{{ sort(xs) }}", data), r#"[null,true,3,{},[1],"a"]"#);
}

#[test]
fn builtin_upper_of_lower_is_upper() {
    for s in ["", "lorem", "IPSUM", "MiXeD 123!", "Straße", "été"] {
        assert_eq!(
            render("{{ upper(lower(s)) == upper(s) }}", json!({ "s": s })),
            "true"
        );
    }
}

#[test]
fn builtin_first_of_empty_is_null() {
    assert_eq!(render("[{{ first(xs) }}]", json!({ "xs": [] })), "[]");
}

#[test]
fn builtin_numbers() {
    let data = json!({ "pi": 3.14159, "n": 10 });
    assert_eq!(render("{{ round(pi, 2) }}", data.clone()), "3.14");
    assert_eq!(render("{{ round(pi, 0) }}", data.clone()), "3");
    assert_eq!(render("{{ even(n) }} {{ odd(n) }}", data.clone()), "true false");
    assert_eq!(render("{{ divisibleBy(n, 5) }}", data.clone()), "true");
    assert_eq!(render("{{ divisibleBy(n, 0) }}", data.clone()), "false");
    assert_eq!(
        render("{{ divisibleBy(-9223372036854775808, -1) }}", data),
        "true"
    );
}

#[test]
fn builtin_conversions() {
    let data = json!({ "s": "42", "f": "2.5", "x": 7.9 });
    assert_eq!(render("{{ int(s) + 1 }}", data.clone()), "43");
    assert_eq!(render("{{ float(f) * 2 }}", data.clone()), "5.0");
    assert_eq!(render("{{ int(x) }}", data), "7");
}

#[test]
fn builtin_type_checks() {
    let data = json!({ "a": [], "o": {}, "s": "", "i": 1, "f": 1.5, "b": true });
    assert_eq!(
        render(
            "{{ isArray(a) }} {{ isObject(o) }} {{ isString(s) }} {{ isInteger(i) }} {{ isFloat(f) }} {{ isNumber(i) }} {{ isBoolean(b) }}",
            data.clone()
        ),
        "true true true true true true true"
    );
    assert_eq!(
        render("{{ isArray(o) }} {{ isInteger(f) }} {{ isFloat(i) }}", data),
        "false false false"
    );
}

#[test]
fn builtin_in() {
    let data = json!({ "xs": [1, 2], "map": { "a": 1 }, "s": "lorem ipsum" });
    assert_eq!(render("{{ 1 in xs }} {{ 3 in xs }}", data.clone()), "true false");
    assert_eq!(render(r#"{{ "a" in map }}"#, data.clone()), "true");
    assert_eq!(render(r#"{{ "ips" in s }}"#, data), "true");
}

#[test]
fn builtin_err_wrong_type() {
    let err = render_err("{{ upper(n) }}", json!({ "n": 1 }));
    assert_eq!(err.kind(), ErrorKind::Value);
    assert_eq!(err.message(), "expected string, found number");
    assert_eq!(err.location(), Some((1, 4)));
}

#[test]
fn builtin_err_length_of_number() {
    let err = render_err("{{ length(n) }}", json!({ "n": 1 }));
    assert_eq!(err.message(), "expected array, object or string, found number");
}

#[test]
fn builtin_err_at_out_of_bounds() {
    let err = render_err("{{ at(xs, 5) }}", json!({ "xs": [1] }));
    assert_eq!(err.message(), "index 5 out of bounds for array of length 1");
}

#[test]
fn builtin_err_int_conversion() {
    let err = render_err("{{ int(s) }}", json!({ "s": "abc" }));
    assert_eq!(err.kind(), ErrorKind::Value);
    assert_eq!(err.message(), "cannot convert 'abc' to integer");
}
