mod helpers;

use serde_json::json;
use tessera::{Engine, ErrorKind, Notation, Syntax};

use crate::helpers::Writer;

fn render(source: &str, data: serde_json::Value) -> String {
    Engine::new().compile(source).unwrap().render(data).unwrap()
}

#[test]
fn render_raw() {
    assert_eq!(render("lorem ipsum dolor", json!({})), "lorem ipsum dolor");
}

#[test]
fn render_inline_expr_bool() {
    assert_eq!(render("lorem {{ ipsum }}", json!({ "ipsum": true })), "lorem true");
}

#[test]
fn render_inline_expr_integer() {
    assert_eq!(render("lorem {{ ipsum }}", json!({ "ipsum": 123 })), "lorem 123");
}

#[test]
fn render_inline_expr_float() {
    assert_eq!(render("lorem {{ ipsum }}", json!({ "ipsum": 123.4 })), "lorem 123.4");
}

#[test]
fn render_inline_expr_string() {
    assert_eq!(
        render("lorem {{ ipsum }}", json!({ "ipsum": "dolor" })),
        "lorem dolor"
    );
}

#[test]
fn render_inline_expr_null() {
    assert_eq!(render("lorem {{ ipsum }}!", json!({ "ipsum": null })), "lorem !");
}

#[test]
fn render_inline_expr_array_and_object() {
    assert_eq!(
        render(
            "{{ list }} {{ map }}",
            json!({ "list": [1, "two"], "map": { "a": [true] } })
        ),
        r#"[1,"two"] {"a":[true]}"#
    );
}

#[test]
fn render_inline_expr_object_index() {
    assert_eq!(
        render("lorem {{ ipsum.dolor }}", json!({ "ipsum": { "dolor": "sit" } })),
        "lorem sit"
    );
}

#[test]
fn render_inline_expr_array_index() {
    assert_eq!(
        render("lorem {{ ipsum.1 }}", json!({ "ipsum": ["sit", "amet"] })),
        "lorem amet"
    );
}

#[test]
fn render_inline_expr_literals() {
    assert_eq!(
        render(r#"{{ "a\tb" }} {{ -1.5 }} {{ [1, 2] }} {{ null }}"#, json!({})),
        "a\tb -1.5 [1,2] "
    );
}

#[test]
fn render_inline_expr_pointer_notation() {
    let syntax = Syntax::builder()
        .expr("{{", "}}")
        .notation(Notation::Pointer)
        .build();
    let result = Engine::with_syntax(syntax)
        .compile("{{ user/names/1 }}")
        .unwrap()
        .render(json!({ "user": { "names": ["John", "Jane"] } }))
        .unwrap();
    assert_eq!(result, "Jane");
}

#[test]
fn render_arithmetic() {
    let data = json!({ "x": 5 });
    assert_eq!(render("{{ 1 + 2 * 3 }}", data.clone()), "7");
    assert_eq!(render("{{ (1 + 2) * 3 }}", data.clone()), "9");
    assert_eq!(render("{{ 7 / 2 }}", data.clone()), "3.5");
    assert_eq!(render("{{ 7 % 3 }}", data.clone()), "1");
    assert_eq!(render("{{ 2 ^ 10 }}", data.clone()), "1024");
    assert_eq!(render("{{ x - 1 }}", data.clone()), "4");
    assert_eq!(render("{{ -x }}", data.clone()), "-5");
    assert_eq!(render("{{ 10 - -1 }}", data.clone()), "11");
    assert_eq!(render(r#"{{ "ab" + "cd" }}"#, data), "abcd");
}

#[test]
fn render_comparison() {
    let data = json!({ "a": 5, "name": "John" });
    assert_eq!(render("{{ a > 1 }}", data.clone()), "true");
    assert_eq!(render("{{ a <= 1 }}", data.clone()), "false");
    assert_eq!(render("{{ a == 5.0 }}", data.clone()), "true");
    assert_eq!(render(r#"{{ name != "John" }}"#, data.clone()), "false");
    assert_eq!(render("{{ 2 in [1, 2, 3] }}", data), "true");
}

#[test]
fn render_logic() {
    let data = json!({ "yes": true, "no": false });
    assert_eq!(render("{{ yes and no }}", data.clone()), "false");
    assert_eq!(render("{{ yes or no }}", data.clone()), "true");
    assert_eq!(render("{{ not no }}", data.clone()), "true");
    assert_eq!(render("{{ 1 and 2 }}", data.clone()), "true");
    assert_eq!(render("{{ not yes or yes and not no }}", data), "true");
}

#[test]
fn render_logic_short_circuits() {
    assert_eq!(render("{{ 0 and undefined }}", json!({})), "false");
    assert_eq!(render("{{ 1 or undefined }}", json!({})), "true");
}

#[test]
fn render_if_statement() {
    let source = "{% if a > 1 %}big{% else %}small{% endif %}";
    assert_eq!(render(source, json!({ "a": 5 })), "big");
    assert_eq!(render(source, json!({ "a": 0 })), "small");
}

#[test]
fn render_if_else_if_statement() {
    let source = "{% if a == 1 %}one{% else if a == 2 %}two{% else if a == 3 %}three{% else %}many{% endif %}";
    assert_eq!(render(source, json!({ "a": 1 })), "one");
    assert_eq!(render(source, json!({ "a": 2 })), "two");
    assert_eq!(render(source, json!({ "a": 3 })), "three");
    assert_eq!(render(source, json!({ "a": 4 })), "many");
}

#[test]
fn render_if_statement_truthiness() {
    let source = "{% if x %}yes{% else %}no{% endif %}";
    for (x, exp) in [
        (json!(null), "no"),
        (json!(0), "no"),
        (json!(0.5), "yes"),
        (json!(""), "no"),
        (json!("a"), "yes"),
        (json!([]), "no"),
        (json!([0]), "yes"),
        (json!({}), "no"),
        (json!({ "a": 1 }), "yes"),
    ] {
        assert_eq!(render(source, json!({ "x": x })), exp);
    }
}

#[test]
fn render_if_statement_nested() {
    let source = "{% if a %}A{% if b %}B{% endif %}{% else %}C{% endif %}!";
    assert_eq!(render(source, json!({ "a": true, "b": true })), "AB!");
    assert_eq!(render(source, json!({ "a": true, "b": false })), "A!");
    assert_eq!(render(source, json!({ "a": false, "b": true })), "C!");
}

#[test]
fn render_for_statement_array() {
    let result = render(
        "{% for n in names %}{{ n }}{% endfor %}",
        json!({ "names": ["Jeff", "Seb"] }),
    );
    assert_eq!(result, "JeffSeb");
}

#[test]
fn render_for_statement_loop_record() {
    let result = render(
        "{% for n in names %}{{ loop.index }}{{ loop.index1 }}{{ loop.is_first }}{{ loop.is_last }} {% endfor %}",
        json!({ "names": ["Jeff", "Seb"] }),
    );
    assert_eq!(result, "01truefalse 12falsetrue ");
}

#[test]
fn render_for_statement_object_sorted() {
    let result = render(
        "{% for k, v in map %}{{ k }}={{ v }};{% endfor %}",
        json!({ "map": { "b": 2, "c": 3, "a": 1 } }),
    );
    assert_eq!(result, "a=1;b=2;c=3;");
}

#[test]
fn render_for_statement_empty() {
    let source = "a{% for x in xs %}x{% endfor %}b";
    assert_eq!(render(source, json!({ "xs": [] })), "ab");
    assert_eq!(render(source, json!({ "xs": {} })), "ab");
}

#[test]
fn render_for_statement_nested_parent() {
    let result = render(
        "{% for a in xs %}{% for b in xs %}{{ loop.parent.index }}{{ loop.index }} {% endfor %}{% endfor %}",
        json!({ "xs": [1, 2] }),
    );
    assert_eq!(result, "00 01 10 11 ");
}

#[test]
fn render_for_statement_shadows_data() {
    let result = render(
        "{% for x in xs %}{{ x }}{% endfor %}{{ x }}",
        json!({ "x": "data", "xs": ["a", "b"] }),
    );
    assert_eq!(result, "abdata");
}

#[test]
fn render_for_statement_loop_item_index() {
    let result = render(
        "{% for user in users %}{{ user.name }},{% endfor %}",
        json!({ "users": [{ "name": "John" }, { "name": "Jane" }] }),
    );
    assert_eq!(result, "John,Jane,");
}

#[test]
fn render_for_statement_over_expression() {
    let result = render("{% for i in range(3) %}{{ i }}{% endfor %}", json!({}));
    assert_eq!(result, "012");
}

#[test]
fn render_line_statements() {
    let result = render(
        "## for n in names\n- {{ n }}\n## endfor\n",
        json!({ "names": ["a", "b"] }),
    );
    assert_eq!(result, "- a\n- b\n");
}

#[test]
fn render_comment() {
    assert_eq!(render("lorem {# ipsum #}dolor", json!({})), "lorem dolor");
}

#[test]
fn render_set_statement() {
    let result = render("{% set x = 1 + 1 %}{{ x }}", json!({}));
    assert_eq!(result, "2");
}

#[test]
fn render_set_statement_nested() {
    let result = render(
        r#"{% set user.name = "Jane" %}{{ user.name }} {{ user.age }}"#,
        json!({ "user": { "name": "John", "age": 42 } }),
    );
    assert_eq!(result, "Jane 42");
}

#[test]
fn render_set_statement_in_loop() {
    let result = render(
        "{% for n in xs %}{% set total = default(total, 0) + n %}{% endfor %}{{ total }}",
        json!({ "xs": [1, 2, 3] }),
    );
    assert_eq!(result, "6");
}

#[test]
fn render_default() {
    let data = json!({ "name": "John", "user": {} });
    assert_eq!(render(r#"{{ default(name, "x") }}"#, data.clone()), "John");
    assert_eq!(render(r#"{{ default(missing, "x") }}"#, data.clone()), "x");
    assert_eq!(render(r#"{{ default(user.title, "Guest") }}"#, data.clone()), "Guest");
    assert_eq!(render("{{ default(1 + 1, 0) }}", data), "2");
}

#[test]
fn render_default_with_computed_value() {
    let data = json!({ "x": 1, "y": 9, "s": "abc" });
    assert_eq!(render("{{ default(x + 1, 0) }}", data.clone()), "2");
    assert_eq!(render("{{ default(x + 1, y) }}", data.clone()), "2");
    assert_eq!(render(r#"{{ default(upper(s), "none") }}"#, data.clone()), "ABC");
    assert_eq!(render("{{ default(missing, x + y) }}", data), "10");
}

#[test]
fn render_exists() {
    let data = json!({ "name": "John", "user": { "id": 1 } });
    assert_eq!(render(r#"{{ exists("name") }}"#, data.clone()), "true");
    assert_eq!(render(r#"{{ exists("nope") }}"#, data.clone()), "false");
    assert_eq!(render(r#"{{ exists("user.id") }}"#, data.clone()), "true");
    assert_eq!(render(r#"{{ existsIn(user, "id") }}"#, data), "true");
}

#[test]
fn render_exists_loop_variable() {
    let result = render(
        r#"{% for x in xs %}{{ exists("x") }}{% endfor %}{{ exists("x") }}"#,
        json!({ "xs": [1] }),
    );
    assert_eq!(result, "truefalse");
}

#[test]
fn render_to_writer() {
    let mut w = Writer::new();
    Engine::new()
        .compile("lorem {{ ipsum }}")
        .unwrap()
        .render_to_writer(&mut w, json!({ "ipsum": "dolor" }))
        .unwrap();
    assert_eq!(w.into_string(), "lorem dolor");
}

#[test]
fn render_to_writer_err_io() {
    let mut w = Writer::with_max(1);
    let err = Engine::new()
        .compile("lorem {{ ipsum }}")
        .unwrap()
        .render_to_writer(&mut w, json!({ "ipsum": "dolor" }))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn render_err_variable_not_found() {
    let err = Engine::new()
        .compile("lorem {{ ipsum }}")
        .unwrap()
        .render(json!({}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert_eq!(err.message(), "variable 'ipsum' not found");
    assert_eq!(err.location(), Some((1, 10)));
    assert_eq!(
        format!("{err:#}"),
        "
  --> <anonymous>:1:10
   |
 1 | lorem {{ ipsum }}
   |          ^^^^^ variable 'ipsum' not found
"
    );
}

#[test]
fn render_err_nested_variable_not_found() {
    let err = Engine::new()
        .compile("{% for x in xs %}{{ x.name }}{% endfor %}")
        .unwrap()
        .render(json!({ "xs": [{}], "x": { "name": "shadowed" } }))
        .unwrap_err();
    assert_eq!(err.message(), "variable 'x.name' not found");
}

#[test]
fn render_err_division_by_zero() {
    let err = Engine::new()
        .compile("{{ 1 / 0 }}")
        .unwrap()
        .render(json!({}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert_eq!(err.message(), "division by zero");
    assert!(err.location().is_some());
}

#[test]
fn render_err_not_iterable() {
    let err = Engine::new()
        .compile("{% for x in xs %}{% endfor %}")
        .unwrap()
        .render(json!({ "xs": 1 }))
        .unwrap_err();
    assert_eq!(err.message(), "expected iterable, found number");
}

#[test]
fn render_err_unpack_object_into_one_variable() {
    let err = Engine::new()
        .compile("{% for x in xs %}{% endfor %}")
        .unwrap()
        .render(json!({ "xs": { "a": 1 } }))
        .unwrap_err();
    assert_eq!(err.message(), "cannot unpack object item into one variable");
    assert_eq!(err.location(), Some((1, 8)));
}

#[test]
fn render_err_unknown_callback() {
    let err = Engine::new()
        .compile("{{ nope(1) }}")
        .unwrap()
        .render(json!({}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert_eq!(err.message(), "function 'nope' (1) not found");
}

#[test]
fn render_err_partial_output_is_kept() {
    let mut w = Writer::new();
    let err = Engine::new()
        .compile("lorem {{ ipsum }}")
        .unwrap()
        .render_to_writer(&mut w, json!({}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert_eq!(w.into_string(), "lorem ");
}

#[test]
fn render_idempotent() {
    let engine = Engine::new();
    let source = "{% for x in xs %}{{ loop.index }}:{{ upper(x) }} {% endfor %}";
    let data = json!({ "xs": ["a", "b"] });
    let a = engine.compile(source).unwrap().render(&data).unwrap();
    let b = engine.compile(source).unwrap().render(&data).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, "0:A 1:B ");
}

#[test]
fn render_value_borrows_data() {
    let engine = Engine::new();
    let template = engine.compile("{{ a }}{{ b.c }}").unwrap();
    let data = json!({ "a": 1, "b": { "c": 2 } });
    assert_eq!(template.render_value(&data).unwrap(), "12");
    assert_eq!(template.render_value(&data).unwrap(), "12");
}
