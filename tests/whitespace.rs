use serde_json::json;
use tessera::{Engine, Syntax};

fn render_with(syntax: Syntax, source: &str) -> String {
    Engine::with_syntax(syntax)
        .compile(source)
        .unwrap()
        .render(json!({ "xs": [1, 2], "a": true }))
        .unwrap()
}

fn render(source: &str) -> String {
    render_with(Syntax::default(), source)
}

#[test]
fn whitespace_kept_by_default() {
    let result = render("{% for x in xs %}\n  {{ x }}\n{% endfor %}\n");
    assert_eq!(result, "\n  1\n\n  2\n\n");
}

#[test]
fn whitespace_trim_markers() {
    let result = render("{% for x in xs -%}\n  {{ x }}  \n  {%- endfor %}");
    assert_eq!(result, "1  \n2  \n");
}

#[test]
fn whitespace_trim_expression() {
    let result = render("lorem   {{- \"ipsum\" -}}   dolor");
    assert_eq!(result, "lorem   ipsumdolor");
}

#[test]
fn whitespace_begin_trim_clears_indentation() {
    let result = render("lorem\n    {{- \"ipsum\" }}");
    assert_eq!(result, "lorem\nipsum");
}

#[test]
fn whitespace_trim_comment() {
    let result = render("lorem {# comment -#}\n  ipsum");
    assert_eq!(result, "lorem ipsum");
}

#[test]
fn whitespace_trim_blocks() {
    let syntax = Syntax::builder()
        .expr("{{", "}}")
        .block("{%", "%}")
        .trim_blocks(true)
        .build();
    let result = render_with(syntax, "{% for x in xs %}\n{{ x }}\n{% endfor %}\n");
    assert_eq!(result, "1\n2\n");
}

#[test]
fn whitespace_lstrip_blocks() {
    let syntax = Syntax::builder()
        .expr("{{", "}}")
        .block("{%", "%}")
        .trim_blocks(true)
        .lstrip_blocks(true)
        .build();
    let result = render_with(
        syntax,
        "<ul>\n  {% for x in xs %}\n  <li>{{ x }}</li>\n  {% endfor %}\n</ul>",
    );
    assert_eq!(result, "<ul>\n  <li>1</li>\n  <li>2</li>\n</ul>");
}

#[test]
fn whitespace_lstrip_blocks_disabled_with_plus() {
    let syntax = Syntax::builder()
        .expr("{{", "}}")
        .block("{%", "%}")
        .lstrip_blocks(true)
        .build();
    let result = render_with(syntax, "  {%+ if a %}yes{% endif %}");
    assert_eq!(result, "  yes");
}
