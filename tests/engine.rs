use std::collections::BTreeMap;
use std::fs;

use serde::Serialize;
use serde_json::json;
use tessera::{Engine, ErrorKind, FileLoader, Syntax, Value};

#[test]
fn engine_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Engine>();
}

#[test]
fn engine_add_and_get_template() {
    let mut engine = Engine::new();
    engine.add_template("hello", "Hello {{ name }}!").unwrap();
    let template = engine.get_template("hello").unwrap();
    assert_eq!(template.name(), "hello");
    assert_eq!(template.source(), "Hello {{ name }}!");
    assert_eq!(template.render(json!({ "name": "John" })).unwrap(), "Hello John!");
    assert!(engine.get_template("other").is_none());
}

#[test]
fn engine_add_template_replaces() {
    let mut engine = Engine::new();
    engine.add_template("t", "a").unwrap();
    engine.add_template("t", "b").unwrap();
    let result = engine.get_template("t").unwrap().render(json!({})).unwrap();
    assert_eq!(result, "b");
}

#[test]
fn engine_render_serializable() {
    #[derive(Serialize)]
    struct User {
        name: String,
        roles: Vec<&'static str>,
    }

    let engine = Engine::new();
    let user = User {
        name: "John".into(),
        roles: vec!["admin", "dev"],
    };
    let result = engine
        .compile(r#"{{ name }} ({{ join(roles, ", ") }})"#)
        .unwrap()
        .render(&user)
        .unwrap();
    assert_eq!(result, "John (admin, dev)");
}

#[test]
fn engine_render_map() {
    let mut data = BTreeMap::new();
    data.insert("a", 1);
    data.insert("b", 2);
    let result = Engine::new()
        .compile("{{ a + b }}")
        .unwrap()
        .render(data)
        .unwrap();
    assert_eq!(result, "3");
}

#[test]
fn engine_render_value() {
    let data: Value = json!({ "list": [3, 1, 2] });
    let mut engine = Engine::new();
    engine.add_template("t", "{{ sort(list) }}").unwrap();
    let template = engine.get_template("t").unwrap();
    assert_eq!(template.render_value(&data).unwrap(), "[1,2,3]");
}

#[test]
fn engine_render_from_multiple_threads() {
    let mut engine = Engine::new();
    engine.add_template("t", "{{ n * 2 }}").unwrap();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let engine = &engine;
                s.spawn(move || engine.get_template("t").unwrap().render(json!({ "n": n })))
            })
            .collect();
        for (n, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap().unwrap(), (n * 2).to_string());
        }
    });
}

#[test]
fn engine_custom_syntax() {
    let syntax = Syntax::builder()
        .expr("<?", "?>")
        .block("<%", "%>")
        .line_statement("%%")
        .comment("<#", "#>")
        .build();
    let engine = Engine::with_syntax(syntax);
    let result = engine
        .compile("<# c #><% if a %><? a ?><% endif %>\n%% for x in xs\n<? x ?>\n%% endfor\n")
        .unwrap()
        .render(json!({ "a": "yes", "xs": [1, 2] }))
        .unwrap();
    assert_eq!(result, "yes\n1\n2\n");
}

#[test]
fn engine_custom_syntax_overlapping() {
    let syntax = Syntax::builder().expr("{", "}").block("{%", "%}").build();
    let result = Engine::with_syntax(syntax)
        .compile("{% if a %}{ a }{% endif %}")
        .unwrap()
        .render(json!({ "a": 1 }))
        .unwrap();
    assert_eq!(result, "1");
}

#[test]
fn engine_compile_file() {
    let dir = std::env::temp_dir().join(format!("tessera-engine-{}", std::process::id()));
    fs::create_dir_all(dir.join("partials")).unwrap();
    fs::write(dir.join("index.txt"), r#"{% include "partials/name.txt" %}!"#).unwrap();
    fs::write(dir.join("partials/name.txt"), "{{ name }}").unwrap();

    let mut engine = Engine::new();
    engine.set_loader(FileLoader::new(&dir));
    let result = engine
        .compile_file("index.txt")
        .unwrap()
        .render(json!({ "name": "John" }))
        .unwrap();
    assert_eq!(result, "John!");

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn engine_compile_file_err_missing() {
    let mut engine = Engine::new();
    engine.set_loader(FileLoader::new("this-directory-does-not-exist"));
    let err = engine.compile_file("index.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::File);
    assert_eq!(err.template_name(), Some("index.txt"));
}

#[test]
fn engine_compile_file_err_no_loader() {
    let mut engine = Engine::new();
    engine.disable_loader();
    let err = engine.compile_file("index.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::File);
    assert_eq!(
        err.message(),
        "cannot load 'index.txt', no loader is configured"
    );
}

#[test]
fn engine_render_err_serialize() {
    let mut data = BTreeMap::new();
    data.insert(vec![1], 1);
    let err = Engine::new()
        .compile("")
        .unwrap()
        .render(data)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
}

#[test]
fn engine_debug() {
    let mut engine = Engine::new();
    engine.add_template("t", "").unwrap();
    let debug = format!("{engine:?}");
    assert!(debug.starts_with("Engine {"));
    assert!(debug.contains("\"t\""));
}
