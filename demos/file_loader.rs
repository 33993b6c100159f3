//! Demonstrates how templates and their includes are loaded from disk.

use std::path::PathBuf;

fn main() -> tessera::Result<()> {
    let template_dir = PathBuf::from_iter([env!("CARGO_MANIFEST_DIR"), "demos", "templates"]);

    let mut engine = tessera::Engine::new();

    // Includes are resolved relative to the including template, everything
    // is read from within the template directory.
    engine.set_loader(tessera::FileLoader::new(template_dir));

    let result = engine.compile_file("index.html")?.render(serde_json::json!({
        "title": "My Webpage!",
        "year": 2024,
        "pages": [
            { "name": "Home", "href": "/" },
            { "name": "About", "href": "/about" },
        ],
    }))?;
    println!("{result}");

    Ok(())
}
