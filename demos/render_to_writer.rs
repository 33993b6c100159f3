use std::io;

fn main() -> tessera::Result<()> {
    let mut stdout = io::BufWriter::new(io::stdout());

    let ctx = serde_json::json!({ "user": { "name": "John Smith" } });

    tessera::Engine::new()
        .compile("Hello {{ user.name }}!\n")?
        .render_to_writer(&mut stdout, ctx)?;

    Ok(())
}
