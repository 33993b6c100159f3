fn main() -> tessera::Result<()> {
    let syntax = tessera::Syntax::builder()
        .expr("<?", "?>") // used to emit expressions (e.g. variables)
        .block("<%", "%>") // used for loops, conditionals, includes and assignments
        .line_statement("%%") // a statement that spans the rest of the line
        // .comment("<#", "#>") // excluding a delimiter essentially disables it
        .build();

    let engine = tessera::Engine::with_syntax(syntax);

    let out = engine
        .compile(
            "
<%- if user.is_enabled %>

Hello <? user.name ?>!
%% for role in user.roles
  - <? upper(role) ?>
%% endfor

<% endif -%>
",
        )?
        .render(serde_json::json!({
            "user": {
                "is_enabled": true,
                "name": "John Smith",
                "roles": ["admin", "developer"],
            }
        }))?;

    println!("{out}");

    Ok(())
}
