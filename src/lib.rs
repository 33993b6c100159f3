//! A small template engine that compiles templates to bytecode.
//!
//! # Features
//!
//! ### Syntax
//!
//! - Expressions: `{{ user.name }}`, `{{ price * 1.2 }}`
//! - Conditionals: `{% if user.enabled %} ... {% else if user.invited %} ... {% endif %}`
//! - Loops: `{% for user in users %} ... {% endfor %}`
//! - Line statements: `## for key, value in settings`
//! - Nested templates: `{% include "partials/header.html" %}`
//! - Assignments: `{% set user.name = "John" %}`
//! - Comments: `{# ... #}`
//! - Functions: `{{ upper(user.name) }}`, `{{ default(user.title, "Guest") }}`
//! - Configurable delimiters: `<? user.name ?>`, `(( if user.enabled ))`
//!
//! ### Engine
//!
//! - Templates are compiled once into a flat program and can be rendered
//!   many times, even from multiple threads
//! - Render using any [`serde`] serializable values
//! - Render to a [`String`] or any [`std::io::Write`] implementor
//! - Custom callback functions with typed argument access
//! - Includes are loaded from the filesystem or any custom [`Loader`]
//!
//! # Getting started
//!
//! Your entry point is the [`Engine`] struct. The engine stores the syntax
//! config, callback functions, and compiled templates. Generally, you only
//! need to construct one engine during the lifetime of a program.
//!
//! ```
//! let engine = tessera::Engine::new();
//! ```
//!
//! Next, [`.add_template`][Engine::add_template] is used to compile and store
//! a template in the engine.
//!
//! ```
//! # let mut engine = tessera::Engine::new();
//! engine.add_template("hello", "Hello {{ user.name }}!")?;
//! # Ok::<(), tessera::Error>(())
//! ```
//!
//! Finally, the template is rendered by fetching it using
//! [`.get_template`][Engine::get_template] and calling
//! [`.render`][TemplateRef::render].
//!
//! ```
//! # let mut engine = tessera::Engine::new();
//! # engine.add_template("hello", "Hello {{ user.name }}!")?;
//! let template = engine.get_template("hello").unwrap();
//! let result = template.render(serde_json::json!({ "user": { "name": "John Smith" } }))?;
//! assert_eq!(result, "Hello John Smith!");
//! # Ok::<(), tessera::Error>(())
//! ```
//!
//! If you don't need to store the compiled template then you can also use
//! the [`.compile`][Engine::compile] function to return the template
//! directly.
//!
//! ```
//! # let engine = tessera::Engine::new();
//! let template = engine.compile("Hello {{ user.name }}!")?;
//! let result = template.render(serde_json::json!({ "user": { "name": "John Smith" } }))?;
//! assert_eq!(result, "Hello John Smith!");
//! # Ok::<(), tessera::Error>(())
//! ```
//!
//! # Examples
//!
//! ### Render using structured data
//!
//! Here is the same example as above except using derived data.
//!
//! ```
//! #[derive(serde::Serialize)]
//! struct Context { user: User }
//!
//! #[derive(serde::Serialize)]
//! struct User { name: String }
//!
//! let ctx = Context { user: User { name: "John Smith".into() } };
//!
//! let result = tessera::Engine::new()
//!     .compile("Hello {{ user.name }}")?
//!     .render(&ctx)?;
//!
//! assert_eq!(result, "Hello John Smith");
//! # Ok::<(), tessera::Error>(())
//! ```
//!
//! ### Transform data using callbacks
//!
//! Data can be transformed using the builtin functions or registered
//! callbacks.
//!
//! ```
//! use tessera::{Arguments, Result};
//!
//! let mut engine = tessera::Engine::new();
//! engine.add_callback("shout", 1, |args: &Arguments<'_>| -> Result<String> {
//!     Ok(format!("{}!", args.as_str(0)?.to_uppercase()))
//! });
//!
//! let result = engine
//!     .compile("Hello {{ shout(value) }}")?
//!     .render(serde_json::json!({ "value": "world" }))?;
//!
//! assert_eq!(result, "Hello WORLD!");
//! # Ok::<(), tessera::Error>(())
//! ```
//!
//! See the [`Arguments`] documentation for more information on callbacks.
//!
//! ### Render a template using custom syntax
//!
//! The template syntax can be set by constructing an engine using
//! [`Engine::with_syntax`].
//!
//! ```
//! let syntax = tessera::Syntax::builder().expr("<?", "?>").block("<%", "%>").build();
//!
//! let result = tessera::Engine::with_syntax(syntax)
//!     .compile("Hello <? user.name ?>")?
//!     .render(serde_json::json!({ "user": { "name": "John Smith" } }))?;
//!
//! assert_eq!(result, "Hello John Smith");
//! # Ok::<(), tessera::Error>(())
//! ```
//!
//! ### Render a template to an `impl io::Write`
//!
//! You can render a template directly to a buffer implementing [`io::Write`]
//! by using [`.render_to_writer()`][Template::render_to_writer].
//!
//! ```
//! use std::io;
//!
//! let stdout = io::BufWriter::new(io::stdout());
//!
//! tessera::Engine::new()
//!     .compile("Hello {{ user.name }}")?
//!     .render_to_writer(stdout, serde_json::json!({ "user": { "name": "John Smith" } }))?;
//! #
//! # Ok::<(), tessera::Error>(())
//! ```

mod compile;
mod error;
mod functions;
mod loader;
mod render;
mod types;
mod value;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;

pub use serde_json::Value;

pub use crate::error::{Error, ErrorKind};
pub use crate::functions::{Arguments, CallbackReturn};
pub use crate::loader::{FileLoader, Loader};
pub use crate::types::syntax::{Notation, Syntax, SyntaxBuilder};

use crate::compile::Searcher;
use crate::functions::{Arity, FunctionRegistry};
use crate::types::program;

/// A type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The default maximum number of nested includes.
const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// The compilation and rendering engine.
pub struct Engine {
    syntax: Syntax,
    searcher: Searcher,
    functions: FunctionRegistry,
    templates: BTreeMap<String, Arc<program::Template>>,
    loader: Option<Box<dyn Loader>>,
    max_include_depth: usize,
}

/// A compiled template.
pub struct Template<'engine> {
    engine: &'engine Engine,
    template: program::Template,
    name: Option<String>,
}

/// A reference to a compiled template in an [`Engine`].
#[derive(Clone, Copy)]
pub struct TemplateRef<'engine> {
    engine: &'engine Engine,
    template: &'engine program::Template,
    name: &'engine str,
}

impl Default for Engine {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct a new engine.
    #[inline]
    pub fn new() -> Self {
        Self::with_syntax(Syntax::default())
    }

    /// Construct a new engine with custom syntax.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera::{Engine, Syntax};
    ///
    /// let syntax = Syntax::builder().expr("<{", "}>").block("<[", "]>").build();
    /// let engine = Engine::with_syntax(syntax);
    /// ```
    #[inline]
    pub fn with_syntax(syntax: Syntax) -> Self {
        Self {
            searcher: Searcher::new(&syntax),
            syntax,
            functions: FunctionRegistry::new(),
            templates: BTreeMap::new(),
            loader: Some(Box::new(FileLoader::new("."))),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    /// Add a new callback to the engine.
    ///
    /// The callback is invoked for calls with the given name and exactly
    /// `arity` arguments. A callback takes priority over a builtin function
    /// with the same name and arity. A callback with no arguments is also
    /// invoked when a variable with that name is not found.
    #[inline]
    pub fn add_callback<F, R>(&mut self, name: &str, arity: usize, f: F)
    where
        F: Fn(&Arguments<'_>) -> R + Send + Sync + 'static,
        R: CallbackReturn,
    {
        self.functions
            .register_callback(name, Arity::Exact(arity), functions::new(f));
    }

    /// Add a new callback to the engine that accepts any number of
    /// arguments.
    ///
    /// The callback is only used for calls with at least one argument and
    /// when no function with the exact number of arguments exists.
    #[inline]
    pub fn add_variadic_callback<F, R>(&mut self, name: &str, f: F)
    where
        F: Fn(&Arguments<'_>) -> R + Send + Sync + 'static,
        R: CallbackReturn,
    {
        self.functions
            .register_callback(name, Arity::Variadic, functions::new(f));
    }

    /// Add a template to the engine.
    ///
    /// The template will be compiled and stored under the given name. Other
    /// templates can include it by this name.
    #[inline]
    pub fn add_template<N, S>(&mut self, name: N, source: S) -> Result<()>
    where
        N: Into<String>,
        S: Into<String>,
    {
        let name = name.into();
        let base = compile::dirname(&name);
        let template = compile::template(self, source.into(), Some(&name), base)?;
        log::debug!("added template `{name}`");
        self.templates.insert(name, Arc::new(template));
        Ok(())
    }

    /// Lookup a template by name.
    #[inline]
    pub fn get_template(&self, name: &str) -> Option<TemplateRef<'_>> {
        self.templates
            .get_key_value(name)
            .map(|(name, template)| TemplateRef {
                engine: self,
                template,
                name,
            })
    }

    /// Compile a template.
    ///
    /// The template will not be stored in the engine.
    #[inline]
    pub fn compile<S>(&self, source: S) -> Result<Template<'_>>
    where
        S: Into<String>,
    {
        let template = compile::template(self, source.into(), None, "")?;
        Ok(Template {
            engine: self,
            template,
            name: None,
        })
    }

    /// Load and compile a template using the engine's loader.
    ///
    /// The template will not be stored in the engine. Includes are resolved
    /// relative to the directory of `path`.
    pub fn compile_file(&self, path: &str) -> Result<Template<'_>> {
        let loader = self.loader.as_ref().ok_or_else(|| {
            Error::file(format!("cannot load '{path}', no loader is configured"))
        })?;
        let source = loader.load(path).map_err(|err| err.with_template_name(path))?;
        let template = compile::template(self, source, Some(path), compile::dirname(path))?;
        Ok(Template {
            engine: self,
            template,
            name: Some(path.to_owned()),
        })
    }

    /// Set the loader used for includes and
    /// [`.compile_file(..)`][Engine::compile_file].
    ///
    /// Defaults to a [`FileLoader`] reading from the current working
    /// directory.
    #[inline]
    pub fn set_loader<L>(&mut self, loader: L)
    where
        L: Loader + 'static,
    {
        self.loader = Some(Box::new(loader));
    }

    /// Remove the loader, only templates added to the engine can be
    /// included.
    #[inline]
    pub fn disable_loader(&mut self) {
        self.loader = None;
    }

    /// Set the maximum number of nested includes.
    ///
    /// This is the maximum number of nested `{% include ... %}` statements
    /// that are allowed during rendering, as counted from the root template.
    ///
    /// Defaults to `64`.
    #[inline]
    pub fn set_max_include_depth(&mut self, depth: usize) {
        self.max_include_depth = depth;
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Engine");
        d.field("syntax", &self.syntax);
        d.field("functions", &self.functions);
        d.field("max_include_depth", &self.max_include_depth);
        d.field("has_loader", &self.loader.is_some());
        #[cfg(not(internal_debug))]
        {
            d.field("templates", &self.templates.keys()).finish()
        }
        #[cfg(internal_debug)]
        {
            d.field("templates", &self.templates).finish()
        }
    }
}

impl<'engine> Template<'engine> {
    /// Render the template to a string using the provided value.
    #[inline]
    pub fn render<S>(&self, data: S) -> Result<String>
    where
        S: serde::Serialize,
    {
        self.render_value(&serde_json::to_value(data)?)
    }

    /// Render the template to a string using the provided [`Value`].
    ///
    /// The value is borrowed for the duration of the render, so this avoids
    /// converting the data again if it is already a [`Value`].
    #[inline]
    pub fn render_value(&self, data: &Value) -> Result<String> {
        render::to_string(self.engine, &self.template, self.name.as_deref(), data)
    }

    /// Render the template to a writer using the provided value.
    #[inline]
    pub fn render_to_writer<W, S>(&self, writer: W, data: S) -> Result<()>
    where
        W: io::Write,
        S: serde::Serialize,
    {
        let data = serde_json::to_value(data)?;
        render::to_writer(self.engine, &self.template, self.name.as_deref(), &data, writer)
    }

    /// Returns the original template source.
    #[inline]
    pub fn source(&self) -> &str {
        &self.template.source
    }
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl<'engine> TemplateRef<'engine> {
    /// Render the template to a string using the provided value.
    #[inline]
    pub fn render<S>(&self, data: S) -> Result<String>
    where
        S: serde::Serialize,
    {
        self.render_value(&serde_json::to_value(data)?)
    }

    /// Render the template to a string using the provided [`Value`].
    #[inline]
    pub fn render_value(&self, data: &Value) -> Result<String> {
        render::to_string(self.engine, self.template, Some(self.name), data)
    }

    /// Render the template to a writer using the provided value.
    #[inline]
    pub fn render_to_writer<W, S>(&self, writer: W, data: S) -> Result<()>
    where
        W: io::Write,
        S: serde::Serialize,
    {
        let data = serde_json::to_value(data)?;
        render::to_writer(self.engine, self.template, Some(self.name), &data, writer)
    }

    /// Returns the name of the template.
    #[inline]
    pub fn name(&self) -> &'engine str {
        self.name
    }

    /// Returns the original template source.
    #[inline]
    pub fn source(&self) -> &'engine str {
        &self.template.source
    }
}

impl fmt::Debug for TemplateRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRef")
            .field("name", &self.name)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}
