//! Loading the source of templates that are not registered on the engine.

use std::fs;
use std::path::PathBuf;

use crate::{Error, Result};

/// Provides the source of templates by path.
///
/// The engine asks its loader for any template that is included but not
/// registered with [`Engine::add_template`][crate::Engine::add_template], as
/// well as for [`Engine::compile_file`][crate::Engine::compile_file]. Paths
/// are normalized and relative to the directory of the including template.
///
/// Closures taking a path implement this trait.
///
/// # Examples
///
/// ```
/// use tessera::{Engine, Error, ErrorKind};
///
/// let mut engine = Engine::new();
/// engine.set_loader(|path: &str| match path {
///     "header.txt" => Ok(String::from("Welcome, {{ name }}!")),
///     _ => Err(Error::new(ErrorKind::File, format!("no template at '{path}'"))),
/// });
///
/// let result = engine
///     .compile("{% include \"header.txt\" %}")?
///     .render(serde_json::json!({ "name": "John" }))?;
/// assert_eq!(result, "Welcome, John!");
/// # Ok::<(), tessera::Error>(())
/// ```
pub trait Loader: Send + Sync {
    /// Returns the template source at the given path.
    fn load(&self, path: &str) -> Result<String>;
}

impl<F> Loader for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn load(&self, path: &str) -> Result<String> {
        self(path)
    }
}

/// Loads templates from the filesystem.
///
/// Relative paths are resolved against the root directory. This is the
/// default loader of an [`Engine`][crate::Engine], with the current working
/// directory as the root.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    /// Construct a new loader that reads templates relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Loader for FileLoader {
    fn load(&self, path: &str) -> Result<String> {
        let full = self.root.join(path);
        log::debug!("loading template from {}", full.display());
        fs::read_to_string(&full).map_err(|err| {
            Error::file(format!("failed accessing file at '{}'", full.display())).with_source(err)
        })
    }
}
