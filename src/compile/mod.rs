//! Compile the template into a program that can be executed by the renderer.
//!
//! This process has two stages:
//! - The lexer chunks the template source into tokens.
//! - The parser consumes the token stream in a single pass and emits the
//!   program directly, backpatching jumps once their targets are known.

mod lex;
mod parse;
mod search;

use std::collections::BTreeSet;
use std::sync::Arc;

pub use crate::compile::search::Searcher;
use crate::types::program::{Includes, Instr, Op, Template, FIXME};
use crate::types::span::Span;
use crate::{Engine, Error, Result};

/// Compile a template into a program.
///
/// Includes are resolved relative to `base`, which is empty or ends with a
/// `/`.
pub fn template(
    engine: &Engine,
    source: String,
    name: Option<&str>,
    base: &str,
) -> Result<Template> {
    let mut ctx = Context {
        engine,
        includes: Includes::new(),
        in_progress: BTreeSet::new(),
    };
    if let Some(name) = name {
        ctx.in_progress.insert(name.to_owned());
    }
    let instrs = ctx.compile(&source, base).map_err(|err| match name {
        Some(name) => err.with_template_name(name),
        None => err,
    })?;
    log::debug!(
        "compiled template {} into {} instructions with {} include(s)",
        name.unwrap_or("<anonymous>"),
        instrs.len(),
        ctx.includes.len()
    );
    Ok(Template {
        source,
        instrs,
        includes: ctx.includes,
    })
}

/// State shared by a template and everything it includes.
pub struct Context<'engine> {
    pub engine: &'engine Engine,
    /// Every include compiled so far, keyed by normalized path.
    includes: Includes,
    /// Paths of the templates currently being compiled.
    in_progress: BTreeSet<String>,
}

impl<'engine> Context<'engine> {
    fn compile(&mut self, source: &str, base: &str) -> Result<Vec<Instr>> {
        parse::Parser::new(self, source, base).parse_template()
    }

    /// Makes sure the named template is available at render time and
    /// returns the key to render it by.
    ///
    /// Resolution order is: includes compiled earlier, templates registered
    /// on the engine, then the engine's loader.
    pub fn resolve_include(&mut self, base: &str, name: &str) -> Result<String> {
        let path = normalize(base, name);

        if self.includes.contains_key(&path) || self.in_progress.contains(&path) {
            log::trace!("include `{path}` already compiled");
            return Ok(path);
        }

        for key in [name, path.as_str()] {
            if let Some(template) = self.engine.templates.get(key) {
                log::trace!("include `{key}` resolved to a registered template");
                for (k, t) in &template.includes {
                    self.includes.entry(k.clone()).or_insert_with(|| t.clone());
                }
                self.includes.insert(key.to_owned(), template.clone());
                return Ok(key.to_owned());
            }
        }

        let loader = self.engine.loader.as_ref().ok_or_else(|| {
            Error::file(format!(
                "template '{path}' not found and no loader is configured"
            ))
        })?;
        let source = loader.load(&path)?;
        log::debug!("loaded include `{path}` ({} bytes)", source.len());

        self.in_progress.insert(path.clone());
        let result = self.compile(&source, dirname(&path));
        self.in_progress.remove(&path);
        let instrs = result.map_err(|err| err.with_template_name(&path))?;

        let template = Template {
            source,
            instrs,
            includes: Includes::new(),
        };
        self.includes.insert(path.clone(), Arc::new(template));
        Ok(path)
    }
}

/// Emits instructions for a single template.
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Compiler {
    instrs: Vec<Instr>,
    /// Instructions before this index must not be merged, since a jump lands
    /// right after them.
    barrier: usize,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            instrs: Vec::new(),
            barrier: 0,
        }
    }

    /// The index of the next instruction.
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn push(&mut self, instr: Instr) -> usize {
        let i = self.instrs.len();
        self.instrs.push(instr);
        i
    }

    /// Emits an instruction that consumes `args` values.
    ///
    /// A trailing `Push` is folded into the new instruction so that the
    /// pushed operand is taken directly from the instruction.
    pub fn push_consuming(&mut self, op: Op, args: usize, span: Span) -> usize {
        if args > 0 && self.instrs.len() > self.barrier {
            if let Some(last) = self.instrs.last_mut() {
                if let Op::Push = last.op {
                    last.op = op;
                    last.args = args;
                    last.span = span;
                    return self.instrs.len() - 1;
                }
            }
        }
        self.push(Instr::new(op, args, span))
    }

    /// Points the jump at `i` to the next instruction.
    pub fn update_jump(&mut self, i: usize) {
        let n = self.instrs.len();
        match self.instrs[i].jump_target_mut() {
            Some(j) => *j = n,
            None => panic!("not a jump instr"),
        }
        self.barrier = n;
    }

    /// Returns whether the instructions from `i` are a single `Push`.
    pub fn is_single_push(&self, i: usize) -> bool {
        i + 1 == self.instrs.len() && matches!(self.instrs[i].op, Op::Push)
    }

    /// Removes the instruction at `i`, shifting any jump targets after it.
    pub fn remove(&mut self, i: usize) -> Instr {
        let instr = self.instrs.remove(i);
        for instr in &mut self.instrs {
            if let Some(j) = instr.jump_target_mut() {
                if *j != FIXME && *j > i {
                    *j -= 1;
                }
            }
        }
        if self.barrier > i {
            self.barrier -= 1;
        }
        instr
    }

    pub fn finish(self) -> Vec<Instr> {
        let n = self.instrs.len();
        debug_assert!(self
            .instrs
            .iter()
            .filter_map(Instr::jump_target)
            .all(|j| j <= n));
        self.instrs
    }
}

/// Joins an include name to the base path and removes `.` and `..`
/// segments.
pub fn normalize(base: &str, name: &str) -> String {
    let joined = if name.starts_with('/') {
        name.to_owned()
    } else {
        format!("{base}{name}")
    };
    let absolute = joined.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(p) if *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            part => parts.push(part),
        }
    }
    let path = parts.join("/");
    if absolute {
        format!("/{path}")
    } else {
        path
    }
}

/// Returns the directory part of the path including the trailing `/`.
pub fn dirname(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(i) => &path[..=i],
        None => "",
    }
}
