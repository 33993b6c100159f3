//! Render a compiled program against some data.
//!
//! The renderer is a small stack machine. Each instruction takes its
//! arguments off the evaluation stack, optionally followed by an operand
//! stored on the instruction itself, and pushes its result back.

mod core;
mod fmt;
mod iter;
mod stack;
mod value;

use std::io;

use serde_json::Value;

use crate::render::core::RendererImpl;
use crate::render::fmt::Writer;
use crate::render::stack::Stack;
use crate::types::program::Template;
use crate::{Engine, Error, Result};

pub(crate) fn to_string<'render>(
    engine: &'render Engine,
    template: &'render Template,
    name: Option<&'render str>,
    data: &'render Value,
) -> Result<String> {
    let mut s = String::with_capacity(template.source.len());
    RendererImpl::new(engine, template, name, Stack::new(data)).render(&mut s)?;
    Ok(s)
}

pub(crate) fn to_writer<'render, W>(
    engine: &'render Engine,
    template: &'render Template,
    name: Option<&'render str>,
    data: &'render Value,
    writer: W,
) -> Result<()>
where
    W: io::Write,
{
    let mut w = Writer::new(writer);
    RendererImpl::new(engine, template, name, Stack::new(data))
        .render(&mut w)
        .map_err(|err| w.take_err().map(Error::from).unwrap_or(err))
}
