use std::fmt;

use crate::functions::{Arguments, Arity, Builtin, Function};
use crate::render::iter::LoopFrame;
use crate::render::stack::Stack;
use crate::render::value::segments;
use crate::types::program::{Includes, Instr, Op, Operand, Template};
use crate::types::span::Span;
use crate::types::syntax::Notation;
use crate::value::{self, ValueCow};
use crate::{Engine, Error, Result};

/// Executes the program of a single template.
#[cfg_attr(internal_debug, derive(Debug))]
pub struct RendererImpl<'render> {
    pub engine: &'render Engine,
    pub template: &'render Template,
    /// The name of the template, used when reporting errors.
    pub name: Option<&'render str>,
    /// The templates that can be included, keyed by normalized path.
    pub includes: &'render Includes,
    /// The template that started the render, which may include itself.
    pub root: (Option<&'render str>, &'render Template),
    pub stack: Stack<'render>,
    /// The number of includes between this template and the root.
    pub depth: usize,
}

impl<'render> RendererImpl<'render> {
    pub fn new(
        engine: &'render Engine,
        template: &'render Template,
        name: Option<&'render str>,
        stack: Stack<'render>,
    ) -> Self {
        Self {
            engine,
            template,
            name,
            includes: &template.includes,
            root: (name, template),
            stack,
            depth: 0,
        }
    }

    pub fn render(mut self, f: &mut dyn fmt::Write) -> Result<()> {
        let name = self.name;
        self.render_impl(f).map_err(|err| match name {
            Some(name) => err.with_template_name(name),
            None => err,
        })
    }

    fn render_impl(&mut self, f: &mut dyn fmt::Write) -> Result<()> {
        let t = self.template;
        let source = t.source.as_str();

        // The evaluation stack
        let mut values: Vec<ValueCow<'render>> = Vec::new();

        let mut pc = 0;
        while let Some(instr) = t.instrs.get(pc) {
            match &instr.op {
                Op::EmitRaw(span) => {
                    // This can only fail because of an IO error, which is
                    // reported by the caller.
                    f.write_str(&source[*span])?;
                }

                Op::Emit => {
                    let value = self.take_one(&mut values, instr)?;
                    value::write(f, &value)?;
                }

                Op::Push => {
                    let args = self.take_args(&mut values, instr)?;
                    values.extend(args);
                }

                Op::Builtin(Builtin::Default) if !matches!(instr.operand, Operand::Pop) => {
                    // The first argument is only looked up now, if it cannot
                    // be found the already evaluated second argument is used.
                    let fallback = pop(&mut values);
                    let value = self.operand(instr).ok().flatten().unwrap_or(fallback);
                    values.push(value);
                }

                Op::Builtin(Builtin::Exists) => {
                    let args = self.take_args(&mut values, instr)?;
                    let args = Arguments::new(&args);
                    let name = args.as_str(0).map_err(|e| e.enrich(source, instr.span))?;
                    let path = segments(name, self.notation());
                    let exists = self.stack.lookup(&path).is_some();
                    values.push(ValueCow::Owned(exists.into()));
                }

                Op::Builtin(builtin) => {
                    let args = self.take_args(&mut values, instr)?;
                    let value = builtin
                        .call(&Arguments::new(&args))
                        .map_err(|e| e.enrich(source, instr.span))?;
                    values.push(ValueCow::Owned(value));
                }

                Op::Callback(name) => {
                    let name = &source[*name];
                    let args = self.take_args(&mut values, instr)?;
                    let value = match self.engine.functions.lookup(name, args.len()) {
                        Some(Function::Callback(f)) => {
                            f(&Arguments::new(&args)).map_err(|e| e.enrich(source, instr.span))?
                        }
                        _ => {
                            return Err(Error::render(
                                format!("function '{name}' ({}) not found", args.len()),
                                source,
                                instr.span,
                            ));
                        }
                    };
                    values.push(ValueCow::Owned(value));
                }

                Op::Include(name) => {
                    self.include(f, name, instr.span)?;
                }

                Op::Jump(j) => {
                    pc = *j;
                    continue;
                }

                Op::JumpIfFalse(j) => {
                    let cond = self.take_one(&mut values, instr)?;
                    if !value::is_truthy(&cond) {
                        pc = *j;
                        continue;
                    }
                }

                Op::JumpIfFalseOrPop(j) => {
                    let cond = pop(&mut values);
                    if !value::is_truthy(&cond) {
                        values.push(ValueCow::Owned(false.into()));
                        pc = *j;
                        continue;
                    }
                }

                Op::JumpIfTrueOrPop(j) => {
                    let cond = pop(&mut values);
                    if value::is_truthy(&cond) {
                        values.push(ValueCow::Owned(true.into()));
                        pc = *j;
                        continue;
                    }
                }

                Op::LoopStart { vars, end } => {
                    let iterable = self.take_one(&mut values, instr)?;
                    let parent = self.stack.loop_record();
                    let frame = LoopFrame::new(source, *vars, iterable, instr.span, parent)?;
                    if frame.is_empty() {
                        pc = *end;
                        continue;
                    }
                    self.stack.push_frame(frame);
                }

                Op::LoopNext(j) => {
                    if self.stack.advance() {
                        pc = *j;
                        continue;
                    }
                }

                Op::Set(path) => {
                    let value = self.take_one(&mut values, instr)?;
                    self.stack.set(path, value.into_owned());
                }
            }
            pc += 1;
        }

        debug_assert!(values.is_empty());
        Ok(())
    }

    /// Renders an included template into the same output.
    ///
    /// The included template sees the variables of this one.
    fn include(&self, f: &mut dyn fmt::Write, name: &'render str, span: Span) -> Result<()> {
        let source = self.template.source.as_str();
        let max = self.engine.max_include_depth;
        if self.depth >= max {
            return Err(Error::max_include_depth(max, source, span));
        }
        let template = self.get_template(name).ok_or_else(|| {
            Error::render(format!("template '{name}' not found"), source, span)
        })?;
        log::trace!("including template `{name}` at depth {}", self.depth + 1);
        RendererImpl {
            engine: self.engine,
            template,
            name: Some(name),
            includes: self.includes,
            root: self.root,
            stack: Stack::with_outer(&self.stack),
            depth: self.depth + 1,
        }
        .render(f)
    }

    fn get_template(&self, name: &str) -> Option<&'render Template> {
        if let Some(template) = self.includes.get(name) {
            return Some(template);
        }
        if let (Some(root), template) = self.root {
            if root == name {
                return Some(template);
            }
        }
        self.engine.templates.get(name).map(|t| &**t)
    }

    /// Takes the arguments of the instruction off the evaluation stack and
    /// appends the resolved operand.
    fn take_args(
        &self,
        values: &mut Vec<ValueCow<'render>>,
        instr: &'render Instr,
    ) -> Result<Vec<ValueCow<'render>>> {
        let n = instr.pops();
        assert!(values.len() >= n, "evaluation stack underflow");
        let mut args = values.split_off(values.len() - n);
        if let Some(value) = self.operand(instr)? {
            args.push(value);
        }
        Ok(args)
    }

    /// Takes the single argument of the instruction.
    fn take_one(
        &self,
        values: &mut Vec<ValueCow<'render>>,
        instr: &'render Instr,
    ) -> Result<ValueCow<'render>> {
        match self.operand(instr)? {
            Some(value) => Ok(value),
            None => Ok(pop(values)),
        }
    }

    /// Resolves the operand of the instruction, if it has one.
    fn operand(&self, instr: &'render Instr) -> Result<Option<ValueCow<'render>>> {
        match &instr.operand {
            Operand::Pop => Ok(None),
            Operand::Value(value) => Ok(Some(ValueCow::Borrowed(value))),
            Operand::Dot(span) => self.lookup(*span, Notation::Dot).map(Some),
            Operand::Pointer(span) => self.lookup(*span, Notation::Pointer).map(Some),
        }
    }

    /// Resolves a variable.
    ///
    /// If it is not in scope a callback taking no arguments with the same
    /// name is called instead.
    fn lookup(&self, span: Span, notation: Notation) -> Result<ValueCow<'render>> {
        let source = self.template.source.as_str();
        let name = &source[span];
        if let Some(value) = self.stack.lookup(&segments(name, notation)) {
            return Ok(value);
        }
        if let Some(Function::Callback(f)) = self.engine.functions.get(name, Arity::Exact(0)) {
            let value = f(&Arguments::new(&[])).map_err(|e| e.enrich(source, span))?;
            return Ok(ValueCow::Owned(value));
        }
        Err(Error::render(
            format!("variable '{name}' not found"),
            source,
            span,
        ))
    }

    fn notation(&self) -> Notation {
        self.engine.syntax.notation
    }
}

fn pop<'render>(values: &mut Vec<ValueCow<'render>>) -> ValueCow<'render> {
    match values.pop() {
        Some(value) => value,
        None => panic!("evaluation stack underflow"),
    }
}
