//! Defines a compiled [`Template`] which is a flat sequence of [`Instr`] that
//! can be executed by the renderer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::functions::Builtin;
use crate::types::span::Span;

/// Placeholder for a jump target that has not been backpatched yet.
pub const FIXME: usize = !0;

/// Compiled templates keyed by their normalized include path.
pub type Includes = BTreeMap<String, Arc<Template>>;

#[cfg_attr(internal_debug, derive(Debug))]
pub struct Template {
    pub source: String,
    pub instrs: Vec<Instr>,
    /// Every template transitively included by this one.
    pub includes: Includes,
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Instr {
    pub op: Op,
    /// The number of values this instruction consumes, including the operand.
    pub args: usize,
    pub operand: Operand,
    /// The region of the template source responsible for this instruction.
    pub span: Span,
}

/// Where the last argument of an instruction comes from.
#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub enum Operand {
    /// Popped off the evaluation stack.
    Pop,
    /// An immediate literal.
    Value(Value),
    /// A name like `user.name` resolved against the current scope.
    Dot(Span),
    /// A name like `user/name` resolved against the current scope.
    Pointer(Span),
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub enum Op {
    /// Emit raw template
    EmitRaw(Span),

    /// Emit the value
    Emit,

    /// Push the operand to the stack
    Push,

    /// Apply a builtin function and push the result
    Builtin(Builtin),

    /// Invoke a registered callback and push the result
    Callback(Span),

    /// Render another template
    Include(String),

    /// Jump to an instruction
    Jump(usize),

    /// Pop the value and jump to the instruction if it is false
    JumpIfFalse(usize),

    /// Jump to the instruction if the value is false, otherwise pop it
    JumpIfFalseOrPop(usize),

    /// Jump to the instruction if the value is true, otherwise pop it
    JumpIfTrueOrPop(usize),

    /// Start a loop over the value, jumping to `end` if it is empty
    LoopStart { vars: LoopVars, end: usize },

    /// Advance the current loop and jump to the start of its body
    LoopNext(usize),

    /// Assign the value to a render local
    Set(Vec<String>),
}

#[derive(Clone, Copy)]
#[cfg_attr(internal_debug, derive(Debug))]
pub enum LoopVars {
    /// `for item in array`
    Item(Span),
    /// `for key, value in object`
    KeyValue(Span, Span),
}

impl Instr {
    pub fn new(op: Op, args: usize, span: Span) -> Self {
        Self {
            op,
            args,
            operand: Operand::Pop,
            span,
        }
    }

    pub fn push(operand: Operand, span: Span) -> Self {
        Self {
            op: Op::Push,
            args: 1,
            operand,
            span,
        }
    }

    /// Returns a mutable reference to the jump target if this is a jump.
    pub fn jump_target_mut(&mut self) -> Option<&mut usize> {
        match &mut self.op {
            Op::Jump(j)
            | Op::JumpIfFalse(j)
            | Op::JumpIfFalseOrPop(j)
            | Op::JumpIfTrueOrPop(j)
            | Op::LoopNext(j)
            | Op::LoopStart { end: j, .. } => Some(j),
            _ => None,
        }
    }

    pub fn jump_target(&self) -> Option<usize> {
        match self.op {
            Op::Jump(j)
            | Op::JumpIfFalse(j)
            | Op::JumpIfFalseOrPop(j)
            | Op::JumpIfTrueOrPop(j)
            | Op::LoopNext(j)
            | Op::LoopStart { end: j, .. } => Some(j),
            _ => None,
        }
    }

    /// The number of arguments taken from the stack.
    pub fn pops(&self) -> usize {
        match self.operand {
            Operand::Pop => self.args,
            _ => self.args.saturating_sub(1),
        }
    }
}

#[cfg(not(internal_debug))]
impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("instrs", &self.instrs.len())
            .field("includes", &self.includes.keys())
            .finish_non_exhaustive()
    }
}
