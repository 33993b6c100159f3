use std::fmt::Display;

use serde_json::Value;

use crate::compile::lex::{Lexer, Token};
use crate::compile::{Compiler, Context};
use crate::functions::{self, Arity, Builtin, Function};
use crate::types::program::{Instr, LoopVars, Op, Operand, FIXME};
use crate::types::span::Span;
use crate::types::syntax::Notation;
use crate::{Error, Result};

/// A parser that compiles a token stream straight into a program.
///
/// The parser is a hand written recursive descent parser. There is no AST,
/// each construct emits its instructions as soon as it is recognized and any
/// forward jumps are patched once their target is known. It sometimes needs
/// to peek at the next token to know how to proceed and uses the `peeked`
/// buffer to do this.
pub struct Parser<'ctx, 'engine, 'source> {
    /// Shared state for resolving includes.
    ctx: &'ctx mut Context<'engine>,

    /// A lexer that tokenizes the template source.
    tokens: Lexer<'engine, 'source>,

    /// Remember a peeked token.
    peeked: Option<(Token, Span)>,

    /// The program being emitted.
    compiler: Compiler,

    /// Blocks that have been opened but not closed yet.
    blocks: Vec<Block>,

    /// The directory includes are resolved against.
    base: &'source str,
}

/// Stores the state of an open block during parsing.
enum Block {
    /// A partial `if` statement.
    If {
        /// The conditional jump of the current branch, if it has one.
        cond_jump: Option<usize>,
        /// The jumps at the end of each branch that skip the rest.
        end_jumps: Vec<usize>,
        /// Whether we have seen the `else` clause.
        has_else: bool,
    },

    /// A partial `for` statement.
    For {
        /// The index of the loop start instruction.
        start: usize,
    },
}

/// A keyword in the template syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    If,
    Else,
    EndIf,
    For,
    In,
    EndFor,
    Include,
    Set,
    Not,
    And,
    Or,
    True,
    False,
    Null,
}

/// A function call resolved at compile time.
enum Callee {
    Builtin(Builtin),
    Callback,
}

impl<'ctx, 'engine, 'source> Parser<'ctx, 'engine, 'source> {
    /// Construct a new parser.
    pub fn new(ctx: &'ctx mut Context<'engine>, source: &'source str, base: &'source str) -> Self {
        let engine = ctx.engine;
        Self {
            ctx,
            tokens: Lexer::new(engine, source),
            peeked: None,
            compiler: Compiler::new(),
            blocks: Vec::new(),
            base,
        }
    }

    /// Parses a template and returns the emitted instructions.
    pub fn parse_template(mut self) -> Result<Vec<Instr>> {
        loop {
            match self.next() {
                (Token::Eof, _) => break,

                // Simply raw template, emit a single instruction for it.
                (Token::Raw, span) => {
                    self.compiler.push(Instr::new(Op::EmitRaw(span), 0, span));
                }

                // The lexer returns the whole comment as a single token.
                (Token::BeginComment, _) => {
                    self.expect(Token::EndComment)?;
                }

                // The start of an expression, e.g. `{{ user.name }}`
                (Token::BeginExpr, begin) => {
                    self.parse_expr()?;
                    let end = self.expect(Token::EndExpr)?;
                    self.compiler
                        .push_consuming(Op::Emit, 1, begin.combine(end));
                }

                // The start of a block, e.g. `{% if cond %}`
                (Token::BeginBlock, _) => {
                    self.parse_statement()?;
                    self.expect(Token::EndBlock)?;
                }

                // A line statement, e.g. `## if cond`
                (Token::BeginLine, _) => {
                    self.parse_statement()?;
                    match self.next() {
                        (Token::EndLine | Token::Eof, _) => {}
                        (tk, span) => {
                            return Err(self.err_unexpected_token(
                                Token::EndLine.human(),
                                tk,
                                span,
                            ));
                        }
                    }
                }

                (tk, span) => {
                    return Err(self.err_unexpected_token("raw template or tag", tk, span));
                }
            }
        }

        if let Some(block) = self.blocks.last() {
            let msg = match block {
                Block::If { .. } => "unmatched `if` block",
                Block::For { .. } => "unmatched `for` block",
            };
            let n = self.source().len();
            return Err(Error::syntax(msg, self.source(), Span::at(n)));
        }

        Ok(self.compiler.finish())
    }

    /// Parses a single statement. All of the following are valid statements.
    ///
    ///   if user.is_enabled
    ///
    ///   else if user.is_admin
    ///
    ///   for uid, user in group.users
    ///
    ///   include "partials/header.txt"
    ///
    ///   set user.name = "John"
    ///
    fn parse_statement(&mut self) -> Result<()> {
        let (kw, span) = self.parse_keyword("statement")?;
        match kw {
            // The start of an `if` statement. The condition jumps past the
            // branch when it is false. This jump is patched at the next
            // `else` or `endif`.
            Keyword::If => {
                let cond = self.parse_expr()?;
                let j = self
                    .compiler
                    .push(Instr::new(Op::JumpIfFalse(FIXME), 1, cond));
                self.blocks.push(Block::If {
                    cond_jump: Some(j),
                    end_jumps: Vec::new(),
                    has_else: false,
                });
            }

            // An `else` or `else if` clause. The previous branch jumps to the
            // end of the `if` statement and the previous condition jumps to
            // here.
            Keyword::Else => {
                let is_else_if = self.is_next_keyword(Keyword::If);
                match self.blocks.last_mut() {
                    Some(Block::If {
                        cond_jump,
                        end_jumps,
                        has_else,
                        ..
                    }) if !*has_else => {
                        let j = self.compiler.push(Instr::new(Op::Jump(FIXME), 0, span));
                        end_jumps.push(j);
                        if let Some(c) = cond_jump.take() {
                            self.compiler.update_jump(c);
                        }
                        *has_else = !is_else_if;
                    }
                    _ => {
                        let msg = if is_else_if {
                            "unexpected `else if` block"
                        } else {
                            "unexpected `else` block"
                        };
                        return Err(Error::syntax(msg, self.tokens.source, span));
                    }
                }
                if is_else_if {
                    self.next();
                    let cond = self.parse_expr()?;
                    let j = self
                        .compiler
                        .push(Instr::new(Op::JumpIfFalse(FIXME), 1, cond));
                    if let Some(Block::If { cond_jump, .. }) = self.blocks.last_mut() {
                        *cond_jump = Some(j);
                    }
                }
            }

            // The end of an `if` statement, every pending jump lands here.
            Keyword::EndIf => match self.blocks.pop() {
                Some(Block::If {
                    cond_jump,
                    end_jumps,
                    ..
                }) => {
                    for j in cond_jump.into_iter().chain(end_jumps) {
                        self.compiler.update_jump(j);
                    }
                }
                _ => {
                    return Err(Error::syntax(
                        "unexpected `endif` block",
                        self.source(),
                        span,
                    ));
                }
            },

            // The start of a `for` statement. The loop start instruction
            // skips to the end of the loop when there is nothing to iterate.
            Keyword::For => {
                let vars = self.parse_loop_vars()?;
                self.expect_keyword(Keyword::In)?;
                let iterable = self.parse_expr()?;
                let start = self.compiler.push_consuming(
                    Op::LoopStart { vars, end: FIXME },
                    1,
                    iterable,
                );
                self.blocks.push(Block::For { start });
            }

            // The end of a `for` statement. The next iteration starts right
            // after the loop start instruction.
            Keyword::EndFor => match self.blocks.pop() {
                Some(Block::For { start }) => {
                    self.compiler
                        .push(Instr::new(Op::LoopNext(start + 1), 0, span));
                    self.compiler.update_jump(start);
                }
                _ => {
                    return Err(Error::syntax(
                        "unexpected `endfor` block",
                        self.source(),
                        span,
                    ));
                }
            },

            // An `include` statement, the template is compiled now and
            // rendered by name.
            Keyword::Include => {
                let name_span = self.expect(Token::String)?;
                let name = self.parse_string(name_span)?;
                let path = self
                    .ctx
                    .resolve_include(self.base, &name)
                    .map_err(|err| err.enrich(self.tokens.source, name_span))?;
                self.compiler
                    .push(Instr::new(Op::Include(path), 0, span.combine(name_span)));
            }

            // A `set` statement, assigns to a render local.
            Keyword::Set => {
                let name = self.expect(Token::Ident)?;
                self.expect(Token::Assign)?;
                let value = self.parse_expr()?;
                let path = self.path_segments(name);
                self.compiler
                    .push_consuming(Op::Set(path), 1, name.combine(value));
            }

            _ => {
                return Err(Error::syntax(
                    format!("unknown statement `{}`", kw.human()),
                    self.source(),
                    span,
                ));
            }
        }
        Ok(())
    }

    /// Parses loop variable(s).
    ///
    /// This is either a single identifier or two comma separated identifiers.
    /// Both of the following are valid:
    ///
    ///   item
    ///
    ///   key, value
    ///
    fn parse_loop_vars(&mut self) -> Result<LoopVars> {
        let item = self.expect(Token::Ident)?;
        if !self.is_next(Token::Comma) {
            return Ok(LoopVars::Item(item));
        }
        self.next();
        let value = self.expect(Token::Ident)?;
        Ok(LoopVars::KeyValue(item, value))
    }

    /// Parses an expression and returns its span.
    ///
    /// The expression leaves exactly one value on the stack. It is built from
    /// the following levels, from loosest to tightest binding:
    ///
    ///   a or b
    ///   a and b
    ///   not a
    ///   a == b, a != b, a > b, a >= b, a < b, a <= b, a in b
    ///   a + b, a - b
    ///   a * b, a / b, a % b
    ///   a ^ b
    ///   -a
    ///
    fn parse_expr(&mut self) -> Result<Span> {
        self.parse_or()
    }

    /// Parses a chain of `or` operators.
    ///
    /// The right hand side is skipped if the left hand side is true.
    fn parse_or(&mut self) -> Result<Span> {
        let mut span = self.parse_and()?;
        while self.is_next_keyword(Keyword::Or) {
            self.next();
            let j = self
                .compiler
                .push(Instr::new(Op::JumpIfTrueOrPop(FIXME), 1, span));
            span = span.combine(self.parse_and()?);
            self.compiler.update_jump(j);
            self.compiler.push_consuming(Op::Builtin(Builtin::Bool), 1, span);
        }
        Ok(span)
    }

    /// Parses a chain of `and` operators.
    ///
    /// The right hand side is skipped if the left hand side is false.
    fn parse_and(&mut self) -> Result<Span> {
        let mut span = self.parse_not()?;
        while self.is_next_keyword(Keyword::And) {
            self.next();
            let j = self
                .compiler
                .push(Instr::new(Op::JumpIfFalseOrPop(FIXME), 1, span));
            span = span.combine(self.parse_not()?);
            self.compiler.update_jump(j);
            self.compiler.push_consuming(Op::Builtin(Builtin::Bool), 1, span);
        }
        Ok(span)
    }

    fn parse_not(&mut self) -> Result<Span> {
        if self.is_next_keyword(Keyword::Not) {
            let (_, kw) = self.next();
            let span = kw.combine(self.parse_not()?);
            self.compiler.push_consuming(Op::Builtin(Builtin::Not), 1, span);
            return Ok(span);
        }
        self.parse_comparison()
    }

    /// Parses a single comparison, comparisons do not chain.
    fn parse_comparison(&mut self) -> Result<Span> {
        let lhs = self.parse_additive()?;
        let builtin = match self.peek() {
            (Token::Equal, _) => Builtin::Eq,
            (Token::NotEqual, _) => Builtin::Ne,
            (Token::Greater, _) => Builtin::Gt,
            (Token::GreaterEqual, _) => Builtin::Ge,
            (Token::Less, _) => Builtin::Lt,
            (Token::LessEqual, _) => Builtin::Le,
            (Token::Ident, sp) if Keyword::from_str(&self.source()[sp]) == Some(Keyword::In) => {
                Builtin::In
            }
            _ => return Ok(lhs),
        };
        self.next();
        let span = lhs.combine(self.parse_additive()?);
        self.compiler.push_consuming(Op::Builtin(builtin), 2, span);
        Ok(span)
    }

    fn parse_additive(&mut self) -> Result<Span> {
        let mut span = self.parse_multiplicative()?;
        loop {
            let builtin = match self.peek().0 {
                Token::Plus => Builtin::Add,
                Token::Minus => Builtin::Sub,
                _ => return Ok(span),
            };
            self.next();
            span = span.combine(self.parse_multiplicative()?);
            self.compiler.push_consuming(Op::Builtin(builtin), 2, span);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Span> {
        let mut span = self.parse_power()?;
        loop {
            let builtin = match self.peek().0 {
                Token::Times => Builtin::Mul,
                Token::Slash => Builtin::Div,
                Token::Percent => Builtin::Mod,
                _ => return Ok(span),
            };
            self.next();
            span = span.combine(self.parse_power()?);
            self.compiler.push_consuming(Op::Builtin(builtin), 2, span);
        }
    }

    /// Parses exponentiation, which is right associative.
    fn parse_power(&mut self) -> Result<Span> {
        let base = self.parse_unary()?;
        if !self.is_next(Token::Caret) {
            return Ok(base);
        }
        self.next();
        let span = base.combine(self.parse_power()?);
        self.compiler.push_consuming(Op::Builtin(Builtin::Pow), 2, span);
        Ok(span)
    }

    /// Parses a negation, compiled as a subtraction from zero.
    fn parse_unary(&mut self) -> Result<Span> {
        if !self.is_next(Token::Minus) {
            return self.parse_datum();
        }
        let (_, minus) = self.next();
        self.compiler
            .push(Instr::push(Operand::Value(Value::from(0)), minus));
        let span = minus.combine(self.parse_unary()?);
        self.compiler.push_consuming(Op::Builtin(Builtin::Sub), 2, span);
        Ok(span)
    }

    /// Parses a single operand. This is one of the following:
    ///
    ///   (a or b)
    ///
    ///   length(users)
    ///
    ///   true
    ///
    ///   user.name
    ///
    ///   -1.5e3
    ///
    ///   "John Smith"
    ///
    ///   [1, 2, {"three": 3}]
    ///
    fn parse_datum(&mut self) -> Result<Span> {
        match self.next() {
            (Token::LeftParen, begin) => {
                self.parse_expr()?;
                let end = self.expect(Token::RightParen)?;
                Ok(begin.combine(end))
            }

            (Token::Ident, span) => {
                if self.is_next(Token::LeftParen) {
                    return self.parse_call(span);
                }
                let operand = match Keyword::from_str(&self.source()[span]) {
                    Some(Keyword::True) => Operand::Value(Value::Bool(true)),
                    Some(Keyword::False) => Operand::Value(Value::Bool(false)),
                    Some(Keyword::Null) => Operand::Value(Value::Null),
                    Some(kw @ (Keyword::And | Keyword::Or | Keyword::Not | Keyword::In)) => {
                        return Err(Error::syntax(
                            format!("expected expression, found keyword `{}`", kw.human()),
                            self.source(),
                            span,
                        ));
                    }
                    _ => match self.ctx.engine.syntax.notation {
                        Notation::Dot => Operand::Dot(span),
                        Notation::Pointer => Operand::Pointer(span),
                    },
                };
                self.compiler.push(Instr::push(operand, span));
                Ok(span)
            }

            (Token::Number, span) => {
                let value = self.parse_literal(span, "number")?;
                self.compiler.push(Instr::push(Operand::Value(value), span));
                Ok(span)
            }

            (Token::String, span) => {
                let value = Value::String(self.parse_string(span)?);
                self.compiler.push(Instr::push(Operand::Value(value), span));
                Ok(span)
            }

            (tk @ (Token::LeftBracket | Token::LeftBrace), begin) => {
                let span = self.skip_balanced(tk, begin)?;
                let value = self.parse_literal(span, "literal")?;
                self.compiler.push(Instr::push(Operand::Value(value), span));
                Ok(span)
            }

            (tk, span) => Err(self.err_unexpected_token("expression", tk, span)),
        }
    }

    /// Parses the arguments of a function call and emits the call.
    ///
    /// The function is resolved by name and the number of arguments. A call
    /// to `default` whose first argument is a single name or literal keeps
    /// that argument on the instruction, the renderer falls back to the
    /// second argument if it cannot be resolved.
    fn parse_call(&mut self, name: Span) -> Result<Span> {
        self.expect(Token::LeftParen)?;

        let mut n = 0;
        let mut first = None;
        if !self.is_next(Token::RightParen) {
            loop {
                let start = self.compiler.len();
                self.parse_expr()?;
                if n == 0 {
                    first = Some((start, self.compiler.is_single_push(start)));
                }
                n += 1;
                if !self.is_next(Token::Comma) {
                    break;
                }
                self.next();
            }
        }
        let end = self.expect(Token::RightParen)?;
        let span = name.combine(end);

        match self.resolve_function(name, n)? {
            Callee::Builtin(Builtin::Default) => match first {
                Some((i, true)) => {
                    let value = self.compiler.remove(i);
                    self.compiler.push(Instr {
                        op: Op::Builtin(Builtin::Default),
                        args: 2,
                        operand: value.operand,
                        span,
                    });
                }
                _ => {
                    // Both arguments stay on the stack, a merged immediate
                    // would be taken for the deferred first argument.
                    self.compiler
                        .push(Instr::new(Op::Builtin(Builtin::Default), 2, span));
                }
            },
            Callee::Builtin(builtin) => {
                self.compiler.push_consuming(Op::Builtin(builtin), n, span);
            }
            Callee::Callback => {
                self.compiler.push_consuming(Op::Callback(name), n, span);
            }
        }
        Ok(span)
    }

    /// Resolves a function call with `n` arguments.
    ///
    /// Engine callbacks with an exact arity take priority over builtins,
    /// followed by variadic callbacks. Unknown functions are looked up again
    /// at render time.
    fn resolve_function(&self, span: Span, n: usize) -> Result<Callee> {
        let name = &self.source()[span];
        let callbacks = &self.ctx.engine.functions;
        let builtins = functions::builtins();

        if callbacks.get(name, Arity::Exact(n)).is_some() {
            return Ok(Callee::Callback);
        }
        if let Some(Function::Builtin(builtin)) = builtins.get(name, Arity::Exact(n)) {
            return Ok(Callee::Builtin(*builtin));
        }
        if n > 0 && callbacks.get(name, Arity::Variadic).is_some() {
            return Ok(Callee::Callback);
        }
        if builtins.contains(name) && !callbacks.contains(name) {
            let exp = builtins
                .arities(name)
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(Error::syntax(
                format!("function `{name}` takes {exp} argument(s), found {n}"),
                self.source(),
                span,
            ));
        }
        Ok(Callee::Callback)
    }

    /// Consumes tokens up to the bracket or brace closing the one at
    /// `begin` and returns the span of the whole literal.
    fn skip_balanced(&mut self, open: Token, begin: Span) -> Result<Span> {
        let mut depth = 1usize;
        loop {
            match self.next() {
                (Token::LeftBracket | Token::LeftBrace, _) => depth += 1,
                (Token::RightBracket | Token::RightBrace, end) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(begin.combine(end));
                    }
                }
                (
                    tk @ (Token::Eof
                    | Token::EndExpr
                    | Token::EndBlock
                    | Token::EndLine
                    | Token::EndComment),
                    span,
                ) => {
                    let exp = match open {
                        Token::LeftBracket => Token::RightBracket.human(),
                        _ => Token::RightBrace.human(),
                    };
                    return Err(self.err_unexpected_token(exp, tk, span));
                }
                _ => {}
            }
        }
    }

    /// Parses a JSON literal from the source.
    fn parse_literal(&self, span: Span, what: &str) -> Result<Value> {
        serde_json::from_str(&self.source()[span])
            .map_err(|_| Error::syntax(format!("invalid {what}"), self.source(), span))
    }

    /// Parses a string literal and handles escape characters.
    fn parse_string(&self, span: Span) -> Result<String> {
        serde_json::from_str(&self.source()[span])
            .map_err(|_| Error::syntax("invalid string", self.source(), span))
    }

    /// Splits a variable name into path segments.
    fn path_segments(&self, span: Span) -> Vec<String> {
        let sep = match self.ctx.engine.syntax.notation {
            Notation::Dot => '.',
            Notation::Pointer => '/',
        };
        self.source()[span].split(sep).map(String::from).collect()
    }

    /// Expects the given keyword.
    fn expect_keyword(&mut self, exp: Keyword) -> Result<Span> {
        match self.next() {
            (Token::Ident, span) if Keyword::from_str(&self.source()[span]) == Some(exp) => {
                Ok(span)
            }
            (tk, span) => {
                let exp = format!("keyword `{}`", exp.human());
                Err(self.err_unexpected_token(exp, tk, span))
            }
        }
    }

    /// Parses a keyword.
    fn parse_keyword(&mut self, exp: &str) -> Result<(Keyword, Span)> {
        match self.next() {
            (Token::Ident, span) => match Keyword::from_str(&self.source()[span]) {
                Some(kw) => Ok((kw, span)),
                None => Err(Error::syntax(
                    format!("unknown statement `{}`", &self.source()[span]),
                    self.source(),
                    span,
                )),
            },
            (tk, span) => Err(self.err_unexpected_token(exp, tk, span)),
        }
    }

    /// Returns `true` if the next token is the given keyword.
    fn is_next_keyword(&mut self, exp: Keyword) -> bool {
        match self.peek() {
            (Token::Ident, span) => Keyword::from_str(&self.source()[span]) == Some(exp),
            _ => false,
        }
    }

    /// Returns `true` if the next token is equal to the provided one.
    fn is_next(&mut self, token: Token) -> bool {
        self.peek().0 == token
    }

    /// Parses the specified token and returns its span.
    fn expect(&mut self, exp: Token) -> Result<Span> {
        match self.next() {
            (tk, span) if tk == exp => Ok(span),
            (tk, span) => Err(self.err_unexpected_token(exp.human(), tk, span)),
        }
    }

    /// Returns a copy of the next token without affecting the result of the
    /// following `.next()` call.
    fn peek(&mut self) -> (Token, Span) {
        match self.peeked {
            Some(next) => next,
            None => {
                let next = self.tokens.scan();
                self.peeked = Some(next);
                next
            }
        }
    }

    /// Returns the next token and span in the stream.
    fn next(&mut self) -> (Token, Span) {
        match self.peeked.take() {
            Some(next) => next,
            None => self.tokens.scan(),
        }
    }

    fn source(&self) -> &'source str {
        self.tokens.source
    }

    fn err_unexpected_token(&self, exp: impl Display, got: Token, span: Span) -> Error {
        let got = got.human();
        Error::syntax(format!("expected {exp}, found {got}"), self.source(), span)
    }
}

impl Keyword {
    const fn human(&self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Else => "else",
            Self::EndIf => "endif",
            Self::For => "for",
            Self::In => "in",
            Self::EndFor => "endfor",
            Self::Include => "include",
            Self::Set => "set",
            Self::Not => "not",
            Self::And => "and",
            Self::Or => "or",
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        let kw = match s {
            "if" => Self::If,
            "else" => Self::Else,
            "endif" => Self::EndIf,
            "for" => Self::For,
            "in" => Self::In,
            "endfor" => Self::EndFor,
            "include" => Self::Include,
            "set" => Self::Set,
            "not" => Self::Not,
            "and" => Self::And,
            "or" => Self::Or,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            _ => return None,
        };
        Some(kw)
    }
}
