use crate::error::to_line_col;
use crate::types::span::Span;
use crate::types::syntax::Kind;
use crate::Engine;

/// A lexer that tokenizes the template source into distinct chunks so that the
/// parser doesn't have to operate on raw text.
///
/// The lexer never fails. Characters it does not understand are returned as
/// [`Token::Unknown`] and an unterminated tag is reported as [`Token::Eof`],
/// the parser turns both into errors with a location.
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Lexer<'engine, 'source> {
    /// A reference to the engine containing the syntax configuration.
    engine: &'engine Engine,

    /// The original template source.
    pub source: &'source str,

    /// A cursor over the template source.
    cursor: usize,

    /// The current state of the lexer.
    state: State,

    /// How to trim the start of the next raw token.
    left_trim: Trim,

    /// Whether the previous token could end an operand, this decides whether
    /// a `-` is a minus operator or the sign of a number.
    after_operand: bool,

    /// A buffer to store the next token.
    next: Option<(Token, Span)>,
}

/// The state of the lexer.
#[derive(Clone, Copy)]
#[cfg_attr(internal_debug, derive(Debug))]
enum State {
    /// Within raw template.
    Template,

    /// Between the begin and end tags of the given kind.
    Body(Kind),
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(internal_debug, derive(Debug))]
enum Trim {
    None,
    /// Remove all leading whitespace.
    All,
    /// Remove spaces and tabs followed by a single newline.
    Newline,
}

/// The unit yielded by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Raw template
    Raw,
    /// Begin expression tag, e.g. `{{`
    BeginExpr,
    /// End expression tag, e.g. `}}`
    EndExpr,
    /// Begin block tag, e.g. `{%`
    BeginBlock,
    /// End block tag, e.g. `%}`
    EndBlock,
    /// Begin line statement, e.g. `##`
    BeginLine,
    /// End of a line statement
    EndLine,
    /// Begin comment tag, e.g. `{#`
    BeginComment,
    /// The comment body and end comment tag, e.g. ` ... #}`
    EndComment,
    /// An identifier, e.g. `user.name` or `user/name`
    Ident,
    /// A permissive number literal, e.g. `19`, `-2.5e10`
    Number,
    /// A string literal, e.g. `"Hello World!\n"`
    String,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `=`
    Assign,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Times,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `^`
    Caret,
    /// End of input, or an unterminated tag
    Eof,
    /// Any character that doesn't start a token
    Unknown,
}

impl<'engine, 'source> Lexer<'engine, 'source> {
    /// Construct a new lexer positioned at the start of the source.
    pub fn new(engine: &'engine Engine, source: &'source str) -> Self {
        Self {
            engine,
            source,
            cursor: 0,
            state: State::Template,
            left_trim: Trim::None,
            after_operand: false,
            next: None,
        }
    }

    /// Returns the 1-based line and column of the lexer cursor.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn current_position(&self) -> (usize, usize) {
        to_line_col(self.source, self.cursor)
    }

    /// Returns the next token and its span.
    pub fn scan(&mut self) -> (Token, Span) {
        if let Some(next) = self.next.take() {
            return next;
        }
        match self.state {
            State::Template => self.scan_template(),
            State::Body(Kind::Comment) => self.scan_comment(),
            State::Body(kind) => self.scan_body(kind),
        }
    }

    fn scan_template(&mut self) -> (Token, Span) {
        // We are within raw template, that means all we have to do is find
        // the next begin tag from `i`. The following diagram helps describe
        // the variable naming.
        //
        // xxxxxxx{{-xxxxxxxx
        //    ^   ^  ^
        //    i   j  k

        let i = self.skip_left_trim(self.cursor);
        let len = self.source.len();
        if i >= len {
            self.cursor = len;
            return (Token::Eof, Span::at(len));
        }

        let syntax = &self.engine.syntax;
        match self.engine.searcher.find_at(self.source, i) {
            Some((kind, j, k)) => {
                let strip_block = matches!(kind, Kind::Block | Kind::Comment);
                let (k, strip) = match self.source.as_bytes().get(k) {
                    Some(b'-') if kind != Kind::Line => (k + 1, true),
                    Some(b'+') if strip_block => (k + 1, false),
                    _ => (k, strip_block && syntax.lstrip_blocks),
                };

                let raw = &self.source[i..j];
                let end = if strip {
                    i + clear_final_line_if_whitespace(raw).len()
                } else {
                    j
                };

                self.cursor = k;
                self.state = State::Body(kind);
                self.after_operand = false;
                let begin = (Token::begin(kind), Span::from(j..k));

                if end > i {
                    // We must first emit the raw token, so we store the begin
                    // tag token in the `next` buffer.
                    self.next = Some(begin);
                    (Token::Raw, Span::from(i..end))
                } else {
                    begin
                }
            }
            None => {
                self.cursor = len;
                (Token::Raw, Span::from(i..len))
            }
        }
    }

    fn scan_comment(&mut self) -> (Token, Span) {
        // We are between two comment tags {# ... #}, that means all we have
        // to do is find the corresponding end tag. The whole comment body
        // including the end tag is returned as one token.
        //
        // x{#cccccc#}xxxxxx
        //    ^     ^ ^
        //    i     j k

        let i = self.cursor;
        let close = self.engine.syntax.close(Kind::Comment);
        match self.source[i..].find(close) {
            Some(d) => {
                let j = i + d;
                let k = j + close.len();
                let trim = j > i && self.source.as_bytes()[j - 1] == b'-';
                self.end_tag(Kind::Comment, trim, k);
                (Token::EndComment, Span::from(i..k))
            }
            None => {
                let len = self.source.len();
                self.cursor = len;
                (Token::Eof, Span::at(len))
            }
        }
    }

    fn scan_body(&mut self, kind: Kind) -> (Token, Span) {
        let bytes = self.source.as_bytes();
        let close = self.engine.syntax.close(kind);

        let mut i = self.cursor;
        loop {
            while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\r') {
                i += 1;
            }
            if i >= bytes.len() {
                self.cursor = bytes.len();
                return (Token::Eof, Span::at(bytes.len()));
            }
            let rest = &self.source[i..];
            if rest.starts_with(close) {
                let j = i + close.len();
                self.end_tag(kind, false, j);
                return (Token::end(kind), Span::from(i..j));
            }
            if kind != Kind::Line && rest.starts_with('-') && rest[1..].starts_with(close) {
                let j = i + 1 + close.len();
                self.end_tag(kind, true, j);
                return (Token::end(kind), Span::from(i..j));
            }
            if bytes[i] == b'\n' {
                i += 1;
                continue;
            }
            break;
        }

        // We can unwrap since we've already checked that there is more text
        // remaining.
        let c = self.source[i..].chars().next().unwrap();
        let next = bytes.get(i + 1).copied();

        let (tk, j) = match c {
            // Single character to token mappings.
            ',' => (Token::Comma, i + 1),
            ':' => (Token::Colon, i + 1),
            '(' => (Token::LeftParen, i + 1),
            ')' => (Token::RightParen, i + 1),
            '[' => (Token::LeftBracket, i + 1),
            ']' => (Token::RightBracket, i + 1),
            '{' => (Token::LeftBrace, i + 1),
            '}' => (Token::RightBrace, i + 1),
            '+' => (Token::Plus, i + 1),
            '*' => (Token::Times, i + 1),
            '/' => (Token::Slash, i + 1),
            '%' => (Token::Percent, i + 1),
            '^' => (Token::Caret, i + 1),

            // Operators that might be followed by `=`.
            '>' if next == Some(b'=') => (Token::GreaterEqual, i + 2),
            '>' => (Token::Greater, i + 1),
            '<' if next == Some(b'=') => (Token::LessEqual, i + 2),
            '<' => (Token::Less, i + 1),
            '=' if next == Some(b'=') => (Token::Equal, i + 2),
            '=' => (Token::Assign, i + 1),
            '!' if next == Some(b'=') => (Token::NotEqual, i + 2),

            // Multi-character tokens with a distinct start character.
            '"' => (Token::String, self.scan_string(i)),
            '-' if !self.after_operand && next.map_or(false, |b| b.is_ascii_digit()) => {
                (Token::Number, self.scan_number(i + 1))
            }
            '-' => (Token::Minus, i + 1),
            c if c.is_ascii_digit() => (Token::Number, self.scan_number(i)),
            c if is_ident_start(c) => (Token::Ident, self.scan_ident(i, close)),

            // Any other character...
            c => (Token::Unknown, i + c.len_utf8()),
        };

        self.after_operand = matches!(
            tk,
            Token::Ident
                | Token::Number
                | Token::String
                | Token::RightParen
                | Token::RightBracket
                | Token::RightBrace
        );
        self.cursor = j;
        (tk, Span::from(i..j))
    }

    /// Scans a string starting at the opening quote and returns the index
    /// after the closing quote, or the end of input.
    fn scan_string(&self, i: usize) -> usize {
        let bytes = self.source.as_bytes();
        let quote = bytes[i];
        let mut escape = false;
        for (j, &b) in bytes.iter().enumerate().skip(i + 1) {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == quote {
                return j + 1;
            }
        }
        bytes.len()
    }

    /// Scans a number, validity is checked when the literal is parsed.
    fn scan_number(&self, i: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut j = i;
        while j < bytes.len() {
            match bytes[j] {
                b'0'..=b'9' | b'.' | b'e' | b'E' => j += 1,
                b'+' | b'-' if matches!(bytes[j - 1], b'e' | b'E') => j += 1,
                _ => break,
            }
        }
        j
    }

    /// Scans an identifier, a `-` directly before the close tag is left for
    /// the trimmed close tag.
    fn scan_ident(&self, i: usize, close: &str) -> usize {
        let mut iter = self.source[i..].char_indices().map(|(d, c)| (i + d, c));
        // Skip the start character.
        iter.next();
        for (j, c) in iter {
            if c == '-' && self.source[j + 1..].starts_with(close) {
                return j;
            }
            if !is_ident(c) {
                return j;
            }
        }
        self.source.len()
    }

    /// Updates the state after an end tag of the given kind.
    fn end_tag(&mut self, kind: Kind, trim: bool, j: usize) {
        self.cursor = j;
        self.state = State::Template;
        self.left_trim = if trim {
            Trim::All
        } else if kind != Kind::Expr && kind != Kind::Line && self.engine.syntax.trim_blocks {
            Trim::Newline
        } else {
            Trim::None
        };
    }

    /// Applies and resets any pending left trim, returning the new start of
    /// the raw token.
    fn skip_left_trim(&mut self, i: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut j = i;
        match std::mem::replace(&mut self.left_trim, Trim::None) {
            Trim::None => {}
            Trim::All => {
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
            }
            Trim::Newline => {
                while j < bytes.len() && matches!(bytes[j], b' ' | b'\t') {
                    j += 1;
                }
                if bytes[j..].starts_with(b"\r\n") {
                    j += 2;
                } else if bytes[j..].starts_with(b"\n") {
                    j += 1;
                } else {
                    j = i;
                }
            }
        }
        j
    }
}

/// Removes trailing spaces and tabs, but only if they are all that is on the
/// final line.
fn clear_final_line_if_whitespace(raw: &str) -> &str {
    let trimmed = raw.trim_end_matches([' ', '\t']);
    if trimmed.is_empty() || trimmed.ends_with('\n') {
        trimmed
    } else {
        raw
    }
}

impl Token {
    pub fn human(&self) -> &'static str {
        match self {
            Self::Raw => "raw template",
            Self::BeginExpr => "begin expression",
            Self::EndExpr => "end expression",
            Self::BeginBlock => "begin block",
            Self::EndBlock => "end block",
            Self::BeginLine => "begin line statement",
            Self::EndLine => "end of line statement",
            Self::BeginComment => "begin comment",
            Self::EndComment => "end comment",
            Self::Ident => "identifier",
            Self::Number => "number",
            Self::String => "string",
            Self::Comma => "comma",
            Self::Colon => "colon",
            Self::LeftParen => "`(`",
            Self::RightParen => "`)`",
            Self::LeftBracket => "`[`",
            Self::RightBracket => "`]`",
            Self::LeftBrace => "`{`",
            Self::RightBrace => "`}`",
            Self::Equal => "`==`",
            Self::NotEqual => "`!=`",
            Self::Greater => "`>`",
            Self::GreaterEqual => "`>=`",
            Self::Less => "`<`",
            Self::LessEqual => "`<=`",
            Self::Assign => "`=`",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Times => "`*`",
            Self::Slash => "`/`",
            Self::Percent => "`%`",
            Self::Caret => "`^`",
            Self::Eof => "end of input",
            Self::Unknown => "unknown character",
        }
    }

    fn begin(kind: Kind) -> Self {
        match kind {
            Kind::Expr => Self::BeginExpr,
            Kind::Block => Self::BeginBlock,
            Kind::Line => Self::BeginLine,
            Kind::Comment => Self::BeginComment,
        }
    }

    fn end(kind: Kind) -> Self {
        match kind {
            Kind::Expr => Self::EndExpr,
            Kind::Block => Self::EndBlock,
            Kind::Line => Self::EndLine,
            Kind::Comment => Self::EndComment,
        }
    }
}

#[cfg(feature = "unicode")]
fn is_ident_start(c: char) -> bool {
    matches!(c, '_' | '@' | '$') || unicode_ident::is_xid_start(c)
}

#[cfg(feature = "unicode")]
fn is_ident(c: char) -> bool {
    matches!(c, '.' | '/' | '-') || unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_ident_start(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'a'..='z' | '_' | '@' | '$')
}

#[cfg(not(feature = "unicode"))]
fn is_ident(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_' | '.' | '/' | '-')
}
