use std::cmp::max;
use std::fmt;
use std::io;

use crate::types::span::Span;

/// An error that can occur during template compilation or rendering.
pub struct Error {
    kind: ErrorKind,
    msg: String,
    name: Option<String>,
    span: Option<(String, Span)>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The template source is malformed.
    Parser,
    /// The template could not be rendered with the given data.
    Render,
    /// A template or include could not be loaded.
    File,
    /// A value could not be converted to the required type.
    Value,
    /// Writing the rendered output failed.
    Io,
}

impl Error {
    /// Construct a new error without any location information.
    ///
    /// This is useful for returning errors from callbacks, the renderer will
    /// attach the location of the call.
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            name: None,
            span: None,
            source: None,
        }
    }

    /// Construct a new error located at the given span.
    fn located(
        kind: ErrorKind,
        msg: impl Into<String>,
        source: &str,
        span: impl Into<Span>,
    ) -> Self {
        Self {
            span: Some((source.to_owned(), span.into())),
            ..Self::new(kind, msg)
        }
    }

    /// Construct a new syntax error.
    pub(crate) fn syntax(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::located(ErrorKind::Parser, msg, source, span)
    }

    /// Construct a new render error.
    pub(crate) fn render(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::located(ErrorKind::Render, msg, source, span)
    }

    pub(crate) fn file(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::File, msg)
    }

    pub(crate) fn value(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, msg)
    }

    pub(crate) fn max_include_depth(max: usize, source: &str, span: Span) -> Self {
        Self::render(
            format!("reached maximum include depth ({max})"),
            source,
            span,
        )
    }

    /// Attaches the template source and span to an error that has none.
    pub(crate) fn enrich(mut self, source: &str, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some((source.to_owned(), span));
        }
        self
    }

    /// Attaches the underlying cause of the error.
    pub(crate) fn with_source(
        mut self,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(err));
        self
    }

    /// Attaches the template name to an error that has none.
    pub(crate) fn with_template_name(mut self, name: &str) -> Self {
        if self.name.is_none() {
            self.name = Some(name.to_owned());
        }
        self
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message without any location information.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the 1-based line and column in the template source where the
    /// error occurred, if known.
    pub fn location(&self) -> Option<(usize, usize)> {
        self.span
            .as_ref()
            .map(|(source, span)| to_line_col(source, span.m))
    }

    /// Returns the name of the template the error occurred in, if known.
    pub fn template_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self {
            source: Some(Box::new(err)),
            ..Self::new(ErrorKind::Io, "failed to write rendered output")
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(err: fmt::Error) -> Self {
        Self {
            source: Some(Box::new(err)),
            ..Self::new(ErrorKind::Io, "failed to format rendered output")
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self {
            source: Some(Box::new(err)),
            ..Self::value("failed to serialize template data")
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => self.fmt_pretty(source, *span, f),
            None => fmt::Display::fmt(self, f),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) if f.alternate() => self.fmt_pretty(source, *span, f),
            Some((source, span)) => {
                let (line, col) = to_line_col(source, span.m);
                write!(f, "{} error: {} at {line}:{col}", self.kind, self.msg)?;
                if let Some(name) = &self.name {
                    write!(f, " in template '{name}'")?;
                }
                Ok(())
            }
            None => {
                write!(f, "{} error: {}", self.kind, self.msg)?;
                if let Some(err) = &self.source {
                    write!(f, ": {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parser => "parser",
            Self::Render => "render",
            Self::File => "file",
            Self::Value => "value",
            Self::Io => "io",
        })
    }
}

impl Error {
    fn fmt_pretty(&self, source: &str, span: Span, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (line, col) = to_line_col(source, span.m);
        let code = source.lines().nth(line - 1).unwrap_or_default();
        let prefix: String = code.chars().take(col - 1).collect();
        let width = max(1, width(source.get(span.m..span.n).unwrap_or_default()));
        let offset = width_of(&prefix);

        let num = line.to_string();
        let pad = num.len();
        let pipe = "|";
        let underline = "^".repeat(width);

        let name = self.name.as_deref().unwrap_or("<anonymous>");
        write!(
            f,
            "\n {0:pad$}--> {name}:{line}:{col}\n \
            {0:pad$} {pipe}\n \
            {num:>} {pipe} {code}\n \
            {0:pad$} {pipe} {0:offset$}{underline} {msg}\n",
            "",
            msg = self.msg,
        )
    }
}

/// Converts a byte offset into a 1-based line and column.
///
/// Columns count characters, not bytes.
pub(crate) fn to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let prefix = source.get(..offset).unwrap_or(source);
    let line = prefix.matches('\n').count() + 1;
    let start = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let col = prefix[start..].chars().count() + 1;
    (line, col)
}

fn width(s: &str) -> usize {
    // Only the first line of a span is underlined.
    width_of(s.lines().next().unwrap_or_default())
}

#[cfg(feature = "unicode")]
fn width_of(s: &str) -> usize {
    use unicode_width::UnicodeWidthStr;
    s.width()
}

#[cfg(not(feature = "unicode"))]
fn width_of(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_line_col_first_line() {
        assert_eq!(to_line_col("{{ x }}", 0), (1, 1));
        assert_eq!(to_line_col("{{ x }}", 3), (1, 4));
    }

    #[test]
    fn to_line_col_after_newline() {
        let source = "lorem\nipsum {{ x }}";
        assert_eq!(to_line_col(source, 6), (2, 1));
        assert_eq!(to_line_col(source, 15), (2, 10));
    }

    #[test]
    fn to_line_col_end_of_input() {
        assert_eq!(to_line_col("ab\n", 3), (2, 1));
        assert_eq!(to_line_col("ab", 99), (1, 3));
    }

    #[test]
    fn error_display_with_location() {
        let err = Error::render("variable 'x' not found", "lorem {{ x }}", 9..10);
        assert_eq!(
            err.to_string(),
            "render error: variable 'x' not found at 1:10"
        );
        assert_eq!(err.location(), Some((1, 10)));
        assert_eq!(err.kind(), ErrorKind::Render);
    }

    #[test]
    fn error_display_pretty() {
        let err = Error::syntax("unexpected token", "lorem\n{{ ) }}", 9..10)
            .with_template_name("test");
        assert_eq!(
            format!("{err:#}"),
            "\n  --> test:2:4\n   |\n 2 | {{ ) }}\n   |    ^ unexpected token\n"
        );
    }

    #[test]
    fn error_enrich_keeps_first_location() {
        let err = Error::value("expected string")
            .enrich("{{ upper(1) }}", Span::from(3..8))
            .enrich("other", Span::from(0..1));
        assert_eq!(err.location(), Some((1, 4)));
        assert_eq!(err.kind(), ErrorKind::Value);
    }
}
