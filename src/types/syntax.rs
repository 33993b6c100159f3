/// The template syntax configuration.
///
/// Use [`Syntax::default()`] to get the default syntax configuration and
/// [`Syntax::builder()`] to create a custom syntax configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    /// The configured open sequences, longest first.
    pub(crate) openers: Vec<(Kind, String)>,
    pub(crate) expr_close: String,
    pub(crate) block_close: String,
    pub(crate) comment_close: String,
    pub(crate) trim_blocks: bool,
    pub(crate) lstrip_blocks: bool,
    pub(crate) notation: Notation,
}

/// A builder for the syntax configuration.
///
/// This struct is typically created using [`Syntax::builder()`].
#[derive(Debug, Clone)]
pub struct SyntaxBuilder {
    expr: Option<(String, String)>,
    block: Option<(String, String)>,
    line: Option<String>,
    comment: Option<(String, String)>,
    trim_blocks: bool,
    lstrip_blocks: bool,
    notation: Notation,
}

/// How variable names in templates address into the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Notation {
    /// Path segments are separated by dots, e.g. `user.names.0`.
    #[default]
    Dot,
    /// Names are JSON pointers without the leading slash, e.g. `user/names/0`.
    Pointer,
}

/// The kind of an open sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Expr,
    Block,
    Line,
    Comment,
}

impl Default for Syntax {
    /// Returns the default syntax configuration.
    ///
    /// This is equivalent to the following.
    /// ```
    /// use tessera::Syntax;
    ///
    /// let syntax = Syntax::builder()
    ///     .expr("{{", "}}")
    ///     .block("{%", "%}")
    ///     .line_statement("##")
    ///     .comment("{#", "#}")
    ///     .build();
    /// assert_eq!(syntax, Syntax::default());
    /// ```
    #[inline]
    fn default() -> Self {
        Syntax::builder()
            .expr("{{", "}}")
            .block("{%", "%}")
            .line_statement("##")
            .comment("{#", "#}")
            .build()
    }
}

impl Syntax {
    /// Create a new syntax builder.
    ///
    /// # Examples
    ///
    /// ```
    /// let syntax = tessera::Syntax::builder()
    ///     .expr("<{", "}>")
    ///     .block("<[", "]>")
    ///     .build();
    /// ```
    #[inline]
    pub fn builder() -> SyntaxBuilder {
        SyntaxBuilder::new()
    }

    /// Returns the close sequence for the given kind of tag.
    pub(crate) fn close(&self, kind: Kind) -> &str {
        match kind {
            Kind::Expr => &self.expr_close,
            Kind::Block => &self.block_close,
            Kind::Comment => &self.comment_close,
            Kind::Line => "\n",
        }
    }
}

impl SyntaxBuilder {
    /// Creates a new syntax builder.
    #[inline]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            expr: None,
            block: None,
            line: None,
            comment: None,
            trim_blocks: false,
            lstrip_blocks: false,
            notation: Notation::Dot,
        }
    }

    /// Set the expression syntax.
    ///
    /// If not set then the expression syntax will not be available.
    ///
    /// # Panics
    ///
    /// If either of the strings are empty.
    #[inline]
    pub fn expr(&mut self, begin_expr: &str, end_expr: &str) -> &mut Self {
        assert!(!begin_expr.is_empty() && !end_expr.is_empty());
        self.expr = Some((begin_expr.into(), end_expr.into()));
        self
    }

    /// Set the statement block syntax.
    ///
    /// If not set then the block syntax will not be available.
    ///
    /// # Panics
    ///
    /// If either of the strings are empty.
    #[inline]
    pub fn block(&mut self, begin_block: &str, end_block: &str) -> &mut Self {
        assert!(!begin_block.is_empty() && !end_block.is_empty());
        self.block = Some((begin_block.into(), end_block.into()));
        self
    }

    /// Set the line statement prefix.
    ///
    /// A line statement is only recognized at the very start of a line and
    /// ends at the end of that line.
    ///
    /// # Panics
    ///
    /// If the string is empty.
    #[inline]
    pub fn line_statement(&mut self, begin_line: &str) -> &mut Self {
        assert!(!begin_line.is_empty());
        self.line = Some(begin_line.into());
        self
    }

    /// Set the comment syntax.
    ///
    /// If not set then comment syntax will not be available.
    ///
    /// # Panics
    ///
    /// If either of the strings are empty.
    #[inline]
    pub fn comment(&mut self, begin_comment: &str, end_comment: &str) -> &mut Self {
        assert!(!begin_comment.is_empty() && !end_comment.is_empty());
        self.comment = Some((begin_comment.into(), end_comment.into()));
        self
    }

    /// Remove the first newline after a block or comment.
    #[inline]
    pub fn trim_blocks(&mut self, yes: bool) -> &mut Self {
        self.trim_blocks = yes;
        self
    }

    /// Strip spaces and tabs from the start of a line up to a block or
    /// comment.
    #[inline]
    pub fn lstrip_blocks(&mut self, yes: bool) -> &mut Self {
        self.lstrip_blocks = yes;
        self
    }

    /// Set how variable names are resolved.
    #[inline]
    pub fn notation(&mut self, notation: Notation) -> &mut Self {
        self.notation = notation;
        self
    }

    /// Builds the syntax configuration.
    pub fn build(&self) -> Syntax {
        let mut openers = Vec::new();
        let mut close = |pair: &Option<(String, String)>, kind| match pair {
            Some((begin, end)) => {
                openers.push((kind, begin.clone()));
                end.clone()
            }
            None => String::new(),
        };
        let expr_close = close(&self.expr, Kind::Expr);
        let block_close = close(&self.block, Kind::Block);
        let comment_close = close(&self.comment, Kind::Comment);
        if let Some(begin) = &self.line {
            openers.push((Kind::Line, begin.clone()));
        }
        // Longer open sequences take priority over their prefixes.
        openers.sort_by(|(_, a), (_, b)| b.len().cmp(&a.len()));
        Syntax {
            openers,
            expr_close,
            block_close,
            comment_close,
            trim_blocks: self.trim_blocks,
            lstrip_blocks: self.lstrip_blocks,
            notation: self.notation,
        }
    }
}
