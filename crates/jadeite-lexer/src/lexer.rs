use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;

use crate::attributes;
use crate::token::{Token, TokenKind};
use crate::LexError;

/// Number of spaces per indentation level.
pub const INDENT_WIDTH: usize = 2;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w[:\w-]*)").expect("valid tag pattern"));
static FILTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:(\w+)").expect("valid filter pattern"));
static CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(!?=|-)([^\n]+)").expect("valid code pattern"));
static DOCTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!!! *([\w.]+)?").expect("valid doctype pattern"));
static ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([\w-]+)").expect("valid id pattern"));
static CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.([\w-]+)").expect("valid class pattern"));
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ *//(-)?([^\n]+)?").expect("valid comment pattern"));

/// Template lexer.
///
/// Pull-based: every call to [`Lexer::next`] scans exactly one token off the
/// front of the remaining input. Indentation is tracked as a single level
/// counter, which is sound because a line may only ever go one level deeper
/// than the line before it.
///
/// Token order on each call:
/// 1. stashed tokens (filled by [`Lexer::peek`] or [`Lexer::stash`]),
/// 2. deferred tokens (synthetic tokens queued by [`Lexer::defer`] or by
///    multi-level outdents),
/// 3. end of source (one `Outdent` per open level, then `Eos`),
/// 4. the scanners, in priority order: tag, filter, code, doctype, id,
///    class, attributes, indentation, comment, text.
pub struct Lexer {
    input: String,
    pos: usize,
    line: usize,
    last_indents: usize,
    stash: VecDeque<Token>,
    deferred: VecDeque<Token>,
}

impl Lexer {
    /// Create a lexer for the given source.
    /// Line endings are normalised to `\n` and tabs expanded to one level.
    pub fn new(source: &str) -> Self {
        let input = source
            .replace("\r\n", "\n")
            .replace('\r', "\n")
            .replace('\t', &" ".repeat(INDENT_WIDTH));

        Self {
            input,
            pos: 0,
            line: 1,
            last_indents: 0,
            stash: VecDeque::new(),
            deferred: VecDeque::new(),
        }
    }

    /// Tokenize the entire source into a vector of tokens, ending with `Eos`.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();

        loop {
            let token = lexer.next()?;
            let done = token.kind == TokenKind::Eos;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Current source line.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Return the next token, consuming it.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Token, LexError> {
        if let Some(token) = self.stash.pop_front() {
            return Ok(token);
        }
        self.advance()
    }

    /// Look `n` tokens ahead (`n >= 1`) without consuming anything.
    pub fn peek(&mut self, n: usize) -> Result<&Token, LexError> {
        let n = n.max(1);
        while self.stash.len() < n {
            let token = self.advance()?;
            self.stash.push_back(token);
        }
        Ok(&self.stash[n - 1])
    }

    /// Push a token back so that it is returned by the next call to `next`.
    pub fn stash(&mut self, token: Token) {
        self.stash.push_front(token);
    }

    /// Queue a token to be returned before any newly scanned token.
    /// Deferred tokens come out in the order they were deferred.
    pub fn defer(&mut self, token: Token) {
        self.deferred.push_back(token);
    }

    /// Produce the next token from the deferred queue or the input.
    fn advance(&mut self) -> Result<Token, LexError> {
        if let Some(token) = self.deferred.pop_front() {
            return Ok(token);
        }

        let token = match self.scan_eos() {
            Some(token) => token,
            None => self.scan()?,
        };
        tracing::trace!(kind = token.kind.name(), line = token.line, "token");
        Ok(token)
    }

    /// Run the scanners in priority order; the first match wins.
    fn scan(&mut self) -> Result<Token, LexError> {
        if let Some(token) = self.scan_tag() {
            return Ok(token);
        }
        if let Some(token) = self.scan_filter() {
            return Ok(token);
        }
        if let Some(token) = self.scan_code() {
            return Ok(token);
        }
        if let Some(token) = self.scan_doctype() {
            return Ok(token);
        }
        if let Some(token) = self.scan_id() {
            return Ok(token);
        }
        if let Some(token) = self.scan_class() {
            return Ok(token);
        }
        if let Some(token) = self.scan_attributes()? {
            return Ok(token);
        }
        if let Some(token) = self.scan_indentation()? {
            return Ok(token);
        }
        if let Some(token) = self.scan_comment() {
            return Ok(token);
        }
        Ok(self.scan_text())
    }

    // --- Scanners ---

    /// Once the input is exhausted: one `Outdent` per open level, then `Eos`.
    fn scan_eos(&mut self) -> Option<Token> {
        if !self.rest().is_empty() {
            return None;
        }

        if self.last_indents > 0 {
            self.last_indents -= 1;
            Some(self.token(TokenKind::Outdent))
        } else {
            Some(self.token(TokenKind::Eos))
        }
    }

    fn scan_tag(&mut self) -> Option<Token> {
        let name = self.capture(&TAG)?;
        Some(self.token(TokenKind::Tag(name)))
    }

    fn scan_filter(&mut self) -> Option<Token> {
        let name = self.capture(&FILTER)?;
        Some(self.token(TokenKind::Filter(name)))
    }

    fn scan_doctype(&mut self) -> Option<Token> {
        let caps = DOCTYPE.captures(self.rest())?;
        let len = caps[0].len();
        let version = caps.get(1).map(|m| m.as_str().to_string());
        self.consume(len);
        Some(self.token(TokenKind::Doctype(version)))
    }

    fn scan_id(&mut self) -> Option<Token> {
        let id = self.capture(&ID)?;
        Some(self.token(TokenKind::Id(id)))
    }

    fn scan_class(&mut self) -> Option<Token> {
        let class = self.capture(&CLASS)?;
        Some(self.token(TokenKind::Class(class)))
    }

    /// `-` is a statement, `=` and `!=` are buffered (output) forms.
    fn scan_code(&mut self) -> Option<Token> {
        let caps = CODE.captures(self.rest())?;
        let len = caps[0].len();
        let buffered = caps[1].contains('=');
        let code = caps[2].to_string();
        self.consume(len);
        Some(self.token(TokenKind::Code { code, buffered }))
    }

    /// `//` is buffered (rendered), `//-` is silent.
    fn scan_comment(&mut self) -> Option<Token> {
        let caps = COMMENT.captures(self.rest())?;
        let len = caps[0].len();
        let buffered = caps.get(1).is_none();
        let text = caps.get(2).map_or(String::new(), |m| m.as_str().to_string());
        self.consume(len);
        Some(self.token(TokenKind::Comment { text, buffered }))
    }

    fn scan_attributes(&mut self) -> Result<Option<Token>, LexError> {
        if !self.rest().starts_with('(') {
            return Ok(None);
        }

        let end = attributes::closing_paren(self.rest())
            .ok_or(LexError::UnclosedAttributes { line: self.line })?;
        let raw = self.rest()[1..end].to_string();
        let parsed = attributes::parse(&raw);
        self.consume(end + 1);

        Ok(Some(self.token(TokenKind::Attributes {
            raw,
            attributes: parsed,
        })))
    }

    /// Handle a newline and the indentation run of the following line.
    fn scan_indentation(&mut self) -> Result<Option<Token>, LexError> {
        if !self.rest().starts_with('\n') {
            return Ok(None);
        }

        let spaces = self.rest()[1..].bytes().take_while(|b| *b == b' ').count();
        self.line += 1;
        self.consume(1 + spaces);

        // Whitespace-only lines never change the level
        if self.rest().is_empty() || self.rest().starts_with('\n') {
            return Ok(Some(self.token(TokenKind::Newline)));
        }

        if spaces % INDENT_WIDTH != 0 {
            return Err(LexError::InvalidIndentation {
                line: self.line,
                spaces,
            });
        }

        let indents = spaces / INDENT_WIDTH;
        let kind = if indents == self.last_indents {
            TokenKind::Newline
        } else if indents == self.last_indents + 1 {
            TokenKind::Indent
        } else if indents > self.last_indents + 1 {
            return Err(LexError::UnexpectedIndent {
                line: self.line,
                expected: self.last_indents + 1,
                got: indents,
            });
        } else {
            for _ in 1..self.last_indents - indents {
                let outdent = self.token(TokenKind::Outdent);
                self.defer(outdent);
            }
            TokenKind::Outdent
        };

        self.last_indents = indents;
        Ok(Some(self.token(kind)))
    }

    /// Text runs to the end of the line. A leading `|` and one space are dropped.
    fn scan_text(&mut self) -> Token {
        let rest = self.rest();
        let line_len = rest.find('\n').unwrap_or(rest.len());
        let line = &rest[..line_len];
        let text = line.strip_prefix('|').unwrap_or(line);
        let text = text.strip_prefix(' ').unwrap_or(text).to_string();
        self.consume(line_len);
        self.token(TokenKind::Text(text))
    }

    // --- Helpers ---

    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn consume(&mut self, len: usize) {
        self.pos += len;
    }

    /// Match `regex` at the cursor, consume the match and return group 1.
    fn capture(&mut self, regex: &Regex) -> Option<String> {
        let caps = regex.captures(self.rest())?;
        let len = caps[0].len();
        let value = caps[1].to_string();
        self.consume(len);
        Some(value)
    }

    fn token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.line)
    }
}
