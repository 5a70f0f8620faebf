use std::io::BufRead;

use kjudge_bounds::{IntervalSet, Real};

use crate::{
    charset::{Atom, CharSet, TokenSpec},
    error::{Cause, Error, ErrorKind, Result, Side},
    literal,
    options::StreamOptions,
};

/// Buffered lines before the oldest live cursor are dropped once there are more than this many.
const COMPACT_THRESHOLD: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Cursor {
    line: usize,
    /// Byte offset, always on a char boundary and before the end of the line.
    col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadKey {
    Line,
    Token(TokenSpec),
    Char(Vec<Atom>),
}

#[derive(Debug, Clone)]
enum Peeked {
    Text(String),
    Atom(Atom),
}

/// Result of a peek, waiting for the read that consumes it.
#[derive(Debug)]
struct Frozen {
    key: ReadKey,
    value: Peeked,
    after: Cursor,
}

/// A line-buffered scanner that enforces an exact character-level grammar.
///
/// Every read either succeeds and advances, or fails with an [`Error`] tagged
/// with the stream's [`ErrorKind`] and [`Side`]. Peeks never advance; the next
/// matching read reuses the peeked value.
pub struct StrictStream<R> {
    source: R,
    options: StreamOptions,
    kind: ErrorKind,
    side: Side,

    lines: Vec<String>,
    base: usize,
    source_done: bool,
    last_terminated: Option<bool>,

    pos: Cursor,
    checkpoint: Option<Cursor>,
    frozen: Option<Frozen>,
}

impl<R: BufRead> StrictStream<R> {
    pub fn new(source: R, options: impl Into<StreamOptions>, kind: ErrorKind, side: Side) -> Self {
        Self {
            source,
            options: options.into(),
            kind,
            side,
            lines: Vec::new(),
            base: 0,
            source_done: false,
            last_terminated: None,
            pos: Cursor { line: 0, col: 0 },
            checkpoint: None,
            frozen: None,
        }
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 1-based line and column of the cursor.
    pub fn position(&self) -> (usize, usize) {
        let col = if self.is_buffered(self.pos.line) {
            self.line_at(self.pos.line)[..self.pos.col].chars().count() + 1
        } else {
            1
        };
        (self.pos.line + 1, col)
    }

    /// An error of this stream's kind at the cursor.
    pub fn error(&self, cause: Cause) -> Error {
        self.error_of(self.kind, cause, false)
    }

    fn exhausted(&self, cause: Cause) -> Error {
        self.error_of(self.kind, cause, true)
    }

    fn internal(&self, cause: Cause) -> Error {
        self.error_of(ErrorKind::StreamError, cause, false)
    }

    fn error_of(&self, kind: ErrorKind, cause: Cause, exhausted: bool) -> Error {
        let (line, col) = self.position();
        Error {
            kind,
            side: self.side,
            line,
            col,
            exhausted,
            cause,
        }
    }

    fn is_buffered(&self, line: usize) -> bool {
        line >= self.base && line < self.base + self.lines.len()
    }

    fn line_at(&self, line: usize) -> &str {
        &self.lines[line - self.base]
    }

    /// Makes sure `line` is buffered. Returns false when the input ends before it.
    fn fetch(&mut self, line: usize) -> Result<bool> {
        while self.base + self.lines.len() <= line {
            if self.source_done {
                return Ok(false);
            }
            let mut buf = String::new();
            match self.source.read_line(&mut buf) {
                Ok(0) => self.source_done = true,
                Ok(_) => {
                    self.last_terminated = Some(buf.ends_with('\n'));
                    self.lines.push(buf);
                }
                Err(e) => return Err(self.internal(Cause::Io(e))),
            }
        }
        Ok(true)
    }

    fn fetch_all(&mut self) -> Result<()> {
        while self.fetch(self.base + self.lines.len())? {}
        Ok(())
    }

    fn current(&mut self) -> Result<Option<char>> {
        if !self.fetch(self.pos.line)? {
            return Ok(None);
        }
        Ok(self.line_at(self.pos.line)[self.pos.col..].chars().next())
    }

    fn advance(&mut self, c: char) {
        self.pos.col += c.len_utf8();
        if self.pos.col >= self.line_at(self.pos.line).len() {
            self.pos = Cursor {
                line: self.pos.line + 1,
                col: 0,
            };
        }
    }

    fn skip_while(&mut self, mut pred: impl FnMut(char) -> bool) -> Result<()> {
        while let Some(c) = self.current()? {
            if !pred(c) {
                break;
            }
            self.advance(c);
        }
        Ok(())
    }

    fn compact(&mut self) {
        let oldest = self
            .checkpoint
            .map_or(self.pos.line, |c| c.line.min(self.pos.line));
        let droppable = oldest.saturating_sub(self.base).min(self.lines.len());
        if droppable > COMPACT_THRESHOLD {
            self.lines.drain(..droppable);
            self.base += droppable;
            log::trace!("{} stream: dropped {} buffered lines", self.side, droppable);
        }
    }

    fn is_blank(&self, text: &str) -> bool {
        let body = text.strip_suffix('\n').unwrap_or(text);
        if self.options.line_ignore_trailing_spaces || self.options.token_skip_spaces {
            body.trim_end_matches(' ').is_empty()
        } else {
            body.is_empty()
        }
    }

    /// Steps over the spaces a token or line read would skip from `at`.
    fn past_spaces(&self, at: Cursor) -> Cursor {
        if !(self.options.token_skip_spaces || self.options.line_ignore_trailing_spaces) {
            return at;
        }
        let text = self.line_at(at.line);
        let skipped = text[at.col..].bytes().take_while(|&b| b == b' ').count();
        if at.col + skipped >= text.len() {
            return at;
        }
        Cursor {
            col: at.col + skipped,
            ..at
        }
    }

    /// The first position from which the rest of the input is not ignorable,
    /// or `None` when only ignorable blank content remains.
    fn first_unread(&mut self) -> Result<Option<Cursor>> {
        let lenient = self.options.ignore_blank_lines || self.options.ignore_trailing_blank_lines;
        let mut line = self.pos.line;
        if self.pos.col > 0 {
            let tail = &self.line_at(line)[self.pos.col..];
            if !(lenient && self.is_blank(tail)) {
                return Ok(Some(self.past_spaces(self.pos)));
            }
            line += 1;
        }
        while self.fetch(line)? {
            if !(lenient && self.is_blank(self.line_at(line))) {
                return Ok(Some(self.past_spaces(Cursor { line, col: 0 })));
            }
            line += 1;
        }
        Ok(None)
    }

    /// True when only ignorable content is left.
    pub fn at_end(&mut self) -> Result<bool> {
        Ok(self.first_unread()?.is_none())
    }

    fn take_peeked(&mut self, key: &ReadKey) -> Option<Peeked> {
        match self.frozen.take() {
            Some(f) if &f.key == key => {
                self.pos = f.after;
                Some(f.value)
            }
            _ => None,
        }
    }

    pub fn checkpoint(&mut self) -> Result<()> {
        if self.checkpoint.is_some() {
            return Err(self.internal(Cause::CheckpointOpen));
        }
        self.checkpoint = Some(self.pos);
        Ok(())
    }

    /// Returns to the open checkpoint and closes it.
    pub fn rollback(&mut self) -> Result<()> {
        let Some(saved) = self.checkpoint.take() else {
            return Err(self.internal(Cause::NoCheckpoint));
        };
        self.pos = saved;
        self.frozen = None;
        Ok(())
    }

    /// Closes the open checkpoint, keeping everything read since.
    pub fn commit(&mut self) -> Result<()> {
        if self.checkpoint.take().is_none() {
            return Err(self.internal(Cause::NoCheckpoint));
        }
        self.compact();
        Ok(())
    }

    /// Runs `read` and then puts the cursor back where it was, whatever the outcome.
    pub fn probe<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let outer = self.checkpoint.is_some();
        let saved = self.pos;
        if !outer {
            self.checkpoint = Some(saved);
        }
        let result = read(self);
        self.pos = saved;
        if !outer {
            self.checkpoint = None;
        }
        result
    }

    fn peek_with(
        &mut self,
        key: ReadKey,
        read: impl FnOnce(&mut Self) -> Result<Peeked>,
    ) -> Result<Peeked> {
        if let Some(f) = &self.frozen {
            if f.key == key {
                return Ok(f.value.clone());
            }
        }
        self.frozen = None;
        let (value, after) = self.probe(|s| {
            let value = read(s)?;
            Ok((value, s.pos))
        })?;
        self.frozen = Some(Frozen {
            key,
            value: value.clone(),
            after,
        });
        Ok(value)
    }

    pub fn read_line(&mut self) -> Result<String> {
        if let Some(Peeked::Text(line)) = self.take_peeked(&ReadKey::Line) {
            return Ok(line);
        }
        if self.options.ignore_blank_lines && self.pos.col == 0 {
            while self.fetch(self.pos.line)? && self.is_blank(self.line_at(self.pos.line)) {
                self.pos.line += 1;
            }
        }
        if !self.fetch(self.pos.line)? {
            return Err(self.exhausted(Cause::NoLine));
        }
        let raw = &self.line_at(self.pos.line)[self.pos.col..];
        let (body, terminated) = match raw.strip_suffix('\n') {
            Some(body) => (body, true),
            None => (raw, false),
        };
        let body = if self.options.line_ignore_trailing_spaces {
            body.trim_end_matches(' ')
        } else {
            body
        };
        let mut line = body.to_owned();
        if terminated && self.options.line_include_terminators {
            line.push('\n');
        }
        self.pos = Cursor {
            line: self.pos.line + 1,
            col: 0,
        };
        self.compact();
        Ok(line)
    }

    pub fn peek_line(&mut self) -> Result<String> {
        match self.peek_with(ReadKey::Line, |s| s.read_line().map(Peeked::Text))? {
            Peeked::Text(line) => Ok(line),
            Peeked::Atom(_) => Err(self.internal(Cause::NoLine)),
        }
    }

    pub fn has_next_line(&mut self) -> Result<bool> {
        Ok(!self.at_end()?)
    }

    /// Reads a whitespace-delimited token.
    pub fn read_token(&mut self) -> Result<String> {
        self.read_token_with(&TokenSpec::default())
    }

    pub fn read_token_with(&mut self, spec: &TokenSpec) -> Result<String> {
        if let Some(Peeked::Text(token)) = self.take_peeked(&ReadKey::Token(spec.clone())) {
            return Ok(token);
        }
        let o = self.options;
        self.skip_while(|c| {
            (c == ' ' && o.token_skip_spaces) || (c == '\n' && o.token_skip_terminators)
        })?;

        let mut token = String::new();
        while let Some(c) = self.current()? {
            let outside = spec.charset.map_or(false, |set| !set.contains(c));
            if c == '\n' || spec.ends.contains(c) || outside {
                break;
            }
            token.push(c);
            self.advance(c);
        }
        if token.is_empty() {
            let at_eof = self.current()?.is_none();
            return Err(self.error_of(self.kind, Cause::NoToken, at_eof));
        }
        if let Some(len) = &spec.len {
            let n = token.chars().count();
            if !len.contains(&(n as i64)) {
                return Err(self.error(Cause::TokenLength {
                    len: n,
                    allowed: len.to_string(),
                }));
            }
        }
        self.compact();
        Ok(token)
    }

    pub fn peek_token(&mut self) -> Result<String> {
        let spec = TokenSpec::default();
        let key = ReadKey::Token(spec.clone());
        match self.peek_with(key, |s| s.read_token_with(&spec).map(Peeked::Text))? {
            Peeked::Text(token) => Ok(token),
            Peeked::Atom(_) => Err(self.internal(Cause::NoToken)),
        }
    }

    /// True if another whitespace-delimited token can be read.
    pub fn has_next(&mut self) -> Result<bool> {
        if let Some(f) = &self.frozen {
            if f.key == ReadKey::Token(TokenSpec::default()) {
                return Ok(true);
            }
        }
        match self.probe(|s| s.read_token()) {
            Ok(_) => Ok(true),
            Err(e) if e.is_no_match() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Reads exactly one of `targets`.
    pub fn read_char(&mut self, targets: &[Atom]) -> Result<Atom> {
        if let Some(Peeked::Atom(atom)) = self.take_peeked(&ReadKey::Char(targets.to_vec())) {
            return Ok(atom);
        }
        let wants_terminator = targets.contains(&Atom::Char('\n')) || targets.contains(&Atom::Eof);
        if wants_terminator
            && self.options.terminator_skip_spaces
            && !targets.contains(&Atom::Char(' '))
        {
            self.skip_while(|c| c == ' ')?;
        }
        let found = self.current()?;
        match found {
            Some(c) if targets.contains(&Atom::Char(c)) => {
                self.advance(c);
                self.compact();
                return Ok(Atom::Char(c));
            }
            None if targets.contains(&Atom::Eof) => return Ok(Atom::Eof),
            Some(_) if targets.contains(&Atom::Eof) && self.at_end()? => {
                self.fetch_all()?;
                self.pos = Cursor {
                    line: self.base + self.lines.len(),
                    col: 0,
                };
                self.compact();
                return Ok(Atom::Eof);
            }
            _ => {}
        }
        let expected = targets
            .iter()
            .map(Atom::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        let found_text = found.map_or(Atom::Eof, Atom::Char).to_string();
        Err(self.error_of(
            self.kind,
            Cause::NoChar {
                expected,
                found: found_text,
            },
            found.is_none(),
        ))
    }

    pub fn peek_char(&mut self, targets: &[Atom]) -> Result<Atom> {
        let key = ReadKey::Char(targets.to_vec());
        match self.peek_with(key, |s| s.read_char(targets).map(Peeked::Atom))? {
            Peeked::Atom(atom) => Ok(atom),
            Peeked::Text(_) => Err(self.internal(Cause::NoChar {
                expected: String::new(),
                found: String::new(),
            })),
        }
    }

    pub fn read_int(&mut self, range: Option<&IntervalSet<i64>>) -> Result<i64> {
        let token = self.read_token_with(&TokenSpec::new().charset(CharSet::IntLiteral))?;
        let Some(value) = literal::parse_int(&token, self.options.validate_on_parse) else {
            return Err(self.error(Cause::InvalidLiteral {
                what: "integer",
                token,
            }));
        };
        if let Some(range) = range {
            if !range.contains(&value) {
                return Err(self.error(Cause::OutOfRange {
                    value: value.to_string(),
                    allowed: range.to_string(),
                }));
            }
        }
        Ok(value)
    }

    pub fn read_real(&mut self, range: Option<&IntervalSet<Real>>) -> Result<f64> {
        let token = self.read_token_with(&TokenSpec::new().charset(CharSet::RealLiteral))?;
        let Some(value) = literal::parse_real(&token, self.options.validate_on_parse) else {
            return Err(self.error(Cause::InvalidLiteral { what: "real", token }));
        };
        if let Some(range) = range {
            if !Real::new(value).map_or(false, |v| range.contains(&v)) {
                return Err(self.error(Cause::OutOfRange {
                    value: value.to_string(),
                    allowed: range.to_string(),
                }));
            }
        }
        Ok(value)
    }

    /// Finishes the stream, checking that nothing but ignorable content is left.
    pub fn close(mut self) -> Result<()> {
        self.frozen = None;
        self.checkpoint = None;
        if !self.options.extra_chars_allowed {
            if let Some(at) = self.first_unread()? {
                self.pos = at;
                return Err(self.error(Cause::ExtraChars));
            }
        }
        if self.options.require_trailing_terminator {
            self.fetch_all()?;
            if self.last_terminated == Some(false) {
                self.pos = Cursor {
                    line: self.base + self.lines.len() - 1,
                    col: 0,
                };
                return Err(self.error(Cause::MissingTerminator));
            }
        }
        Ok(())
    }
}
