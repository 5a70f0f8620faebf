use std::fmt;

use kjudge_bounds::IntervalSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharSet {
    /// Space, tab, carriage return and newline.
    Whitespace,
    Space,
    Digits,
    IntLiteral,
    RealLiteral,
    OneOf(&'static str),
}

impl CharSet {
    pub fn contains(self, c: char) -> bool {
        match self {
            CharSet::Whitespace => matches!(c, ' ' | '\t' | '\r' | '\n'),
            CharSet::Space => c == ' ',
            CharSet::Digits => c.is_ascii_digit(),
            CharSet::IntLiteral => c.is_ascii_digit() || c == '-' || c == '+',
            CharSet::RealLiteral => c.is_ascii_digit() || matches!(c, '-' | '+' | '.'),
            CharSet::OneOf(chars) => chars.contains(c),
        }
    }
}

/// A single-character read target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Atom {
    Char(char),
    Eof,
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Char(c) => write!(f, "{:?}", c),
            Atom::Eof => f.write_str("EOF"),
        }
    }
}

/// What a token read accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpec {
    /// Characters that end the token. A newline always ends it.
    pub ends: CharSet,
    /// When set, the token stops at the first character outside this set.
    pub charset: Option<CharSet>,
    pub len: Option<IntervalSet<i64>>,
}

impl Default for TokenSpec {
    fn default() -> Self {
        Self {
            ends: CharSet::Whitespace,
            charset: None,
            len: None,
        }
    }
}

impl TokenSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ends(mut self, ends: CharSet) -> Self {
        self.ends = ends;
        self
    }

    pub fn charset(mut self, charset: CharSet) -> Self {
        self.charset = Some(charset);
        self
    }

    pub fn len(mut self, len: impl Into<IntervalSet<i64>>) -> Self {
        self.len = Some(len.into());
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_charsets() {
        assert!(CharSet::Whitespace.contains('\t'));
        assert!(!CharSet::Space.contains('\n'));
        assert!(CharSet::IntLiteral.contains('-'));
        assert!(!CharSet::IntLiteral.contains('.'));
        assert!(CharSet::RealLiteral.contains('.'));
        assert!(CharSet::OneOf("LR").contains('R'));
        assert!(!CharSet::OneOf("LR").contains('U'));
    }
}
