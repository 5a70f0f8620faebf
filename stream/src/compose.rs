//! Fixed compositions of the primitive reads.

use std::io::BufRead;

use kjudge_bounds::{IntervalSet, Real};

use crate::{charset::Atom, error::Result, stream::StrictStream};

const SPACE: [Atom; 1] = [Atom::Char(' ')];
const NEWLINE: [Atom; 1] = [Atom::Char('\n')];
const EOF: [Atom; 1] = [Atom::Eof];

impl<R: BufRead> StrictStream<R> {
    pub fn read_space(&mut self) -> Result<()> {
        self.read_char(&SPACE).map(drop)
    }

    pub fn read_eoln(&mut self) -> Result<()> {
        self.read_char(&NEWLINE).map(drop)
    }

    pub fn read_eof(&mut self) -> Result<()> {
        self.read_char(&EOF).map(drop)
    }

    pub fn read_token_then_space(&mut self) -> Result<String> {
        let token = self.read_token()?;
        self.read_space()?;
        Ok(token)
    }

    pub fn read_token_then_newline(&mut self) -> Result<String> {
        let token = self.read_token()?;
        self.read_eoln()?;
        Ok(token)
    }

    pub fn read_int_then_space(&mut self, range: Option<&IntervalSet<i64>>) -> Result<i64> {
        let v = self.read_int(range)?;
        self.read_space()?;
        Ok(v)
    }

    pub fn read_int_then_newline(&mut self, range: Option<&IntervalSet<i64>>) -> Result<i64> {
        let v = self.read_int(range)?;
        self.read_eoln()?;
        Ok(v)
    }

    pub fn read_real_then_space(&mut self, range: Option<&IntervalSet<Real>>) -> Result<f64> {
        let v = self.read_real(range)?;
        self.read_space()?;
        Ok(v)
    }

    pub fn read_real_then_newline(&mut self, range: Option<&IntervalSet<Real>>) -> Result<f64> {
        let v = self.read_real(range)?;
        self.read_eoln()?;
        Ok(v)
    }

    /// Reads `n` space-separated integers followed by a newline.
    pub fn read_ints_then_newline(
        &mut self,
        n: usize,
        range: Option<&IntervalSet<i64>>,
    ) -> Result<Vec<i64>> {
        let mut values = Vec::with_capacity(n);
        for i in 0..n {
            values.push(self.read_int(range)?);
            if i + 1 < n {
                self.read_space()?;
            }
        }
        self.read_eoln()?;
        Ok(values)
    }
}
