//! Checkers that need no problem-specific code.

use kjudge_stream::StreamMode;

use super::{
    checker::{Checker, CheckerBuilder, Stream},
    HarnessError,
};
use crate::verdict::{JudgeError, JudgeResult};

fn all_tokens(s: &mut Stream) -> JudgeResult<Vec<String>> {
    let mut tokens = Vec::new();
    while s.has_next()? {
        tokens.push(s.read_token()?);
    }
    Ok(tokens)
}

fn abbreviate(token: &str) -> String {
    const MAX: usize = 32;
    if token.chars().count() <= MAX {
        format!("{:?}", token)
    } else {
        let head: String = token.chars().take(MAX).collect();
        format!("{:?}...", head)
    }
}

/// Compares whitespace-separated tokens of the output with the judge data.
/// The input is not read.
pub fn tokens() -> Result<Checker<(), Vec<String>, Vec<String>>, HarnessError> {
    CheckerBuilder::new()
        .input_options(StreamMode::Tokens.options().extra_chars_allowed(true))
        .require_input(false)
        .get_one_input(|_| Ok(()))
        .get_output_for_input(|s, _| all_tokens(s))
        .get_judge_data_for_input(|s, _| all_tokens(s))
        .score_one(|_, output, expected| compare(output, expected))
        .build()
}

fn compare(output: &[String], expected: &[String]) -> JudgeResult<f64> {
    for (i, (o, e)) in output.iter().zip(expected).enumerate() {
        if o != e {
            return Err(JudgeError::wrong(format!(
                "token {}: expected {}, found {}",
                i + 1,
                abbreviate(e),
                abbreviate(o)
            )));
        }
    }
    if output.len() != expected.len() {
        return Err(JudgeError::wrong(format!(
            "expected {} tokens, found {}",
            expected.len(),
            output.len()
        )));
    }
    Ok(1.0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{harness::checker::Source, verdict::Verdict};

    fn run(input: &'static str, output: &'static str, judge: &'static str) -> JudgeResult<f64> {
        let src = |t: &'static str| -> Source { Box::new(t.as_bytes()) };
        tokens().unwrap().check(src(input), src(output), Some(src(judge)))
    }

    #[test]
    fn ignores_layout() {
        assert_eq!(run("whatever", "1  2\n3\n\n", "1 2 3\n").unwrap(), 1.0);
        assert_eq!(run("1", "yes\n", "yes").unwrap(), 1.0);
    }

    #[test]
    fn reports_first_difference() {
        let e = run("1", "1 2 4\n", "1 2 3\n").unwrap_err();
        assert_eq!(e.verdict(), Verdict::Wrong);
        assert_eq!(e.to_string(), r#"token 3: expected "3", found "4""#);

        let e = run("1", "1 2\n", "1 2 3\n").unwrap_err();
        assert_eq!(e.to_string(), "expected 3 tokens, found 2");

        let long = "x".repeat(40);
        assert_eq!(abbreviate(&long), format!("{:?}...", "x".repeat(32)));
    }

    #[test]
    fn empty_input_is_fine() {
        assert_eq!(run("", "hi\n", "hi\n").unwrap(), 1.0);
    }

    #[test]
    fn empty_output_is_a_parse_error() {
        let e = run("1", "\n", "1\n").unwrap_err();
        assert_eq!(e.verdict(), Verdict::ParseError);
    }
}
