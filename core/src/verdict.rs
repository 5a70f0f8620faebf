use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

pub use kjudge_stream::Side;
use kjudge_stream::{Error as StreamError, ErrorKind};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum Verdict {
    Accepted,
    ParseError,
    Wrong,
    RuntimeError,
    TimeLimitExceeded,
    Fail,
    EngineException,
}

impl Verdict {
    pub fn abbr(self) -> &'static str {
        use Verdict::*;
        match self {
            Accepted => "AC",
            ParseError => "PAE",
            Wrong => "WA",
            RuntimeError => "RE",
            TimeLimitExceeded => "TLE",
            Fail => "FAIL",
            EngineException => "EXC",
        }
    }

    pub fn is_accepted(self) -> bool {
        self == Verdict::Accepted
    }
}

pub type JudgeResult<T> = std::result::Result<T, JudgeError>;

/// A judging step that did not end in a score. Each variant is one verdict.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("{0}")]
    ParseError(String),

    #[error("{0}")]
    Wrong(String),

    #[error("{0}")]
    RuntimeError(String),

    #[error("{0}")]
    TimeLimitExceeded(String),

    #[error("{0}")]
    Fail(String),

    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

impl JudgeError {
    pub fn wrong(msg: impl fmt::Display) -> Self {
        Self::Wrong(msg.to_string())
    }

    pub fn fail(msg: impl fmt::Display) -> Self {
        Self::Fail(msg.to_string())
    }

    pub fn parse_error(msg: impl fmt::Display) -> Self {
        Self::ParseError(msg.to_string())
    }

    /// The canonical message for a side that ran out before the protocol finished.
    pub fn exhausted(side: Side) -> Self {
        let msg = format!("{} stream fully read but expected more", side);
        match side {
            Side::Output => Self::ParseError(msg),
            Side::Input | Side::Judge => Self::Fail(msg),
        }
    }

    pub fn verdict(&self) -> Verdict {
        match self {
            JudgeError::ParseError(_) => Verdict::ParseError,
            JudgeError::Wrong(_) => Verdict::Wrong,
            JudgeError::RuntimeError(_) => Verdict::RuntimeError,
            JudgeError::TimeLimitExceeded(_) => Verdict::TimeLimitExceeded,
            JudgeError::Fail(_) => Verdict::Fail,
            JudgeError::Engine(_) => Verdict::EngineException,
        }
    }
}

impl From<StreamError> for JudgeError {
    fn from(e: StreamError) -> Self {
        if e.is_exhausted() && e.kind != ErrorKind::StreamError {
            return JudgeError::exhausted(e.side);
        }
        match e.kind {
            ErrorKind::ParseError => JudgeError::ParseError(e.to_string()),
            ErrorKind::Fail => JudgeError::Fail(e.to_string()),
            ErrorKind::StreamError => JudgeError::Engine(e.into()),
        }
    }
}

impl From<fsutil::Error> for JudgeError {
    fn from(e: fsutil::Error) -> Self {
        JudgeError::Engine(e.into())
    }
}

impl From<kjudge_bounds::BoundsError> for JudgeError {
    fn from(e: kjudge_bounds::BoundsError) -> Self {
        JudgeError::Fail(e.to_string())
    }
}

/// The outcome of judging one case or one whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub verdict: Verdict,
    pub score: f64,
    pub message: String,
}

impl VerdictRecord {
    pub fn accepted(score: f64) -> Self {
        if (0.0..=1.0).contains(&score) {
            Self {
                verdict: Verdict::Accepted,
                score,
                message: String::new(),
            }
        } else {
            Self::rejected(
                Verdict::Fail,
                format!("score {} is outside [0, 1]", score),
            )
        }
    }

    pub fn rejected(verdict: Verdict, message: impl Into<String>) -> Self {
        Self {
            verdict,
            score: 0.0,
            message: message.into(),
        }
    }

    pub fn from_error(e: &JudgeError, verbose: bool) -> Self {
        let message = match e {
            JudgeError::Engine(inner) if verbose => format!("{:?}", inner),
            JudgeError::Engine(inner) => format!("{}", inner),
            other => other.to_string(),
        };
        Self::rejected(e.verdict(), message)
    }

    pub fn from_result(result: JudgeResult<f64>, verbose: bool) -> Self {
        match result {
            Ok(score) => Self::accepted(score),
            Err(e) => Self::from_error(&e, verbose),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_xml(&self) -> String {
        format!(
            r#"<result verdict="{}" score="{}" message="{}"/>"#,
            self.verdict,
            self.score,
            xml_escape(&self.message)
        )
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
    out
}

/// Process exit codes for verdicts, supplied by the embedding caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "HashMap<String, i32>")]
pub struct ExitCodeTable {
    codes: HashMap<Verdict, i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExitCodeTableError {
    #[error("Unknown verdict '{0}' in exit code table")]
    UnknownVerdict(String),

    #[error("Exit code {code} is assigned to both {first} and {second}")]
    Duplicate {
        code: i32,
        first: Verdict,
        second: Verdict,
    },
}

impl ExitCodeTable {
    pub fn new<I: IntoIterator<Item = (Verdict, i32)>>(
        entries: I,
    ) -> Result<Self, ExitCodeTableError> {
        let mut codes: HashMap<Verdict, i32> = HashMap::new();
        for (verdict, code) in entries {
            if let Some((&first, _)) = codes.iter().find(|(v, c)| **c == code && **v != verdict) {
                return Err(ExitCodeTableError::Duplicate {
                    code,
                    first,
                    second: verdict,
                });
            }
            codes.insert(verdict, code);
        }
        Ok(Self { codes })
    }

    pub fn code_for(&self, verdict: Verdict) -> Option<i32> {
        self.codes.get(&verdict).copied()
    }

    pub fn verdict_for(&self, code: i32) -> Option<Verdict> {
        Verdict::iter().find(|v| self.codes.get(v) == Some(&code))
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl TryFrom<HashMap<String, i32>> for ExitCodeTable {
    type Error = ExitCodeTableError;

    fn try_from(raw: HashMap<String, i32>) -> Result<Self, Self::Error> {
        let mut entries = Vec::with_capacity(raw.len());
        for (name, code) in raw {
            let verdict = Verdict::from_str(&name)
                .map_err(|_| ExitCodeTableError::UnknownVerdict(name.clone()))?;
            entries.push((verdict, code));
        }
        entries.sort_by_key(|&(_, code)| code);
        Self::new(entries)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kjudge_stream::Cause;

    fn table() -> ExitCodeTable {
        ExitCodeTable::new([
            (Verdict::Accepted, 0),
            (Verdict::Wrong, 1),
            (Verdict::ParseError, 2),
            (Verdict::Fail, 3),
        ])
        .unwrap()
    }

    #[test]
    fn test_exit_code_lookup_both_ways() {
        let t = table();
        assert_eq!(t.code_for(Verdict::Wrong), Some(1));
        assert_eq!(t.code_for(Verdict::EngineException), None);
        assert_eq!(t.verdict_for(3), Some(Verdict::Fail));
        assert_eq!(t.verdict_for(42), None);
    }

    #[test]
    fn test_exit_code_table_from_toml() {
        let t: ExitCodeTable = toml::from_str("Accepted = 0\nWrong = 1\nParseError = 2\nFail = 3").unwrap();
        assert_eq!(t, table());
        assert!(toml::from_str::<ExitCodeTable>("Nope = 1").is_err());
        assert!(toml::from_str::<ExitCodeTable>("Wrong = 1\nFail = 1").is_err());
    }

    #[test]
    fn test_stream_errors_keep_their_kind() {
        let make = |kind| StreamError {
            kind,
            side: Side::Output,
            line: 2,
            col: 5,
            exhausted: false,
            cause: Cause::ExtraChars,
        };
        assert_eq!(JudgeError::from(make(ErrorKind::ParseError)).verdict(), Verdict::ParseError);
        assert_eq!(JudgeError::from(make(ErrorKind::Fail)).verdict(), Verdict::Fail);
        assert_eq!(
            JudgeError::from(make(ErrorKind::StreamError)).verdict(),
            Verdict::EngineException
        );
        assert_eq!(
            JudgeError::from(make(ErrorKind::ParseError)).to_string(),
            "output line 2 col 5: extra characters found at the end"
        );
    }

    #[test]
    fn test_running_out_reads_as_exhaustion() {
        let e = StreamError {
            kind: ErrorKind::Fail,
            side: Side::Judge,
            line: 4,
            col: 1,
            exhausted: true,
            cause: Cause::NoToken,
        };
        let e = JudgeError::from(e);
        assert_eq!(e.verdict(), Verdict::Fail);
        assert_eq!(e.to_string(), "judge stream fully read but expected more");
    }

    #[test]
    fn test_exhausted_blames_the_right_side() {
        let e = JudgeError::exhausted(Side::Input);
        assert_eq!(e.verdict(), Verdict::Fail);
        assert_eq!(e.to_string(), "input stream fully read but expected more");
        assert_eq!(JudgeError::exhausted(Side::Judge).verdict(), Verdict::Fail);
        assert_eq!(JudgeError::exhausted(Side::Output).verdict(), Verdict::ParseError);
    }

    #[test]
    fn test_records() {
        assert_eq!(VerdictRecord::accepted(0.5).verdict, Verdict::Accepted);
        assert_eq!(VerdictRecord::accepted(1.5).verdict, Verdict::Fail);

        let r = VerdictRecord::from_result(Err(JudgeError::wrong("expected 3, got <4>")), false);
        assert_eq!(r.score, 0.0);
        assert_eq!(
            r.to_xml(),
            r#"<result verdict="Wrong" score="0" message="expected 3, got &lt;4&gt;"/>"#
        );
        assert_eq!(
            r.to_json().unwrap(),
            r#"{"verdict":"Wrong","score":0.0,"message":"expected 3, got <4>"}"#
        );
    }

    #[test]
    fn test_engine_detail_only_when_verbose() {
        let err = || JudgeError::Engine(anyhow::anyhow!("root cause").context("while judging"));
        let terse = VerdictRecord::from_error(&err(), false);
        let verbose = VerdictRecord::from_error(&err(), true);
        assert_eq!(terse.verdict, Verdict::EngineException);
        assert_eq!(terse.message, "while judging");
        assert!(verbose.message.contains("root cause"));
    }
}
