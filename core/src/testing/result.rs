use std::time::Duration;

use serde::Serialize;

use crate::{
    harness::Aggregate,
    verdict::{Verdict, VerdictRecord},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
    pub name: String,
    #[serde(flatten)]
    pub record: VerdictRecord,
    /// Wall time of the candidate (the slowest node when interactive).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<Duration>,
}

impl TestOutcome {
    pub fn verdict(&self) -> Verdict {
        self.record.verdict
    }
}

/// The verdict of a whole run: the first rejected case decides the verdict,
/// the score aggregates every case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<TestOutcome>,
    pub verdict: VerdictRecord,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: Vec<TestOutcome>, aggregate: &Aggregate) -> Self {
        let scores: Vec<_> = outcomes
            .iter()
            .map(|o| Some(if o.record.verdict.is_accepted() { o.record.score } else { 0.0 }))
            .collect();
        let score = aggregate.apply(&scores);
        let rejected = outcomes.iter().find(|o| !o.record.verdict.is_accepted());

        let verdict = match (rejected, score) {
            (_, Err(e)) => VerdictRecord::from_error(&e, false),
            (Some(o), Ok(score)) => VerdictRecord {
                verdict: o.record.verdict,
                score,
                message: format!("{}: {}", o.name, o.record.message),
            },
            (None, Ok(score)) => VerdictRecord::accepted(score),
        };
        Self { outcomes, verdict }
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.outcomes.iter().filter(|o| o.verdict() == verdict).count()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn outcome(name: &str, record: VerdictRecord) -> TestOutcome {
        TestOutcome {
            name: name.to_owned(),
            record,
            elapsed: None,
        }
    }

    #[test]
    fn first_rejection_wins() {
        let outcomes = vec![
            outcome("01", VerdictRecord::accepted(1.0)),
            outcome("02", VerdictRecord::rejected(Verdict::Wrong, "expected 3, found 4")),
            outcome("03", VerdictRecord::rejected(Verdict::TimeLimitExceeded, "")),
        ];
        let s = RunSummary::from_outcomes(outcomes, &Aggregate::Mean);
        assert_eq!(s.verdict.verdict, Verdict::Wrong);
        assert_eq!(s.verdict.message, "02: expected 3, found 4");
        assert!((s.verdict.score - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.count(Verdict::Accepted), 1);
    }

    #[test]
    fn all_accepted() {
        let outcomes = vec![
            outcome("01", VerdictRecord::accepted(1.0)),
            outcome("02", VerdictRecord::accepted(0.5)),
        ];
        let s = RunSummary::from_outcomes(outcomes, &Aggregate::Minimum);
        assert_eq!(s.verdict, VerdictRecord::accepted(0.5));
    }

    #[test]
    fn no_cases_fail() {
        let s = RunSummary::from_outcomes(Vec::new(), &Aggregate::Minimum);
        assert_eq!(s.verdict.verdict, Verdict::Fail);
    }
}
