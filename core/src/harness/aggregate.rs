use serde::{Deserialize, Serialize};

use crate::verdict::{JudgeError, JudgeResult};

/// How per-case scores combine into one score for a whole run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    /// One failing case caps the whole run.
    #[default]
    Minimum,
    Mean,
    #[serde(skip)]
    Custom(fn(&[f64]) -> f64),
}

impl Aggregate {
    pub fn apply(&self, scores: &[Option<f64>]) -> JudgeResult<f64> {
        if scores.is_empty() {
            return Err(JudgeError::fail("no scores to aggregate"));
        }
        let mut values = Vec::with_capacity(scores.len());
        for (i, score) in scores.iter().enumerate() {
            match *score {
                None => return Err(JudgeError::fail(format!("case {} has no score", i + 1))),
                Some(s) if !(0.0..=1.0).contains(&s) => {
                    return Err(JudgeError::fail(format!(
                        "case {} scored {}, outside [0, 1]",
                        i + 1,
                        s
                    )))
                }
                Some(s) => values.push(s),
            }
        }
        let total = match self {
            Aggregate::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregate::Custom(f) => f(&values),
        };
        if (0.0..=1.0).contains(&total) {
            Ok(total)
        } else {
            Err(JudgeError::fail(format!("aggregated score {} is outside [0, 1]", total)))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::verdict::Verdict;

    #[test]
    fn minimum_is_default() {
        let scores = [Some(1.0), Some(0.25), Some(0.5)];
        assert_eq!(Aggregate::default().apply(&scores).unwrap(), 0.25);
        assert_eq!(Aggregate::Mean.apply(&[Some(1.0), Some(0.5)]).unwrap(), 0.75);
        assert_eq!(Aggregate::Custom(|v| v[0]).apply(&scores).unwrap(), 1.0);
    }

    #[test]
    fn bad_scores_fail() {
        for bad in [&[][..], &[Some(1.0), None][..], &[Some(1.5)][..], &[Some(-0.1)][..]] {
            let e = Aggregate::Mean.apply(bad).unwrap_err();
            assert_eq!(e.verdict(), Verdict::Fail, "{:?}", bad);
        }
        let e = Aggregate::Custom(|_| 2.0).apply(&[Some(1.0)]).unwrap_err();
        assert_eq!(e.verdict(), Verdict::Fail);
    }

    #[test]
    fn deserialize_by_name() {
        #[derive(Deserialize)]
        struct T {
            aggregate: Aggregate,
        }
        let t: T = toml::from_str("aggregate = \"mean\"").unwrap();
        assert!(matches!(t.aggregate, Aggregate::Mean));
    }
}
