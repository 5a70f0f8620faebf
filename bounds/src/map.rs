use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    interval::IntervalSet,
    number::{Number, Real},
    Chain, Constraint, Var,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constant {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Bool(v) => v.fmt(f),
            Constant::Int(v) => v.fmt(f),
            Constant::Real(v) => v.fmt(f),
            Constant::Text(v) => write!(f, "{:?}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Int(IntervalSet<i64>),
    Real(IntervalSet<Real>),
    Const(Constant),
}

impl BoundValue {
    fn describe(&self) -> String {
        match self {
            BoundValue::Int(s) => format!("integer {}", s),
            BoundValue::Real(s) => format!("real {}", s),
            BoundValue::Const(c) => format!("constant {}", c),
        }
    }

    fn merge(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (BoundValue::Int(a), BoundValue::Int(b)) => Some(BoundValue::Int(a & b)),
            (BoundValue::Real(a), BoundValue::Real(b)) => Some(BoundValue::Real(a & b)),
            (BoundValue::Const(a), BoundValue::Const(b)) if a == b => Some(self.clone()),
            _ => None,
        }
    }
}

impl From<IntervalSet<i64>> for BoundValue {
    fn from(s: IntervalSet<i64>) -> Self {
        BoundValue::Int(s)
    }
}

impl From<IntervalSet<Real>> for BoundValue {
    fn from(s: IntervalSet<Real>) -> Self {
        BoundValue::Real(s)
    }
}

impl From<Constant> for BoundValue {
    fn from(c: Constant) -> Self {
        BoundValue::Const(c)
    }
}

impl<T: Number> From<Chain<T>> for BoundValue
where
    IntervalSet<T>: Into<BoundValue>,
{
    fn from(c: Chain<T>) -> Self {
        c.build().into()
    }
}

impl<T: Number> From<Constraint<T>> for BoundValue
where
    IntervalSet<T>: Into<BoundValue>,
{
    fn from(c: Constraint<T>) -> Self {
        c.build().into()
    }
}

/// Named bounds of a problem (or of one subtask of it).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, Decl>")]
pub struct BoundsMap {
    entries: BTreeMap<String, BoundValue>,
}

impl BoundsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<BoundValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<BoundValue>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn int(&self, name: &str) -> Result<&IntervalSet<i64>> {
        match self.lookup(name)? {
            BoundValue::Int(s) => Ok(s),
            _ => Err(self.wrong_type(name, "an integer range")),
        }
    }

    pub fn real(&self, name: &str) -> Result<&IntervalSet<Real>> {
        match self.lookup(name)? {
            BoundValue::Real(s) => Ok(s),
            _ => Err(self.wrong_type(name, "a real range")),
        }
    }

    pub fn constant(&self, name: &str) -> Result<&Constant> {
        match self.lookup(name)? {
            BoundValue::Const(c) => Ok(c),
            _ => Err(self.wrong_type(name, "a constant")),
        }
    }

    pub fn check_int(&self, name: &str, value: i64) -> Result<()> {
        let allowed = self.int(name)?;
        if allowed.contains(&value) {
            Ok(())
        } else {
            Err(Error::OutOfRange {
                name: name.to_owned(),
                value: value.to_string(),
                allowed: allowed.to_string(),
            })
        }
    }

    pub fn check_real(&self, name: &str, value: f64) -> Result<()> {
        let allowed = self.real(name)?;
        match Real::new(value) {
            Some(v) if allowed.contains(&v) => Ok(()),
            _ => Err(Error::OutOfRange {
                name: name.to_owned(),
                value: value.to_string(),
                allowed: allowed.to_string(),
            }),
        }
    }

    /// Combines two maps. Shared ranges are intersected, names present on one
    /// side only are copied. Anything else on a shared name is a conflict.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        let mut entries = self.entries.clone();
        for (name, value) in &other.entries {
            let merged = match entries.get(name) {
                None => value.clone(),
                Some(mine) => mine.merge(value).ok_or_else(|| Error::Conflict {
                    name: name.clone(),
                    left: mine.describe(),
                    right: value.describe(),
                })?,
            };
            entries.insert(name.clone(), merged);
        }
        Ok(Self { entries })
    }

    fn lookup(&self, name: &str) -> Result<&BoundValue> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::Unknown(name.to_owned()))
    }

    fn wrong_type(&self, name: &str, expected: &'static str) -> Error {
        Error::WrongType {
            name: name.to_owned(),
            expected,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Num {
    Int(i64),
    Real(f64),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RangeDecl {
    ge: Option<Num>,
    gt: Option<Num>,
    le: Option<Num>,
    lt: Option<Num>,
    #[serde(default)]
    abs: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Decl {
    Range(RangeDecl),
    Const(Constant),
}

impl RangeDecl {
    fn comparisons(&self) -> Vec<(&'static str, Num)> {
        [("ge", self.ge), ("gt", self.gt), ("le", self.le), ("lt", self.lt)]
            .into_iter()
            .filter_map(|(op, v)| v.map(|v| (op, v)))
            .collect()
    }

    fn into_value(self, name: &str) -> Result<BoundValue> {
        let malformed = |reason: &str| Error::Malformed {
            name: name.to_owned(),
            reason: reason.to_owned(),
        };
        if self.ge.is_some() && self.gt.is_some() || self.le.is_some() && self.lt.is_some() {
            return Err(malformed("at most one lower and one upper comparison"));
        }
        let comparisons = self.comparisons();
        if comparisons.is_empty() {
            return Err(malformed("no comparison given"));
        }
        let is_real = comparisons.iter().any(|(_, v)| matches!(v, Num::Real(_)));
        let x = if self.abs { Var::default().abs() } else { Var::default() };
        if is_real {
            let mut reals = Vec::with_capacity(comparisons.len());
            for (op, v) in comparisons {
                let v = match v {
                    Num::Int(i) => i as f64,
                    Num::Real(r) => r,
                };
                reals.push((op, Real::new(v).ok_or_else(|| malformed("NaN is not a bound"))?));
            }
            Ok(BoundValue::Real(chain(x, reals)))
        } else {
            let ints = comparisons
                .into_iter()
                .filter_map(|(op, v)| match v {
                    Num::Int(i) => Some((op, i)),
                    Num::Real(_) => None,
                })
                .collect();
            Ok(BoundValue::Int(chain(x, ints)))
        }
    }
}

fn chain<T: Number>(x: Var, comparisons: Vec<(&'static str, T)>) -> IntervalSet<T> {
    let mut it = comparisons.into_iter();
    let first = match it.next() {
        Some(("ge", v)) => x.ge(v),
        Some(("gt", v)) => x.gt(v),
        Some(("le", v)) => x.le(v),
        Some((_, v)) => x.lt(v),
        None => return IntervalSet::all(),
    };
    match it.next() {
        Some(("ge", v)) => first.ge(v).build(),
        Some(("gt", v)) => first.gt(v).build(),
        Some(("le", v)) => first.le(v).build(),
        Some((_, v)) => first.lt(v).build(),
        None => first.build(),
    }
}

impl TryFrom<BTreeMap<String, Decl>> for BoundsMap {
    type Error = Error;

    fn try_from(decls: BTreeMap<String, Decl>) -> Result<Self> {
        let mut map = BoundsMap::new();
        for (name, decl) in decls {
            let value = match decl {
                Decl::Range(r) => r.into_value(&name)?,
                Decl::Const(c) => BoundValue::Const(c),
            };
            map.entries.insert(name, value);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::var;

    #[test]
    fn test_merge_intersects_shared_ranges() {
        let global = BoundsMap::new()
            .with("n", var().ge(1i64).le(100_000))
            .with("t", var().ge(1i64).le(10))
            .with("mod", Constant::Int(998244353));
        let subtask = BoundsMap::new()
            .with("n", var().ge(1i64).le(10))
            .with("q", var().abs().le(5i64))
            .with("mod", Constant::Int(998244353));

        let merged = global.merge(&subtask).unwrap();
        assert_eq!(merged.int("n").unwrap(), &IntervalSet::closed(1, 10));
        assert_eq!(merged.int("t").unwrap(), &IntervalSet::closed(1, 10));
        assert_eq!(merged.int("q").unwrap(), &IntervalSet::closed(-5, 5));
        assert_eq!(merged.constant("mod").unwrap(), &Constant::Int(998244353));
        assert_eq!(merged.names().collect::<Vec<_>>(), ["mod", "n", "q", "t"]);
    }

    #[test]
    fn test_merge_conflicts() {
        let a = BoundsMap::new().with("k", Constant::Int(1));
        let b = BoundsMap::new().with("k", Constant::Int(2));
        assert!(matches!(a.merge(&b), Err(Error::Conflict { .. })));

        let c = BoundsMap::new().with("k", var().ge(0i64));
        assert!(matches!(a.merge(&c), Err(Error::Conflict { .. })));
    }

    #[test]
    fn test_check_int() {
        let m = BoundsMap::new().with("v", var().abs().le(1_000_000_000i64));
        assert!(m.check_int("v", -1_000_000_000).is_ok());
        let err = m.check_int("v", 2_000_000_000).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'v' = 2000000000 violates [-1000000000, 1000000000]"
        );
        assert!(matches!(m.check_int("w", 0), Err(Error::Unknown(_))));
        assert!(matches!(m.real("v"), Err(Error::WrongType { .. })));
    }

    #[test]
    fn test_deserialize_from_toml() {
        let src = r#"
            n = { ge = 1, le = 200000 }
            x = { abs = true, lt = 1.5 }
            name = "sample"
            strict = true
        "#;
        let m: BoundsMap = toml::from_str(src).unwrap();
        assert_eq!(m.int("n").unwrap(), &IntervalSet::closed(1, 200_000));
        assert!(m.check_real("x", -1.25).is_ok());
        assert!(m.check_real("x", 1.5).is_err());
        assert_eq!(m.constant("name").unwrap(), &Constant::Text("sample".to_owned()));
        assert_eq!(m.constant("strict").unwrap(), &Constant::Bool(true));
    }

    #[test]
    fn test_deserialize_rejects_double_lower_bound() {
        let src = "n = { ge = 1, gt = 0 }";
        assert!(toml::from_str::<BoundsMap>(src).is_err());
    }
}
