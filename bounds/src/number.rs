use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

/// A totally ordered numeric domain usable as interval endpoints.
pub trait Number: Clone + Ord + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static {
    fn zero() -> Self;

    /// `-self`, or `None` when it lies beyond the largest value.
    fn checked_negated(&self) -> Option<Self>;

    /// The next value up on a discrete domain. Dense domains return `None`,
    /// as does a discrete domain at its maximum.
    fn successor(&self) -> Option<Self> {
        None
    }

    /// The next value down on a discrete domain.
    fn predecessor(&self) -> Option<Self> {
        None
    }
}

impl Number for i64 {
    fn zero() -> Self {
        0
    }

    fn checked_negated(&self) -> Option<Self> {
        self.checked_neg()
    }

    fn successor(&self) -> Option<Self> {
        self.checked_add(1)
    }

    fn predecessor(&self) -> Option<Self> {
        self.checked_sub(1)
    }
}

/// A NaN-free `f64` with a total order. `-0.0` is stored as `0.0`.
#[derive(Clone, Copy)]
pub struct Real(f64);

impl Real {
    pub fn new(v: f64) -> Option<Self> {
        if v.is_nan() {
            None
        } else if v == 0.0 {
            Some(Self(0.0))
        } else {
            Some(Self(v))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for Real {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Real {}

impl PartialOrd for Real {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Real {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Real {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state)
    }
}

impl fmt::Debug for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Number for Real {
    fn zero() -> Self {
        Self(0.0)
    }

    fn checked_negated(&self) -> Option<Self> {
        Self::new(-self.0)
    }
}

/// A point of the extended domain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint<T> {
    NegInf,
    At(T),
    PosInf,
}

impl<T: Number> Endpoint<T> {
    pub(crate) fn negated(&self) -> Self {
        match self {
            Endpoint::NegInf => Endpoint::PosInf,
            Endpoint::At(v) => v.checked_negated().map_or(Endpoint::PosInf, Endpoint::At),
            Endpoint::PosInf => Endpoint::NegInf,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::NegInf => f.write_str("-inf"),
            Endpoint::At(v) => v.fmt(f),
            Endpoint::PosInf => f.write_str("inf"),
        }
    }
}

impl<T> From<T> for Endpoint<T> {
    fn from(v: T) -> Self {
        Endpoint::At(v)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_real_rejects_nan_and_normalizes_zero() {
        assert!(Real::new(f64::NAN).is_none());
        assert_eq!(Real::new(-0.0).unwrap().get().to_bits(), 0.0f64.to_bits());
        assert_eq!(Real::new(1.5).unwrap().checked_negated(), Real::new(-1.5));
        assert_eq!(Real::new(1.5).unwrap().successor(), None);
        assert!(Real::new(-2.0).unwrap() < Real::new(-1.0).unwrap());
    }

    #[test]
    fn test_endpoint_order() {
        assert!(Endpoint::NegInf < Endpoint::At(i64::MIN));
        assert!(Endpoint::At(i64::MAX) < Endpoint::PosInf);
        assert_eq!(Endpoint::At(3i64).negated(), Endpoint::At(-3));
        assert_eq!(Endpoint::<i64>::NegInf.negated(), Endpoint::PosInf);
        assert_eq!(Endpoint::At(i64::MIN).negated(), Endpoint::PosInf);
        assert_eq!(Endpoint::At(i64::MAX).negated(), Endpoint::At(i64::MIN + 1));
    }

    #[test]
    fn test_discrete_neighbours() {
        assert_eq!(5i64.successor(), Some(6));
        assert_eq!(5i64.predecessor(), Some(4));
        assert_eq!(i64::MAX.successor(), None);
        assert_eq!(i64::MIN.predecessor(), None);
    }
}
