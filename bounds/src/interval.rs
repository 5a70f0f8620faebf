use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    ops::{BitAnd, BitOr, BitXor, Neg, Not},
    sync::{Arc, Mutex},
};

use once_cell::sync::OnceCell;

use crate::number::{Endpoint, Number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundKind {
    LowerInclusive,
    LowerExclusive,
    UpperInclusive,
    UpperExclusive,
}

impl BoundKind {
    pub fn is_lower(self) -> bool {
        matches!(self, BoundKind::LowerInclusive | BoundKind::LowerExclusive)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound<T> {
    pub value: Endpoint<T>,
    pub kind: BoundKind,
}

impl<T: Number> Bound<T> {
    pub fn new(value: impl Into<Endpoint<T>>, kind: BoundKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }

    fn cut(&self) -> Cut<T> {
        use BoundKind::*;
        let side = match self.kind {
            LowerInclusive | UpperExclusive => Side::Below,
            LowerExclusive | UpperInclusive => Side::Above,
        };
        Cut::new(self.value.clone(), side)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Side {
    Below,
    Above,
}

/// A position strictly between points of the domain: just below or just above `at`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Cut<T> {
    at: Endpoint<T>,
    side: Side,
}

impl<T: Number> Cut<T> {
    fn new(at: Endpoint<T>, side: Side) -> Self {
        // Infinities are never members, so only one side of each is meaningful.
        // On a discrete domain every cut is written as "below" its next value,
        // and a cut past the first or last value becomes an infinity.
        let v = match at {
            Endpoint::NegInf => {
                return Self {
                    at: Endpoint::NegInf,
                    side: Side::Below,
                }
            }
            Endpoint::PosInf => {
                return Self {
                    at: Endpoint::PosInf,
                    side: Side::Above,
                }
            }
            Endpoint::At(v) => v,
        };
        match (side, v.successor(), v.predecessor()) {
            (Side::Above, Some(next), _) => Self {
                at: Endpoint::At(next),
                side: Side::Below,
            },
            (Side::Above, None, Some(_)) => Self {
                at: Endpoint::PosInf,
                side: Side::Above,
            },
            (Side::Below, Some(_), None) => Self {
                at: Endpoint::NegInf,
                side: Side::Below,
            },
            _ => Self {
                at: Endpoint::At(v),
                side,
            },
        }
    }

    fn is_below(&self, point: &T) -> bool {
        match &self.at {
            Endpoint::NegInf => true,
            Endpoint::PosInf => false,
            Endpoint::At(v) => match self.side {
                Side::Below => v <= point,
                Side::Above => v < point,
            },
        }
    }

    fn negated(&self) -> Self {
        let side = match self.side {
            Side::Below => Side::Above,
            Side::Above => Side::Below,
        };
        Cut::new(self.at.negated(), side)
    }

    fn is_closed(&self, lower: bool) -> bool {
        let inside = if lower { Side::Below } else { Side::Above };
        matches!(self.at, Endpoint::At(_)) && self.side == inside
    }

    fn bound(&self, lower: bool) -> Bound<T> {
        // A discrete upper cut is named by the last member before it.
        if let (false, Side::Below, Endpoint::At(v)) = (lower, self.side, &self.at) {
            if let Some(last) = v.predecessor() {
                return Bound {
                    value: Endpoint::At(last),
                    kind: BoundKind::UpperInclusive,
                };
            }
        }
        let kind = match (lower, self.is_closed(lower)) {
            (true, true) => BoundKind::LowerInclusive,
            (true, false) => BoundKind::LowerExclusive,
            (false, true) => BoundKind::UpperInclusive,
            (false, false) => BoundKind::UpperExclusive,
        };
        Bound {
            value: self.at.clone(),
            kind,
        }
    }
}

struct Inner<T: Number> {
    cuts: Vec<Cut<T>>,
    complement: OnceCell<IntervalSet<T>>,
    meets: Mutex<HashMap<Vec<Cut<T>>, IntervalSet<T>>>,
}

/// A finite union of disjoint intervals in canonical form.
///
/// The set is stored as a strictly increasing list of cuts of even length;
/// even positions open an interval and odd positions close it. Touching
/// intervals are merged when built (on `i64`, `[1, 2]` touches `[3, 5]`), so
/// two sets are equal exactly when they contain the same points. Cloning is
/// cheap and clones share the caches.
pub struct IntervalSet<T: Number> {
    inner: Arc<Inner<T>>,
}

impl<T: Number> IntervalSet<T> {
    fn from_canonical(cuts: Vec<Cut<T>>) -> Self {
        debug_assert!(cuts.len() % 2 == 0);
        debug_assert!(cuts.windows(2).all(|w| w[0] < w[1]));
        Self {
            inner: Arc::new(Inner {
                cuts,
                complement: OnceCell::new(),
                meets: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn from_spans(mut spans: Vec<(Cut<T>, Cut<T>)>) -> Self {
        spans.retain(|(lo, hi)| lo < hi);
        spans.sort();
        let mut cuts: Vec<Cut<T>> = Vec::with_capacity(spans.len() * 2);
        for (lo, hi) in spans {
            match cuts.last_mut() {
                Some(end) if lo <= *end => {
                    if hi > *end {
                        *end = hi;
                    }
                }
                _ => {
                    cuts.push(lo);
                    cuts.push(hi);
                }
            }
        }
        Self::from_canonical(cuts)
    }

    pub fn empty() -> Self {
        Self::from_canonical(Vec::new())
    }

    pub fn all() -> Self {
        Self::from_canonical(vec![
            Cut::new(Endpoint::NegInf, Side::Below),
            Cut::new(Endpoint::PosInf, Side::Above),
        ])
    }

    /// Builds a set from `(lower, upper)` pairs. Empty pairs are dropped and
    /// overlapping or touching pairs are merged.
    pub fn from_intervals<I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = (Bound<T>, Bound<T>)>,
    {
        Self::from_spans(
            intervals
                .into_iter()
                .map(|(lo, hi)| (lo.cut(), hi.cut()))
                .collect(),
        )
    }

    pub fn interval(lower: Bound<T>, upper: Bound<T>) -> Self {
        Self::from_intervals([(lower, upper)])
    }

    /// `[lo, hi]`
    pub fn closed(lo: T, hi: T) -> Self {
        Self::interval(
            Bound::new(lo, BoundKind::LowerInclusive),
            Bound::new(hi, BoundKind::UpperInclusive),
        )
    }

    pub fn point(v: T) -> Self {
        Self::closed(v.clone(), v)
    }

    pub fn at_least(v: T) -> Self {
        Self::interval(
            Bound::new(v, BoundKind::LowerInclusive),
            Bound::new(Endpoint::PosInf, BoundKind::UpperExclusive),
        )
    }

    pub fn greater_than(v: T) -> Self {
        Self::interval(
            Bound::new(v, BoundKind::LowerExclusive),
            Bound::new(Endpoint::PosInf, BoundKind::UpperExclusive),
        )
    }

    pub fn at_most(v: T) -> Self {
        Self::interval(
            Bound::new(Endpoint::NegInf, BoundKind::LowerExclusive),
            Bound::new(v, BoundKind::UpperInclusive),
        )
    }

    pub fn less_than(v: T) -> Self {
        Self::interval(
            Bound::new(Endpoint::NegInf, BoundKind::LowerExclusive),
            Bound::new(v, BoundKind::UpperExclusive),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.inner.cuts.is_empty()
    }

    pub fn contains(&self, point: &T) -> bool {
        self.inner.cuts.partition_point(|c| c.is_below(point)) % 2 == 1
    }

    /// The canonical bounds, alternating lower and upper.
    pub fn bounds(&self) -> Vec<Bound<T>> {
        self.inner
            .cuts
            .iter()
            .enumerate()
            .map(|(i, c)| c.bound(i % 2 == 0))
            .collect()
    }

    pub fn intersection(&self, other: &Self) -> Self {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return self.clone();
        }
        let key = &other.inner.cuts;
        if let Ok(meets) = self.inner.meets.lock() {
            if let Some(hit) = meets.get(key) {
                return hit.clone();
            }
        }
        let result = Self::from_canonical(meet(&self.inner.cuts, key));
        if let Ok(mut meets) = self.inner.meets.lock() {
            meets.insert(key.clone(), result.clone());
        }
        result
    }

    pub fn complement(&self) -> Self {
        self.inner
            .complement
            .get_or_init(|| {
                let head = Cut::new(Endpoint::NegInf, Side::Below);
                let tail = Cut::new(Endpoint::PosInf, Side::Above);
                let mut cuts = self.inner.cuts.clone();
                if cuts.first() == Some(&head) {
                    cuts.remove(0);
                } else {
                    cuts.insert(0, head);
                }
                if cuts.last() == Some(&tail) {
                    cuts.pop();
                } else {
                    cuts.push(tail);
                }
                Self::from_canonical(cuts)
            })
            .clone()
    }

    pub fn union(&self, other: &Self) -> Self {
        self.complement()
            .intersection(&other.complement())
            .complement()
    }

    pub fn symmetric_difference(&self, other: &Self) -> Self {
        let left = self.intersection(&other.complement());
        let right = self.complement().intersection(other);
        left.union(&right)
    }

    /// `{ -x | x in self }`
    pub fn negated(&self) -> Self {
        // Spans that negate past the end of the domain come out empty.
        Self::from_spans(
            self.inner
                .cuts
                .chunks(2)
                .map(|pair| (pair[1].negated(), pair[0].negated()))
                .collect(),
        )
    }

    /// `{ |x| | x in self }`
    pub fn abs(&self) -> Self {
        let nonneg = self.intersection(&Self::at_least(T::zero()));
        let nonpos = self.intersection(&Self::at_most(T::zero()));
        nonneg.union(&nonpos.negated())
    }

    /// `{ x | |x| in self }`
    pub fn abs_preimage(&self) -> Self {
        let nonneg = self.intersection(&Self::at_least(T::zero()));
        nonneg.union(&nonneg.negated())
    }
}

fn meet<T: Number>(a: &[Cut<T>], b: &[Cut<T>]) -> Vec<Cut<T>> {
    let (mut i, mut j) = (0, 0);
    let (mut in_a, mut in_b, mut in_both) = (false, false, false);
    let mut out = Vec::new();
    while i < a.len() || j < b.len() {
        let next = match (a.get(i), b.get(j)) {
            (Some(x), Some(y)) => x.min(y),
            (Some(x), None) => x,
            (None, Some(y)) => y,
            (None, None) => break,
        }
        .clone();
        if a.get(i) == Some(&next) {
            in_a = !in_a;
            i += 1;
        }
        if b.get(j) == Some(&next) {
            in_b = !in_b;
            j += 1;
        }
        if (in_a && in_b) != in_both {
            in_both = !in_both;
            out.push(next);
        }
    }
    out
}

impl<T: Number> Clone for IntervalSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Number> Default for IntervalSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Number> PartialEq for IntervalSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.cuts == other.inner.cuts
    }
}

impl<T: Number> Eq for IntervalSet<T> {}

impl<T: Number> Hash for IntervalSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.cuts.hash(state)
    }
}

impl<T: Number> fmt::Display for IntervalSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        for (i, pair) in self.inner.cuts.chunks(2).enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            let (lo, hi) = (pair[0].bound(true), pair[1].bound(false));
            let open = if lo.kind == BoundKind::LowerInclusive { '[' } else { '(' };
            let close = if hi.kind == BoundKind::UpperInclusive { ']' } else { ')' };
            write!(f, "{}{}, {}{}", open, lo.value, hi.value, close)?;
        }
        Ok(())
    }
}

impl<T: Number> fmt::Debug for IntervalSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntervalSet({})", self)
    }
}

macro_rules! forward_binop {
    ($trait:ident, $method:ident, $impl_fn:ident) => {
        impl<T: Number> $trait for &IntervalSet<T> {
            type Output = IntervalSet<T>;
            fn $method(self, rhs: Self) -> IntervalSet<T> {
                self.$impl_fn(rhs)
            }
        }

        impl<T: Number> $trait for IntervalSet<T> {
            type Output = IntervalSet<T>;
            fn $method(self, rhs: Self) -> IntervalSet<T> {
                self.$impl_fn(&rhs)
            }
        }
    };
}

forward_binop!(BitAnd, bitand, intersection);
forward_binop!(BitOr, bitor, union);
forward_binop!(BitXor, bitxor, symmetric_difference);

impl<T: Number> Not for &IntervalSet<T> {
    type Output = IntervalSet<T>;
    fn not(self) -> IntervalSet<T> {
        self.complement()
    }
}

impl<T: Number> Not for IntervalSet<T> {
    type Output = IntervalSet<T>;
    fn not(self) -> IntervalSet<T> {
        self.complement()
    }
}

impl<T: Number> Neg for &IntervalSet<T> {
    type Output = IntervalSet<T>;
    fn neg(self) -> IntervalSet<T> {
        self.negated()
    }
}

impl<T: Number> Neg for IntervalSet<T> {
    type Output = IntervalSet<T>;
    fn neg(self) -> IntervalSet<T> {
        self.negated()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::number::Real;

    fn set(pairs: &[(i64, i64)]) -> IntervalSet<i64> {
        IntervalSet::from_intervals(pairs.iter().map(|&(lo, hi)| {
            (
                Bound::new(lo, BoundKind::LowerInclusive),
                Bound::new(hi, BoundKind::UpperInclusive),
            )
        }))
    }

    fn members(s: &IntervalSet<i64>) -> Vec<i64> {
        (-30..=30).filter(|x| s.contains(x)).collect()
    }

    #[test]
    fn test_canonical_form_merges_touching() {
        let a = IntervalSet::from_intervals([
            (
                Bound::new(1, BoundKind::LowerInclusive),
                Bound::new(3, BoundKind::UpperExclusive),
            ),
            (
                Bound::new(3, BoundKind::LowerInclusive),
                Bound::new(5, BoundKind::UpperInclusive),
            ),
        ]);
        assert_eq!(a, set(&[(1, 5)]));
        assert_eq!(a.bounds().len(), 2);
        assert_eq!(a.to_string(), "[1, 5]");

        assert_eq!(set(&[(4, 9), (1, 5)]), set(&[(1, 9)]));
        assert!(IntervalSet::interval(
            Bound::new(5i64, BoundKind::LowerExclusive),
            Bound::new(5, BoundKind::UpperExclusive)
        )
        .is_empty());
        assert_eq!(IntervalSet::point(5), set(&[(5, 5)]));
    }

    #[test]
    fn test_open_points_stay_apart() {
        // (1, 3) and (3, 5) do not touch: 3 belongs to neither.
        let r = |v: f64| Real::new(v).unwrap();
        let a = IntervalSet::from_intervals([
            (
                Bound::new(r(1.0), BoundKind::LowerExclusive),
                Bound::new(r(3.0), BoundKind::UpperExclusive),
            ),
            (
                Bound::new(r(3.0), BoundKind::LowerExclusive),
                Bound::new(r(5.0), BoundKind::UpperExclusive),
            ),
        ]);
        assert_eq!(a.bounds().len(), 4);
        assert!(!a.contains(&r(3.0)));
        assert_eq!(a.to_string(), "(1, 3) | (3, 5)");
    }

    #[test]
    fn test_integer_sets_are_normalized() {
        let open = IntervalSet::interval(
            Bound::new(0i64, BoundKind::LowerExclusive),
            Bound::new(11, BoundKind::UpperExclusive),
        );
        assert_eq!(open, set(&[(1, 10)]));
        assert_eq!(open.to_string(), "[1, 10]");
        assert_eq!(
            open.bounds(),
            [
                Bound::new(1, BoundKind::LowerInclusive),
                Bound::new(10, BoundKind::UpperInclusive)
            ]
        );

        // Neighbouring integers leave no gap between the spans.
        assert_eq!(set(&[(1, 2), (3, 5)]), set(&[(1, 5)]));
        assert_eq!(set(&[(1, 2)]).union(&set(&[(3, 5)])).to_string(), "[1, 5]");
        assert_eq!(IntervalSet::greater_than(0), IntervalSet::at_least(1));

        // The ends of the domain meet the infinities.
        assert_eq!(IntervalSet::at_least(i64::MIN), IntervalSet::all());
        assert_eq!(IntervalSet::at_most(i64::MAX), IntervalSet::all());
        assert_eq!(IntervalSet::greater_than(i64::MAX), IntervalSet::empty());
        assert_eq!(IntervalSet::point(i64::MIN).negated(), IntervalSet::empty());
        assert!(IntervalSet::point(i64::MIN).abs().is_empty());
        assert_eq!(
            IntervalSet::closed(i64::MIN, -5).negated(),
            IntervalSet::at_least(5)
        );
    }

    #[test]
    fn test_set_operations_match_pointwise_logic() {
        let samples = [
            set(&[]),
            set(&[(-5, 5)]),
            set(&[(-20, -10), (0, 3), (7, 12)]),
            set(&[(-3, 8), (10, 10)]),
            IntervalSet::at_least(4),
            IntervalSet::less_than(-2),
            IntervalSet::all(),
        ];
        for a in &samples {
            for b in &samples {
                for x in -30..=30 {
                    let (ia, ib) = (a.contains(&x), b.contains(&x));
                    assert_eq!((a & b).contains(&x), ia && ib, "{a} & {b} at {x}");
                    assert_eq!((a | b).contains(&x), ia || ib, "{a} | {b} at {x}");
                    assert_eq!((a ^ b).contains(&x), ia != ib, "{a} ^ {b} at {x}");
                }
            }
            for x in -30..=30 {
                assert_eq!((!a).contains(&x), !a.contains(&x));
                assert_eq!((-a).contains(&x), a.contains(&-x));
                assert_eq!(a.abs().contains(&x), x >= 0 && (a.contains(&x) || a.contains(&-x)));
                assert_eq!(a.abs_preimage().contains(&x), a.contains(&x.abs()));
            }
        }
    }

    #[test]
    fn test_canonical_equality_after_algebra() {
        let a = set(&[(1, 4), (6, 9)]);
        let b = set(&[(3, 7)]);
        assert_eq!(!!a.clone(), a);
        assert_eq!(&(&a | &b) & &a, a);
        assert_eq!(&a ^ &a, IntervalSet::empty());
        assert_eq!(&a | &!&a, IntervalSet::all());
        assert_eq!(members(&(&a | &b)), (1..=9).collect::<Vec<_>>());
        assert_eq!(a.union(&b), set(&[(1, 9)]));
    }

    #[test]
    fn test_caches_return_equal_sets() {
        let a = set(&[(1, 4)]);
        let b = set(&[(2, 8)]);
        let first = &a & &b;
        let second = &a & &b;
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first.inner, &second.inner));
        assert!(Arc::ptr_eq(&a.complement().inner, &a.complement().inner));
    }

    #[test]
    fn test_infinite_endpoints() {
        let a: IntervalSet<i64> = IntervalSet::at_most(3);
        assert!(a.contains(&i64::MIN));
        assert_eq!(a.to_string(), "(-inf, 3]");
        assert_eq!((!&a).to_string(), "[4, inf)");
        assert_eq!(a.negated().to_string(), "[-3, inf)");
        assert_eq!(IntervalSet::<i64>::all().complement(), IntervalSet::empty());
    }

    #[test]
    fn test_real_domain() {
        let r = |v: f64| Real::new(v).unwrap();
        let a = IntervalSet::interval(
            Bound::new(r(-1.5), BoundKind::LowerExclusive),
            Bound::new(r(2.0), BoundKind::UpperInclusive),
        );
        assert!(a.contains(&r(2.0)));
        assert!(!a.contains(&r(-1.5)));
        assert!(a.contains(&r(-1.4999)));
        assert!(a.abs().contains(&r(1.5)));
        assert!(!a.abs().contains(&r(-0.5)));
    }
}
