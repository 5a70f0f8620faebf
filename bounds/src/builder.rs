use crate::{interval::IntervalSet, number::Number};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Abs,
    Neg,
}

/// The variable being constrained. Transforms may only be applied before the
/// first comparison.
#[derive(Debug, Clone, Default)]
pub struct Var {
    transforms: Vec<Transform>,
}

pub fn var() -> Var {
    Var::default()
}

impl Var {
    pub fn abs(mut self) -> Self {
        self.transforms.push(Transform::Abs);
        self
    }

    pub fn neg(mut self) -> Self {
        self.transforms.push(Transform::Neg);
        self
    }

    pub fn ge<T: Number>(self, v: T) -> Chain<T> {
        self.compare(IntervalSet::at_least(v))
    }

    pub fn gt<T: Number>(self, v: T) -> Chain<T> {
        self.compare(IntervalSet::greater_than(v))
    }

    pub fn le<T: Number>(self, v: T) -> Chain<T> {
        self.compare(IntervalSet::at_most(v))
    }

    pub fn lt<T: Number>(self, v: T) -> Chain<T> {
        self.compare(IntervalSet::less_than(v))
    }

    fn compare<T: Number>(self, set: IntervalSet<T>) -> Chain<T> {
        Chain {
            transforms: self.transforms,
            set,
        }
    }
}

/// A constraint with one comparison; one more may follow.
#[derive(Debug, Clone)]
pub struct Chain<T: Number> {
    transforms: Vec<Transform>,
    set: IntervalSet<T>,
}

impl<T: Number> Chain<T> {
    pub fn ge(self, v: T) -> Constraint<T> {
        self.compare(IntervalSet::at_least(v))
    }

    pub fn gt(self, v: T) -> Constraint<T> {
        self.compare(IntervalSet::greater_than(v))
    }

    pub fn le(self, v: T) -> Constraint<T> {
        self.compare(IntervalSet::at_most(v))
    }

    pub fn lt(self, v: T) -> Constraint<T> {
        self.compare(IntervalSet::less_than(v))
    }

    fn compare(self, set: IntervalSet<T>) -> Constraint<T> {
        Constraint {
            transforms: self.transforms,
            set: &self.set & &set,
        }
    }

    pub fn build(self) -> IntervalSet<T> {
        preimage(&self.transforms, self.set)
    }
}

/// A constraint with two comparisons. Nothing can be chained after it.
#[derive(Debug, Clone)]
pub struct Constraint<T: Number> {
    transforms: Vec<Transform>,
    set: IntervalSet<T>,
}

impl<T: Number> Constraint<T> {
    pub fn build(self) -> IntervalSet<T> {
        preimage(&self.transforms, self.set)
    }
}

/// Values of the variable whose transformed value lands in `set`.
fn preimage<T: Number>(transforms: &[Transform], set: IntervalSet<T>) -> IntervalSet<T> {
    transforms.iter().rev().fold(set, |acc, t| match t {
        Transform::Abs => acc.abs_preimage(),
        Transform::Neg => acc.negated(),
    })
}

impl<T: Number> From<Chain<T>> for IntervalSet<T> {
    fn from(c: Chain<T>) -> Self {
        c.build()
    }
}

impl<T: Number> From<Constraint<T>> for IntervalSet<T> {
    fn from(c: Constraint<T>) -> Self {
        c.build()
    }
}
