//! Interval sets over ordered numeric domains.
//!
//! ```
//! use kjudge_bounds::{var, IntervalSet};
//!
//! let small: IntervalSet<i64> = var().abs().le(10).build();
//! assert!(small.contains(&-10));
//! assert!(!small.contains(&11));
//!
//! let positive = var().gt(0).build();
//! assert_eq!((&small & &positive).to_string(), "[1, 10]");
//! ```

mod builder;
mod interval;
mod map;
mod number;

pub use builder::{var, Chain, Constraint, Transform, Var};
pub use interval::{Bound, BoundKind, IntervalSet};
pub use map::{BoundValue, BoundsMap, Constant};
pub use number::{Endpoint, Number, Real};

pub mod error {
    pub type Result<T> = std::result::Result<T, self::Error>;

    #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    pub enum Error {
        #[error("Conflicting bounds for '{name}': {left} vs {right}")]
        Conflict {
            name: String,
            left: String,
            right: String,
        },

        #[error("No bound named '{0}'")]
        Unknown(String),

        #[error("Bound '{name}' is not {expected}")]
        WrongType { name: String, expected: &'static str },

        #[error("'{name}' = {value} violates {allowed}")]
        OutOfRange {
            name: String,
            value: String,
            allowed: String,
        },

        #[error("Malformed bound '{name}': {reason}")]
        Malformed { name: String, reason: String },
    }
}
pub use error::{Error as BoundsError, Result};
