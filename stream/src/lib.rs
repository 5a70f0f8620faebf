mod charset;
mod compose;
pub mod error;
mod literal;
mod options;
mod stream;

pub use charset::{Atom, CharSet, TokenSpec};
pub use error::{Cause, Error, ErrorKind, Result, Side};
pub use literal::{parse_int, parse_real};
pub use options::{OptionOverrides, StreamMode, StreamOptions};
pub use stream::StrictStream;
