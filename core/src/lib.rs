pub mod config;
pub mod harness;
pub mod interaction;
pub mod program;
pub mod str_interp;
pub mod testing;
pub mod verdict;

pub use crate::config::Config;
pub use kjudge_bounds as bounds;
pub use kjudge_stream as stream;
