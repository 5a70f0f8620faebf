pub mod cmd;
pub mod style;
mod util;
