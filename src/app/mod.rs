pub mod cli;
pub mod session;

pub use session::*;
