pub mod domain;
pub mod flow;
pub mod log;

pub use domain::*;
pub use flow::*;
pub use log::*;
