pub mod attribution;
pub mod shapley;

pub use attribution::*;
pub use shapley::*;
