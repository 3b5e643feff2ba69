pub mod cross_validation;
pub mod grid_search;

pub use cross_validation::*;
pub use grid_search::*;
