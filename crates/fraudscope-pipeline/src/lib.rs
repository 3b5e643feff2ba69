pub mod summary;
pub mod report;
pub mod pipeline;

pub use summary::*;
pub use report::*;
pub use pipeline::*;
