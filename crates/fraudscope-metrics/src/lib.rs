pub mod classification;
pub mod roc;
pub mod evaluate;

pub use classification::*;
pub use roc::*;
pub use evaluate::*;
