pub mod clean;
pub mod scaler;
pub mod smote;
pub mod split;

pub use clean::*;
pub use scaler::*;
pub use smote::*;
pub use split::*;
