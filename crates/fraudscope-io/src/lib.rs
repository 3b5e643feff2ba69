pub mod loader;
pub mod model_io;
pub mod json_io;

pub use loader::*;
pub use model_io::*;
pub use json_io::*;
