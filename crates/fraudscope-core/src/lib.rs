pub mod error;
pub mod matrix;
pub mod dataset;
pub mod config;
pub mod classifier;

pub use error::{FraudError, FraudResult, Stage};
pub use matrix::Matrix;
pub use dataset::{ClassCounts, Dataset, Label, RawDataset, RawRecord, Schema};
pub use config::*;
pub use classifier::Classifier;
