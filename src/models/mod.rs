pub mod board;
pub mod extraction;
pub mod fine_tune;
pub mod report;
pub mod stats;
pub mod training;

pub use board::{BoardFileSet, Classification, ClassificationWarning, MissingRole};
pub use extraction::{BomItem, Contract, Coordinate, ExtractionResult};
pub use fine_tune::{FineTuneJob, JobStatus};
pub use report::{BoardOutcome, RoundReport};
pub use stats::{Category, CategoryTally, ComparisonStats};
pub use training::{ChatMessage, Role, TrainingRecord};
