//! 业务能力层
//!
//! 描述"我能做什么"，每个服务只处理单块板或单个文件，不关心轮次流程

pub mod comparator;
pub mod dataset_writer;
pub mod extractor;
pub mod fine_tune_manager;
pub mod report_writer;
pub mod role_classifier;

pub use comparator::{compare, normalize_key, ComparisonOutcome};
pub use dataset_writer::DatasetWriter;
pub use extractor::StructuredExtractor;
pub use fine_tune_manager::{FineTuneManager, FineTuneOutcome};
pub use report_writer::ReportWriter;
pub use role_classifier::RoleClassifier;
