//! 基础设施层
//!
//! 持有外部资源（文件系统、HTTP 客户端），只暴露能力，不认识业务流程

pub mod artifact_writer;
pub mod completion;
pub mod fine_tune_api;
pub mod text_source;

pub use artifact_writer::{ArtifactWriter, JsonArtifactWriter};
pub use completion::{CompletionService, OpenAiCompletion};
pub use fine_tune_api::{FineTuneApi, OpenAiFineTuneApi};
pub use text_source::{is_delimited_text, TextSource, WorkbookTextSource};
