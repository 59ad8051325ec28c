//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责轮次循环和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `round_runner` - 轮次循环
//! - 管理应用生命周期（初始化协作者、运行）
//! - 分批并发抽取，按完成顺序串行汇总
//! - 判断收敛 / 进入下一轮 / 触发微调
//!
//! ### `scanner` - 样本目录扫描
//! - 遍历 `<root>/<年份>/<板名>`，委托 RoleClassifier 确定文件角色
//!
//! ### `state` - 编排状态
//! - 断点（轮次、本轮已完成 / 失败的板）与当前模型的加载和原子写入
//!
//! ## 层次关系
//!
//! ```text
//! round_runner (处理一轮中的 Vec<BoardFileSet>)
//!     ↓
//! workflow::BoardFlow (处理单块板)
//!     ↓
//! services (能力层：classify / extract / compare / dataset / fine-tune)
//!     ↓
//! infrastructure (基础设施：TextSource / CompletionService / FineTuneApi)
//! ```
//!
//! ## 设计原则
//!
//! 1. **向下依赖**：编排层 → workflow → services → infrastructure
//! 2. **单写者**：断点、数据集、报告只在编排任务中写入
//! 3. **无业务逻辑**：只做调度和统计，比对规则在 services 中

pub mod round_runner;
pub mod scanner;
pub mod state;

// 重新导出主要类型
pub use round_runner::{decide, App, Collaborators, RoundDecision, RoundSummary, RunOutcome};
pub use scanner::{scan_boards, ScanResult};
pub use state::{Checkpoint, OrchestratorState, StateStore};
