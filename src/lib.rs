//! # BOM Verify Loop
//!
//! 从 PCB 样本目录中抽取 BOM / 坐标数据，用验证模型生成的标准答案逐项比对，
//! 把标准答案累积成微调数据集，并逐轮微调学生模型直到全部通过
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `TextSource` - 读取 BOM / 坐标 / 标准答案文件的文本
//! - `CompletionService` - JSON 模式的模型调用
//! - `FineTuneApi` - 上传数据集、创建与轮询微调任务
//! - `ArtifactWriter` - 写学生模型的抽取结果
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单块板或单个文件
//! - `RoleClassifier` - 确定板目录中每个文件的角色
//! - `StructuredExtractor` - 学生抽取 / 标准答案抽取
//! - `compare` - 逐项比对并统计七个类别
//! - `DatasetWriter` - 写 JSONL 训练样本
//! - `FineTuneManager` - 微调任务的完整生命周期
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一块板"的完整处理流程
//! - `BoardCtx` - 上下文封装（轮次 + 板序号 + 模型）
//! - `BoardFlow` - 流程编排（extract → compare → dataset → artifact）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/round_runner` - 轮次循环，管理并发、断点和微调
//! - `orchestrator/scanner` - 样本目录扫描
//! - `orchestrator/state` - 断点与当前模型
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{BoardFileSet, BoardOutcome, ExtractionResult, RoundReport};
pub use orchestrator::{App, Collaborators, RunOutcome};
pub use workflow::{BoardCtx, BoardFlow};
