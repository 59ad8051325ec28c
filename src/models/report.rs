use chrono::{DateTime, Local};
use serde::Serialize;

use super::ComparisonStats;

/// 单块板的处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardOutcome {
    pub name: String,
    pub year: String,
    pub success: bool,
    pub diffs: Vec<String>,
    pub stats: ComparisonStats,
    /// 标准答案是否贡献了训练样本
    pub contributed_samples: bool,
}

impl BoardOutcome {
    /// 处理过程中出现致命错误的板：只有一条 `Error: …` 差异
    pub fn failed(name: &str, year: &str, message: impl std::fmt::Display) -> Self {
        Self {
            name: name.to_string(),
            year: year.to_string(),
            success: false,
            diffs: vec![format!("Error: {}", message)],
            stats: ComparisonStats::default(),
            contributed_samples: false,
        }
    }
}

/// 每轮结束时写入 `<report_dir>/round-<n>.json` 的报告
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub round: u32,
    pub model: String,
    pub finished_at: DateTime<Local>,
    pub scanned: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub unresolved: usize,
    pub totals: ComparisonStats,
    pub boards: Vec<BoardOutcome>,
}
