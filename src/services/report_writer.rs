//! 轮次报告写入 - 业务能力层

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::RoundReport;

/// 把每轮的结果写成 `<dir>/round-<n>.json`
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn report_path(&self, round: u32) -> PathBuf {
        self.dir.join(format!("round-{}.json", round))
    }

    pub async fn write(&self, report: &RoundReport) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::io(&self.dir, e))?;

        let path = self.report_path(report.round);
        let body = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| AppError::io(&path, e))?;

        debug!("第 {} 轮报告已写入 {}", report.round, path.display());
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoardOutcome, ComparisonStats};

    #[tokio::test]
    async fn test_writes_round_report() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("reports"));

        let report = RoundReport {
            round: 3,
            model: "ft:model".to_string(),
            finished_at: chrono::Local::now(),
            scanned: 1,
            success_count: 0,
            fail_count: 1,
            unresolved: 0,
            totals: ComparisonStats::default(),
            boards: vec![BoardOutcome::failed("PWR", "2024", "boom")],
        };

        let path = writer.write(&report).await.unwrap();
        assert_eq!(path, writer.dir().join("round-3.json"));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["round"], 3);
        assert_eq!(value["boards"][0]["diffs"][0], "Error: boom");
        assert_eq!(value["totals"]["SET"]["fail"], 0);
    }
}
