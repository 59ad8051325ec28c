//! 数据集累积 - 业务能力层
//!
//! 只负责"把标准答案写成微调样本"，不关心何时触发微调

use std::path::{Path, PathBuf};

use serde_json::json;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{ExtractionResult, TrainingRecord};
use crate::utils::truncate_chars;

const BOM_SYSTEM_PROMPT: &str = "Extract structured BOM data.";
const COORD_SYSTEM_PROMPT: &str = "Extract Coordinate data.";

/// 微调数据集写入服务（JSONL）
///
/// 每块贡献样本的板写两行：先 BOM，后坐标
pub struct DatasetWriter {
    path: PathBuf,
    input_char_budget: usize,
}

impl DatasetWriter {
    pub fn new(path: impl Into<PathBuf>, input_char_budget: usize) -> Self {
        Self {
            path: path.into(),
            input_char_budget,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_parent(&self) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| AppError::io(parent, e))?;
            }
        }
        Ok(())
    }

    /// 清空数据集（新一轮从头开始时调用）
    pub async fn reset(&self) -> AppResult<()> {
        self.ensure_parent().await?;
        fs::write(&self.path, b"")
            .await
            .map_err(|e| AppError::io(&self.path, e))?;
        debug!("数据集已清空: {}", self.path.display());
        Ok(())
    }

    /// 数据集文件存在且非空
    pub async fn has_records(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    }

    /// 构造一块板的两条样本
    pub fn records_for(
        &self,
        bom_text: &str,
        coord_text: &str,
        truth: &ExtractionResult,
    ) -> AppResult<[TrainingRecord; 2]> {
        let bom_completion = serde_json::to_string(&json!({ "items": truth.items }))?;
        let coord_completion = serde_json::to_string(&truth.coords)?;

        Ok([
            TrainingRecord::new(
                BOM_SYSTEM_PROMPT,
                truncate_chars(bom_text, self.input_char_budget),
                bom_completion,
            ),
            TrainingRecord::new(
                COORD_SYSTEM_PROMPT,
                truncate_chars(coord_text, self.input_char_budget),
                coord_completion,
            ),
        ])
    }

    /// 追加一块板的样本
    pub async fn append(
        &self,
        bom_text: &str,
        coord_text: &str,
        truth: &ExtractionResult,
    ) -> AppResult<()> {
        let records = self.records_for(bom_text, coord_text, truth)?;

        let mut lines = String::new();
        for record in &records {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }

        self.ensure_parent().await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AppError::io(&self.path, e))?;
        file.write_all(lines.as_bytes())
            .await
            .map_err(|e| AppError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| AppError::io(&self.path, e))?;

        debug!("写入 {} 条样本到 {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BomItem, Coordinate, Role};

    fn truth() -> ExtractionResult {
        let mut result = ExtractionResult {
            items: vec![BomItem {
                item_name: "R1005".to_string(),
                item_type: "저항".to_string(),
                qty: "1".to_string(),
                refs: vec!["R1".to_string()],
            }],
            ..Default::default()
        };
        result.coords.insert(
            "R1".to_string(),
            Coordinate {
                x: Some("1".to_string()),
                y: Some("2".to_string()),
                rot: None,
                side: Some("TOP".to_string()),
            },
        );
        result
    }

    #[tokio::test]
    async fn test_append_writes_two_chat_records() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DatasetWriter::new(dir.path().join("dataset.jsonl"), 5);
        assert!(!writer.has_records().await);

        writer.append("ABCDEFGH", "RefDes", &truth()).await.unwrap();
        assert!(writer.has_records().await);

        let content = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let bom: TrainingRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(bom.messages.len(), 3);
        assert_eq!(bom.messages[0].role, Role::System);
        assert_eq!(bom.messages[0].content, "Extract structured BOM data.");
        assert_eq!(bom.messages[1].content, "ABCDE");
        let completion: serde_json::Value = serde_json::from_str(&bom.messages[2].content).unwrap();
        assert_eq!(completion["items"][0]["itemName"], "R1005");

        let coord: TrainingRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(coord.messages[0].content, "Extract Coordinate data.");
        let completion: serde_json::Value = serde_json::from_str(&coord.messages[2].content).unwrap();
        assert_eq!(completion["R1"]["side"], "TOP");
        assert!(completion["R1"].get("rot").is_none());
    }

    #[tokio::test]
    async fn test_reset_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DatasetWriter::new(dir.path().join("state").join("dataset.jsonl"), 100);

        writer.reset().await.unwrap();
        assert!(writer.path().exists());
        assert!(!writer.has_records().await);

        writer.append("bom", "coord", &truth()).await.unwrap();
        writer.append("bom", "coord", &truth()).await.unwrap();
        assert_eq!(std::fs::read_to_string(writer.path()).unwrap().lines().count(), 4);

        writer.reset().await.unwrap();
        assert!(!writer.has_records().await);
    }
}
