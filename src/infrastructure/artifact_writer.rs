//! 生成物写入 - 基础设施层

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{BoardFileSet, ExtractionResult};

/// 把学生模型的抽取结果落地到板目录
#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    /// 返回写入的文件路径
    async fn write(&self, board: &BoardFileSet, result: &ExtractionResult) -> AppResult<PathBuf>;
}

/// 写成 `<板目录>/generated/<板名>_generated.json`
#[derive(Debug, Default, Clone)]
pub struct JsonArtifactWriter;

impl JsonArtifactWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn artifact_path(board: &BoardFileSet) -> PathBuf {
        board
            .dir
            .join("generated")
            .join(format!("{}_generated.json", board.name))
    }
}

#[async_trait]
impl ArtifactWriter for JsonArtifactWriter {
    async fn write(&self, board: &BoardFileSet, result: &ExtractionResult) -> AppResult<PathBuf> {
        let path = Self::artifact_path(board);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::io(parent, e))?;
        }

        let body = serde_json::to_string_pretty(result)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| AppError::io(&path, e))?;

        debug!("{} 生成物已写入 {}", board, path.display());
        Ok(path)
    }
}
