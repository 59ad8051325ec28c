//! 微调任务管理 - 业务能力层
//!
//! 上传 → 创建任务 → 轮询到终态，返回新模型 ID 或失败原因。
//! 不负责持久化模型（由编排层处理）。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::FineTuneError;
use crate::infrastructure::FineTuneApi;
use crate::models::JobStatus;

/// 一次微调的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FineTuneOutcome {
    /// 新模型 ID
    Succeeded(String),
    /// 失败原因（继续使用旧模型）
    Failed(String),
}

pub struct FineTuneManager {
    api: Arc<dyn FineTuneApi>,
    n_epochs: u32,
    poll_interval: Duration,
}

impl FineTuneManager {
    pub fn new(api: Arc<dyn FineTuneApi>, config: &Config) -> Self {
        Self {
            api,
            n_epochs: config.fine_tune_epochs,
            poll_interval: config.fine_tune_poll_interval(),
        }
    }

    /// 以 `base_model` 为基础训练，阻塞直到任务结束
    ///
    /// 任何上传 / 创建 / 轮询错误都折算为 `Failed`
    pub async fn run(&self, dataset: &Path, base_model: &str) -> FineTuneOutcome {
        match self.run_inner(dataset, base_model).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("⚠️ 微调失败: {}", e);
                FineTuneOutcome::Failed(e.to_string())
            }
        }
    }

    async fn run_inner(
        &self,
        dataset: &Path,
        base_model: &str,
    ) -> Result<FineTuneOutcome, FineTuneError> {
        let file_id = self.api.upload(dataset).await?;
        info!("📤 数据集已上传: {}", file_id);

        let mut job = self.api.submit(&file_id, base_model, self.n_epochs).await?;
        info!("⏳ 等待微调任务 {}（基础模型 {}）", job.id, base_model);

        while !job.status.is_terminal() {
            tokio::time::sleep(self.poll_interval).await;
            job = self.api.poll(&job.id).await?;
            info!("   任务 {} 状态: {}", job.id, job.raw_status);
        }

        Ok(match (job.status, job.fine_tuned_model) {
            (JobStatus::Succeeded, Some(model)) => {
                info!("✨ 新模型: {}", model);
                FineTuneOutcome::Succeeded(model)
            }
            (JobStatus::Succeeded, None) => {
                warn!("⚠️ 任务 {} 成功但没有返回模型 ID", job.id);
                FineTuneOutcome::Failed(format!("任务 {} 没有返回模型 ID", job.id))
            }
            _ => {
                warn!("⚠️ 任务 {} 以 {} 结束", job.id, job.raw_status);
                FineTuneOutcome::Failed(format!("任务 {} 状态 {}", job.id, job.raw_status))
            }
        })
    }
}
