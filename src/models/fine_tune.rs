use serde::Deserialize;

/// 微调任务状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// 将服务端状态字符串映射为三态
    ///
    /// `succeeded` 成功，`failed` / `cancelled` 失败，其余（validating_files、queued、running …）视为进行中
    pub fn from_api(status: &str) -> Self {
        match status {
            "succeeded" => JobStatus::Succeeded,
            "failed" | "cancelled" => JobStatus::Failed,
            _ => JobStatus::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// 微调任务快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FineTuneJob {
    pub id: String,
    pub status: JobStatus,
    /// 原始状态字符串（日志用）
    pub raw_status: String,
    /// 成功后生成的模型 ID
    pub fine_tuned_model: Option<String>,
}

/// `/fine_tuning/jobs` 响应体中用到的字段
#[derive(Debug, Clone, Deserialize)]
pub struct FineTuneJobResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub fine_tuned_model: Option<String>,
}

impl From<FineTuneJobResponse> for FineTuneJob {
    fn from(resp: FineTuneJobResponse) -> Self {
        Self {
            status: JobStatus::from_api(&resp.status),
            id: resp.id,
            raw_status: resp.status,
            fine_tuned_model: resp.fine_tuned_model.filter(|m| !m.trim().is_empty()),
        }
    }
}

/// `/files` 上传响应
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub id: String,
}
