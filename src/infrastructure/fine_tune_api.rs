//! 微调 API - 基础设施层
//!
//! 只暴露"上传数据集 / 创建任务 / 查询任务"三个能力，轮询节奏由服务层决定

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::error::FineTuneError;
use crate::models::fine_tune::{FineTuneJobResponse, UploadedFile};
use crate::models::FineTuneJob;

#[async_trait]
pub trait FineTuneApi: Send + Sync {
    /// 上传数据集（purpose = fine-tune），返回文件 ID
    async fn upload(&self, dataset: &Path) -> Result<String, FineTuneError>;

    /// 以 `base_model` 为基础创建微调任务
    async fn submit(
        &self,
        file_id: &str,
        base_model: &str,
        n_epochs: u32,
    ) -> Result<FineTuneJob, FineTuneError>;

    /// 查询任务当前状态
    async fn poll(&self, job_id: &str) -> Result<FineTuneJob, FineTuneError>;
}

/// OpenAI 兼容的 REST 实现
pub struct OpenAiFineTuneApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiFineTuneApi {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.llm_api_base_url.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn read_json<T: DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<T, FineTuneError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FineTuneError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|source| FineTuneError::RequestFailed {
                endpoint: endpoint.to_string(),
                source,
            })
    }
}

fn request_failed(endpoint: &str) -> impl FnOnce(reqwest::Error) -> FineTuneError + '_ {
    move |source| FineTuneError::RequestFailed {
        endpoint: endpoint.to_string(),
        source,
    }
}

#[async_trait]
impl FineTuneApi for OpenAiFineTuneApi {
    async fn upload(&self, dataset: &Path) -> Result<String, FineTuneError> {
        let endpoint = "/files";
        let bytes =
            tokio::fs::read(dataset)
                .await
                .map_err(|source| FineTuneError::DatasetUnreadable {
                    path: dataset.to_path_buf(),
                    source,
                })?;
        debug!("上传数据集 {}（{} 字节）", dataset.display(), bytes.len());

        let file_name = dataset
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset.jsonl".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/jsonl")
            .map_err(request_failed(endpoint))?;
        let form = Form::new().text("purpose", "fine-tune").part("file", part);

        let response = self
            .http
            .post(self.url(endpoint))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(request_failed(endpoint))?;

        let uploaded: UploadedFile = Self::read_json(endpoint, response).await?;
        Ok(uploaded.id)
    }

    async fn submit(
        &self,
        file_id: &str,
        base_model: &str,
        n_epochs: u32,
    ) -> Result<FineTuneJob, FineTuneError> {
        let endpoint = "/fine_tuning/jobs";
        let body = json!({
            "training_file": file_id,
            "model": base_model,
            "hyperparameters": { "n_epochs": n_epochs },
        });

        let response = self
            .http
            .post(self.url(endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(request_failed(endpoint))?;

        let job: FineTuneJobResponse = Self::read_json(endpoint, response).await?;
        Ok(job.into())
    }

    async fn poll(&self, job_id: &str) -> Result<FineTuneJob, FineTuneError> {
        let endpoint = format!("/fine_tuning/jobs/{}", job_id);

        let response = self
            .http
            .get(self.url(&endpoint))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(request_failed(&endpoint))?;

        let job: FineTuneJobResponse = Self::read_json(&endpoint, response).await?;
        Ok(job.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_strips_trailing_slash() {
        let config = Config {
            llm_api_base_url: "https://api.example.com/v1/".to_string(),
            llm_api_key: "sk-test".to_string(),
            ..Config::default()
        };
        let api = OpenAiFineTuneApi::new(&config);
        assert_eq!(
            api.url("/fine_tuning/jobs/ftjob-1"),
            "https://api.example.com/v1/fine_tuning/jobs/ftjob-1"
        );
    }

    #[tokio::test]
    async fn test_upload_missing_dataset_is_unreadable() {
        let api = OpenAiFineTuneApi::new(&Config::default());
        let dir = tempfile::tempdir().unwrap();

        let err = api
            .upload(&dir.path().join("absent.jsonl"))
            .await
            .unwrap_err();
        assert!(matches!(err, FineTuneError::DatasetUnreadable { .. }));
    }
}
