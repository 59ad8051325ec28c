use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// JSON 序列化/解析错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),
    /// TOML 解析错误
    #[error("TOML解析失败 ({path}): {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 补全服务错误
    #[error("补全服务错误: {0}")]
    Completion(#[from] CompletionError),
    /// 微调服务错误
    #[error("微调错误: {0}")]
    FineTune(#[from] FineTuneError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: &'static str,
    },
    /// 缺少必需的配置项
    #[error("缺少必需的配置项: {0}")]
    Missing(&'static str),
    /// 配置值非法
    #[error("配置项 {key} 非法: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// 补全服务（LLM）错误
#[derive(Debug, Error)]
pub enum CompletionError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容不是合法 JSON
    #[error("LLM返回内容不是合法JSON (模型: {model}): {source}")]
    InvalidJson {
        model: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 结构化抽取错误
///
/// 抽取失败在编排层被转换为空结果（软失败），不会中断本轮
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// 补全服务调用失败或返回非 JSON
    #[error(transparent)]
    Completion(#[from] CompletionError),
    /// 返回的 JSON 与约定结构不符
    #[error("{contract} 结构不符: {reason}")]
    Schema {
        contract: &'static str,
        reason: String,
    },
}

/// 微调服务错误
#[derive(Debug, Error)]
pub enum FineTuneError {
    /// 读取数据集失败
    #[error("读取数据集失败 ({path}): {source}")]
    DatasetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 网络请求失败
    #[error("微调API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// API 返回错误响应
    #[error("微调API返回错误响应 ({endpoint}): status={status}, body={body}")]
    BadResponse {
        endpoint: String,
        status: u16,
        body: String,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件错误
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }
}

impl CompletionError {
    /// 创建 API 调用失败错误
    pub fn api_call_failed(model: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CompletionError::ApiCallFailed {
            model: model.into(),
            message: err.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
