//! 补全服务 - 基础设施层
//!
//! 只负责"发一条提示词，拿回一个 JSON 对象"，不关心提示词内容
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 强制 JSON 对象响应格式
//! - 兼容 OpenAI API 的服务（通过 base url 切换）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::CompletionError;

/// 语言模型补全服务
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// 以 JSON 模式调用 `model`，返回解析后的 JSON
    async fn complete_json(&self, model: &str, prompt: &str) -> Result<Value, CompletionError>;
}

/// OpenAI 兼容实现
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    temperature: f32,
}

impl OpenAiCompletion {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete_json(&self, model: &str, prompt: &str) -> Result<Value, CompletionError> {
        debug!("调用 LLM API，模型: {}，提示词 {} 字符", model, prompt.len());

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| CompletionError::api_call_failed(model, e))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(self.temperature)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| CompletionError::api_call_failed(model, e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败 ({}): {}", model, e);
            CompletionError::api_call_failed(model, e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CompletionError::EmptyContent {
                model: model.to_string(),
            })?;

        serde_json::from_str(content.trim()).map_err(|source| CompletionError::InvalidJson {
            model: model.to_string(),
            source,
        })
    }
}
