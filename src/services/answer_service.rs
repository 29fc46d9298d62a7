//! 回答服务 - 业务能力层
//!
//! 只负责"为一个请求取得补全文本"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型部署名称
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::utils::truncate_text;

/// 补全后端
///
/// 返回 `Ok(None)` 表示"没有可用内容"；网络或服务故障以 `Err` 返回
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &str) -> AppResult<Option<String>>;

    /// 目标模型部署名称（仅用于日志）
    fn deployment(&self) -> &str;
}

/// 基于 async-openai 的补全后端
pub struct OpenAiCompletionBackend {
    client: Client<OpenAIConfig>,
    deployment_name: String,
    system_message: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompletionBackend {
    /// 创建新的补全后端
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            deployment_name: config.chat_model_deployment_name.clone(),
            system_message: config.llm_system_message.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
        }
    }

    fn build_messages(&self, request: &str) -> AppResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::new();

        if let Some(sys_msg) = &self.system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg.as_str())
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        Ok(messages)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletionBackend {
    async fn complete(&self, request: &str) -> AppResult<Option<String>> {
        debug!("调用 LLM API，模型部署: {}", self.deployment_name);

        let request_args = CreateChatCompletionRequestArgs::default()
            .model(&self.deployment_name)
            .messages(self.build_messages(request)?)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()?;

        let response = self
            .client
            .chat()
            .create(request_args)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                crate::error::AppError::llm_api_failed(&self.deployment_name, e)
            })?;

        debug!("LLM API 调用成功");

        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone()))
    }

    fn deployment(&self) -> &str {
        &self.deployment_name
    }
}

/// 回答服务
///
/// 职责：
/// - 为单个请求取得补全文本
/// - 把空白回答归一化为"没有回答"，非空回答原样返回
/// - 不重试，重试由编排层通过回放完成
#[derive(Clone)]
pub struct AnswerService {
    backend: Arc<dyn CompletionBackend>,
}

impl AnswerService {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// 回答一个请求
    ///
    /// # 返回
    /// - `Ok(Some(text))`: 模型返回的原始文本
    /// - `Ok(None)`: 后端没有给出可用内容
    /// - `Err(_)`: 后端调用失败
    pub async fn answer(&self, request: &str) -> AppResult<Option<String>> {
        let content = self.backend.complete(request).await?;
        let answer = content.filter(|c| !c.trim().is_empty());

        match &answer {
            Some(text) => debug!(
                "[回答] 请求: {} | 回答: {}",
                truncate_text(request, 80),
                truncate_text(text, 200)
            ),
            None => debug!(
                "[回答] 请求: {} | 模型 {} 未返回内容",
                truncate_text(request, 80),
                self.backend.deployment()
            ),
        }

        Ok(answer)
    }
}
