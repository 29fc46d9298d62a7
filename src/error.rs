use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 批次接收错误
    #[error("接收错误: {0}")]
    Intake(#[from] IntakeError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 记录存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 执行历史错误
    #[error("历史错误: {0}")]
    History(#[from] HistoryError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 批次接收错误
#[derive(Debug, Error)]
pub enum IntakeError {
    /// 输入为空
    #[error("输入文档为空")]
    EmptyInput,
    /// 无法解析为预期结构
    #[error("输入文档无法解析: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },
    /// 缺少 requests 字段
    #[error("输入文档缺少 requests 字段")]
    MissingRequests,
    /// requests 为空数组
    #[error("输入文档不包含任何请求")]
    NoRequests,
    /// 某个请求为空字符串
    #[error("第 {index} 个请求为空")]
    BlankRequest { index: usize },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 请求构建失败
    #[error("LLM 请求构建失败: {source}")]
    RequestBuildFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 记录存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 容器不存在且未允许自动创建
    #[error("容器不存在: {database}/{container}")]
    ContainerNotFound { database: String, container: String },
    /// 写入记录失败
    #[error("写入记录失败 ({id}): {source}")]
    WriteFailed {
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 读取记录失败
    #[error("读取记录失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 执行历史错误
#[derive(Debug, Error)]
pub enum HistoryError {
    /// 追加历史事件失败
    #[error("追加历史事件失败 (实例: {instance_id}): {source}")]
    AppendFailed {
        instance_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 读取历史失败
    #[error("读取历史失败 (实例: {instance_id}): {source}")]
    LoadFailed {
        instance_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 历史文件损坏
    #[error("历史文件损坏 (实例: {instance_id}, 行: {line}): {source}")]
    Corrupt {
        instance_id: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    /// 实例不存在
    #[error("实例不存在: {instance_id}")]
    InstanceNotFound { instance_id: String },
    /// 历史与批次内容不一致，无法确定性回放
    #[error("历史无法确定性回放 (实例: {instance_id}): {detail}")]
    NonDeterministic { instance_id: String, detail: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 必填配置项缺失
    #[error("必填配置项 {field} 为空")]
    MissingField { field: String },
    /// 配置值非法
    #[error("配置项 {field} 非法: {reason}")]
    InvalidValue { field: String, reason: String },
    /// 配置文件读取或解析失败
    #[error("配置文件 {path} 读取失败: {source}")]
    FileFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Intake(IntakeError::Malformed { source: err })
    }
}

impl From<async_openai::error::OpenAIError> for AppError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        AppError::Llm(LlmError::RequestBuildFailed {
            source: Box::new(err),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::FileFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建记录写入错误
    pub fn store_write_failed(
        id: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Store(StoreError::WriteFailed {
            id: id.into(),
            source: Box::new(source),
        })
    }

    /// 创建历史追加错误
    pub fn history_append_failed(
        instance_id: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::History(HistoryError::AppendFailed {
            instance_id: instance_id.into(),
            source: Box::new(source),
        })
    }

    /// 创建历史读取错误
    pub fn history_load_failed(
        instance_id: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::History(HistoryError::LoadFailed {
            instance_id: instance_id.into(),
            source: Box::new(source),
        })
    }

    /// 是否为执行历史（检查点）错误
    ///
    /// 这类错误不属于单个条目，调用方应该中止当前实例的推进
    pub fn is_history(&self) -> bool {
        matches!(self, AppError::History(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
