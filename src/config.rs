use crate::error::{AppResult, ConfigError};
use serde::Deserialize;
use std::path::Path;

/// 程序配置文件
///
/// 所有值都是透传给外部服务的不透明配置，编排层不解释其含义
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    /// 目标补全模型的部署名称（必填）
    pub chat_model_deployment_name: String,
    pub llm_api_key: String,
    /// 兼容 OpenAI API 的服务地址（必填）
    pub llm_api_base_url: String,
    /// 可选的系统消息
    pub llm_system_message: Option<String>,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    // --- 记录存储配置 ---
    /// 目标数据库（必填）
    pub cosmos_db_database: String,
    /// 目标容器（必填）
    pub cosmos_db_container: String,
    /// 文件存储根目录
    pub store_root: String,
    /// 容器不存在时是否自动创建
    pub create_if_not_exists: bool,
    // --- 编排配置 ---
    /// 执行历史目录
    pub history_dir: String,
    /// 输入文档目录
    pub input_folder: String,
    /// 接收后是否删除输入文档
    pub remove_processed_inputs: bool,
    /// 同时运行的实例数量
    pub max_concurrent_instances: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chat_model_deployment_name: "gpt-4o-mini".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_system_message: None,
            llm_temperature: 0.3,
            llm_max_tokens: 1024,
            cosmos_db_database: "prompts".to_string(),
            cosmos_db_container: "responses".to_string(),
            store_root: "output_store".to_string(),
            create_if_not_exists: true,
            history_dir: "history".to_string(),
            input_folder: "input".to_string(),
            remove_processed_inputs: true,
            max_concurrent_instances: 4,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置（文件不存在时使用默认值），再应用环境变量覆盖
    pub fn load(path: &Path) -> AppResult<Self> {
        let base = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
            toml::from_str::<Config>(&content).map_err(|e| ConfigError::FileFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    fn with_env_overrides(self) -> AppResult<Self> {
        let config = Self {
            chat_model_deployment_name: env_string("CHAT_MODEL_DEPLOYMENT_NAME")
                .unwrap_or(self.chat_model_deployment_name),
            llm_api_key: env_string("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_system_message: env_string("LLM_SYSTEM_MESSAGE").or(self.llm_system_message),
            llm_temperature: env_parse("LLM_TEMPERATURE", "f32")?.unwrap_or(self.llm_temperature),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS", "u32")?.unwrap_or(self.llm_max_tokens),
            cosmos_db_database: env_string("COSMOS_DB_DATABASE")
                .unwrap_or(self.cosmos_db_database),
            cosmos_db_container: env_string("COSMOS_DB_CONTAINER")
                .unwrap_or(self.cosmos_db_container),
            store_root: env_string("STORE_ROOT").unwrap_or(self.store_root),
            create_if_not_exists: env_parse("CREATE_IF_NOT_EXISTS", "bool")?
                .unwrap_or(self.create_if_not_exists),
            history_dir: env_string("HISTORY_DIR").unwrap_or(self.history_dir),
            input_folder: env_string("INPUT_FOLDER").unwrap_or(self.input_folder),
            remove_processed_inputs: env_parse("REMOVE_PROCESSED_INPUTS", "bool")?
                .unwrap_or(self.remove_processed_inputs),
            max_concurrent_instances: env_parse("MAX_CONCURRENT_INSTANCES", "usize")?
                .unwrap_or(self.max_concurrent_instances),
            verbose_logging: env_parse("VERBOSE_LOGGING", "bool")?.unwrap_or(self.verbose_logging),
        };
        Ok(config)
    }

    /// 检查必填配置项
    pub fn validate(&self) -> AppResult<()> {
        let required = [
            ("chat_model_deployment_name", &self.chat_model_deployment_name),
            ("llm_api_base_url", &self.llm_api_base_url),
            ("cosmos_db_database", &self.cosmos_db_database),
            ("cosmos_db_container", &self.cosmos_db_container),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                }
                .into());
            }
        }

        if self.max_concurrent_instances == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_instances".to_string(),
                reason: "必须大于 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok()
}

fn env_parse<T: std::str::FromStr>(var_name: &str, expected_type: &str) -> AppResult<Option<T>> {
    match std::env::var(var_name) {
        Ok(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_missing_deployment_name_rejected() {
        let config = Config {
            chat_model_deployment_name: "  ".to_string(),
            ..Config::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chat_model_deployment_name"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = Config {
            max_concurrent_instances: 0,
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            chat_model_deployment_name = "chat"
            cosmos_db_container = "answers"
            "#,
        )
        .unwrap();

        assert_eq!(config.chat_model_deployment_name, "chat");
        assert_eq!(config.cosmos_db_container, "answers");
        assert_eq!(config.cosmos_db_database, "prompts");
        assert!(config.create_if_not_exists);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();

        assert!(config.validate().is_ok());
    }
}
