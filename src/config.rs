use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError};

/// 默认配置文件名（存在时自动加载）
const DEFAULT_CONFIG_FILE: &str = "bomloop.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 样本根目录（<root>/<年份>/<板名>/）
    pub watch_root: PathBuf,
    /// 断点文件
    pub checkpoint_file: PathBuf,
    /// 当前模型 ID 文件
    pub model_file: PathBuf,
    /// 微调数据集（JSONL）
    pub dataset_file: PathBuf,
    /// 每轮报告目录
    pub report_dir: PathBuf,
    /// 学生模型初始 ID（没有模型文件时使用）
    pub initial_model: String,
    /// 验证模型 ID（生成标准答案）
    pub verifier_model: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub temperature: f32,
    // --- 批处理 ---
    /// 每批并发处理的板数
    pub batch_size: usize,
    /// 批次之间的冷却时间（毫秒）
    pub batch_cooldown_ms: u64,
    // --- 验证模型重试 ---
    pub verifier_max_attempts: usize,
    pub verifier_retry_delay_ms: u64,
    // --- 微调 ---
    pub fine_tune_epochs: u32,
    pub fine_tune_poll_interval_ms: u64,
    // --- 输入截断 ---
    /// BOM / 坐标 / 标准答案 BOM 的截断字符数
    pub input_char_budget: usize,
    /// 标准答案坐标的截断字符数
    pub truth_coord_char_budget: usize,
    /// 最大轮数（None 表示不限制）
    pub max_rounds: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_root: PathBuf::from("sample-data/24_25_SOCKET"),
            checkpoint_file: PathBuf::from("state/progress.json"),
            model_file: PathBuf::from("state/last_model.txt"),
            dataset_file: PathBuf::from("state/dataset.jsonl"),
            report_dir: PathBuf::from("state/reports"),
            initial_model: "gpt-4o-mini-2024-07-18".to_string(),
            verifier_model: "gpt-4o".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.1,
            batch_size: 5,
            batch_cooldown_ms: 2_000,
            verifier_max_attempts: 3,
            verifier_retry_delay_ms: 1_000,
            fine_tune_epochs: 3,
            fine_tune_poll_interval_ms: 30_000,
            input_char_budget: 15_000,
            truth_coord_char_budget: 30_000,
            max_rounds: None,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → TOML 文件（可选）→ 环境变量
    pub fn load() -> AppResult<Self> {
        let explicit = std::env::var("BOMLOOP_CONFIG").ok().map(PathBuf::from);
        let base = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        let config = base.with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取，未出现的键使用默认值
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        toml::from_str(&content).map_err(|source| AppError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 仅使用默认值 + 环境变量
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env()
    }

    fn with_env(self) -> AppResult<Self> {
        Ok(Self {
            watch_root: env_path("WATCH_ROOT").unwrap_or(self.watch_root),
            checkpoint_file: env_path("CHECKPOINT_FILE").unwrap_or(self.checkpoint_file),
            model_file: env_path("MODEL_FILE").unwrap_or(self.model_file),
            dataset_file: env_path("DATASET_FILE").unwrap_or(self.dataset_file),
            report_dir: env_path("REPORT_DIR").unwrap_or(self.report_dir),
            initial_model: std::env::var("INITIAL_MODEL").unwrap_or(self.initial_model),
            verifier_model: std::env::var("VERIFIER_MODEL").unwrap_or(self.verifier_model),
            llm_api_key: std::env::var("OPENAI_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(self.llm_api_base_url),
            temperature: env_parse("LLM_TEMPERATURE", "f32")?.unwrap_or(self.temperature),
            batch_size: env_parse("BATCH_SIZE", "usize")?.unwrap_or(self.batch_size),
            batch_cooldown_ms: env_parse("BATCH_COOLDOWN_MS", "u64")?
                .unwrap_or(self.batch_cooldown_ms),
            verifier_max_attempts: env_parse("VERIFIER_MAX_ATTEMPTS", "usize")?
                .unwrap_or(self.verifier_max_attempts),
            verifier_retry_delay_ms: env_parse("VERIFIER_RETRY_DELAY_MS", "u64")?
                .unwrap_or(self.verifier_retry_delay_ms),
            fine_tune_epochs: env_parse("FINE_TUNE_EPOCHS", "u32")?
                .unwrap_or(self.fine_tune_epochs),
            fine_tune_poll_interval_ms: env_parse("FINE_TUNE_POLL_INTERVAL_MS", "u64")?
                .unwrap_or(self.fine_tune_poll_interval_ms),
            input_char_budget: env_parse("INPUT_CHAR_BUDGET", "usize")?
                .unwrap_or(self.input_char_budget),
            truth_coord_char_budget: env_parse("TRUTH_COORD_CHAR_BUDGET", "usize")?
                .unwrap_or(self.truth_coord_char_budget),
            max_rounds: env_parse("MAX_ROUNDS", "u32")?.or(self.max_rounds),
        })
    }

    /// 启动前校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::Missing("OPENAI_API_KEY"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "batch_size",
                reason: "必须大于 0".to_string(),
            });
        }
        if self.verifier_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "verifier_max_attempts",
                reason: "必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn batch_cooldown(&self) -> Duration {
        Duration::from_millis(self.batch_cooldown_ms)
    }

    pub fn verifier_retry_delay(&self) -> Duration {
        Duration::from_millis(self.verifier_retry_delay_ms)
    }

    pub fn fine_tune_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fine_tune_poll_interval_ms)
    }
}

fn env_path(var_name: &str) -> Option<PathBuf> {
    std::env::var(var_name).ok().map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(
    var_name: &str,
    expected_type: &'static str,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type,
            }),
        Err(_) => Ok(None),
    }
}
