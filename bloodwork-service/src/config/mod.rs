use serde::Deserialize;
use service_core::config as core_config;
use service_core::config::get_env;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct BloodworkConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub storage: StorageConfig,
    pub ocr: OcrConfig,
    pub ai: AiConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub local_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Use the scripted mock provider instead of the real API.
    pub use_mock: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub max_file_size_bytes: i64,
    /// Minimum interval between coalesced progress writes, in milliseconds.
    pub progress_throttle_ms: u64,
}

impl PipelineConfig {
    pub fn progress_throttle(&self) -> Duration {
        Duration::from_millis(self.progress_throttle_ms)
    }
}

impl BloodworkConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(BloodworkConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("bloodwork_db"), is_prod)?,
            },
            storage: StorageConfig {
                local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), is_prod)?,
            },
            ocr: OcrConfig {
                base_url: get_env("OCR_BASE_URL", Some("https://api.ocr.space"), is_prod)?,
                api_key: get_env("OCR_API_KEY", Some(""), is_prod)?,
            },
            ai: AiConfig {
                base_url: get_env("AI_BASE_URL", Some("https://api.openai.com/v1"), is_prod)?,
                api_key: get_env("AI_API_KEY", Some(""), is_prod)?,
                model: get_env("AI_MODEL", Some("o4-mini"), is_prod)?,
                use_mock: env::var("AI_USE_MOCK")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
            },
            pipeline: PipelineConfig {
                max_file_size_bytes: get_env("MAX_FILE_SIZE_BYTES", Some("10485760"), is_prod)?
                    .parse()
                    .map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!("Invalid MAX_FILE_SIZE_BYTES: {}", e))
                    })?,
                progress_throttle_ms: get_env("PROGRESS_THROTTLE_MS", Some("400"), is_prod)?
                    .parse()
                    .map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!("Invalid PROGRESS_THROTTLE_MS: {}", e))
                    })?,
            },
        })
    }
}
