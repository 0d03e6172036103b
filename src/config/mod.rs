use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub is_dev: bool,
    pub ai: AiConfig,
}

/// Outbound endpoints used by the suggestion pipeline.
///
/// Everything except the generation backend is optional: a missing search
/// URL or provider key degrades suggestions, it never blocks startup.
#[derive(Clone, Debug)]
pub struct AiConfig {
    pub ollama_url: String,
    pub ollama_model: String,
    pub searx_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub gemini_model: String,
}

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:3b";
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            searx_url: None,
            gemini_api_key: None,
            gemini_api_url: DEFAULT_GEMINI_API_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

impl AiConfig {
    pub fn from_env() -> Self {
        AiConfig {
            ollama_url: non_empty_var("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            ollama_model: non_empty_var("OLLAMA_MODEL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            searx_url: non_empty_var("SEARXNG_URL"),
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            gemini_api_url: non_empty_var("GEMINI_API_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string()),
            gemini_model: non_empty_var("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        }
    }
}

/// Time budgets and size limits for one suggestion run.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub total_timeout: Duration,
    pub search_timeout: Duration,
    pub query_timeout: Duration,
    pub provider_timeout: Duration,
    pub generation_timeout: Duration,
    pub enrich_timeout: Duration,
    pub scrape_timeout: Duration,
    pub enrich_concurrency: usize,
    pub results_per_query: usize,
    pub max_search_results: usize,
    pub excerpt_chars: usize,
    pub og_body_limit: usize,
    pub og_value_limit: usize,
    pub temperature: f32,
    pub num_predict: u32,
    pub num_ctx: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            total_timeout: Duration::from_secs(120),
            search_timeout: Duration::from_secs(15),
            query_timeout: Duration::from_secs(10),
            provider_timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(120),
            enrich_timeout: Duration::from_secs(8),
            scrape_timeout: Duration::from_secs(3),
            enrich_concurrency: 3,
            results_per_query: 5,
            max_search_results: 5,
            excerpt_chars: 150,
            og_body_limit: 32 * 1024,
            og_value_limit: 500,
            temperature: 0.3,
            num_predict: 1024,
            num_ctx: 2048,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev_secret_change_in_production".to_string()),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            is_dev: env::var("APP_ENV").as_deref() != Ok("production"),
            ai: AiConfig::from_env(),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
