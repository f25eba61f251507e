use std::env;
use std::str::FromStr;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub langbase: LangbaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub sources: SourcesConfig,
    pub agent: AgentSettings,
}

/// Langbase API configuration
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    pub api_key: String,
    pub base_url: String,
    /// Pipe used for every completion (planner, judge, synthesis).
    pub pipe: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Endpoints of the external knowledge sources
#[derive(Debug, Clone, Default)]
pub struct SourcesConfig {
    pub documents_url: Option<String>,
    pub jurisprudence_url: Option<String>,
    pub legislation_url: Option<String>,
    pub timeout_ms: u64,
}

/// Tunable agent constants.
///
/// Thresholds are inclusive: a document survives when its pertinence
/// score is greater than or equal to the threshold of its source.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub max_iterations: u32,
    pub rag_top_k: usize,
    pub rag_threshold: u8,
    pub jurisprudence_threshold: u8,
    pub legislation_threshold: u8,
    pub fail_open_score: u8,
    /// Legislation titles are generic, so filtering them is off by default.
    pub filter_legislation: bool,
    pub observation_limit: usize,
    pub citation_cap: usize,
    pub legislation_fetch_limit: usize,
    pub judge_content_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            rag_top_k: 10,
            rag_threshold: 5,
            jurisprudence_threshold: 4,
            legislation_threshold: 4,
            fail_open_score: 5,
            filter_legislation: false,
            observation_limit: 5,
            citation_cap: 10,
            legislation_fetch_limit: 3,
            judge_content_chars: 4000,
        }
    }
}

/// Parse an env var, falling back to the default when absent or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let langbase = LangbaseConfig {
            api_key: env::var("LANGBASE_API_KEY").map_err(|_| AppError::Config {
                message: "LANGBASE_API_KEY is required".to_string(),
            })?,
            base_url: env::var("LANGBASE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
            pipe: env::var("LANGBASE_PIPE")
                .unwrap_or_else(|_| "legal-research-agent-v1".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env_or("REQUEST_TIMEOUT_MS", 30000),
            max_retries: env_or("MAX_RETRIES", 3),
            retry_delay_ms: env_or("RETRY_DELAY_MS", 1000),
        };

        let sources = SourcesConfig {
            documents_url: env_opt("DOCUMENTS_API_URL"),
            jurisprudence_url: env_opt("JURISPRUDENCE_API_URL"),
            legislation_url: env_opt("LEGISLATION_API_URL"),
            timeout_ms: env_or("SOURCES_TIMEOUT_MS", 20000),
        };

        let defaults = AgentSettings::default();
        let agent = AgentSettings {
            max_iterations: env_or("AGENT_MAX_ITERATIONS", defaults.max_iterations),
            rag_top_k: env_or("RAG_TOP_K", defaults.rag_top_k),
            rag_threshold: env_or("RAG_PERTINENCE_THRESHOLD", defaults.rag_threshold).min(10),
            jurisprudence_threshold: env_or(
                "JURISPRUDENCE_PERTINENCE_THRESHOLD",
                defaults.jurisprudence_threshold,
            )
            .min(10),
            legislation_threshold: env_or(
                "LEGISLATION_PERTINENCE_THRESHOLD",
                defaults.legislation_threshold,
            )
            .min(10),
            fail_open_score: env_or("PERTINENCE_FAIL_OPEN_SCORE", defaults.fail_open_score)
                .min(10),
            filter_legislation: env_or("FILTER_LEGISLATION", defaults.filter_legislation),
            observation_limit: env_or("OBSERVATION_LIMIT", defaults.observation_limit),
            citation_cap: env_or("CITATION_CAP", defaults.citation_cap),
            legislation_fetch_limit: env_or(
                "LEGISLATION_FETCH_LIMIT",
                defaults.legislation_fetch_limit,
            ),
            judge_content_chars: env_or("JUDGE_CONTENT_CHARS", defaults.judge_content_chars),
        };

        Ok(Config {
            langbase,
            logging,
            request,
            sources,
            agent,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}
