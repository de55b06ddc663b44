use serde::Serialize;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9199";
const DEFAULT_UPLOAD_CONCURRENCY: usize = 2;

/// Storage connection settings read from the environment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    #[serde(skip)]
    pub token: Option<String>,
    pub token_configured: bool,
    pub upload_concurrency: usize,
}

impl ClientSettings {
    pub fn from_env() -> Self {
        let base_url = std::env::var("STORAGE_BASE_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let token = std::env::var("STORAGE_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        let upload_concurrency =
            read_usize_env("UPLOAD_FIELD_CONCURRENCY", DEFAULT_UPLOAD_CONCURRENCY);

        Self {
            base_url,
            token_configured: token.is_some(),
            token,
            upload_concurrency,
        }
    }
}

fn read_usize_env(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
