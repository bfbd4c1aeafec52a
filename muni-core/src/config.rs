use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub state_path: PathBuf,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            state_path: PathBuf::from("muni-state.db"),
            request_timeout: Duration::from_millis(30_000),
        }
    }
}

impl ClientConfig {
    pub fn load() -> Self {
        let defaults = Self::default();
        let base_url: String = try_load("MUNI_API_URL", DEFAULT_API_URL, defaults.base_url);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            state_path: try_load("MUNI_STATE_PATH", "muni-state.db", defaults.state_path),
            request_timeout: Duration::from_millis(try_load(
                "MUNI_REQUEST_TIMEOUT_MS",
                "30000",
                30_000u64,
            )),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }
}

fn try_load<T: FromStr>(key: &str, shown_default: &str, fallback: T) -> T
where
    T::Err: Display,
{
    let Ok(raw) = env::var(key) else {
        info!("{key} not set, using default: {shown_default}");
        return fallback;
    };
    raw.parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value: {e}, using default: {shown_default}");
        fallback
    })
}
