use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Provider gateways (normalized-shape endpoints)
    pub places_api_url: String,
    pub places_api_key: String,
    pub events_api_url: String,
    pub events_api_key: String,

    // Optional model classifier
    pub anthropic_api_key: String,
    pub classifier_model: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Budgets
    /// Daily places spend cap in hundredths of a cent. 0 = unlimited.
    pub places_daily_budget: u64,
    /// Daily events spend cap in hundredths of a cent. 0 = unlimited.
    pub events_daily_budget: u64,

    // Quality
    /// Results below this rating are filtered out.
    pub min_rating: f32,
    /// Below this count the fallback ladder engages.
    pub min_acceptable_results: usize,
    /// The count a "good" response carries.
    pub good_result_count: usize,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            places_api_url: required_env("PLACES_API_URL"),
            places_api_key: env::var("PLACES_API_KEY").unwrap_or_default(),
            events_api_url: required_env("EVENTS_API_URL"),
            events_api_key: env::var("EVENTS_API_KEY").unwrap_or_default(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            classifier_model: env::var("CLASSIFIER_MODEL")
                .unwrap_or_else(|_| "claude-3-5-haiku-latest".to_string()),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            places_daily_budget: env_u64("PLACES_DAILY_BUDGET", 100_000), // $10/day
            events_daily_budget: env_u64("EVENTS_DAILY_BUDGET", 100_000),
            min_rating: env::var("MIN_RATING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3.5),
            min_acceptable_results: env_u64("MIN_ACCEPTABLE_RESULTS", 5) as usize,
            good_result_count: env_u64("GOOD_RESULT_COUNT", 15) as usize,
        }
    }

    /// A config with test-friendly defaults and no env reads.
    pub fn for_tests() -> Self {
        Self {
            places_api_url: "http://localhost:0".to_string(),
            places_api_key: String::new(),
            events_api_url: "http://localhost:0".to_string(),
            events_api_key: String::new(),
            anthropic_api_key: String::new(),
            classifier_model: "claude-3-5-haiku-latest".to_string(),
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            places_daily_budget: 0,
            events_daily_budget: 0,
            min_rating: 3.5,
            min_acceptable_results: 5,
            good_result_count: 15,
        }
    }

    /// Log key presence without leaking values.
    pub fn log_redacted(&self) {
        let vars = [
            ("PLACES_API_KEY", &self.places_api_key),
            ("EVENTS_API_KEY", &self.events_api_key),
            ("ANTHROPIC_API_KEY", &self.anthropic_api_key),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
