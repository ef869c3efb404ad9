use thiserror::Error;

/// Failure kinds recovered at component boundaries. None of these reach the
/// HTTP client — the search handler degrades to an empty envelope instead.
#[derive(Error, Debug)]
pub enum CityPulseError {
    #[error("Location resolution failed: {0}")]
    Resolution(String),

    #[error("Provider transport error ({provider}): {message}")]
    ProviderTransport { provider: String, message: String },

    #[error("Daily budget exceeded for {0}")]
    BudgetExceeded(String),

    #[error("Circuit open for {0}")]
    CircuitOpen(String),

    #[error("Model call failed: {0}")]
    ModelCall(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("All fallback strategies exhausted after {attempts} attempts")]
    FallbackExhausted { attempts: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
