use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Malformed amount: {0}")]
    MalformedAmount(String),

    #[error("Infeasible action: {0}")]
    InfeasibleAction(String),

    #[error("External call `{call}` failed: {reason}")]
    ExternalCall { call: &'static str, reason: String },

    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    #[error("Step {step} still infeasible after {attempts} attempts")]
    RetryBudgetExhausted { step: usize, attempts: usize },

    #[error("Metrics slot {index} already committed")]
    SlotRewrite { index: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl SimError {
    /// Wrap a collaborator failure for the named call.
    pub fn external(call: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::ExternalCall {
            call,
            reason: reason.to_string(),
        }
    }

    /// Whether the run loop may continue past this error at step granularity.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ExternalCall { .. }
                | Self::InfeasibleAction(_)
                | Self::Provider(_)
        )
    }
}
