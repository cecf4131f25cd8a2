//! Error taxonomy for the report pipeline

use signal_llm::LlmError;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline-specific errors
///
/// Variants map onto the service-boundary status codes: a 428 prompts the
/// client to supply a fresh model credential and retry the same request.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable model credential for this caller
    #[error("no usable model credential; supply one and retry")]
    CredentialRequired,

    /// Identifier resolution could not map the query to an instrument
    #[error("could not resolve '{0}' to a market instrument")]
    UnrecognizedSubject(String),

    /// The model provider rejected the credential mid-run
    #[error("model provider rejected the credential: {0}")]
    UpstreamRejected(String),

    /// The agent hit its turn bound without a final answer
    #[error("agent produced no final answer within {0} turns")]
    ReasoningExhausted(usize),

    /// Persistence lookup miss
    #[error("report not found")]
    NotFound,

    /// Caller does not own the requested report
    #[error("not authorized to access this report")]
    NotAuthorized,

    /// An external collaborator failed
    #[error("collaborator failure: {0}")]
    Collaborator(String),

    /// Anything else; the message is surfaced verbatim for diagnosability
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// HTTP status code for the service boundary
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::CredentialRequired | PipelineError::UpstreamRejected(_) => 428,
            PipelineError::UnrecognizedSubject(_) => 400,
            PipelineError::NotFound => 404,
            PipelineError::NotAuthorized => 403,
            PipelineError::ReasoningExhausted(_)
            | PipelineError::Collaborator(_)
            | PipelineError::Other(_) => 500,
        }
    }

    /// Whether this failure indicates upstream credential rejection and
    /// should trigger the purge policy
    pub fn is_credential_rejection(&self) -> bool {
        matches!(self, PipelineError::UpstreamRejected(_))
    }
}

/// Classify provider failures: auth and quota rejections become
/// [`PipelineError::UpstreamRejected`] so the orchestrator's rotation
/// policy can purge the broken credential.
impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        if err.is_credential_rejection() {
            PipelineError::UpstreamRejected(err.to_string())
        } else {
            PipelineError::Other(err.to_string())
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Collaborator(err.to_string())
    }
}
