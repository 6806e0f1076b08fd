//! Error taxonomy for the nixtalk pipeline
//!
//! Every failure a request can run into is one of these variants. They are
//! all caught at the pipeline boundary and turned into a `ProcessResult`;
//! none of them reach the caller as a panic.

use thiserror::Error;

/// What kind of runtime failure the stderr classifier recognised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeErrorKind {
    NotFound,
    PermissionDenied,
    Network,
}

impl RuntimeErrorKind {
    pub fn user_message(&self) -> &'static str {
        match self {
            RuntimeErrorKind::NotFound => {
                "Package not found. Try searching with a different name."
            }
            RuntimeErrorKind::PermissionDenied => {
                "Permission denied. This command requires different privileges."
            }
            RuntimeErrorKind::Network => "Network error. Check your internet connection.",
        }
    }
}

/// Stable, serializable identifier for a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    InvalidInput,
    UnknownTemplate,
    MissingArgument,
    InvalidArgument,
    UnsafeCommand,
    Timeout,
    BinaryNotFound,
    NotFound,
    PermissionDenied,
    Network,
    CommandFailed,
    Internal,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input was empty or too long to be a request.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The intent has no command template.
    #[error("no command template for intent '{0}'")]
    UnknownTemplate(String),

    /// The template needs an argument the utterance did not provide.
    #[error("intent '{intent}' requires a {entity} name")]
    MissingArgument { intent: String, entity: String },

    /// The argument sanitised down to nothing.
    #[error("argument '{0}' is empty after sanitization")]
    InvalidArgument(String),

    /// Rejected by the safety validator. `pattern` is for logs only.
    #[error("unsafe command rejected ({pattern})")]
    UnsafeCommand { pattern: String },

    #[error("command timed out after {0} seconds")]
    ExecutionTimeout(u64),

    #[error("binary '{0}' not found")]
    BinaryNotFound(String),

    #[error("command failed: {kind:?}")]
    ClassifiedRuntime { kind: RuntimeErrorKind, stderr: String },

    #[error("command failed with exit code {code:?}")]
    UnclassifiedRuntime { code: Option<i32>, stderr: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Text shown to the end user. Never contains the rejected command.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::InvalidInput(reason) => {
                format!("I couldn't read that request: {}.", reason)
            }
            PipelineError::UnknownTemplate(_) => "I don't know how to do that yet.".to_string(),
            PipelineError::MissingArgument { entity, .. } => {
                format!("Which {} did you mean? Please include its name.", entity)
            }
            PipelineError::InvalidArgument(_) => {
                "That name doesn't look like a valid package name.".to_string()
            }
            PipelineError::UnsafeCommand { .. } => "Sorry, I can't run that.".to_string(),
            PipelineError::ExecutionTimeout(_) => {
                "Command timed out. This might happen with large searches.".to_string()
            }
            PipelineError::BinaryNotFound(_) => {
                "Nix command not found. Make sure Nix is installed.".to_string()
            }
            PipelineError::ClassifiedRuntime { kind, .. } => kind.user_message().to_string(),
            PipelineError::UnclassifiedRuntime { .. } => {
                "Command failed. Try rephrasing your request.".to_string()
            }
            PipelineError::Config(_) | PipelineError::Io(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            PipelineError::InvalidInput(_) => ErrorCode::InvalidInput,
            PipelineError::UnknownTemplate(_) => ErrorCode::UnknownTemplate,
            PipelineError::MissingArgument { .. } => ErrorCode::MissingArgument,
            PipelineError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            PipelineError::UnsafeCommand { .. } => ErrorCode::UnsafeCommand,
            PipelineError::ExecutionTimeout(_) => ErrorCode::Timeout,
            PipelineError::BinaryNotFound(_) => ErrorCode::BinaryNotFound,
            PipelineError::ClassifiedRuntime { kind, .. } => match kind {
                RuntimeErrorKind::NotFound => ErrorCode::NotFound,
                RuntimeErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
                RuntimeErrorKind::Network => ErrorCode::Network,
            },
            PipelineError::UnclassifiedRuntime { .. } => ErrorCode::CommandFailed,
            PipelineError::Config(_) | PipelineError::Io(_) => ErrorCode::Internal,
        }
    }

    /// Whether resubmitting the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::ExecutionTimeout(_)
            | PipelineError::UnclassifiedRuntime { .. }
            | PipelineError::Io(_) => true,
            PipelineError::ClassifiedRuntime { kind, .. } => *kind == RuntimeErrorKind::Network,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsafe_message_hides_details() {
        let err = PipelineError::UnsafeCommand {
            pattern: "recursive delete".into(),
        };
        let msg = err.user_message();
        assert!(!msg.contains("recursive"));
        assert!(!msg.contains("rm"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retry_policy() {
        assert!(PipelineError::ExecutionTimeout(30).is_retryable());
        assert!(!PipelineError::BinaryNotFound("nix".into()).is_retryable());
        assert!(PipelineError::UnclassifiedRuntime {
            code: Some(1),
            stderr: String::new()
        }
        .is_retryable());
        assert!(!PipelineError::UnknownTemplate("unknown".into()).is_retryable());
    }

    #[test]
    fn test_codes() {
        let err = PipelineError::ClassifiedRuntime {
            kind: RuntimeErrorKind::PermissionDenied,
            stderr: "Permission denied".into(),
        };
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
        assert_eq!(PipelineError::ExecutionTimeout(1).code(), ErrorCode::Timeout);
        assert_eq!(serde_json::to_value(ErrorCode::BinaryNotFound).unwrap(), "binary-not-found");
    }

    #[test]
    fn test_missing_argument_prompts_for_entity() {
        let err = PipelineError::MissingArgument {
            intent: "install".into(),
            entity: "package".into(),
        };
        assert!(err.user_message().contains("package"));
    }
}
