use thiserror::Error;

/// Why a provider request did not produce a reply.
///
/// All three variants lead to the same failure transition in the controller;
/// they only differ in the text that ends up in the conversation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// No response was obtained (connection refused, DNS, TLS, timeout...)
    #[error("{0}")]
    Transport(String),

    /// The provider answered with a non-success status. `message` is the
    /// server-supplied `error.message` when there was one.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// Success status, but the reply was not where it should be
    #[error("Unexpected response format: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_displays_server_message_verbatim() {
        let err = ProviderError::Status {
            status: 400,
            message: "API key not valid. Please pass a valid API key.".to_string(),
        };
        assert_eq!(err.to_string(), "API key not valid. Please pass a valid API key.");
        assert_eq!(err.status_code(), Some(400));
    }

    #[test]
    fn malformed_error_names_the_problem() {
        let err = ProviderError::Malformed("missing choices[0].message.content".to_string());
        assert!(err.to_string().contains("choices[0].message.content"));
        assert_eq!(err.status_code(), None);
    }
}
