use thiserror::Error;

/// Failures a component can hand back to the view layer.
///
/// Forms are never validated locally, so there is no validation variant:
/// whatever the server rejects comes back as [`ClientError::Api`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("{0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// A success response whose body was not the JSON we expected.
    #[error("unexpected response from server: {0}")]
    Decode(String),

    /// A request body could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// The durable token store could not be read or written.
    #[error("session storage failed: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for a notification, falling back when the
    /// underlying error carries no text.
    pub fn user_message(&self, fallback: &str) -> String {
        let text = self.to_string();
        if text.trim().is_empty() {
            fallback.to_string()
        } else {
            text
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::ClientError;

    #[test]
    fn api_error_displays_server_message_verbatim() {
        let err = ClientError::Api {
            status: 400,
            message: "title required".to_string(),
        };
        assert_eq!(err.to_string(), "title required");
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.user_message("Failed"), "title required");
    }

    #[test]
    fn empty_message_uses_fallback() {
        let err = ClientError::Network(String::new());
        assert_eq!(err.user_message("Login failed"), "Login failed");
        assert_eq!(err.status(), None);
    }
}
