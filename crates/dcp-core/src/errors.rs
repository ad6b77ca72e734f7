/// Core error type for the channel purge.
///
/// Adapter crates map their transport errors into this type so the sweep
/// driver can tell a dead connection apart from a bad answer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// True when the request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_classify_as_transport() {
        assert!(Error::Transport("connection reset".into()).is_transport());
        assert!(!Error::MalformedResponse("not a list".into()).is_transport());
        assert!(!Error::Http {
            status: 401,
            body: "401: Unauthorized".into()
        }
        .is_transport());
    }

    #[test]
    fn http_error_display_includes_status() {
        let e = Error::Http {
            status: 403,
            body: "Missing Access".into(),
        };
        assert_eq!(e.to_string(), "http 403: Missing Access");
    }
}
