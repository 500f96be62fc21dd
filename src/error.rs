use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for every public operation.
///
/// Caller-side precondition violations (`InvalidRequest`,
/// `UnsupportedIdentityMethod`) are raised before anything is sent over the
/// network. `Remote` carries the classified outcome of a 4xx/5xx response
/// verbatim; nothing is retried automatically.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller violated a request precondition. Never sent to the remote.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An identification method tag outside the supported set
    /// (INFERRED, PHONE, EMAIL, SSN).
    #[error("unsupported identity method: {0}")]
    UnsupportedIdentityMethod(String),

    /// The remote answered 200 but omitted a mandatory field.
    #[error("missing {0} in response")]
    ProtocolViolation(&'static str),

    /// A 4xx/5xx outcome as classified from the remote response.
    #[error("{message}")]
    Remote { code: u16, message: String },

    /// Connection, TLS or timeout failure before any status was received.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The JWS payload of an approved signature could not be decoded at
    /// all. Distinct from a decodable-but-unverifiable payload, which is
    /// reported as `verified = false` rather than as an error.
    #[error("signature payload could not be decoded: {0}")]
    MalformedSignaturePayload(String),

    /// Certificate or key material could not be loaded or parsed at
    /// construction time.
    #[error("certificate material: {0}")]
    CertificateMaterial(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Uniform numeric view of the failure, mirroring the wire-level
    /// `{code, message}` shape regardless of where the failure originated.
    pub fn code(&self) -> u16 {
        match self {
            Error::InvalidRequest(_)
            | Error::UnsupportedIdentityMethod(_)
            | Error::ProtocolViolation(_)
            | Error::MalformedSignaturePayload(_) => 400,
            Error::Remote { code, .. } => *code,
            Error::Transport(_)
            | Error::CertificateMaterial(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_map_to_400() {
        assert_eq!(Error::InvalidRequest("x".into()).code(), 400);
        assert_eq!(Error::ProtocolViolation("authRef").code(), 400);
        assert_eq!(Error::MalformedSignaturePayload("x".into()).code(), 400);
    }

    #[test]
    fn remote_failures_keep_their_code() {
        let err = Error::Remote {
            code: 404,
            message: "gone".into(),
        };
        assert_eq!(err.code(), 404);
        assert_eq!(err.to_string(), "gone");
    }

    #[test]
    fn transport_failures_are_500() {
        assert_eq!(Error::Transport("connection refused".into()).code(), 500);
    }
}
