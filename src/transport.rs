//! The HTTP/TLS seam.
//!
//! Protocol logic never touches a socket directly; it hands a finished
//! form body to this port and gets a status/body pair back. The reqwest
//! implementation carries the client-certificate identity issued for the
//! relying party and enforces a bounded timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, TLS handshake or timeout failure.
    #[error("{0}")]
    Http(String),
    /// The client-certificate bundle could not be loaded into the TLS
    /// stack at construction time.
    #[error("client identity rejected: {0}")]
    Identity(String),
}

impl From<TransportError> for crate::error::Error {
    fn from(e: TransportError) -> Self {
        let message = e.to_string();
        match e {
            TransportError::Http(_) => crate::error::Error::Transport(message),
            TransportError::Identity(_) => crate::error::Error::CertificateMaterial(message),
        }
    }
}

/// What came back over the wire, before any interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Transport collaborator: executes one form-encoded POST against the
/// service endpoint. Implementations must be safe to share across
/// concurrent calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_form(&self, path: &str, form_body: String)
    -> Result<RawResponse, TransportError>;
}

/// The PKCS#12 bundle and passphrase issued to the relying party.
#[derive(Clone)]
pub struct ClientIdentity {
    pub pkcs12_der: Vec<u8>,
    pub passphrase: String,
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The passphrase must never end up in logs.
        f.debug_struct("ClientIdentity")
            .field("pkcs12_der", &format!("{} bytes", self.pkcs12_der.len()))
            .finish_non_exhaustive()
    }
}

/// reqwest-backed transport with mutual-TLS authentication.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        identity: &ClientIdentity,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let identity = reqwest::Identity::from_pkcs12_der(&identity.pkcs12_der, &identity.passphrase)
            .map_err(|e| TransportError::Identity(e.to_string()))?;

        let client = reqwest::Client::builder()
            .identity(identity)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| TransportError::Identity(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_form(
        &self,
        path: &str,
        form_body: String,
    ) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "posting form request");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form_body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?
            .to_vec();

        Ok(RawResponse { status, body })
    }
}
