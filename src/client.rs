//! The public operations: initiate, poll and cancel authentication and
//! signature requests, plus QR-code reference construction.
//!
//! The client is stateless between calls; every operation is one request
//! assembly, one network round trip and one classification. The only
//! long-lived resources are the TLS identity and the pinned trust anchor,
//! both fixed at construction and shared read-only.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::config::{ClientConfig, FrejaEnvironment};
use crate::error::{Error, Result};
use crate::jws::{SignatureVerification, SignatureVerifier, TrustAnchor};
use crate::request::{
    self, AuthRequest, Operation, OperationReference, SignRequest, WireEnvelope,
};
use crate::response::{self, ApiOutcome, AuthResult, SignResult, TransactionStatus};
use crate::transport::{HttpTransport, Transport};

/// Result of polling a signature operation, with the approved payload run
/// through verification.
#[derive(Debug, Clone)]
pub struct SignatureResult {
    pub sign_ref: String,
    pub status: TransactionStatus,
    /// Present exactly when the status is APPROVED. Check `verified` on
    /// it; an unverified-but-decoded payload is not an error.
    pub signature: Option<SignatureVerification>,
    /// Remaining fields of the raw poll result.
    pub extra: Map<String, Value>,
}

/// A QR-code reference for an authentication in progress.
#[derive(Debug, Clone)]
pub struct QrCode {
    /// URL rendering the QR image for the pending operation.
    pub url: String,
    pub reference: OperationReference,
}

/// Client for the remote authentication and signature services.
#[derive(Clone)]
pub struct FrejaClient {
    environment: FrejaEnvironment,
    transport: Arc<dyn Transport>,
    verifier: SignatureVerifier,
}

impl FrejaClient {
    /// Builds a client over the standard HTTPS transport, loading the
    /// trust anchor and client identity from the resolved configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let anchor = TrustAnchor::from_pem(&config.trust_anchor_pem)?;
        let transport = HttpTransport::new(
            config.environment.service_url(),
            &config.identity,
            config.timeout,
        )?;
        Ok(Self::from_parts(
            config.environment,
            Arc::new(transport),
            anchor,
        ))
    }

    /// Assembles a client from explicit parts. Useful when the transport
    /// is provided by the caller (instrumented stacks, tests).
    pub fn from_parts(
        environment: FrejaEnvironment,
        transport: Arc<dyn Transport>,
        anchor: TrustAnchor,
    ) -> Self {
        Self {
            environment,
            transport,
            verifier: SignatureVerifier::new(anchor),
        }
    }

    /// Starts an authentication for the user addressed by the request.
    #[instrument(skip_all)]
    pub async fn init_authentication(&self, request: &AuthRequest) -> Result<OperationReference> {
        let envelope = request::init_auth_envelope(request)?;
        let data = expect_data(self.dispatch(envelope).await?)?;
        let reference = data
            .get("authRef")
            .and_then(Value::as_str)
            .ok_or(Error::ProtocolViolation("authRef"))?;
        info!(auth_ref = reference, "authentication initiated");
        Ok(OperationReference::new(reference))
    }

    /// Reads the current state of a pending or finished authentication.
    /// Polling is idempotent; repeated calls do not advance remote state.
    #[instrument(skip_all, fields(reference = %reference))]
    pub async fn check_authentication(&self, reference: &OperationReference) -> Result<AuthResult> {
        let envelope = request::reference_envelope(Operation::GetAuthResult, reference)?;
        let data = expect_data(self.dispatch(envelope).await?)?;
        serde_json::from_value(data).map_err(|_| Error::ProtocolViolation("authRef or status"))
    }

    /// Cancels a pending authentication.
    #[instrument(skip_all, fields(reference = %reference))]
    pub async fn cancel_authentication(&self, reference: &OperationReference) -> Result<()> {
        let envelope = request::reference_envelope(Operation::CancelAuth, reference)?;
        expect_no_data(self.dispatch(envelope).await?)
    }

    /// Starts a signature request for the agreement the request carries.
    #[instrument(skip_all)]
    pub async fn init_signature(&self, request: &SignRequest) -> Result<OperationReference> {
        let envelope = request::init_sign_envelope(request)?;
        let data = expect_data(self.dispatch(envelope).await?)?;
        let reference = data
            .get("signRef")
            .and_then(Value::as_str)
            .ok_or(Error::ProtocolViolation("signRef"))?;
        info!(sign_ref = reference, "signature requested");
        Ok(OperationReference::new(reference))
    }

    /// Reads the current state of a signature request. An APPROVED result
    /// is run through the verification pipeline; any other status is
    /// returned as-is with no signature data.
    #[instrument(skip_all, fields(reference = %reference))]
    pub async fn check_signature(&self, reference: &OperationReference) -> Result<SignatureResult> {
        let envelope = request::reference_envelope(Operation::GetSignResult, reference)?;
        let data = expect_data(self.dispatch(envelope).await?)?;
        let raw: SignResult =
            serde_json::from_value(data).map_err(|_| Error::ProtocolViolation("signRef or status"))?;

        let signature = match raw.status {
            TransactionStatus::Approved => {
                let token = raw
                    .details
                    .as_deref()
                    .ok_or(Error::ProtocolViolation("details"))?;
                Some(self.verifier.verify(token)?)
            }
            _ => None,
        };

        Ok(SignatureResult {
            sign_ref: raw.sign_ref,
            status: raw.status,
            signature,
            extra: raw.extra,
        })
    }

    /// Cancels a pending signature request.
    #[instrument(skip_all, fields(reference = %reference))]
    pub async fn cancel_signature(&self, reference: &OperationReference) -> Result<()> {
        let envelope = request::reference_envelope(Operation::CancelSign, reference)?;
        expect_no_data(self.dispatch(envelope).await?)
    }

    /// Builds the QR-code URL binding a user to a pending authentication.
    ///
    /// When no reference is supplied, `default_request` is used to start a
    /// fresh authentication first.
    pub async fn auth_qr_code(
        &self,
        existing: Option<OperationReference>,
        default_request: &AuthRequest,
    ) -> Result<QrCode> {
        let reference = match existing {
            Some(reference) => reference,
            None => self.init_authentication(default_request).await?,
        };

        let url = format!(
            "{}/qrcode/generate?qrcodedata=frejaeid%3A%2F%2FbindUserToTransaction%3Fdimension%3D4x%3FtransactionReference%3D{}",
            self.environment.resource_url(),
            reference
        );
        Ok(QrCode { url, reference })
    }

    async fn dispatch(&self, envelope: WireEnvelope) -> Result<ApiOutcome> {
        let operation = envelope.operation;
        debug!(path = operation.path(), "dispatching");
        let response = self
            .transport
            .post_form(operation.path(), envelope.form_body)
            .await?;
        Ok(response::classify(response.status, &response.body))
    }
}

fn expect_data(outcome: ApiOutcome) -> Result<Value> {
    match outcome {
        ApiOutcome::Success(data) => Ok(data),
        ApiOutcome::Empty => Ok(Value::Null),
        ApiOutcome::Failure { code, message } => Err(Error::Remote { code, message }),
    }
}

fn expect_no_data(outcome: ApiOutcome) -> Result<()> {
    match outcome {
        ApiOutcome::Success(_) | ApiOutcome::Empty => Ok(()),
        ApiOutcome::Failure { code, message } => Err(Error::Remote { code, message }),
    }
}
