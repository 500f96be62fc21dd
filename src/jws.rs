//! Verification of the double-signed result payload returned for approved
//! signature requests.
//!
//! The remote wraps the result in a compact JWS signed with its own
//! environment-specific certificate; inside that payload, the user's
//! signature is itself a compact JWS. The pipeline here is explicit:
//! decode the outer envelope, verify it against the pinned anchor (or
//! degrade to unverified decoding), split the inner ticket, and flatten
//! everything into one caller-facing shape.

#[cfg(test)]
mod tests;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL};
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use x509_parser::pem::parse_x509_pem;

use crate::error::{Error, Result};

/// Message reported when strict verification succeeds.
const VERIFIED_MESSAGE: &str = "the signed data was verified against the pinned certificate";

#[derive(Debug, Error)]
enum JwsError {
    #[error("token must have three dot-separated segments")]
    Segments,
    #[error("segment is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("segment is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("signed content is not UTF-8 text")]
    Utf8,
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("signature does not match the pinned certificate")]
    SignatureMismatch,
}

fn malformed(e: JwsError) -> Error {
    Error::MalformedSignaturePayload(e.to_string())
}

/// The pinned certificate a deployment environment validates service
/// signatures against. Chosen at construction time, never per call.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    // BIT STRING content of the certificate's SubjectPublicKeyInfo: the
    // DER RSAPublicKey for RSA anchors, the uncompressed point for EC.
    public_key: Vec<u8>,
}

impl TrustAnchor {
    /// Parses a PEM-encoded X.509 certificate and pins its public key.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let (_, parsed) = parse_x509_pem(pem)
            .map_err(|e| Error::CertificateMaterial(format!("not a PEM certificate: {e}")))?;
        let cert = parsed
            .parse_x509()
            .map_err(|e| Error::CertificateMaterial(format!("not an X.509 certificate: {e}")))?;
        debug!(subject = %cert.subject(), "pinned JWS trust anchor");
        Ok(Self {
            public_key: cert.public_key().subject_public_key.data.to_vec(),
        })
    }
}

fn verification_algorithm(alg: &str) -> Option<&'static dyn VerificationAlgorithm> {
    match alg {
        "RS256" => Some(&signature::RSA_PKCS1_2048_8192_SHA256),
        "ES256" => Some(&signature::ECDSA_P256_SHA256_FIXED),
        _ => None,
    }
}

/// One compact-serialized JWS, split but not yet decoded.
struct CompactJws<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> CompactJws<'a> {
    fn split(token: &'a str) -> std::result::Result<Self, JwsError> {
        let mut segments = token.split('.');
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(header), Some(payload), Some(sig), None)
                if !header.is_empty() && !payload.is_empty() =>
            {
                Ok(Self {
                    header,
                    payload,
                    signature: sig,
                })
            }
            _ => Err(JwsError::Segments),
        }
    }

    fn decode_header(&self) -> std::result::Result<JwsHeader, JwsError> {
        let bytes = BASE64URL.decode(self.header)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn payload_bytes(&self) -> std::result::Result<Vec<u8>, JwsError> {
        Ok(BASE64URL.decode(self.payload)?)
    }

    /// The ASCII signing input the signature covers.
    fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct JwsHeader {
    alg: String,
    #[serde(default)]
    x5t: Option<String>,
    #[serde(default)]
    kid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OuterPayload {
    signature_data: OuterSignatureData,
    user_info: String,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OuterSignatureData {
    user_signature: String,
}

/// The user's own signature, flattened out of the inner ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSignature {
    /// Key id from the inner ticket's protected header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    pub alg: String,
    /// The content the user signed, decoded from the inner ticket.
    pub content: String,
}

/// Caller-facing flat view of the signed result: the payload fields merged
/// with the outer envelope's transport metadata, the wrapper discarded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureDetails {
    /// Certificate thumbprint from the outer envelope's header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5t: Option<String>,
    /// Algorithm the service signed the envelope with.
    pub alg: String,
    pub signature_data: UserSignature,
    /// The identifier the user was addressed by, in structured form when
    /// it carries one (national-id users), as a plain string otherwise.
    pub user_info: Value,
    /// Remaining payload fields (signRef, status, timestamps, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Outcome of the verification pipeline.
///
/// `verified == false` is a valid, non-error outcome: the payload decoded
/// but the trust check did not complete (wrong or rolled-over anchor,
/// unknown algorithm). It is surfaced rather than discarded so the caller
/// can decide what degraded trust is worth.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureVerification {
    pub verified: bool,
    pub message: String,
    pub details: SignatureDetails,
}

/// Verifies approved signature payloads against one pinned anchor.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    anchor: TrustAnchor,
}

impl SignatureVerifier {
    pub fn new(anchor: TrustAnchor) -> Self {
        Self { anchor }
    }

    /// Runs the full pipeline on the compact JWS of an approved result.
    ///
    /// Only a payload that cannot be decoded at all is an error; a payload
    /// that decodes but fails the trust check comes back with
    /// `verified = false` and the failure reason as the message.
    pub fn verify(&self, token: &str) -> Result<SignatureVerification> {
        let jws = CompactJws::split(token).map_err(malformed)?;
        let header = jws.decode_header().map_err(malformed)?;
        let payload_bytes = jws.payload_bytes().map_err(malformed)?;
        let payload: OuterPayload =
            serde_json::from_slice(&payload_bytes).map_err(|e| malformed(JwsError::Json(e)))?;

        let (verified, message) = match self.check_signature(&jws, &header) {
            Ok(()) => (true, VERIFIED_MESSAGE.to_string()),
            Err(reason) => {
                warn!(%reason, "strict verification failed, falling back to unauthenticated decoding");
                (false, reason.to_string())
            }
        };

        let details = flatten(header, payload)?;
        Ok(SignatureVerification {
            verified,
            message,
            details,
        })
    }

    fn check_signature(
        &self,
        jws: &CompactJws<'_>,
        header: &JwsHeader,
    ) -> std::result::Result<(), JwsError> {
        let algorithm = verification_algorithm(&header.alg)
            .ok_or_else(|| JwsError::UnsupportedAlgorithm(header.alg.clone()))?;
        let signature = BASE64URL.decode(jws.signature)?;
        let key = UnparsedPublicKey::new(algorithm, &self.anchor.public_key);
        key.verify(jws.signing_input().as_bytes(), &signature)
            .map_err(|_| JwsError::SignatureMismatch)
    }
}

/// Splits the inner ticket and merges the outer header metadata into the
/// payload, producing the flat caller-facing shape.
fn flatten(header: JwsHeader, payload: OuterPayload) -> Result<SignatureDetails> {
    let OuterPayload {
        signature_data,
        user_info,
        rest,
    } = payload;

    let ticket = CompactJws::split(&signature_data.user_signature).map_err(malformed)?;
    let ticket_header = ticket.decode_header().map_err(malformed)?;
    let content = String::from_utf8(ticket.payload_bytes().map_err(malformed)?)
        .map_err(|_| malformed(JwsError::Utf8))?;
    // The ticket's third segment is the user's raw signature; it is carried
    // opaquely and never decoded here.

    let user_info = serde_json::from_str(&user_info).unwrap_or(Value::String(user_info));

    Ok(SignatureDetails {
        x5t: header.x5t,
        alg: header.alg,
        signature_data: UserSignature {
            kid: ticket_header.kid,
            alg: ticket_header.alg,
            content,
        },
        user_info,
        fields: rest,
    })
}
