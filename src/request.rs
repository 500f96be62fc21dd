//! Request value objects and the wire envelopes built from them.
//!
//! Each operation's JSON payload is serialized, base64-encoded and wrapped
//! as a single url-encoded form field whose name is operation-specific; the
//! transport submits the resulting body verbatim.

use std::collections::BTreeSet;
use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::attributes::{self, AssuranceLevel, AttributeKind};
use crate::error::{Error, Result};
use crate::identity::IdentityMethod;

/// Opaque server-issued token correlating an init call with later
/// poll/cancel calls. All operation state lives at the remote service and
/// is addressed through this reference alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationReference(String);

impl OperationReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OperationReference {
    fn from(reference: String) -> Self {
        Self(reference)
    }
}

/// An authentication request: who to authenticate, at which level, and
/// which attributes to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    identity: IdentityMethod,
    level: AssuranceLevel,
    attributes: BTreeSet<AttributeKind>,
}

impl AuthRequest {
    /// A BASIC-level request for the conventional attribute pair.
    pub fn new(identity: IdentityMethod) -> Self {
        Self {
            identity,
            level: AssuranceLevel::Basic,
            attributes: attributes::default_attributes(),
        }
    }

    pub fn with_level(mut self, level: AssuranceLevel) -> Self {
        self.level = level;
        self
    }

    /// Replaces the requested attribute set.
    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = AttributeKind>) -> Self {
        self.attributes = attributes.into_iter().collect();
        self
    }

    pub fn identity(&self) -> &IdentityMethod {
        &self.identity
    }

    pub fn level(&self) -> AssuranceLevel {
        self.level
    }

    pub fn attributes(&self) -> &BTreeSet<AttributeKind> {
        &self.attributes
    }
}

/// Push-notification text shown on the user's device for signature
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub text: String,
}

/// Default lifetime of a pending signature request.
pub const DEFAULT_SIGN_TIMEOUT_MINUTES: i64 = 2;

/// A qualified-signature request.
///
/// The agreement title and text are mandatory and must be non-blank; the
/// signer must be identified (an inferred identity cannot sign).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    identity: IdentityMethod,
    level: AssuranceLevel,
    attributes: BTreeSet<AttributeKind>,
    agreement_title: String,
    agreement_text: String,
    confidential: bool,
    timeout_minutes: i64,
    push: Option<PushNotification>,
    attachment: Option<Vec<u8>>,
}

impl SignRequest {
    pub fn new(
        identity: IdentityMethod,
        agreement_title: impl Into<String>,
        agreement_text: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            level: AssuranceLevel::Basic,
            attributes: attributes::default_attributes(),
            agreement_title: agreement_title.into(),
            agreement_text: agreement_text.into(),
            confidential: false,
            timeout_minutes: DEFAULT_SIGN_TIMEOUT_MINUTES,
            push: None,
            attachment: None,
        }
    }

    pub fn with_level(mut self, level: AssuranceLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = AttributeKind>) -> Self {
        self.attributes = attributes.into_iter().collect();
        self
    }

    /// Marks the agreement as confidential so its text is hidden from the
    /// transaction list on the user's device.
    pub fn confidential(mut self, confidential: bool) -> Self {
        self.confidential = confidential;
        self
    }

    pub fn with_timeout_minutes(mut self, minutes: i64) -> Self {
        self.timeout_minutes = minutes;
        self
    }

    pub fn with_push_notification(
        mut self,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.push = Some(PushNotification {
            title: title.into(),
            text: text.into(),
        });
        self
    }

    /// Attaches binary data to be signed alongside the agreement text,
    /// switching the request to the EXTENDED signature format.
    pub fn with_attachment(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.attachment = Some(data.into());
        self
    }

    pub fn identity(&self) -> &IdentityMethod {
        &self.identity
    }

    pub fn level(&self) -> AssuranceLevel {
        self.level
    }

    pub fn attributes(&self) -> &BTreeSet<AttributeKind> {
        &self.attributes
    }
}

/// The six remote operations and their wire-level addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    InitAuth,
    GetAuthResult,
    CancelAuth,
    InitSign,
    GetSignResult,
    CancelSign,
}

impl Operation {
    pub fn path(&self) -> &'static str {
        match self {
            Operation::InitAuth => "/authentication/1.0/initAuthentication",
            Operation::GetAuthResult => "/authentication/1.0/getOneResult",
            Operation::CancelAuth => "/authentication/1.0/cancel",
            Operation::InitSign => "/sign/1.0/initSignature",
            Operation::GetSignResult => "/sign/1.0/getOneResult",
            Operation::CancelSign => "/sign/1.0/cancel",
        }
    }

    /// Name of the single form field the payload is submitted under.
    pub fn form_field(&self) -> &'static str {
        match self {
            Operation::InitAuth => "initAuthRequest",
            Operation::GetAuthResult => "getOneAuthResultRequest",
            Operation::CancelAuth => "cancelAuthRequest",
            Operation::InitSign => "initSignRequest",
            Operation::GetSignResult => "getOneSignResultRequest",
            Operation::CancelSign => "cancelSignRequest",
        }
    }
}

/// A fully assembled request, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEnvelope {
    pub operation: Operation,
    /// `field=<urlencoded base64(JSON payload)>`
    pub form_body: String,
}

impl WireEnvelope {
    fn wrap<T: Serialize>(operation: Operation, payload: &T) -> Result<Self> {
        let json = serde_json::to_vec(payload)?;
        let encoded = BASE64.encode(json);
        Ok(Self {
            operation,
            form_body: format!(
                "{}={}",
                operation.form_field(),
                urlencoding::encode(&encoded)
            ),
        })
    }
}

#[derive(Serialize)]
struct RequestedAttribute {
    attribute: AttributeKind,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitAuthPayload {
    attributes_to_return: Vec<RequestedAttribute>,
    min_registration_level: AssuranceLevel,
    user_info_type: &'static str,
    user_info: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DataToSign {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    binary_data: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitSignPayload {
    attributes_to_return: Vec<RequestedAttribute>,
    min_registration_level: AssuranceLevel,
    user_info_type: &'static str,
    user_info: String,
    title: String,
    confidential: bool,
    /// Epoch milliseconds after which the pending request expires.
    expiry: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    push_notification: Option<PushNotification>,
    data_to_sign: DataToSign,
    data_to_sign_type: &'static str,
    signature_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthReferencePayload<'a> {
    auth_ref: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignReferencePayload<'a> {
    sign_ref: &'a str,
}

fn requested(selection: Vec<AttributeKind>) -> Vec<RequestedAttribute> {
    selection
        .into_iter()
        .map(|attribute| RequestedAttribute { attribute })
        .collect()
}

/// Builds the init-authentication envelope. Runs attribute selection and
/// identity encoding; an empty attribute set fails before any network call.
pub fn init_auth_envelope(request: &AuthRequest) -> Result<WireEnvelope> {
    let selection = attributes::select(request.attributes(), request.level())?;
    let encoded = request.identity().encode()?;

    WireEnvelope::wrap(
        Operation::InitAuth,
        &InitAuthPayload {
            attributes_to_return: requested(selection),
            min_registration_level: request.level(),
            user_info_type: encoded.kind,
            user_info: encoded.value,
        },
    )
}

/// Builds the init-signature envelope.
///
/// Beyond the shared checks, signing requires a non-blank agreement title
/// and text, and an identified signer.
pub fn init_sign_envelope(request: &SignRequest) -> Result<WireEnvelope> {
    let selection = attributes::select(request.attributes(), request.level())?;

    if request.agreement_title.trim().is_empty() || request.agreement_text.trim().is_empty() {
        return Err(Error::InvalidRequest(
            "agreement title and text must both be specified".into(),
        ));
    }
    if matches!(request.identity(), IdentityMethod::Inferred) {
        return Err(Error::InvalidRequest("a signer must be identified".into()));
    }

    let encoded = request.identity().encode()?;
    let expiry = Utc::now().timestamp_millis() + request.timeout_minutes * 60 * 1000;

    let mut data_to_sign = DataToSign {
        text: BASE64.encode(request.agreement_text.as_bytes()),
        binary_data: None,
    };
    let (data_to_sign_type, signature_type) = match &request.attachment {
        None => ("SIMPLE_UTF8_TEXT", "SIMPLE"),
        Some(binary) => {
            data_to_sign.binary_data = Some(BASE64.encode(binary));
            ("EXTENDED_UTF8_TEXT", "EXTENDED")
        }
    };

    WireEnvelope::wrap(
        Operation::InitSign,
        &InitSignPayload {
            attributes_to_return: requested(selection),
            min_registration_level: request.level(),
            user_info_type: encoded.kind,
            user_info: encoded.value,
            title: request.agreement_title.clone(),
            confidential: request.confidential,
            expiry,
            push_notification: request.push.clone(),
            data_to_sign,
            data_to_sign_type,
            signature_type,
        },
    )
}

/// Builds the minimal reference-only envelope used by poll and cancel.
pub fn reference_envelope(
    operation: Operation,
    reference: &OperationReference,
) -> Result<WireEnvelope> {
    match operation {
        Operation::GetAuthResult | Operation::CancelAuth => WireEnvelope::wrap(
            operation,
            &AuthReferencePayload {
                auth_ref: reference.as_str(),
            },
        ),
        Operation::GetSignResult | Operation::CancelSign => WireEnvelope::wrap(
            operation,
            &SignReferencePayload {
                sign_ref: reference.as_str(),
            },
        ),
        Operation::InitAuth | Operation::InitSign => Err(Error::InvalidRequest(
            "init operations carry a full payload, not a bare reference".into(),
        )),
    }
}
