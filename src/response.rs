//! Classification of transport-level outcomes into domain outcomes, and the
//! typed results poll operations return.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Domain outcome of one remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    /// 200 with a parsed body.
    Success(Value),
    /// 204; the operation succeeded and carries no data.
    Empty,
    /// Any failure, normalized to the uniform `{code, message}` pair.
    Failure { code: u16, message: String },
}

impl ApiOutcome {
    fn failure(code: u16, message: impl Into<String>) -> Self {
        ApiOutcome::Failure {
            code,
            message: message.into(),
        }
    }
}

#[derive(Deserialize)]
struct RemoteErrorBody {
    message: String,
}

/// Maps an HTTP status and body onto exactly one domain outcome.
///
/// Total over every status; unmapped statuses are reported as internal
/// failures with the raw body retained in the log for diagnostics.
pub fn classify(status: u16, body: &[u8]) -> ApiOutcome {
    match status {
        200 => match serde_json::from_slice(body) {
            Ok(data) => ApiOutcome::Success(data),
            Err(e) => ApiOutcome::failure(500, format!("malformed response body: {e}")),
        },
        204 => ApiOutcome::Empty,
        404 | 410 => ApiOutcome::failure(404, "the service reported the resource cannot be found"),
        400 => ApiOutcome::failure(400, "the service reported the request cannot be parsed"),
        422 => {
            let detail = serde_json::from_slice::<RemoteErrorBody>(body)
                .map(|e| e.message)
                .unwrap_or_else(|_| "unspecified".into());
            ApiOutcome::failure(400, format!("processing error: {detail}"))
        }
        500 => ApiOutcome::failure(500, "the service reported an internal error"),
        other => {
            warn!(
                status = other,
                body = %String::from_utf8_lossy(body),
                "unmapped response status"
            );
            ApiOutcome::failure(500, format!("unknown status {other}"))
        }
    }
}

/// Lifecycle state of a pending or finished operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Started,
    DeliveredToMobile,
    Approved,
    Rejected,
    Expired,
    Canceled,
    RpCanceled,
    /// A status this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    /// Whether the operation has reached a final state; polling further
    /// cannot change the answer.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Approved
                | TransactionStatus::Rejected
                | TransactionStatus::Expired
                | TransactionStatus::Canceled
                | TransactionStatus::RpCanceled
        )
    }
}

/// Result of polling an authentication operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    pub auth_ref: String,
    pub status: TransactionStatus,
    /// Signed result data, present once the user approved.
    #[serde(default)]
    pub details: Option<String>,
    /// Attributes the user released, as returned by the service.
    #[serde(default)]
    pub requested_attributes: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw result of polling a signature operation, before verification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignResult {
    pub sign_ref: String,
    pub status: TransactionStatus,
    /// The double-signed result payload (compact JWS), present once the
    /// user approved.
    #[serde(default)]
    pub details: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
