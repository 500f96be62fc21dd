use super::*;
use crate::error::Error;
use serde_json::json;

const ANCHOR_PEM: &[u8] = include_bytes!("../../test_data/jws_anchor.pem");
const OTHER_ANCHOR_PEM: &[u8] = include_bytes!("../../test_data/jws_other_anchor.pem");
const APPROVED_JWS: &str = include_str!("../../test_data/approved_signature.jws");

fn verifier(pem: &[u8]) -> SignatureVerifier {
    SignatureVerifier::new(TrustAnchor::from_pem(pem).unwrap())
}

/// Builds an unsigned-but-structured compact token; only useful for paths
/// that do not require a valid signature.
fn handmade_token(header: serde_json::Value, payload: serde_json::Value) -> String {
    format!(
        "{}.{}.{}",
        BASE64URL.encode(header.to_string()),
        BASE64URL.encode(payload.to_string()),
        BASE64URL.encode(b"not-a-signature"),
    )
}

fn inner_ticket() -> String {
    handmade_token(
        json!({"alg": "RS256", "kid": "user-key-1"}),
        json!({"text": "SSBhZ3JlZSB0byB0aGUgdGVybXMu"}),
    )
}

#[test]
fn anchor_rejects_non_certificate_material() {
    let err = TrustAnchor::from_pem(b"not a pem").unwrap_err();
    assert!(matches!(err, Error::CertificateMaterial(_)));
}

#[test]
fn matching_anchor_verifies_strictly() {
    let result = verifier(ANCHOR_PEM).verify(APPROVED_JWS.trim()).unwrap();

    assert!(result.verified);
    assert_eq!(result.message, VERIFIED_MESSAGE);

    let details = &result.details;
    assert_eq!(details.alg, "RS256");
    assert!(details.x5t.is_some());
    assert_eq!(details.signature_data.kid.as_deref(), Some("user-key-1"));
    assert_eq!(details.signature_data.alg, "RS256");
    assert_eq!(
        details.signature_data.content,
        r#"{"text":"SSBhZ3JlZSB0byB0aGUgdGVybXMu"}"#
    );
    // userInfo arrived as a JSON string and comes back structured.
    assert_eq!(details.user_info["country"], "SE");
    assert_eq!(details.user_info["ssn"], "199001011234");
    // The envelope wrapper is gone; payload fields sit flat.
    assert_eq!(details.fields["signRef"], "sign-ref-1");
    assert_eq!(details.fields["status"], "APPROVED");
}

#[test]
fn wrong_anchor_degrades_to_unverified_decoding() {
    let result = verifier(OTHER_ANCHOR_PEM).verify(APPROVED_JWS.trim()).unwrap();

    assert!(!result.verified);
    assert!(result.message.contains("does not match"));
    // Decoded content is still fully available.
    assert_eq!(result.details.fields["signRef"], "sign-ref-1");
    assert_eq!(result.details.signature_data.kid.as_deref(), Some("user-key-1"));
}

#[test]
fn unsupported_algorithm_degrades_with_reason() {
    let token = handmade_token(
        json!({"alg": "HS256", "x5t": "abc"}),
        json!({
            "signRef": "r",
            "userInfo": "user@example.com",
            "signatureData": {"userSignature": inner_ticket()},
        }),
    );
    let result = verifier(ANCHOR_PEM).verify(&token).unwrap();

    assert!(!result.verified);
    assert!(result.message.contains("HS256"));
    assert_eq!(result.details.fields["signRef"], "r");
}

#[test]
fn plain_string_user_info_is_kept_as_string() {
    let token = handmade_token(
        json!({"alg": "RS256"}),
        json!({
            "userInfo": "user@example.com",
            "signatureData": {"userSignature": inner_ticket()},
        }),
    );
    let result = verifier(ANCHOR_PEM).verify(&token).unwrap();

    assert!(!result.verified);
    assert_eq!(result.details.user_info, json!("user@example.com"));
    assert_eq!(result.details.x5t, None);
}

#[test]
fn garbage_token_is_malformed() {
    let err = verifier(ANCHOR_PEM).verify("not-a-jws").unwrap_err();
    assert!(matches!(err, Error::MalformedSignaturePayload(_)));
}

#[test]
fn non_json_payload_is_malformed() {
    let token = format!(
        "{}.{}.{}",
        BASE64URL.encode(json!({"alg": "RS256"}).to_string()),
        BASE64URL.encode(b"plain text, not an envelope"),
        BASE64URL.encode(b"sig"),
    );
    let err = verifier(ANCHOR_PEM).verify(&token).unwrap_err();
    assert!(matches!(err, Error::MalformedSignaturePayload(_)));
}

#[test]
fn undecodable_inner_ticket_is_malformed() {
    let token = handmade_token(
        json!({"alg": "RS256"}),
        json!({
            "userInfo": "user@example.com",
            "signatureData": {"userSignature": "only-one-segment"},
        }),
    );
    let err = verifier(ANCHOR_PEM).verify(&token).unwrap_err();
    assert!(matches!(err, Error::MalformedSignaturePayload(_)));
}

#[test]
fn malformed_is_distinguishable_from_unverified() {
    // The two outcomes the caller must never confuse: a decodable payload
    // with a bad signature is Ok(verified=false), garbage is Err.
    let ok = verifier(OTHER_ANCHOR_PEM).verify(APPROVED_JWS.trim());
    assert!(matches!(ok, Ok(v) if !v.verified));

    let err = verifier(OTHER_ANCHOR_PEM).verify("a.b");
    assert!(matches!(err, Err(Error::MalformedSignaturePayload(_))));
}
