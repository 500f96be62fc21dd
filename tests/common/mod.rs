use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use frejaeid_client::FrejaClient;
use frejaeid_client::config::FrejaEnvironment;
use frejaeid_client::jws::TrustAnchor;
use frejaeid_client::transport::{RawResponse, Transport, TransportError};

pub const ANCHOR_PEM: &[u8] = include_bytes!("../../test_data/jws_anchor.pem");
pub const OTHER_ANCHOR_PEM: &[u8] = include_bytes!("../../test_data/jws_other_anchor.pem");
pub const APPROVED_JWS: &str = include_str!("../../test_data/approved_signature.jws");

/// Transport double that replays queued responses and records every
/// request that reached it.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_response(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(RawResponse {
            status,
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn push_transport_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Http(message.into())));
    }

    /// `(path, form_body)` pairs in dispatch order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_form(
        &self,
        path: &str,
        form_body: String,
    ) -> Result<RawResponse, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), form_body));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Http("no response queued".into())))
    }
}

/// A client wired to the mock transport, pinning the fixture anchor.
pub fn test_client(transport: Arc<MockTransport>) -> FrejaClient {
    test_client_with_anchor(transport, ANCHOR_PEM)
}

pub fn test_client_with_anchor(transport: Arc<MockTransport>, anchor_pem: &[u8]) -> FrejaClient {
    FrejaClient::from_parts(
        FrejaEnvironment::Test,
        transport,
        TrustAnchor::from_pem(anchor_pem).unwrap(),
    )
}
