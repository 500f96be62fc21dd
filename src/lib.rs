//! Client for the Freja eID authentication and signature REST services.

pub mod attributes;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod jws;
pub mod request;
pub mod response;
pub mod telemetry;
pub mod transport;

pub use client::{FrejaClient, QrCode, SignatureResult};
pub use error::{Error, Result};
