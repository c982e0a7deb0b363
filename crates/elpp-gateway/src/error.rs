//! Ingress error mapping.
//!
//! Every failure an uplink POST can hit, each rendered as a 500 with a
//! human-readable line. Reassembly that simply has not finished is not an
//! error and never lands here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use elpp_reassembly::ReassemblyError;
use elpp_tapos::{ClientError, TaposError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngressError {
    /// The request body was not the uplink JSON shape.
    #[error("invalid uplink request: {0}")]
    Request(serde_json::Error),

    /// The uplink addressed a different application port.
    #[error("wrong port {got}, expected {expected}")]
    WrongPort { expected: u16, got: u16 },

    /// `payload` was not valid base64.
    #[error("invalid payload encoding: {0}")]
    PayloadEncoding(#[from] base64::DecodeError),

    /// The codec or the reassembler rejected the payload.
    #[error("decoder error: {0}")]
    Decode(#[from] ReassemblyError),

    /// A TAPOS request arrived for a chain with no fresh value.
    #[error("decoder error: no tapos")]
    TaposUnavailable(#[source] TaposError),

    /// A TAPOS request arrived without a downlink URL to answer to.
    #[error("tapos request without a downlink_url")]
    MissingDownlinkUrl,

    /// The TAPOS response could not be encoded.
    #[error("cannot encode tapos response: {0}")]
    DownlinkEncoding(#[from] elpp_codec::CodecError),

    /// The downlink POST failed.
    #[error("downlink failed: {0}")]
    Downlink(#[source] ClientError),

    /// A completed transaction addressed an unconfigured chain.
    #[error("cannot dispatch: {0}")]
    Dispatch(#[from] TaposError),

    /// The submit body failed to serialize.
    #[error("cannot serialize transaction: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The dispatch POST failed in transport.
    #[error("dispatch failed: {0}")]
    DispatchTransport(#[source] ClientError),

    /// The whole-request deadline elapsed.
    #[error("request deadline exceeded")]
    Deadline,
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        // Devices only distinguish success from failure; everything here is
        // a 500 with a readable reason for the network-server logs.
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
