//! The HTTP ingress.
//!
//! One POST route accepts network-server uplinks; the read-only `/api`
//! routes expose the in-memory tables for a dashboard. Uplink handling is
//! bounded by a whole-request deadline. Device-state locks are held only
//! around the CPU-bound decode, never across outbound HTTP.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use elpp_reassembly::{CompletedTransaction, DecodeResult, DeviceRegistry, Reassembler};
use elpp_tapos::{ChainApiClient, TaposManager};
use shared_types::{time, ChainId};

use crate::config::GatewayConfig;
use crate::downlink;
use crate::error::IngressError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub devices: Arc<DeviceRegistry>,
    pub reassembler: Arc<Reassembler>,
    pub tapos: Arc<TaposManager>,
    pub client: ChainApiClient,
}

impl AppState {
    /// Wire the subsystems up from a validated configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, elpp_tapos::ClientError> {
        let client = ChainApiClient::new(config.outbound.timeout)?;
        let tapos = Arc::new(TaposManager::new(
            config.chain_specs(),
            client.clone(),
            config.tapos_settings(),
        ));
        Ok(Self {
            devices: Arc::new(DeviceRegistry::new(config.reassembly.purge_after)),
            reassembler: Arc::new(Reassembler::new()),
            client,
            tapos,
            config: Arc::new(config),
        })
    }
}

/// One uplink POST from the network server.
#[derive(Debug, Clone, Deserialize)]
pub struct UplinkRequest {
    /// ELPP application port the device addressed.
    pub port: u16,
    /// Base64 uplink payload bytes.
    pub payload: String,
    /// Device key.
    pub dev_eui: String,
    /// Where a TAPOS response downlink may be POSTed.
    #[serde(default)]
    pub downlink_url: Option<String>,
    /// Network-server receive time, milliseconds since epoch.
    #[serde(default)]
    pub reported_at: Option<u64>,
}

/// Build the ingress router.
pub fn router(state: AppState) -> Router {
    let introspection = Router::new()
        .route("/api/health", get(health))
        .route("/api/device_states", get(device_states))
        .route("/api/tapos_manager_state", get(tapos_manager_state))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/", post(handle_uplink))
        .merge(introspection)
        .with_state(state)
}

async fn handle_uplink(State(state): State<AppState>, body: String) -> Response {
    // Parsed by hand so a malformed body is a 500 with a readable reason,
    // like every other ingress failure.
    let request: UplinkRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(error) => return IngressError::Request(error).into_response(),
    };

    let deadline = state.config.ingress.request_deadline;
    match tokio::time::timeout(deadline, process_uplink(state, request)).await {
        Ok(Ok(reply)) => reply.into_response(),
        Ok(Err(error)) => error.into_response(),
        Err(_) => IngressError::Deadline.into_response(),
    }
}

/// Successful uplink replies: always 200 with a body for the device logs.
enum UplinkReply {
    /// Reassembly still pending; body is the progress line.
    Status(String),
    /// Dispatched; body is the blockchain API's response verbatim.
    ChainResponse(String),
}

impl IntoResponse for UplinkReply {
    fn into_response(self) -> Response {
        match self {
            UplinkReply::Status(text) => (StatusCode::OK, text).into_response(),
            UplinkReply::ChainResponse(body) => (StatusCode::OK, body).into_response(),
        }
    }
}

async fn process_uplink(
    state: AppState,
    request: UplinkRequest,
) -> Result<UplinkReply, IngressError> {
    if request.port != state.config.elpp_port {
        return Err(IngressError::WrongPort {
            expected: state.config.elpp_port,
            got: request.port,
        });
    }

    let payload = Bytes::from(BASE64.decode(request.payload.as_bytes())?);
    let now_epoch = time::epoch_secs();
    debug!(device = %request.dev_eui, bytes = payload.len(), "uplink received");

    // Per-device serialization: the registry hands out one lock per device
    // and the decode happens entirely inside it (CPU only, no I/O).
    let device = state.devices.device(&request.dev_eui, now_epoch);
    let result = {
        let mut device_state = device.lock();
        state
            .reassembler
            .decode(&mut device_state, &payload, now_epoch)?
    };

    match result {
        DecodeResult::Incomplete(status) => Ok(UplinkReply::Status(status.to_string())),
        DecodeResult::Complete(transactions) => {
            dispatch_completed(&state, &request.dev_eui, transactions).await
        }
        DecodeResult::TaposRequest(tapos_request) => {
            answer_tapos_request(&state, &request, tapos_request).await
        }
    }
}

/// Queue every completed transaction, run a dispatch sweep, and relay the
/// chain's answer for the transaction this uplink completed.
///
/// The sweep also flushes older items (this device's or others') that were
/// waiting for an `api_last`; their outcomes are logged by the sweep but
/// must not be mistaken for this request's, so matching is by the queue
/// sequence numbers just enqueued, never by device key alone.
async fn dispatch_completed(
    state: &AppState,
    dev_eui: &str,
    transactions: Vec<CompletedTransaction>,
) -> Result<UplinkReply, IngressError> {
    let mut enqueued: Vec<(ChainId, u64)> = Vec::with_capacity(transactions.len());
    for completed in &transactions {
        let json = serde_json::to_string(&completed.trx)?;
        let seq = state
            .tapos
            .enqueue(completed.chain, json, dev_eui.to_string())?;
        enqueued.push((completed.chain, seq));
    }

    let outcomes = state.tapos.sweep().await;
    let mine = outcomes
        .into_iter()
        .find(|outcome| enqueued.contains(&(outcome.chain, outcome.seq)));

    match mine {
        Some(outcome) => match outcome.result {
            Ok(reply) => {
                info!(device = %dev_eui, chain = outcome.chain, status = reply.status,
                    "transaction forwarded to chain");
                Ok(UplinkReply::ChainResponse(reply.body))
            }
            Err(error) => Err(IngressError::DispatchTransport(error)),
        },
        // No api_last yet for the chain: the item stays queued and a later
        // sweep picks it up.
        None => Ok(UplinkReply::Status(
            "transaction queued; no blockchain api available yet".into(),
        )),
    }
}

/// Answer a channel-4 TAPOS request over the supplied downlink URL.
async fn answer_tapos_request(
    state: &AppState,
    request: &UplinkRequest,
    tapos_request: elpp_reassembly::TaposRequest,
) -> Result<UplinkReply, IngressError> {
    let tapos = state
        .tapos
        .tapos_for(tapos_request.chain_id)
        .ok_or_else(|| {
            IngressError::TaposUnavailable(elpp_tapos::TaposError::TaposUnavailable(
                tapos_request.chain_id,
            ))
        })?;

    let downlink_url = request
        .downlink_url
        .as_deref()
        .ok_or(IngressError::MissingDownlinkUrl)?;

    let received_at_ms = request.reported_at.unwrap_or_else(time::epoch_millis);
    let frame = downlink::encode_tapos_response(tapos_request, received_at_ms, &tapos)?;
    let message = downlink::downlink_message(&frame, state.config.elpp_port);

    state
        .client
        .post_downlink(downlink_url, &message)
        .await
        .map_err(IngressError::Downlink)?;

    info!(device = %request.dev_eui, chain = tapos_request.chain_id,
        req_id = tapos_request.req_id, "tapos response downlinked");
    Ok(UplinkReply::Status("tapos response sent".into()))
}

async fn health() -> &'static str {
    "ok"
}

async fn device_states(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!(state.devices.snapshot()))
}

async fn tapos_manager_state(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.tapos.snapshot())
}
