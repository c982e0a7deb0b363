//! # ELPP Gateway
//!
//! The HTTP surface and wiring of the gateway: the uplink ingress, the
//! TAPOS response downlink, the read-only introspection routes, and the
//! configuration tying the subsystem crates together. The runtime binary
//! owns process concerns (CLI, logging, serving, shutdown); everything
//! testable lives here.

pub mod config;
pub mod downlink;
pub mod error;
pub mod ingress;

pub use config::{ConfigError, GatewayConfig};
pub use error::IngressError;
pub use ingress::{router, AppState, UplinkRequest};
