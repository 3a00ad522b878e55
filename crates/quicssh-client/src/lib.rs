//! quicssh Client Library
//!
//! Relays a local byte stream (normally stdin/stdout) over a single
//! bidirectional QUIC stream:
//! - TLS policy and address handling
//! - QUIC session establishment via `quinn`
//! - Two-way relay with first-to-finish shutdown
//! - Tunnel lifecycle tying it together

pub mod config;
pub mod error;
pub mod relay;
pub mod tls;
pub mod transport;
pub mod tunnel;

pub use config::ClientConfig;
pub use error::TunnelError;
pub use tunnel::TunnelClient;
