//! `quicssh` Core Library
//!
//! Shared functionality for `quicssh` components:
//! - Tracing subscriber setup (logs always go to stderr)
//! - Development CA and server certificates (`certs` feature)

#[cfg(feature = "certs")]
pub mod certs;
pub mod tracing_init;
