//! Duplex relay between a local endpoint and one session stream.
//!
//! - [`pump`]: a single direction, copied until EOF, error, or cancellation
//! - [`race`]: the "first of N" wait the relay uses to pick a winner
//! - [`coordinator`]: runs both directions and closes the session once

pub mod coordinator;
pub mod pump;
pub mod race;

pub use coordinator::Coordinator;
pub use pump::{Direction, PumpExit, PumpReport};
pub use race::Race;
