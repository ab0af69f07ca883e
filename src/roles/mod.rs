//! The two client roles, composed from the session engine.
//!
//! The host drives the phase machine; players read snapshots and submit
//! answers. Both talk to `AppState` exactly like a remote client would.

mod host;
mod player;

pub use host::HostController;
pub use player::{PlayerAgent, PlayerView};
