//! Control command dispatch.
//!
//! The dispatcher validates, invokes the bound adapter, and falls back to
//! simulated clicks on conventional player controls when a direct call is
//! refused. Every result carries a metadata snapshot read after the attempt
//! from whatever binding is current at completion, so callers always see the
//! state their command actually left behind.

pub mod dispatcher;

pub use dispatcher::{ControlDispatcher, PAUSE_CONTROL_SELECTORS, PLAY_CONTROL_SELECTORS};
