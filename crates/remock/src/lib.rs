//! remock — derive a one-test-run registry from an existing component
//! registry, with a caller-chosen subset of each declaration's dependencies
//! transparently replaced by recording stand-ins.
//!
//! ## Crate layout
//! - `core`: the value model, mock synthesizer, policy resolver, registry
//!   transformer, builder facade, and scheduler shim.
//!
//! The `prelude` module mirrors the surface used inside test code.

pub use remock_core as core;

pub use remock_core::{Error, MOCK_SUFFIX};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use remock_core::prelude::*;
}
