//! Core runtime for remock: the selective-mocking policy resolver, registry
//! transformer, structural mock synthesizer, and the builder facade that
//! stages inclusion requests and compiles them into a derived registry.

pub mod builder;
pub mod compile;
pub mod introspect;
pub mod mock;
pub mod policy;
pub mod registry;
pub mod scheduler;
pub mod spy;
pub mod value;

use thiserror::Error as ThisError;

///
/// CONSTANTS
///

/// Suffix appended to a mocked dependency's binding name. A mocked `X` is
/// exposed to consuming declarations, and retrievable from the derived
/// registry, as `XMock`.
pub const MOCK_SUFFIX: &str = "Mock";

/// Prefix marking the host framework's own built-in namespace. Names under
/// it are always exempt from mocking.
pub const BUILTIN_PREFIX: &str = "$";

/// Upper bound on fixed-point drain rounds in one scheduler tick.
pub const MAX_TICK_ROUNDS: usize = 64;

///
/// Error
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    CompileError(#[from] compile::CompileError),

    #[error(transparent)]
    IntrospectError(#[from] introspect::IntrospectError),

    #[error(transparent)]
    MockError(#[from] mock::MockError),

    #[error(transparent)]
    PolicyError(#[from] policy::PolicyError),

    #[error(transparent)]
    RegistryError(#[from] registry::RegistryError),

    #[error(transparent)]
    SchedulerError(#[from] scheduler::SchedulerError),
}

///
/// Prelude
///
/// Prelude contains only domain vocabulary; errors and internals stay behind
/// their modules.
///

pub mod prelude {
    pub use crate::{
        builder::ModuleBuilder,
        compile::CompiledModule,
        policy::Directive,
        registry::{Category, Declaration, Factory, Registry},
        spy::create_spy,
        value::Value,
    };
}
