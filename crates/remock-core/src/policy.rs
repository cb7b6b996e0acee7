use crate::{
    mock,
    registry::{Registry, RegistryError},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

///
/// PolicyError
///

#[derive(Debug, ThisError)]
pub enum PolicyError {
    #[error("dependency '{dependency}' was explicitly listed for mocking but cannot be mocked")]
    ExplicitMockUnavailable { dependency: String },

    #[error("invalid inclusion directive: {reason}")]
    InvalidDirective { reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

///
/// Directive
///
/// The caller's per-declaration mocking intent: mock every dependency, only
/// the listed ones, or everything except the listed ones.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    All,
    OnlyListed(BTreeSet<String>),
    AllExcept(BTreeSet<String>),
}

impl Directive {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OnlyListed(names.into_iter().map(Into::into).collect())
    }

    pub fn except<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllExcept(names.into_iter().map(Into::into).collect())
    }

    /// Reject malformed name sets before they reach the resolver.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let names = match self {
            Self::All => return Ok(()),
            Self::OnlyListed(names) | Self::AllExcept(names) => names,
        };

        if names.iter().any(|name| name.is_empty()) {
            return Err(PolicyError::InvalidDirective {
                reason: "listed dependency names must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

///
/// Decision
///
/// The fate of one (declaration, dependency) pair within a build.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Mock,
    Real,
    Unresolved,
}

/// Resolve one dependency against a directive.
///
/// Names unknown to the registry pass through as `Unresolved` regardless of
/// directive. Built-in namespace names are forced to `Real` even when the
/// directive would mock them. An explicitly listed dependency that cannot be
/// mocked aborts the build; the same unmockability under `All`/`AllExcept`
/// silently degrades to `Real`.
pub fn decide(
    registry: &Registry,
    directive: &Directive,
    dependency: &str,
) -> Result<Decision, PolicyError> {
    if !registry.has(dependency) {
        return Ok(Decision::Unresolved);
    }
    if Registry::is_builtin(dependency) {
        return Ok(Decision::Real);
    }

    let wants_mock = match directive {
        Directive::All => true,
        Directive::OnlyListed(names) => names.contains(dependency),
        Directive::AllExcept(names) => !names.contains(dependency),
    };
    if !wants_mock {
        return Ok(Decision::Real);
    }

    let instance = registry.get(dependency)?;
    if mock::can_synthesize(&instance) {
        return Ok(Decision::Mock);
    }

    match directive {
        Directive::OnlyListed(_) => Err(PolicyError::ExplicitMockUnavailable {
            dependency: dependency.to_string(),
        }),
        Directive::All | Directive::AllExcept(_) => Ok(Decision::Real),
    }
}
