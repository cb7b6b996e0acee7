use crate::{
    registry::{Category, Factory, ProviderMethod, RawDeclaration, Registry},
    value::Value,
};
use thiserror::Error as ThisError;

///
/// IntrospectError
///

#[derive(Debug, ThisError)]
pub enum IntrospectError {
    #[error("no {category} declaration named '{name}'")]
    UnknownDeclaration { category: Category, name: String },

    #[error("no built-in provider named '{name}'")]
    UnknownBuiltinProvider { name: String },
}

///
/// DeclarationRecord
///
/// The one normalized view of a declaration. Downstream code branches only on
/// `provider_method`, never on the raw registry shape.
///

#[derive(Clone, Debug)]
pub struct DeclarationRecord {
    pub name: String,
    pub category: Category,
    pub provider_method: ProviderMethod,
    pub dependency_names: Vec<String>,
    pub raw_factory: Factory,
    pub stripped_factory: Factory,
}

///
/// NormalizedShape
///
/// Intermediate result of shape normalization: either a fixed value or a
/// factory carrying its full dependency list.
///

pub(crate) enum NormalizedShape {
    Fixed(Value),
    Factory(Factory),
}

/// Flatten a raw declaration shape. This is the only place that sniffs the
/// heterogeneous registry shapes.
pub(crate) fn normalize_raw(raw: &RawDeclaration) -> NormalizedShape {
    match raw {
        RawDeclaration::Annotated {
            dependency_names,
            factory,
        } => NormalizedShape::Factory(factory.with_dependencies(dependency_names.clone())),
        RawDeclaration::Bare(factory) => NormalizedShape::Factory(factory.clone()),
        RawDeclaration::Fixed(value) => NormalizedShape::Fixed(value.clone()),
        RawDeclaration::Provider { init } => normalize_raw(init),
    }
}

/// Describe the declaration registered under `category`/`name`.
pub fn describe(
    registry: &Registry,
    category: Category,
    name: &str,
) -> Result<DeclarationRecord, IntrospectError> {
    let declaration = registry
        .declaration(name)
        .filter(|declaration| declaration.category == category)
        .ok_or_else(|| IntrospectError::UnknownDeclaration {
            category,
            name: name.to_string(),
        })?;

    let raw_factory = match normalize_raw(&declaration.raw) {
        NormalizedShape::Fixed(value) => Factory::fixed(value),
        NormalizedShape::Factory(factory) => factory,
    };

    Ok(DeclarationRecord {
        name: name.to_string(),
        category,
        provider_method: declaration.provider_method,
        dependency_names: raw_factory.dependency_names().to_vec(),
        stripped_factory: raw_factory.stripped(),
        raw_factory,
    })
}

/// Describe one of the host's own built-in bindings as a zero-dependency
/// provider, so harness startup can wrap framework primitives.
pub fn describe_builtin(registry: &Registry, name: &str) -> Result<DeclarationRecord, IntrospectError> {
    if !Registry::is_builtin(name) {
        return Err(IntrospectError::UnknownBuiltinProvider {
            name: name.to_string(),
        });
    }

    let value = registry
        .get(name)
        .map_err(|_| IntrospectError::UnknownBuiltinProvider {
            name: name.to_string(),
        })?;

    let raw_factory = Factory::fixed(value);
    Ok(DeclarationRecord {
        name: name.to_string(),
        category: Category::Service,
        provider_method: ProviderMethod::Constant,
        dependency_names: Vec::new(),
        stripped_factory: raw_factory.stripped(),
        raw_factory,
    })
}
