use crate::value::{NativeFn, Value};
use derive_more::{Display, FromStr};
use serde::{Deserialize, Serialize};
use std::{fmt, rc::Rc};

///
/// Category
///
/// The kind of declaration a registry entry belongs to. Every staging surface
/// on the builder exists once per category.
///

#[derive(
    Clone, Copy, Debug, Display, FromStr, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[display("service")]
    Service,
    #[display("filter")]
    Filter,
    #[display("controller")]
    Controller,
    #[display("directive")]
    Directive,
    #[display("animation")]
    Animation,
}

///
/// ProviderMethod
///
/// How a declaration was registered. Fixed-value methods (`value`,
/// `constant`) have no factory to rewrite and are never mockable targets.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMethod {
    #[display("factory")]
    Factory,
    #[display("service")]
    Service,
    #[display("value")]
    Value,
    #[display("constant")]
    Constant,
    #[display("filter")]
    Filter,
    #[display("controller")]
    Controller,
    #[display("directive")]
    Directive,
    #[display("animation")]
    Animation,
}

impl ProviderMethod {
    /// True for fixed-value provider methods, which carry no factory.
    #[must_use]
    pub const fn is_fixed(self) -> bool {
        matches!(self, Self::Value | Self::Constant)
    }
}

///
/// Factory
///
/// A factory description: the ordered dependency names the body expects and
/// the body itself. Clones share the body allocation, so "the same factory"
/// is checkable via [`Factory::same_body`].
///

#[derive(Clone)]
pub struct Factory {
    dependency_names: Vec<String>,
    produce: NativeFn,
}

impl Factory {
    pub fn new<I, S>(dependency_names: I, produce: impl Fn(&[Value]) -> Value + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dependency_names: dependency_names.into_iter().map(Into::into).collect(),
            produce: Rc::new(produce),
        }
    }

    /// A zero-dependency factory yielding a fixed value.
    #[must_use]
    pub fn fixed(value: Value) -> Self {
        Self {
            dependency_names: Vec::new(),
            produce: Rc::new(move |_| value.clone()),
        }
    }

    #[must_use]
    pub fn dependency_names(&self) -> &[String] {
        &self.dependency_names
    }

    /// Invoke the body with already-resolved dependency values.
    #[must_use]
    pub fn produce(&self, args: &[Value]) -> Value {
        (self.produce)(args)
    }

    /// The same body with the injection annotations removed.
    #[must_use]
    pub fn stripped(&self) -> Self {
        Self {
            dependency_names: Vec::new(),
            produce: Rc::clone(&self.produce),
        }
    }

    /// Rebind this body to a different dependency list.
    #[must_use]
    pub(crate) fn with_dependencies(&self, dependency_names: Vec<String>) -> Self {
        Self {
            dependency_names,
            produce: Rc::clone(&self.produce),
        }
    }

    /// True if both descriptions share one underlying body.
    #[must_use]
    pub fn same_body(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.produce, &other.produce)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("dependency_names", &self.dependency_names)
            .finish()
    }
}

///
/// RawDeclaration
///
/// The heterogeneous shapes a registry entry can take on the wire. Only the
/// introspection adapter is allowed to branch on these; everything downstream
/// works off the normalized [`crate::introspect::DeclarationRecord`].
///

#[derive(Clone, Debug)]
pub enum RawDeclaration {
    /// An ordered dependency-name list paired with an un-annotated body.
    Annotated {
        dependency_names: Vec<String>,
        factory: Factory,
    },

    /// A body that carries its own dependency annotations.
    Bare(Factory),

    /// A fixed value with no factory.
    Fixed(Value),

    /// A provider wrapper nesting one of the other shapes under its
    /// initializer key.
    Provider { init: Box<RawDeclaration> },
}

///
/// Declaration
///
/// One registry entry: category, registration method, and the raw shape.
///

#[derive(Clone, Debug)]
pub struct Declaration {
    pub category: Category,
    pub provider_method: ProviderMethod,
    pub raw: RawDeclaration,
}

impl Declaration {
    /// An annotated factory declaration for any category.
    pub fn factory<I, S>(
        category: Category,
        dependency_names: I,
        body: impl Fn(&[Value]) -> Value + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider_method = match category {
            Category::Service => ProviderMethod::Factory,
            Category::Filter => ProviderMethod::Filter,
            Category::Controller => ProviderMethod::Controller,
            Category::Directive => ProviderMethod::Directive,
            Category::Animation => ProviderMethod::Animation,
        };

        Self {
            category,
            provider_method,
            raw: RawDeclaration::Annotated {
                dependency_names: dependency_names.into_iter().map(Into::into).collect(),
                factory: Factory::new(Vec::<String>::new(), body),
            },
        }
    }

    /// A service declared through a self-annotated body.
    #[must_use]
    pub fn service(factory: Factory) -> Self {
        Self {
            category: Category::Service,
            provider_method: ProviderMethod::Service,
            raw: RawDeclaration::Bare(factory),
        }
    }

    /// A mutable fixed value.
    #[must_use]
    pub fn value(value: Value) -> Self {
        Self {
            category: Category::Service,
            provider_method: ProviderMethod::Value,
            raw: RawDeclaration::Fixed(value),
        }
    }

    /// An immutable fixed value.
    #[must_use]
    pub fn constant(value: Value) -> Self {
        Self {
            category: Category::Service,
            provider_method: ProviderMethod::Constant,
            raw: RawDeclaration::Fixed(value),
        }
    }

    /// Wrap an existing declaration shape under a provider initializer.
    #[must_use]
    pub fn provider(category: Category, provider_method: ProviderMethod, init: RawDeclaration) -> Self {
        Self {
            category,
            provider_method,
            raw: RawDeclaration::Provider {
                init: Box::new(init),
            },
        }
    }
}
