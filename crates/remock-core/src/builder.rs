use crate::{
    Error,
    compile::{self, CompileError, CompiledModule, InclusionMode, InclusionRequest},
    introspect,
    policy::Directive,
    registry::{Category, Registry},
};

/// One staging method quartet per declaration category: mock everything, mock
/// only the listed dependencies, mock all but the listed dependencies, or
/// include the declaration untouched.
macro_rules! staging_surface {
    ($(($category:ident, $with_mocks:ident, $with_mocks_for:ident, $with_mocks_except:ident, $as_is:ident)),* $(,)?) => {
        $(
            pub fn $with_mocks(&mut self, name: impl Into<String>) -> Result<&mut Self, Error> {
                self.stage(
                    Category::$category,
                    name.into(),
                    InclusionMode::WithMocks(Directive::All),
                )
            }

            pub fn $with_mocks_for<I, S>(
                &mut self,
                name: impl Into<String>,
                dependencies: I,
            ) -> Result<&mut Self, Error>
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.stage(
                    Category::$category,
                    name.into(),
                    InclusionMode::WithMocks(Directive::only(dependencies)),
                )
            }

            pub fn $with_mocks_except<I, S>(
                &mut self,
                name: impl Into<String>,
                dependencies: I,
            ) -> Result<&mut Self, Error>
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.stage(
                    Category::$category,
                    name.into(),
                    InclusionMode::WithMocks(Directive::except(dependencies)),
                )
            }

            pub fn $as_is(&mut self, name: impl Into<String>) -> Result<&mut Self, Error> {
                self.stage(Category::$category, name.into(), InclusionMode::AsIs)
            }
        )*
    };
}

///
/// ModuleBuilder
///
/// Fluent accumulation facade over [`compile`]. Staging calls validate
/// eagerly and reject without touching the staged list; `build()` compiles
/// the staged requests into a fresh [`CompiledModule`] and may be called
/// again to re-derive from the same staging.
///

#[derive(Debug)]
pub struct ModuleBuilder {
    registry: Registry,
    requests: Vec<InclusionRequest>,
}

impl ModuleBuilder {
    /// Start a builder over the given source registry.
    #[must_use]
    pub fn for_registry(registry: &Registry) -> Self {
        Self {
            registry: registry.clone(),
            requests: Vec::new(),
        }
    }

    staging_surface! {
        (Service, service_with_mocks, service_with_mocks_for, service_with_mocks_except, service_as_is),
        (Filter, filter_with_mocks, filter_with_mocks_for, filter_with_mocks_except, filter_as_is),
        (Controller, controller_with_mocks, controller_with_mocks_for, controller_with_mocks_except, controller_as_is),
        (Directive, directive_with_mocks, directive_with_mocks_for, directive_with_mocks_except, directive_as_is),
        (Animation, animation_with_mocks, animation_with_mocks_for, animation_with_mocks_except, animation_as_is),
    }

    /// Number of staged inclusion requests.
    #[must_use]
    pub fn staged(&self) -> usize {
        self.requests.len()
    }

    /// Compile the staged requests into a registerable module.
    pub fn build(&self) -> Result<CompiledModule, Error> {
        let module_name = format!(
            "{}::derived#{}",
            self.registry.name(),
            self.registry.next_module_id()
        );

        Ok(compile::compile(&self.registry, &self.requests, module_name)?)
    }

    fn stage(
        &mut self,
        category: Category,
        name: String,
        mode: InclusionMode,
    ) -> Result<&mut Self, Error> {
        // Fail fast: unknown declarations and fixed-value mocking targets are
        // rejected here, leaving the staged list untouched.
        let record = introspect::describe(&self.registry, category, &name)
            .map_err(CompileError::Introspect)?;

        if let InclusionMode::WithMocks(directive) = &mode {
            if record.provider_method.is_fixed() {
                return Err(CompileError::UnsupportedProviderKind {
                    name: record.name,
                    provider_method: record.provider_method,
                }
                .into());
            }
            directive.validate().map_err(CompileError::Policy)?;
        }

        self.requests.push(InclusionRequest {
            name,
            category,
            mode,
        });
        Ok(self)
    }
}
