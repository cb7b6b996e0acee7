use crate::{
    MOCK_SUFFIX, introspect,
    introspect::IntrospectError,
    mock,
    mock::MockError,
    policy::{self, Decision, Directive, PolicyError},
    registry::{Category, Declaration, Factory, ProviderMethod, RawDeclaration, Registry, RegistryError},
    value::Value,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error as ThisError;

///
/// CompileError
///

#[derive(Debug, ThisError)]
pub enum CompileError {
    #[error("{provider_method} declaration '{name}' cannot be a mocking target")]
    UnsupportedProviderKind {
        name: String,
        provider_method: ProviderMethod,
    },

    #[error(transparent)]
    Introspect(#[from] IntrospectError),

    #[error(transparent)]
    Mock(#[from] MockError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

///
/// InclusionMode
///
/// How a staged declaration enters the derived registry: untouched, or with
/// its dependency list rewritten under a mocking directive.
///

#[derive(Clone, Debug)]
pub enum InclusionMode {
    AsIs,
    WithMocks(Directive),
}

///
/// InclusionRequest
///
/// One staged intent, immutable once created. Accumulated by the builder
/// facade and consumed in staging order by [`compile`].
///

#[derive(Clone, Debug)]
pub struct InclusionRequest {
    pub name: String,
    pub category: Category,
    pub mode: InclusionMode,
}

///
/// RewrittenDeclaration
///
/// A declaration ready for the derived registry: its final dependency list
/// (mock-suffixed where mocked) plus the factory to run.
///

#[derive(Clone, Debug)]
pub struct RewrittenDeclaration {
    pub name: String,
    pub category: Category,
    pub provider_method: ProviderMethod,
    pub dependency_names: Vec<String>,
    pub factory: Factory,
}

impl RewrittenDeclaration {
    fn to_declaration_pair(&self) -> (String, Declaration) {
        let raw = if self.factory.dependency_names().is_empty() {
            RawDeclaration::Annotated {
                dependency_names: self.dependency_names.clone(),
                factory: self.factory.clone(),
            }
        } else {
            RawDeclaration::Bare(self.factory.clone())
        };

        (
            self.name.clone(),
            Declaration {
                category: self.category,
                provider_method: self.provider_method,
                raw,
            },
        )
    }
}

///
/// Manifest
///
/// Serializable summary of a compiled module: binding and declaration names
/// only, for inspection and snapshotting.
///

#[derive(Clone, Debug, Serialize)]
pub struct Manifest {
    pub module_name: String,
    pub mocks: Vec<String>,
    pub passthrough: Vec<String>,
    pub declarations: Vec<ManifestDeclaration>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ManifestDeclaration {
    pub name: String,
    pub category: Category,
    pub provider_method: ProviderMethod,
    pub dependency_names: Vec<String>,
}

///
/// CompiledModule
///
/// The build artifact: synthesized mock bindings, real-instance passthrough
/// bindings, and rewritten declarations, bundled for one registration into a
/// derived child registry.
///

#[derive(Debug)]
pub struct CompiledModule {
    module_name: String,
    mocks: BTreeMap<String, Value>,
    passthrough: BTreeMap<String, Value>,
    declarations: Vec<RewrittenDeclaration>,
}

impl CompiledModule {
    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    #[must_use]
    pub const fn mocks(&self) -> &BTreeMap<String, Value> {
        &self.mocks
    }

    /// Look up a mock binding by its suffixed name.
    #[must_use]
    pub fn mock(&self, binding_name: &str) -> Option<&Value> {
        self.mocks.get(binding_name)
    }

    #[must_use]
    pub const fn passthrough(&self) -> &BTreeMap<String, Value> {
        &self.passthrough
    }

    #[must_use]
    pub fn declarations(&self) -> &[RewrittenDeclaration] {
        &self.declarations
    }

    #[must_use]
    pub fn manifest(&self) -> Manifest {
        Manifest {
            module_name: self.module_name.clone(),
            mocks: self.mocks.keys().cloned().collect(),
            passthrough: self.passthrough.keys().cloned().collect(),
            declarations: self
                .declarations
                .iter()
                .map(|declaration| ManifestDeclaration {
                    name: declaration.name.clone(),
                    category: declaration.category,
                    provider_method: declaration.provider_method,
                    dependency_names: declaration.dependency_names.clone(),
                })
                .collect(),
        }
    }

    /// Register the bundle into a fresh child of `registry` and hand the
    /// child back. The compiled module itself is not consumed; applying twice
    /// yields two independent children.
    pub fn apply(&self, registry: &Registry) -> Result<Registry, CompileError> {
        let mut bindings: Vec<(String, Value)> = Vec::new();
        for (name, value) in &self.mocks {
            bindings.push((name.clone(), value.clone()));
        }
        for (name, value) in &self.passthrough {
            bindings.push((name.clone(), value.clone()));
        }

        let declarations = self
            .declarations
            .iter()
            .map(RewrittenDeclaration::to_declaration_pair)
            .collect();

        Ok(registry.new_child(self.module_name.clone(), declarations, bindings)?)
    }
}

/// Compile staged inclusion requests into a [`CompiledModule`].
///
/// Requests are processed in staging order. Mock synthesis is deduplicated
/// across the whole compile: one binding per distinct mocked dependency name.
/// When one declaration mocks a dependency and another keeps it real, the
/// mock binding always wins for the suffixed name, independent of request
/// order.
pub fn compile(
    registry: &Registry,
    requests: &[InclusionRequest],
    module_name: impl Into<String>,
) -> Result<CompiledModule, CompileError> {
    let mut to_mock: BTreeSet<String> = BTreeSet::new();
    let mut passthrough_names: BTreeSet<String> = BTreeSet::new();
    let mut declarations: Vec<RewrittenDeclaration> = Vec::new();

    for request in requests {
        let record = introspect::describe(registry, request.category, &request.name)?;

        match &request.mode {
            InclusionMode::AsIs => {
                // Pull every resolvable dependency so transitive real wiring
                // survives into the derived registry.
                for dependency in &record.dependency_names {
                    if registry.has(dependency) {
                        passthrough_names.insert(dependency.clone());
                    }
                }

                declarations.push(RewrittenDeclaration {
                    name: record.name,
                    category: record.category,
                    provider_method: record.provider_method,
                    dependency_names: record.dependency_names.clone(),
                    factory: record.raw_factory,
                });
            }
            InclusionMode::WithMocks(directive) => {
                if record.provider_method.is_fixed() {
                    return Err(CompileError::UnsupportedProviderKind {
                        name: record.name,
                        provider_method: record.provider_method,
                    });
                }
                directive.validate()?;

                let mut rewritten = Vec::with_capacity(record.dependency_names.len());
                for dependency in &record.dependency_names {
                    match policy::decide(registry, directive, dependency)? {
                        Decision::Mock => {
                            to_mock.insert(dependency.clone());
                            rewritten.push(format!("{dependency}{MOCK_SUFFIX}"));
                        }
                        Decision::Real => {
                            passthrough_names.insert(dependency.clone());
                            rewritten.push(dependency.clone());
                        }
                        Decision::Unresolved => rewritten.push(dependency.clone()),
                    }
                }

                declarations.push(RewrittenDeclaration {
                    name: record.name,
                    category: record.category,
                    provider_method: record.provider_method,
                    dependency_names: rewritten,
                    factory: record.stripped_factory,
                });
            }
        }
    }

    let mut mocks: BTreeMap<String, Value> = BTreeMap::new();
    for dependency in &to_mock {
        let instance = registry.get(dependency)?;
        let mocked = mock::synthesize(&instance)?;
        mocks.insert(format!("{dependency}{MOCK_SUFFIX}"), mocked);
    }

    let declared_names: BTreeSet<&str> = declarations
        .iter()
        .map(|declaration| declaration.name.as_str())
        .collect();

    let mut passthrough: BTreeMap<String, Value> = BTreeMap::new();
    for dependency in &passthrough_names {
        // A name already bound by synthesis is never overwritten: Mock wins
        // over Real for the same binding name across the whole compile. A
        // name the module itself declares is superseded by that declaration;
        // its instance stays reachable through the parent until the child
        // declaration shadows it.
        if mocks.contains_key(dependency) || declared_names.contains(dependency.as_str()) {
            continue;
        }
        passthrough.insert(dependency.clone(), registry.get(dependency)?);
    }

    Ok(CompiledModule {
        module_name: module_name.into(),
        mocks,
        passthrough,
        declarations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Callable, Object};
    use proptest::prelude::*;

    fn mockable_instance(name: &'static str) -> Value {
        Value::Object(Object::plain(BTreeMap::from([(
            "run".to_string(),
            Value::Callable(Callable::new(format!("{name}.run"), |_| Value::Null)),
        )])))
    }

    /// serviceA -> [serviceB, $log], serviceB and serviceC mockable services.
    fn registry() -> Registry {
        let registry = Registry::new("app");
        registry
            .declare(
                "serviceB",
                Declaration::factory(Category::Service, Vec::<String>::new(), |_| {
                    mockable_instance("serviceB")
                }),
            )
            .expect("serviceB should register");
        registry
            .declare(
                "serviceC",
                Declaration::factory(Category::Service, Vec::<String>::new(), |_| {
                    mockable_instance("serviceC")
                }),
            )
            .expect("serviceC should register");
        registry
            .declare(
                "serviceA",
                Declaration::factory(Category::Service, vec!["serviceB", "$log"], |args| {
                    Value::list(args.to_vec())
                }),
            )
            .expect("serviceA should register");
        registry
    }

    fn with_mocks(name: &str, directive: Directive) -> InclusionRequest {
        InclusionRequest {
            name: name.to_string(),
            category: Category::Service,
            mode: InclusionMode::WithMocks(directive),
        }
    }

    fn as_is(name: &str) -> InclusionRequest {
        InclusionRequest {
            name: name.to_string(),
            category: Category::Service,
            mode: InclusionMode::AsIs,
        }
    }

    #[test]
    fn as_is_keeps_the_raw_factory_and_unsuffixed_names() {
        let registry = registry();
        let compiled =
            compile(&registry, &[as_is("serviceA")], "m#1").expect("compile should succeed");

        let declaration = &compiled.declarations()[0];
        assert_eq!(declaration.dependency_names, vec!["serviceB", "$log"]);

        let record = introspect::describe(&registry, Category::Service, "serviceA")
            .expect("serviceA should describe");
        assert!(
            declaration.factory.same_body(&record.raw_factory),
            "AsIs must keep the original factory body"
        );

        // Transitive real wiring: both resolvable deps are pulled through.
        assert!(compiled.passthrough().contains_key("serviceB"));
        assert!(compiled.passthrough().contains_key("$log"));
        assert!(compiled.mocks().is_empty());
    }

    #[test]
    fn with_mocks_for_suffixes_exactly_the_listed_dependency() {
        // Worked example: serviceA -> ["serviceB", "$log"], mock only serviceB.
        let registry = registry();
        let compiled = compile(
            &registry,
            &[with_mocks("serviceA", Directive::only(vec!["serviceB"]))],
            "m#1",
        )
        .expect("compile should succeed");

        let declaration = &compiled.declarations()[0];
        assert_eq!(declaration.dependency_names, vec!["serviceBMock", "$log"]);

        assert_eq!(compiled.mocks().len(), 1);
        let mock = compiled.mock("serviceBMock").expect("one MockBinding named serviceBMock");
        assert!(
            mock.as_object().is_some_and(|o| o.get("run").is_some_and(Value::is_callable)),
            "mock mirrors the original's callable surface"
        );

        // $log passes through untouched (builtin exemption).
        let log = compiled.passthrough().get("$log").expect("$log passthrough");
        assert!(log.ref_eq(&registry.get("$log").expect("$log resolves")));
    }

    #[test]
    fn with_mocks_all_suffixes_every_known_non_builtin_dependency() {
        let registry = registry();
        let compiled = compile(&registry, &[with_mocks("serviceA", Directive::All)], "m#1")
            .expect("compile should succeed");

        let declaration = &compiled.declarations()[0];
        assert_eq!(declaration.dependency_names, vec!["serviceBMock", "$log"]);
        assert!(
            declaration.factory.dependency_names().is_empty(),
            "rewritten declarations carry the stripped factory"
        );
    }

    #[test]
    fn all_except_with_empty_list_mocks_everything() {
        let registry = Registry::new("app");
        for name in ["serviceB", "serviceC"] {
            registry
                .declare(
                    name,
                    Declaration::factory(Category::Service, Vec::<String>::new(), move |_| {
                        mockable_instance("dep")
                    }),
                )
                .expect("dep should register");
        }
        registry
            .declare(
                "serviceA",
                Declaration::factory(Category::Service, vec!["serviceB", "serviceC"], |_| Value::Null),
            )
            .expect("serviceA should register");

        let compiled = compile(
            &registry,
            &[with_mocks("serviceA", Directive::except(Vec::<String>::new()))],
            "m#1",
        )
        .expect("compile should succeed");

        assert_eq!(
            compiled.declarations()[0].dependency_names,
            vec!["serviceBMock", "serviceCMock"]
        );
        assert_eq!(compiled.mocks().len(), 2);
    }

    #[test]
    fn unknown_dependency_names_pass_through_bare() {
        let registry = registry();
        registry
            .declare(
                "serviceD",
                Declaration::factory(Category::Service, vec!["serviceB", "laterInjected"], |_| {
                    Value::Null
                }),
            )
            .expect("serviceD should register");

        let compiled = compile(&registry, &[with_mocks("serviceD", Directive::All)], "m#1")
            .expect("compile should succeed");

        let declaration = &compiled.declarations()[0];
        assert_eq!(declaration.dependency_names, vec!["serviceBMock", "laterInjected"]);
        assert!(
            !compiled.passthrough().contains_key("laterInjected"),
            "unresolved names are neither mocked nor passed through"
        );
    }

    #[test]
    fn mock_binding_wins_over_real_for_the_same_dependency() {
        let registry = registry();
        registry
            .declare(
                "serviceD",
                Declaration::factory(Category::Service, vec!["serviceB"], |_| Value::Null),
            )
            .expect("serviceD should register");

        // serviceA mocks serviceB; serviceD keeps it real. Order must not matter.
        for requests in [
            vec![
                with_mocks("serviceA", Directive::All),
                with_mocks("serviceD", Directive::only(Vec::<String>::new())),
            ],
            vec![
                with_mocks("serviceD", Directive::only(Vec::<String>::new())),
                with_mocks("serviceA", Directive::All),
            ],
        ] {
            let compiled = compile(&registry, &requests, "m#1").expect("compile should succeed");

            assert!(
                compiled.mock("serviceBMock").is_some(),
                "the mock binding must exist regardless of request order"
            );
            let real = compiled.passthrough().get("serviceB").expect("plain-name binding coexists");
            assert!(real.ref_eq(&registry.get("serviceB").expect("serviceB resolves")));
        }
    }

    #[test]
    fn mock_synthesis_is_deduplicated_across_requests() {
        let registry = registry();
        registry
            .declare(
                "serviceD",
                Declaration::factory(Category::Service, vec!["serviceB"], |_| Value::Null),
            )
            .expect("serviceD should register");

        let compiled = compile(
            &registry,
            &[
                with_mocks("serviceA", Directive::All),
                with_mocks("serviceD", Directive::All),
            ],
            "m#1",
        )
        .expect("compile should succeed");

        assert_eq!(
            compiled.mocks().len(),
            1,
            "one MockBinding per distinct mocked dependency name"
        );
    }

    #[test]
    fn staged_declarations_supersede_their_passthrough_bindings() {
        let registry = registry();

        // serviceA pulls serviceB as a passthrough, but serviceB is itself
        // staged: the declaration wins and the module must still apply.
        let compiled = compile(
            &registry,
            &[as_is("serviceA"), as_is("serviceB")],
            "m#1",
        )
        .expect("compile should succeed");

        assert!(
            !compiled.passthrough().contains_key("serviceB"),
            "a staged declaration supersedes the passthrough binding for its name"
        );
        assert!(compiled.passthrough().contains_key("$log"));

        let derived = compiled.apply(&registry).expect("apply must accept the composition");
        derived.get("serviceB").expect("the staged declaration resolves");
        derived.get("serviceA").expect("the dependent declaration resolves");
    }

    #[test]
    fn fixed_provider_kinds_are_rejected_as_mocking_targets() {
        let registry = registry();
        registry
            .declare("config", Declaration::constant(Value::Int(1)))
            .expect("constant should register");

        let err = compile(&registry, &[with_mocks("config", Directive::All)], "m#1")
            .expect_err("constants cannot be mocking targets");
        assert!(matches!(
            err,
            CompileError::UnsupportedProviderKind {
                provider_method: ProviderMethod::Constant,
                ..
            }
        ));
    }

    #[test]
    fn applied_module_resolves_through_mocks() {
        let registry = registry();
        let compiled = compile(
            &registry,
            &[with_mocks("serviceA", Directive::only(vec!["serviceB"]))],
            "app::derived#1",
        )
        .expect("compile should succeed");

        let derived = compiled.apply(&registry).expect("apply should produce a child registry");
        let instance = derived.get("serviceA").expect("serviceA resolves in the child");

        let Value::List(args) = instance else {
            panic!("serviceA factory should receive its argument list");
        };
        // First slot is the mock, not the real serviceB.
        let real = registry.get("serviceB").expect("serviceB resolves");
        assert!(!args[0].ref_eq(&real), "the mock replaces the real instance");
        assert!(
            args[0].as_object().is_some_and(|o| o.get("run").is_some_and(Value::is_callable)),
            "the injected stand-in preserves the callable surface"
        );
        // Second slot is the untouched builtin.
        assert!(args[1].ref_eq(&registry.get("$log").expect("$log resolves")));

        // The mock is also retrievable from the environment by its name.
        let bound = derived.get("serviceBMock").expect("suffixed binding resolves");
        assert!(bound.ref_eq(compiled.mock("serviceBMock").expect("mock binding exists")));
    }

    proptest! {
        /// OnlyListed suffixes exactly the listed ∩ known, non-builtin names;
        /// AllExcept suffixes exactly the complement.
        #[test]
        fn directive_set_algebra_holds(
            dep_count in 1usize..6,
            listed_mask in proptest::collection::vec(any::<bool>(), 6),
        ) {
            let registry = Registry::new("app");
            let deps: Vec<String> = (0..dep_count).map(|i| format!("dep{i}")).collect();
            for dep in &deps {
                registry
                    .declare(
                        dep.clone(),
                        Declaration::factory(Category::Service, Vec::<String>::new(), |_| {
                            mockable_instance("dep")
                        }),
                    )
                    .expect("dep should register");
            }
            registry
                .declare(
                    "target",
                    Declaration::factory(Category::Service, deps.clone(), |_| Value::Null),
                )
                .expect("target should register");

            let listed: Vec<String> = deps
                .iter()
                .zip(&listed_mask)
                .filter_map(|(dep, keep)| keep.then(|| dep.clone()))
                .collect();

            for (directive, mock_if_listed) in [
                (Directive::only(listed.clone()), true),
                (Directive::except(listed.clone()), false),
            ] {
                let compiled = compile(
                    &registry,
                    &[with_mocks("target", directive)],
                    "m#1",
                )
                .expect("compile should succeed");

                let rewritten = &compiled.declarations()[0].dependency_names;
                for (dep, name) in deps.iter().zip(rewritten) {
                    let expect_mock = listed.contains(dep) == mock_if_listed;
                    let got_mock = name.ends_with(MOCK_SUFFIX) && name.starts_with(dep.as_str());
                    prop_assert_eq!(expect_mock, got_mock, "dependency {} rewritten as {}", dep, name);
                }
            }
        }
    }
}
