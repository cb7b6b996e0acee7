pub mod declaration;

pub use declaration::{Category, Declaration, Factory, ProviderMethod, RawDeclaration};

use crate::{
    BUILTIN_PREFIX,
    introspect::{self, NormalizedShape},
    scheduler::Scheduler,
    value::{Callable, Object, Value},
};
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};
use thiserror::Error as ThisError;

///
/// RegistryError
///

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("declaration '{0}' already registered")]
    DuplicateDeclaration(String),

    #[error("binding '{0}' already present")]
    DuplicateBinding(String),

    #[error("nothing registered under name '{0}'")]
    NotFound(String),

    #[error("circular dependency while resolving '{0}'")]
    CircularDependency(String),
}

///
/// Registry
///
/// The host container: named declarations, a resolved-instance cache, and a
/// built-in namespace seeded at construction. Derived registries produced by
/// a compile are children that shadow their parent and delegate misses to it.
///
/// Cheap to clone; clones share one registry. Single-threaded by design:
/// resolution happens within one call stack and nothing here suspends.
///

#[derive(Clone)]
pub struct Registry {
    inner: Rc<RegistryInner>,
}

struct RegistryInner {
    name: String,
    declarations: RefCell<BTreeMap<String, Declaration>>,
    instances: RefCell<BTreeMap<String, Value>>,
    resolving: RefCell<BTreeSet<String>>,
    parent: Option<Registry>,
    scheduler: Scheduler,
    module_seq: Cell<u64>,
}

impl Registry {
    /// Create a root registry and seed the built-in namespace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let registry = Self {
            inner: Rc::new(RegistryInner {
                name: name.into(),
                declarations: RefCell::new(BTreeMap::new()),
                instances: RefCell::new(BTreeMap::new()),
                resolving: RefCell::new(BTreeSet::new()),
                parent: None,
                scheduler: Scheduler::new(),
                module_seq: Cell::new(0),
            }),
        };
        registry.seed_builtins();

        registry
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.inner.parent.as_ref()
    }

    /// True for names owned by the host framework itself.
    #[must_use]
    pub fn is_builtin(name: &str) -> bool {
        name.starts_with(BUILTIN_PREFIX)
    }

    /// Register a declaration. Shadowing a parent entry is allowed; a name
    /// already taken in this registry is not.
    pub fn declare(&self, name: impl Into<String>, declaration: Declaration) -> Result<(), RegistryError> {
        let name = name.into();
        if self.inner.declarations.borrow().contains_key(&name) {
            return Err(RegistryError::DuplicateDeclaration(name));
        }
        if self.inner.instances.borrow().contains_key(&name) {
            return Err(RegistryError::DuplicateBinding(name));
        }

        self.inner.declarations.borrow_mut().insert(name, declaration);
        Ok(())
    }

    /// Bind a concrete instance directly, bypassing factory instantiation.
    pub fn bind(&self, name: impl Into<String>, value: Value) -> Result<(), RegistryError> {
        let name = name.into();
        if self.inner.instances.borrow().contains_key(&name) {
            return Err(RegistryError::DuplicateBinding(name));
        }
        if self.inner.declarations.borrow().contains_key(&name) {
            return Err(RegistryError::DuplicateDeclaration(name));
        }

        self.inner.instances.borrow_mut().insert(name, value);
        Ok(())
    }

    /// True if `name` is resolvable here or anywhere up the parent chain.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        if self.inner.instances.borrow().contains_key(name)
            || self.inner.declarations.borrow().contains_key(name)
        {
            return true;
        }

        self.inner.parent.as_ref().is_some_and(|parent| parent.has(name))
    }

    /// Fetch the declaration registered under `name`, searching the chain.
    #[must_use]
    pub fn declaration(&self, name: &str) -> Option<Declaration> {
        if let Some(declaration) = self.inner.declarations.borrow().get(name) {
            return Some(declaration.clone());
        }

        self.inner.parent.as_ref().and_then(|parent| parent.declaration(name))
    }

    /// Resolve `name` to its instance, instantiating and caching on first use.
    pub fn get(&self, name: &str) -> Result<Value, RegistryError> {
        if let Some(value) = self.inner.instances.borrow().get(name) {
            return Ok(value.clone());
        }

        let declaration = self.inner.declarations.borrow().get(name).cloned();
        if let Some(declaration) = declaration {
            if !self.inner.resolving.borrow_mut().insert(name.to_string()) {
                return Err(RegistryError::CircularDependency(name.to_string()));
            }
            let result = self.instantiate_declaration(&declaration);
            self.inner.resolving.borrow_mut().remove(name);

            let value = result?;
            self.inner
                .instances
                .borrow_mut()
                .insert(name.to_string(), value.clone());
            return Ok(value);
        }

        match &self.inner.parent {
            Some(parent) => parent.get(name),
            None => Err(RegistryError::NotFound(name.to_string())),
        }
    }

    /// Build an instance from a factory description. Dependencies resolve
    /// from `overrides` first, then from this registry.
    pub fn instantiate(
        &self,
        factory: &Factory,
        overrides: &BTreeMap<String, Value>,
    ) -> Result<Value, RegistryError> {
        let mut args = Vec::with_capacity(factory.dependency_names().len());
        for dependency in factory.dependency_names() {
            let value = match overrides.get(dependency) {
                Some(value) => value.clone(),
                None => self.get(dependency)?,
            };
            args.push(value);
        }

        Ok(factory.produce(&args))
    }

    /// Create a derived child registry carrying extra bindings and
    /// declarations. Misses delegate to this registry; the scheduler is
    /// shared with the root.
    pub fn new_child(
        &self,
        name: impl Into<String>,
        declarations: Vec<(String, Declaration)>,
        bindings: Vec<(String, Value)>,
    ) -> Result<Self, RegistryError> {
        let child = Self {
            inner: Rc::new(RegistryInner {
                name: name.into(),
                declarations: RefCell::new(BTreeMap::new()),
                instances: RefCell::new(BTreeMap::new()),
                resolving: RefCell::new(BTreeSet::new()),
                parent: Some(self.clone()),
                scheduler: self.inner.scheduler.clone(),
                module_seq: Cell::new(0),
            }),
        };

        for (binding_name, value) in bindings {
            child.bind(binding_name, value)?;
        }
        for (declaration_name, declaration) in declarations {
            child.declare(declaration_name, declaration)?;
        }

        Ok(child)
    }

    /// Next generated-module sequence number, owned by the root registry.
    pub(crate) fn next_module_id(&self) -> u64 {
        let root = self.root();
        let next = root.inner.module_seq.get() + 1;
        root.inner.module_seq.set(next);
        next
    }

    fn root(&self) -> Self {
        let mut current = self.clone();
        while let Some(parent) = current.inner.parent.clone() {
            current = parent;
        }
        current
    }

    fn instantiate_declaration(&self, declaration: &Declaration) -> Result<Value, RegistryError> {
        match introspect::normalize_raw(&declaration.raw) {
            NormalizedShape::Fixed(value) => Ok(value),
            NormalizedShape::Factory(factory) => self.instantiate(&factory, &BTreeMap::new()),
        }
    }

    fn seed_builtins(&self) {
        let mut instances = self.inner.instances.borrow_mut();

        let log_members: BTreeMap<String, Value> = ["debug", "info", "warn", "error"]
            .into_iter()
            .map(|level| {
                let name = format!("{BUILTIN_PREFIX}log.{level}");
                (level.to_string(), Value::Callable(Callable::new(name, |_| Value::Null)))
            })
            .collect();
        instances.insert(
            format!("{BUILTIN_PREFIX}log"),
            Value::Object(Object::plain(log_members)),
        );

        let scheduler = self.inner.scheduler.clone();
        instances.insert(
            format!("{BUILTIN_PREFIX}defer"),
            Value::Callable(Callable::new(format!("{BUILTIN_PREFIX}defer"), move |args| {
                if let Some(task) = args.first().and_then(Value::as_callable) {
                    scheduler.defer(task.clone(), args[1..].to_vec());
                }
                Value::Null
            })),
        );
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.inner.name)
            .field("declarations", &self.inner.declarations.borrow().len())
            .field("instances", &self.inner.instances.borrow().len())
            .field("is_child", &self.inner.parent.is_some())
            .finish()
    }
}
