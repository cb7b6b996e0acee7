use crate::spy::CallLog;
use std::{collections::BTreeMap, fmt, rc::Rc};

///
/// NativeFn
///
/// The invocable body of a [`Callable`]. Bodies receive the resolved argument
/// slice and produce a single value; the runtime is single-threaded and
/// cooperative, so no `Send`/`Sync` bound applies.
///

pub type NativeFn = Rc<dyn Fn(&[Value]) -> Value>;

///
/// TypeTag
///
/// Constructor identity. Two tags are the same type iff they share one
/// allocation; the name is diagnostic only.
///

#[derive(Clone)]
pub struct TypeTag(Rc<String>);

impl TypeTag {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Rc::new(name.into()))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TypeTag {}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

///
/// TypeShape
///
/// The prototype of a constructor-like callable: a member map plus the
/// constructor identity, optionally chained to a parent shape.
///

#[derive(Clone)]
pub struct TypeShape(Rc<TypeShapeInner>);

struct TypeShapeInner {
    members: BTreeMap<String, Value>,
    constructor: TypeTag,
    parent: Option<TypeShape>,
}

impl TypeShape {
    /// Build a root shape with no parent.
    #[must_use]
    pub fn root(members: BTreeMap<String, Value>, constructor: TypeTag) -> Self {
        Self(Rc::new(TypeShapeInner {
            members,
            constructor,
            parent: None,
        }))
    }

    /// Build a shape inheriting from `parent`.
    ///
    /// Used by the mock synthesizer: the fresh shape carries replaced members
    /// but keeps the original constructor identity so instance checks against
    /// the original type still hold.
    #[must_use]
    pub fn derived(
        parent: &Self,
        members: BTreeMap<String, Value>,
        constructor: TypeTag,
    ) -> Self {
        Self(Rc::new(TypeShapeInner {
            members,
            constructor,
            parent: Some(parent.clone()),
        }))
    }

    #[must_use]
    pub fn members(&self) -> &BTreeMap<String, Value> {
        &self.0.members
    }

    #[must_use]
    pub fn constructor(&self) -> &TypeTag {
        &self.0.constructor
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.0.parent.as_ref()
    }

    /// True if `tag` matches the constructor identity anywhere on the chain.
    #[must_use]
    pub fn matches(&self, tag: &TypeTag) -> bool {
        let mut current = Some(self);
        while let Some(shape) = current {
            if shape.constructor() == tag {
                return true;
            }
            current = shape.parent();
        }
        false
    }
}

impl fmt::Debug for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeShape")
            .field("constructor", &self.0.constructor)
            .field("members", &self.0.members.keys().collect::<Vec<_>>())
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}

///
/// Callable
///
/// A function value: a named invocable body, a map of own members
/// (static-like properties), and an optional [`TypeShape`] when the callable
/// acts as a constructor. Cheap to clone; all clones share one identity.
///

#[derive(Clone)]
pub struct Callable(Rc<CallableInner>);

struct CallableInner {
    name: String,
    body: NativeFn,
    members: BTreeMap<String, Value>,
    shape: Option<TypeShape>,
    call_log: Option<CallLog>,
}

impl Callable {
    /// A bare callable with no members and no shape.
    pub fn new(name: impl Into<String>, body: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(CallableInner {
            name: name.into(),
            body: Rc::new(body),
            members: BTreeMap::new(),
            shape: None,
            call_log: None,
        }))
    }

    /// A constructor-like callable: own members plus a fresh prototype shape
    /// whose constructor identity is newly minted from `name`.
    pub fn constructor(
        name: impl Into<String>,
        body: impl Fn(&[Value]) -> Value + 'static,
        members: BTreeMap<String, Value>,
        prototype_members: BTreeMap<String, Value>,
    ) -> Self {
        let name = name.into();
        let tag = TypeTag::new(name.clone());

        Self(Rc::new(CallableInner {
            name,
            body: Rc::new(body),
            members,
            shape: Some(TypeShape::root(prototype_members, tag)),
            call_log: None,
        }))
    }

    /// Assemble a callable from explicit parts. Used by the synthesizer to
    /// materialize recording stand-ins that mirror an existing structure.
    #[must_use]
    pub(crate) fn assemble(
        name: String,
        body: NativeFn,
        members: BTreeMap<String, Value>,
        shape: Option<TypeShape>,
        call_log: Option<CallLog>,
    ) -> Self {
        Self(Rc::new(CallableInner {
            name,
            body,
            members,
            shape,
            call_log,
        }))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn members(&self) -> &BTreeMap<String, Value> {
        &self.0.members
    }

    #[must_use]
    pub fn shape(&self) -> Option<&TypeShape> {
        self.0.shape.as_ref()
    }

    /// The call log, present only on recording stand-ins.
    #[must_use]
    pub fn call_log(&self) -> Option<&CallLog> {
        self.0.call_log.as_ref()
    }

    /// True if this callable carries no own members and no prototype members
    /// beyond the constructor identity itself.
    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.0.members.is_empty() && self.0.shape.as_ref().is_none_or(|s| s.members().is_empty())
    }

    /// Invoke the body. Recording stand-ins log arguments and the returned
    /// value before handing it back.
    pub fn call(&self, args: &[Value]) -> Value {
        let returned = (self.0.body)(args);
        if let Some(log) = &self.0.call_log {
            log.record(args.to_vec(), returned.clone());
        }
        returned
    }

    /// True if a value constructed by `tag` would satisfy an instance check
    /// against this callable's shape chain.
    #[must_use]
    pub fn instance_of(&self, tag: &TypeTag) -> bool {
        self.0.shape.as_ref().is_some_and(|shape| shape.matches(tag))
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.0.name)
            .field("members", &self.0.members.keys().collect::<Vec<_>>())
            .field("shape", &self.0.shape)
            .field("recording", &self.0.call_log.is_some())
            .finish()
    }
}

///
/// Object
///
/// A non-callable object: a shared member map, optionally tagged by the
/// constructor that produced it.
///

#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

struct ObjectInner {
    members: BTreeMap<String, Value>,
    tag: Option<TypeTag>,
}

impl Object {
    /// A plain untagged object.
    #[must_use]
    pub fn plain(members: BTreeMap<String, Value>) -> Self {
        Self(Rc::new(ObjectInner { members, tag: None }))
    }

    /// An object tagged by its constructing type.
    #[must_use]
    pub fn tagged(members: BTreeMap<String, Value>, tag: TypeTag) -> Self {
        Self(Rc::new(ObjectInner {
            members,
            tag: Some(tag),
        }))
    }

    #[must_use]
    pub fn members(&self) -> &BTreeMap<String, Value> {
        &self.0.members
    }

    #[must_use]
    pub fn get(&self, member: &str) -> Option<&Value> {
        self.0.members.get(member)
    }

    #[must_use]
    pub fn tag(&self) -> Option<&TypeTag> {
        self.0.tag.as_ref()
    }

    /// True if this object owns at least one callable member.
    #[must_use]
    pub fn has_callable_member(&self) -> bool {
        self.0.members.values().any(Value::is_callable)
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("members", &self.0.members.keys().collect::<Vec<_>>())
            .field("tag", &self.0.tag)
            .finish()
    }
}

///
/// Value
///
/// The one runtime currency of the registry: every declaration instance,
/// factory argument, and mock is a `Value`. Scalars copy by value; compound
/// variants share their payload, so "copied by reference" is observable
/// through [`Value::ref_eq`].
///

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Rc<Vec<Value>>),
    Map(Rc<BTreeMap<String, Value>>),
    Callable(Callable),
    Object(Object),
}

impl Value {
    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(items))
    }

    #[must_use]
    pub fn map(entries: BTreeMap<String, Self>) -> Self {
        Self::Map(Rc::new(entries))
    }

    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    #[must_use]
    pub const fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }

    #[must_use]
    pub const fn as_callable(&self) -> Option<&Callable> {
        match self {
            Self::Callable(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Diagnostic label for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Callable(_) => "callable",
            Self::Object(_) => "object",
        }
    }

    /// Identity comparison: value equality for scalars, shared-allocation
    /// equality for compound variants.
    #[must_use]
    pub fn ref_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => Rc::ptr_eq(a, b),
            (Self::Callable(a), Self::Callable(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// True if a value of this shape was constructed by `tag`.
    #[must_use]
    pub fn instance_of(&self, tag: &TypeTag) -> bool {
        match self {
            Self::Callable(c) => c.instance_of(tag),
            Self::Object(o) => o.tag().is_some_and(|t| t == tag),
            _ => false,
        }
    }
}
