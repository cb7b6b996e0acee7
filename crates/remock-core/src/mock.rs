use crate::{
    spy::{CallLog, create_spy},
    value::{Callable, Object, TypeShape, Value},
};
use std::{collections::BTreeMap, rc::Rc};
use thiserror::Error as ThisError;

///
/// MockError
///

#[derive(Debug, ThisError)]
pub enum MockError {
    #[error("cannot mock {kind} value: no callable surface")]
    UnmockableValue { kind: &'static str },
}

/// True iff a structural mock can be synthesized for `value`: the value is
/// callable, or it is a non-callable object owning at least one callable
/// member.
#[must_use]
pub fn can_synthesize(value: &Value) -> bool {
    match value {
        Value::Callable(_) => true,
        Value::Object(object) => object.has_callable_member(),
        _ => false,
    }
}

/// Produce a behaviorally inert, shape-preserving stand-in for `value`.
///
/// - A bare callable becomes a bare recording spy.
/// - A constructor-like callable becomes a recording spy that mirrors the
///   original's own members and prototype members (callables replaced by
///   independent spies, everything else shared by reference), with the
///   prototype's constructor identity rebound to the original so instance
///   checks against the original type keep holding.
/// - A non-callable object with callable members becomes a shallow plain copy
///   under the same callable-to-spy rule.
pub fn synthesize(value: &Value) -> Result<Value, MockError> {
    match value {
        Value::Callable(callable) => Ok(Value::Callable(synthesize_callable(callable))),
        Value::Object(object) if object.has_callable_member() => {
            Ok(Value::Object(synthesize_object(object)))
        }
        other => Err(MockError::UnmockableValue { kind: other.kind() }),
    }
}

fn synthesize_callable(original: &Callable) -> Callable {
    if original.is_bare() {
        return create_spy(original.name());
    }

    let members = mirror_members(original.members(), |member| {
        format!("{}.{member}", original.name())
    });

    let shape = original.shape().map(|shape| {
        let prototype_members = mirror_members(shape.members(), |member| {
            format!("{}.prototype.{member}", original.name())
        });
        // Fresh prototype, original constructor identity.
        TypeShape::derived(shape, prototype_members, shape.constructor().clone())
    });

    Callable::assemble(
        original.name().to_string(),
        Rc::new(|_: &[Value]| Value::Null),
        members,
        shape,
        Some(CallLog::new()),
    )
}

fn synthesize_object(original: &Object) -> Object {
    Object::plain(mirror_members(original.members(), str::to_string))
}

/// Apply the callable-to-spy / non-callable-by-reference rule to one member
/// map. `spy_name` derives the recording stand-in's diagnostic name.
fn mirror_members(
    members: &BTreeMap<String, Value>,
    spy_name: impl Fn(&str) -> String,
) -> BTreeMap<String, Value> {
    members
        .iter()
        .map(|(name, member)| {
            let replacement = if member.is_callable() {
                Value::Callable(create_spy(spy_name(name)))
            } else {
                member.clone()
            };
            (name.clone(), replacement)
        })
        .collect()
}
