use crate::value::{Callable, Value};
use std::{cell::RefCell, rc::Rc};

///
/// CallRecord
///
/// One recorded invocation: the arguments as received and the value handed
/// back to the caller.
///

#[derive(Clone, Debug)]
pub struct CallRecord {
    pub args: Vec<Value>,
    pub returned: Value,
}

///
/// CallLog
///
/// Shared invocation log behind a recording stand-in. Cheap to clone; every
/// clone observes the same recorded calls, so a test can keep a handle to the
/// log while the stand-in circulates through the registry.
///

#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<CallRecord>>>);

impl CallLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, args: Vec<Value>, returned: Value) {
        self.0.borrow_mut().push(CallRecord { args, returned });
    }

    /// Snapshot of all recorded calls in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<CallRecord> {
        self.0.borrow().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn was_called(&self) -> bool {
        !self.0.borrow().is_empty()
    }
}

impl std::fmt::Debug for CallLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CallLog({} calls)", self.call_count())
    }
}

/// Create a bare recording stand-in.
///
/// The spy is callable, performs no work, returns [`Value::Null`], and records
/// every invocation's arguments and return value into its [`CallLog`].
#[must_use]
pub fn create_spy(name: impl Into<String>) -> Callable {
    let log = CallLog::new();
    Callable::assemble(
        name.into(),
        Rc::new(|_: &[Value]| Value::Null),
        std::collections::BTreeMap::new(),
        None,
        Some(log),
    )
}
