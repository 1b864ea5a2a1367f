//! # suspension values
//!
//! what a generator body may yield to the driver
//!

use std::any::{self, Any};
use std::fmt;

use crate::error::{Error, Result};
use crate::resumer::Resumer;

/// type erased value passed across a suspension point
pub type Value = Box<dyn Any>;

/// continuation registered on an awaitable
pub type Continuation<T> = Box<dyn FnOnce(T) -> Result<()>>;

/// a value exposing a two callback continuation registration
///
/// Implementors must call exactly one of the continuations, at most once.
/// The driver guards against misbehaving implementations and reports a
/// second call as [`Error::ResumerReused`].
pub trait Awaitable {
    /// register the success and failure continuations
    fn register(self: Box<Self>, on_fulfilled: Continuation<Value>, on_rejected: Continuation<Error>);
}

/// interpretation of a yielded value
pub enum Suspension {
    /// nothing to wait on, the body already handed out a resumer
    Pending,
    /// the driver resumes the body once the awaitable settles
    Await(Box<dyn Awaitable>),
    /// the driver calls the thunk with a fresh resumer
    Thunk(Box<dyn FnOnce(Resumer) -> Result<()>>),
}

impl Suspension {
    /// wait on an awaitable value
    pub fn await_<A: Awaitable + 'static>(awaitable: A) -> Self {
        Suspension::Await(Box::new(awaitable))
    }

    /// wait on a function that accepts a resumer
    pub fn thunk<F>(f: F) -> Self
    where
        F: FnOnce(Resumer) -> Result<()> + 'static,
    {
        Suspension::Thunk(Box::new(f))
    }
}

impl From<()> for Suspension {
    fn from(_: ()) -> Self {
        Suspension::Pending
    }
}

impl From<Box<dyn Awaitable>> for Suspension {
    fn from(awaitable: Box<dyn Awaitable>) -> Self {
        Suspension::Await(awaitable)
    }
}

impl fmt::Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Suspension::Pending => write!(f, "Suspension::Pending"),
            Suspension::Await(_) => write!(f, "Suspension::Await {{ ... }}"),
            Suspension::Thunk(_) => write!(f, "Suspension::Thunk {{ ... }}"),
        }
    }
}

/// take the concrete value out of a resumed value
pub fn downcast<T: 'static>(value: Value) -> Result<T> {
    value.downcast::<T>().map(|v| *v).map_err(|_| Error::TypeMismatch {
        expected: any::type_name::<T>(),
    })
}
