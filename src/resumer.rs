//! # resume tokens
//!
//! single use continuations handed out to the generator body
//!

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::driver::{Context, Status};
use crate::error::{Error, Result};
use crate::fork;
use crate::rt::ContextStack;
use crate::suspension::Value;
use crate::wrap::Callback;

/// how a resumer hands its outcome to the body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// `Err` is injected into the body as a failure, `Ok` becomes the value
    #[default]
    ErrorFirst,
    /// the whole `Result` is delivered as the value, nothing is injected
    Raw,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Target {
    /// resume the suspended body
    Resume,
    /// settle a slot of a fork/join round
    Fork { round: u64, index: usize },
}

/// single use resume token
///
/// Clones share the same token, invoking any clone after the first
/// invocation fails with [`Error::ResumerReused`].
#[derive(Clone)]
pub struct Resumer {
    ctx: Rc<Context>,
    consumed: Rc<Cell<bool>>,
    mode: Mode,
    target: Target,
}

impl Resumer {
    pub(crate) fn new(ctx: Rc<Context>, mode: Mode, target: Target) -> Self {
        Resumer {
            ctx,
            consumed: Rc::new(Cell::new(false)),
            mode,
            target,
        }
    }

    /// get the mode of this token
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// check if the token was already invoked
    #[inline]
    pub fn is_consumed(&self) -> bool {
        self.consumed.get()
    }

    /// get the lifecycle status of the coroutine behind this token
    #[inline]
    pub fn status(&self) -> Status {
        self.ctx.status()
    }

    /// invoke the token with the outcome of an operation
    pub fn resume<T: 'static>(&self, result: Result<T>) -> Result<()> {
        let settled = match self.mode {
            Mode::ErrorFirst => result.map(|v| Box::new(v) as Value),
            Mode::Raw => Ok(Box::new(result) as Value),
        };
        self.settle(settled)
    }

    /// invoke the token with a value
    pub fn ok<T: 'static>(&self, value: T) -> Result<()> {
        self.resume(Ok(value))
    }

    /// invoke the token with a failure
    pub fn err(&self, err: Error) -> Result<()> {
        self.resume::<()>(Err(err))
    }

    /// invoke the token error first style, `err` wins over `value`
    pub fn call<T: 'static>(&self, err: Option<Error>, value: T) -> Result<()> {
        match err {
            Some(e) => self.resume::<T>(Err(e)),
            None => self.resume(Ok(value)),
        }
    }

    /// turn the token into a completion callback
    ///
    /// lets a nested coroutine resume its parent or fill a parent's fork slot
    pub fn into_callback<T: 'static>(self) -> Callback<T> {
        Box::new(move |result| self.resume(result))
    }

    // deliver an already erased outcome
    pub(crate) fn settle(&self, settled: Result<Value>) -> Result<()> {
        if self.consumed.replace(true) {
            return Err(Error::ResumerReused);
        }

        match self.target {
            Target::Resume => self.ctx.resume(settled),
            Target::Fork { round, index } => fork::settle(&self.ctx, round, index, settled),
        }
    }
}

impl fmt::Debug for Resumer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Resumer")
            .field("coroutine", &self.ctx.id())
            .field("mode", &self.mode)
            .field("target", &self.target)
            .field("consumed", &self.consumed.get())
            .finish()
    }
}

/// get a resumer for the running body, in the given mode
pub fn current_resumer(mode: Mode) -> Result<Resumer> {
    let ctx = ContextStack::current()?;
    trace!("coroutine #{} hands out a {:?} resumer", ctx.id(), mode);
    Ok(Resumer::new(ctx, mode, Target::Resume))
}

/// get a resumer for the running body
///
/// the mode is the default configured for the coroutine, `ErrorFirst`
/// unless changed through [`Options::mode`](crate::Options::mode)
pub fn resume() -> Result<Resumer> {
    let ctx = ContextStack::current()?;
    let mode = ctx.options().mode;
    Ok(Resumer::new(ctx, mode, Target::Resume))
}

/// get a raw mode resumer for the running body
pub fn resume_raw() -> Result<Resumer> {
    current_resumer(Mode::Raw)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_outside_body() {
        assert!(matches!(resume(), Err(Error::NotInGeneratorBody)));
        assert!(matches!(resume_raw(), Err(Error::NotInGeneratorBody)));
        assert!(matches!(
            current_resumer(Mode::ErrorFirst),
            Err(Error::NotInGeneratorBody)
        ));
    }

    #[test]
    fn test_default_mode() {
        assert_eq!(Mode::default(), Mode::ErrorFirst);
    }
}
