//! # suspend
//!
//! generator based coroutines for callback driven code
//!
//! A generator function is a closure that takes a [`Co`] handle. It runs on
//! its own stack and suspends with [`Co::yield_`], handing the driver a
//! [`Suspension`] that tells how it is resumed: through a [`Resumer`] token
//! the body handed out before, through a [`Promise`] or any other
//! [`Awaitable`], or through a thunk that accepts the token.
//!
//! ```
//! use std::time::Duration;
//! use suspend::{event_loop, resume, wrap_callback};
//!
//! let double = wrap_callback(|co, (), x: u32| {
//!     let r = resume()?;
//!     event_loop::set_timeout(Duration::from_millis(1), move || r.ok(x * 2));
//!     co.yield_as::<u32, _>(())
//! });
//!
//! double((), 21, Box::new(|r: suspend::Result<u32>| {
//!     assert_eq!(r?, 42);
//!     Ok(())
//! }));
//! event_loop::run().unwrap();
//! ```
//!
//! Completion is always delivered on a later tick of the [`event_loop`],
//! even when the body never suspends.
//!

#![cfg_attr(test, deny(warnings))]
#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod driver;
mod error;
pub mod event_loop;
mod fork;
mod promise;
mod resumer;
mod rt;
mod suspension;
mod wrap;

pub use crate::driver::{Co, Status};
pub use crate::error::{Error, Result};
pub use crate::fork::{fork, fork_raw, fork_with, join};
pub use crate::promise::{Promise, Settle};
pub use crate::resumer::{current_resumer, resume, resume_raw, Mode, Resumer};
pub use crate::rt::is_generator;
pub use crate::suspension::{downcast, Awaitable, Continuation, Suspension, Value};
pub use crate::wrap::{
    run, wrap_callback, wrap_fn, wrap_promise, Callback, Options, DEFAULT_STACK_SIZE,
};
