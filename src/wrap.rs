//! # entry points
//!
//! fire-and-forget, callback and promise flavours of a generator function
//!
//! A generator function receives the [`Co`] handle, the receiver value the
//! wrapper was called with and the arguments. Passing anything else is a
//! compile error:
//!
//! ```compile_fail
//! // a plain function is not a generator function
//! let f = suspend::wrap_fn(|x: u32| x + 1);
//! ```
//!
//! ```compile_fail
//! // the callback flavour needs a callback
//! let f = suspend::wrap_callback(|_co, (), ()| Ok(1u32));
//! f((), (), "foo");
//! ```
//!

use std::rc::Rc;

use crate::driver::{self, Co, Completion};
use crate::error::Result;
use crate::promise::Promise;
use crate::resumer::Mode;
use crate::suspension::{downcast, Value};

cfg_if::cfg_if! {
    if #[cfg(debug_assertions)] {
        /// default generator stack size, in words
        pub const DEFAULT_STACK_SIZE: usize = 0x4000;
    } else {
        /// default generator stack size, in words
        pub const DEFAULT_STACK_SIZE: usize = 0x1000;
    }
}

/// completion callback, receives the final outcome exactly once
///
/// an `Err` returned by the callback is a fault of the event loop
pub type Callback<T> = Box<dyn FnOnce(Result<T>) -> Result<()>>;

/// configuration fixed when a generator function is wrapped
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub(crate) mode: Mode,
    pub(crate) stack_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            mode: Mode::ErrorFirst,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

// erase the typed callback for the driver
fn completion<T: 'static>(callback: Callback<T>) -> Completion {
    Box::new(move |result: Result<Value>| callback(result.and_then(downcast::<T>)))
}

impl Options {
    /// create the default options
    pub fn new() -> Self {
        Self::default()
    }

    /// default mode of the tokens returned by `resume()` and `fork()`
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// stack size of each coroutine, in words
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    /// wrap `f` into a fire-and-forget function
    ///
    /// a failure of the body surfaces as a fault of the event loop
    pub fn wrap_fn<R, A, T, F>(self, f: F) -> impl Fn(R, A)
    where
        F: Fn(&mut Co<'_>, R, A) -> Result<T> + 'static,
        R: 'static,
        A: 'static,
        T: 'static,
    {
        let f = Rc::new(f);
        move |this: R, args: A| {
            let f = f.clone();
            driver::start(
                self,
                move |co| (*f)(co, this, args).map(|v| Box::new(v) as Value),
                None,
            );
        }
    }

    /// wrap `f` into a function that reports through a callback
    pub fn wrap_callback<R, A, T, F>(self, f: F) -> impl Fn(R, A, Callback<T>)
    where
        F: Fn(&mut Co<'_>, R, A) -> Result<T> + 'static,
        R: 'static,
        A: 'static,
        T: 'static,
    {
        let f = Rc::new(f);
        move |this: R, args: A, callback: Callback<T>| {
            let f = f.clone();
            driver::start(
                self,
                move |co| (*f)(co, this, args).map(|v| Box::new(v) as Value),
                Some(completion(callback)),
            );
        }
    }

    /// wrap `f` into a function that returns a promise
    pub fn wrap_promise<R, A, T, F>(self, f: F) -> impl Fn(R, A) -> Promise<T>
    where
        F: Fn(&mut Co<'_>, R, A) -> Result<T> + 'static,
        R: 'static,
        A: 'static,
        T: Clone + 'static,
    {
        let f = Rc::new(f);
        move |this: R, args: A| {
            let (promise, settle) = Promise::pending();
            let f = f.clone();
            let callback: Callback<T> = Box::new(move |result| {
                settle.settle(result);
                Ok(())
            });
            driver::start(
                self,
                move |co| (*f)(co, this, args).map(|v| Box::new(v) as Value),
                Some(completion(callback)),
            );
            promise
        }
    }

    /// start `f` right away
    pub fn run<T, F>(self, f: F, callback: Option<Callback<T>>)
    where
        F: FnOnce(&mut Co<'_>) -> Result<T> + 'static,
        T: 'static,
    {
        driver::start(
            self,
            move |co| f(co).map(|v| Box::new(v) as Value),
            callback.map(completion),
        );
    }
}

/// wrap `f` into a fire-and-forget function, with default options
pub fn wrap_fn<R, A, T, F>(f: F) -> impl Fn(R, A)
where
    F: Fn(&mut Co<'_>, R, A) -> Result<T> + 'static,
    R: 'static,
    A: 'static,
    T: 'static,
{
    Options::default().wrap_fn(f)
}

/// wrap `f` into a function that reports through a callback, with default
/// options
pub fn wrap_callback<R, A, T, F>(f: F) -> impl Fn(R, A, Callback<T>)
where
    F: Fn(&mut Co<'_>, R, A) -> Result<T> + 'static,
    R: 'static,
    A: 'static,
    T: 'static,
{
    Options::default().wrap_callback(f)
}

/// wrap `f` into a function that returns a promise, with default options
pub fn wrap_promise<R, A, T, F>(f: F) -> impl Fn(R, A) -> Promise<T>
where
    F: Fn(&mut Co<'_>, R, A) -> Result<T> + 'static,
    R: 'static,
    A: 'static,
    T: Clone + 'static,
{
    Options::default().wrap_promise(f)
}

/// start `f` right away, with default options
///
/// without a callback a failure of the body surfaces as a fault of the
/// event loop
pub fn run<T, F>(f: F, callback: Option<Callback<T>>)
where
    F: FnOnce(&mut Co<'_>) -> Result<T> + 'static,
    T: 'static,
{
    Options::default().run(f, callback)
}
