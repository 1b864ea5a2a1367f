//! # promise
//!
//! a minimal single threaded promise
//!
//! A promise settles once. Listeners registered before or after the
//! settlement are always called on a later tick of the event loop, never
//! from inside `settle` or `then`.
//!

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::event_loop;
use crate::suspension::{Awaitable, Continuation, Suspension, Value};

type Listener<T> = Box<dyn FnOnce(Result<T>) -> Result<()>>;

enum State<T> {
    Pending(Vec<Listener<T>>),
    Settled(Result<T>),
}

/// shared read side of a promise
pub struct Promise<T> {
    state: Rc<RefCell<State<T>>>,
}

/// write side of a promise
pub struct Settle<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            state: self.state.clone(),
        }
    }
}

impl<T> Clone for Settle<T> {
    fn clone(&self) -> Self {
        Settle {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + 'static> Promise<T> {
    /// create a pending promise together with its settle handle
    pub fn pending() -> (Promise<T>, Settle<T>) {
        let state = Rc::new(RefCell::new(State::Pending(Vec::new())));
        (
            Promise {
                state: state.clone(),
            },
            Settle { state },
        )
    }

    /// create a promise and hand its settle handle to `executor`
    pub fn new<F: FnOnce(Settle<T>)>(executor: F) -> Promise<T> {
        let (promise, settle) = Self::pending();
        executor(settle);
        promise
    }

    /// create a fulfilled promise
    pub fn resolved(value: T) -> Promise<T> {
        Promise {
            state: Rc::new(RefCell::new(State::Settled(Ok(value)))),
        }
    }

    /// create a rejected promise
    pub fn rejected(err: Error) -> Promise<T> {
        Promise {
            state: Rc::new(RefCell::new(State::Settled(Err(err)))),
        }
    }

    /// check if the promise is settled
    pub fn is_settled(&self) -> bool {
        matches!(*self.state.borrow(), State::Settled(_))
    }

    /// get a copy of the outcome, if settled
    pub fn peek(&self) -> Option<Result<T>> {
        match &*self.state.borrow() {
            State::Settled(r) => Some(r.clone()),
            State::Pending(_) => None,
        }
    }

    /// register a listener for the outcome
    pub fn on_settled<F>(&self, f: F)
    where
        F: FnOnce(Result<T>) -> Result<()> + 'static,
    {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            State::Pending(listeners) => listeners.push(Box::new(f)),
            State::Settled(r) => {
                let r = r.clone();
                event_loop::next_tick(move || f(r));
            }
        }
    }

    /// register the success and failure continuations
    pub fn then<F, G>(&self, on_fulfilled: F, on_rejected: G)
    where
        F: FnOnce(T) -> Result<()> + 'static,
        G: FnOnce(Error) -> Result<()> + 'static,
    {
        self.on_settled(move |r| match r {
            Ok(v) => on_fulfilled(v),
            Err(e) => on_rejected(e),
        });
    }
}

impl<T: Clone + 'static> Settle<T> {
    /// settle the promise, returns false if it was already settled
    pub fn settle(&self, result: Result<T>) -> bool {
        let listeners = {
            let mut state = self.state.borrow_mut();
            if let State::Settled(_) = *state {
                return false;
            }
            match mem::replace(&mut *state, State::Settled(result.clone())) {
                State::Pending(listeners) => listeners,
                State::Settled(_) => Vec::new(),
            }
        };
        for listener in listeners {
            let r = result.clone();
            event_loop::next_tick(move || listener(r));
        }
        true
    }

    /// fulfill the promise
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// reject the promise
    pub fn reject(&self, err: Error) -> bool {
        self.settle(Err(err))
    }
}

impl<T: Clone + 'static> Awaitable for Promise<T> {
    fn register(self: Box<Self>, on_fulfilled: Continuation<Value>, on_rejected: Continuation<Error>) {
        self.then(move |v| on_fulfilled(Box::new(v) as Value), on_rejected);
    }
}

impl<T: Clone + 'static> From<Promise<T>> for Suspension {
    fn from(promise: Promise<T>) -> Self {
        Suspension::Await(Box::new(promise))
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let settled = matches!(*self.state.borrow(), State::Settled(_));
        write!(f, "Promise {{ settled: {} }}", settled)
    }
}

impl<T> fmt::Debug for Settle<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Settle {{ ... }}")
    }
}
