//! # coroutine driver
//!
//! drives one generator from start to its single terminal completion
//!
//! The body runs on a stackful generator. Every `Co::yield_` hands a
//! [`Suspension`] to the driver and parks the body until the driver sends
//! back the settled value or error. Resumptions that arrive while an
//! advance is still on the call stack are deferred to the next tick, so the
//! body is never re-entered while it is logically running.
//!

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use generator::{Gn, LocalGenerator};

use crate::error::{Error, Result};
use crate::event_loop;
use crate::fork::ForkSet;
use crate::resumer::{Mode, Resumer, Target};
use crate::rt::Active;
use crate::suspension::{downcast, Suspension, Value};
use crate::wrap::Options;

/// what the body is resumed with
pub(crate) type Resumed = Result<Value>;

/// completion handler of a context, receives the erased final outcome
pub(crate) type Completion = Box<dyn FnOnce(Result<Value>) -> Result<()>>;

/// what one step of the generator produced
pub(crate) enum Step {
    Yield(Suspension),
    Done(Result<Value>),
}

type Gen = LocalGenerator<'static, Resumed, Step>;

/// lifecycle of a coroutine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// created, the body has not run yet
    Idle,
    /// the body is executing
    Running,
    /// the body yielded and waits to be resumed
    Suspended,
    /// the body returned, terminal
    Completed,
}

thread_local! {
    static NEXT_ID: Cell<usize> = Cell::new(0);
}

fn next_id() -> usize {
    NEXT_ID.with(|id| {
        let n = id.get();
        id.set(n + 1);
        n
    })
}

/// state of one coroutine invocation
pub(crate) struct Context {
    id: usize,
    options: Options,
    generator: RefCell<Option<Gen>>,
    status: Cell<Status>,
    // set while a synchronous advance is on the call stack
    guard: Cell<bool>,
    completion: RefCell<Option<Completion>>,
    pub(crate) forks: RefCell<Option<ForkSet>>,
    pub(crate) fork_round: Cell<u64>,
    // a resolved join whose aggregate has not reached the body yet
    pub(crate) join_delivering: Cell<bool>,
}

impl Context {
    fn new(options: Options, completion: Option<Completion>) -> Self {
        Context {
            id: next_id(),
            options,
            generator: RefCell::new(None),
            status: Cell::new(Status::Idle),
            guard: Cell::new(false),
            completion: RefCell::new(completion),
            forks: RefCell::new(None),
            fork_round: Cell::new(0),
            join_delivering: Cell::new(false),
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.status.get()
    }

    #[inline]
    pub(crate) fn set_guard(&self, on: bool) {
        self.guard.set(on);
    }

    /// the single re-entry point for every external completion
    pub fn resume(self: &Rc<Self>, result: Resumed) -> Result<()> {
        if self.guard.get() {
            // still inside an advance, come back on the next tick
            debug!("coroutine #{} resumed synchronously, deferring", self.id);
            let ctx = self.clone();
            event_loop::next_tick(move || ctx.resume(result));
            return Ok(());
        }

        if self.status.get() == Status::Completed {
            return Err(Error::ResumedAfterCompletion);
        }

        self.advance(Some(result));
        Ok(())
    }

    /// run the body until its next suspension point or its end
    fn advance(self: &Rc<Self>, input: Option<Resumed>) {
        let _active = Active::enter(self);
        self.status.set(Status::Running);
        self.join_delivering.set(false);
        debug!("advance coroutine #{}", self.id);

        let step = {
            let mut generator = self.generator.borrow_mut();
            match generator.as_mut() {
                // the first send only starts the body, the para is never read
                Some(g) => g.raw_send(input),
                None => None,
            }
        };

        match step {
            Some(Step::Yield(suspension)) => {
                self.status.set(Status::Suspended);
                self.dispatch(suspension);
            }
            Some(Step::Done(result)) => self.complete(result),
            None => {
                // the generator only goes away in `complete`
                error!("coroutine #{} has no generator to advance", self.id);
                self.status.set(Status::Completed);
            }
        }
    }

    /// arrange the resumption for what the body yielded
    fn dispatch(self: &Rc<Self>, suspension: Suspension) {
        match suspension {
            Suspension::Pending => {}
            Suspension::Await(awaitable) => {
                let resumer = Resumer::new(self.clone(), Mode::ErrorFirst, Target::Resume);
                let on_err = resumer.clone();
                awaitable.register(
                    Box::new(move |v| resumer.settle(Ok(v))),
                    Box::new(move |e| on_err.settle(Err(e))),
                );
            }
            Suspension::Thunk(thunk) => {
                let resumer = Resumer::new(self.clone(), self.options.mode, Target::Resume);
                if let Err(e) = thunk(resumer.clone()) {
                    if resumer.is_consumed() {
                        error!("coroutine #{} thunk failed after resuming: {}", self.id, e);
                        event_loop::raise(e);
                    } else if let Err(fault) = resumer.settle(Err(e)) {
                        event_loop::raise(fault);
                    }
                }
            }
        }
    }

    /// terminal transition, runs exactly once
    fn complete(&self, result: Result<Value>) {
        self.status.set(Status::Completed);
        // the body is finished, release its stack
        self.generator.borrow_mut().take();
        self.forks.borrow_mut().take();
        debug!("coroutine #{} completed, ok={}", self.id, result.is_ok());

        match self.completion.borrow_mut().take() {
            Some(completion) => event_loop::next_tick(move || completion(result)),
            None => {
                if let Err(e) = result {
                    error!("unhandled error in coroutine #{}: {}", self.id, e);
                    event_loop::raise(e);
                }
            }
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let status = self.status.get();
        if status != Status::Completed && status != Status::Idle {
            warn!("coroutine #{} dropped while {:?}", self.id, status);
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Context #{} {{ status: {:?} }}", self.id, self.status.get())
    }
}

/// handle passed to the generator body
///
/// `yield_` is the only suspension point of a coroutine.
pub struct Co<'a> {
    yielder: &'a mut dyn FnMut(Step) -> Option<Resumed>,
}

impl<'a> Co<'a> {
    fn new(yielder: &'a mut dyn FnMut(Step) -> Option<Resumed>) -> Self {
        Co { yielder }
    }

    /// suspend the body and get the value it is resumed with
    ///
    /// a failure delivered to the suspension point comes back as `Err`, the
    /// body may handle it and keep going or return it with `?`
    pub fn yield_<S: Into<Suspension>>(&mut self, suspension: S) -> Result<Value> {
        match (self.yielder)(Step::Yield(suspension.into())) {
            Some(resumed) => resumed,
            // only a driverless scope can send nothing back
            None => Err(Error::NotInGeneratorBody),
        }
    }

    /// like [`yield_`](Co::yield_), and downcast the value to `T`
    pub fn yield_as<T: 'static, S: Into<Suspension>>(&mut self, suspension: S) -> Result<T> {
        self.yield_(suspension).and_then(downcast)
    }

    /// suspend until every fork of the current round settled
    pub fn join(&mut self) -> Result<Vec<Value>> {
        let suspension = crate::fork::join()?;
        self.yield_as(suspension)
    }

    /// like [`join`](Co::join), and downcast every result to `T`
    pub fn join_as<T: 'static>(&mut self) -> Result<Vec<T>> {
        self.join()?.into_iter().map(downcast).collect()
    }
}

impl fmt::Debug for Co<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Co {{ ... }}")
    }
}

/// build a context for `body` and run it up to its first suspension point
pub(crate) fn start<F>(options: Options, body: F, completion: Option<Completion>)
where
    F: FnOnce(&mut Co<'_>) -> Result<Value> + 'static,
{
    let ctx = Rc::new(Context::new(options, completion));
    let generator = Gn::<Resumed>::new_scoped_opt_local(options.stack_size, move |mut s| -> Step {
        // Safety: the context owns the generator and either runs it to the end
        // or drops it, which cancels the body, so everything the body
        // captured outlives each yield
        let mut yielder = |step: Step| unsafe { s.yield_unsafe(step) };
        let mut co = Co::new(&mut yielder);
        Step::Done(body(&mut co))
    });
    *ctx.generator.borrow_mut() = Some(generator);
    debug!("start coroutine #{}", ctx.id);
    ctx.advance(None);
}

#[cfg(test)]
mod test {
    use super::*;

    fn ctx() -> Rc<Context> {
        Rc::new(Context::new(Options::default(), None))
    }

    #[test]
    fn test_new_context_is_idle() {
        let c = ctx();
        assert_eq!(c.status(), Status::Idle);
        assert!(!c.guard.get());
    }

    #[test]
    fn test_resume_after_completion() {
        let c = ctx();
        c.status.set(Status::Completed);
        assert!(matches!(
            c.resume(Ok(Box::new(1))),
            Err(Error::ResumedAfterCompletion)
        ));
    }

    #[test]
    fn test_guarded_resume_is_deferred() {
        let c = ctx();
        c.status.set(Status::Completed);
        c.set_guard(true);
        // deferred, the error only shows up once the tick runs
        assert!(c.resume(Ok(Box::new(1))).is_ok());
        c.set_guard(false);
        assert!(matches!(
            event_loop::run(),
            Err(Error::ResumedAfterCompletion)
        ));
    }

    #[test]
    fn test_sync_body_completes_on_next_tick() {
        let out = Rc::new(Cell::new(0));
        let o = out.clone();
        let completion: Completion = Box::new(move |r| {
            o.set(downcast::<u32>(r?)?);
            Ok(())
        });
        start(Options::default(), |_co| Ok(Box::new(7u32) as Value), Some(completion));
        assert_eq!(out.get(), 0);
        event_loop::run().unwrap();
        assert_eq!(out.get(), 7);
    }

    #[test]
    fn test_context_ids_are_distinct() {
        let (a, b) = (ctx(), ctx());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_advance_without_generator() {
        let c = ctx();
        c.advance(Some(Ok(Box::new(1))));
        assert_eq!(c.status(), Status::Completed);
        // no completion is made up for a missing generator
        assert!(!event_loop::has_pending());
    }
}
