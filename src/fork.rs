//! # fork / join
//!
//! concurrent continuations collected in registration order
//!
//! Every `fork()` reserves the next slot of the current round and returns a
//! token that settles that slot. `join()` suspends the body until the round
//! has no pending slot. The aggregate is ordered by the `fork()` calls, never
//! by completion time, and the first failing slot by index decides the error.
//! The round is cleared once the join resolves.
//!

use std::rc::Rc;

use crate::driver::{Context, Status};
use crate::error::{Error, Result};
use crate::resumer::{Mode, Resumer, Target};
use crate::rt::ContextStack;
use crate::suspension::{Suspension, Value};

/// slots of one fork/join round
#[derive(Debug, Default)]
pub(crate) struct ForkSet {
    round: u64,
    slots: Vec<Option<Result<Value>>>,
    pending: usize,
    join_requested: bool,
}

impl ForkSet {
    fn new(round: u64) -> Self {
        ForkSet {
            round,
            ..ForkSet::default()
        }
    }

    /// reserve the next slot
    fn register(&mut self) -> usize {
        self.slots.push(None);
        self.pending += 1;
        self.slots.len() - 1
    }

    /// fill a slot, returns true once a requested join can resolve
    fn settle(&mut self, round: u64, index: usize, result: Result<Value>) -> Result<bool> {
        if round != self.round {
            // the slot belonged to a round that already joined
            return Err(Error::DoubleSettlement { index });
        }
        let slot = match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => slot,
            _ => return Err(Error::DoubleSettlement { index }),
        };
        *slot = Some(result);
        self.pending -= 1;
        Ok(self.is_ready())
    }

    /// mark the join, returns true if it can resolve right away
    fn request_join(&mut self) -> Result<bool> {
        if self.join_requested {
            return Err(Error::JoinAlreadyPending);
        }
        self.join_requested = true;
        Ok(self.is_ready())
    }

    #[inline]
    fn is_ready(&self) -> bool {
        self.join_requested && self.pending == 0
    }

    /// aggregate the round, first failure by index wins
    fn resolve(self) -> Result<Value> {
        debug_assert_eq!(self.pending, 0);
        let mut values = Vec::with_capacity(self.slots.len());
        for slot in self.slots.into_iter().flatten() {
            values.push(slot?);
        }
        Ok(Box::new(values))
    }
}

// run `f` on the fork set of `ctx`, creating it on first use
fn with_forks<R>(ctx: &Context, f: impl FnOnce(&mut ForkSet) -> R) -> R {
    let mut forks = ctx.forks.borrow_mut();
    let set = forks.get_or_insert_with(|| ForkSet::new(ctx.fork_round.get()));
    f(set)
}

// tear the round down and resume the body with the aggregate
fn resolve_join(ctx: &Rc<Context>) -> Result<()> {
    let set = ctx.forks.borrow_mut().take();
    ctx.fork_round.set(ctx.fork_round.get() + 1);
    ctx.join_delivering.set(true);
    let outcome = match set {
        Some(set) => {
            trace!("coroutine #{} joins {} forks", ctx.id(), set.slots.len());
            set.resolve()
        }
        None => Ok(Box::new(Vec::<Value>::new()) as Value),
    };
    ctx.resume(outcome)
}

/// settle the slot behind a fork token
pub(crate) fn settle(ctx: &Rc<Context>, round: u64, index: usize, result: Result<Value>) -> Result<()> {
    trace!("coroutine #{} settles fork {}", ctx.id(), index);
    if ctx.status() == Status::Completed {
        return Err(Error::ResumedAfterCompletion);
    }
    let ready = {
        let mut forks = ctx.forks.borrow_mut();
        match forks.as_mut() {
            Some(set) => set.settle(round, index, result)?,
            None => return Err(Error::DoubleSettlement { index }),
        }
    };
    if ready {
        resolve_join(ctx)?;
    }
    Ok(())
}

/// register a pending continuation in the given mode
pub fn fork_with(mode: Mode) -> Result<Resumer> {
    let ctx = ContextStack::current()?;
    let (round, index) = with_forks(&ctx, |set| (set.round, set.register()));
    trace!("coroutine #{} forks slot {}", ctx.id(), index);
    Ok(Resumer::new(ctx, mode, Target::Fork { round, index }))
}

/// register a pending continuation, in the coroutine's default mode
pub fn fork() -> Result<Resumer> {
    let mode = ContextStack::current()?.options().mode;
    fork_with(mode)
}

/// register a pending continuation that keeps its `Result` as the slot value
pub fn fork_raw() -> Result<Resumer> {
    fork_with(Mode::Raw)
}

/// request the aggregate of the current round
///
/// yield the returned suspension to wait for it; the body is resumed with a
/// `Vec<Value>` ordered like the `fork()` calls, or with the error of the
/// first failing fork
///
/// fails with [`Error::JoinAlreadyPending`] while an earlier join has not
/// handed its aggregate to the body
pub fn join() -> Result<Suspension> {
    let ctx = ContextStack::current()?;
    if ctx.join_delivering.get() {
        return Err(Error::JoinAlreadyPending);
    }
    if with_forks(&ctx, |set| set.request_join())? {
        resolve_join(&ctx)?;
    }
    Ok(Suspension::Pending)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::suspension::downcast;

    fn ok(n: u32) -> Result<Value> {
        Ok(Box::new(n))
    }

    fn values(v: Result<Value>) -> Vec<u32> {
        downcast::<Vec<Value>>(v.unwrap())
            .unwrap()
            .into_iter()
            .map(|v| downcast::<u32>(v).unwrap())
            .collect()
    }

    #[test]
    fn test_registration_order() {
        let mut set = ForkSet::new(0);
        let a = set.register();
        let b = set.register();
        assert_eq!((a, b), (0, 1));
        assert!(!set.request_join().unwrap());
        assert!(!set.settle(0, b, ok(8)).unwrap());
        assert!(set.settle(0, a, ok(6)).unwrap());
        assert_eq!(values(set.resolve()), vec![6, 8]);
    }

    #[test]
    fn test_first_error_by_index() {
        let mut set = ForkSet::new(0);
        for _ in 0..3 {
            set.register();
        }
        set.settle(0, 2, Err(Error::msg("fail2"))).unwrap();
        set.settle(0, 1, Err(Error::msg("fail1"))).unwrap();
        set.settle(0, 0, ok(1)).unwrap();
        assert!(set.request_join().unwrap());
        assert_eq!(set.resolve().unwrap_err().to_string(), "fail1");
    }

    #[test]
    fn test_double_settlement() {
        let mut set = ForkSet::new(3);
        let i = set.register();
        set.settle(3, i, ok(1)).unwrap();
        assert!(matches!(
            set.settle(3, i, ok(2)),
            Err(Error::DoubleSettlement { index: 0 })
        ));
        // a token of an earlier round
        assert!(matches!(
            set.settle(2, i, ok(2)),
            Err(Error::DoubleSettlement { .. })
        ));
    }

    #[test]
    fn test_empty_join_is_ready() {
        let mut set = ForkSet::new(0);
        assert!(set.request_join().unwrap());
        assert!(values(set.resolve()).is_empty());
    }

    #[test]
    fn test_join_already_pending() {
        let mut set = ForkSet::new(0);
        set.register();
        set.request_join().unwrap();
        assert!(matches!(set.request_join(), Err(Error::JoinAlreadyPending)));
    }

    #[test]
    fn test_outside_body() {
        assert!(matches!(fork(), Err(Error::NotInGeneratorBody)));
        assert!(matches!(fork_raw(), Err(Error::NotInGeneratorBody)));
        assert!(matches!(join(), Err(Error::NotInGeneratorBody)));
    }
}
