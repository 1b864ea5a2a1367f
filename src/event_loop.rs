//! # event loop
//!
//! single threaded host loop that drives the coroutines
//!
//! Every thread owns one loop. Tasks queued with [`next_tick`] run before
//! any timer; timers fire by deadline and, for equal deadlines, in the
//! order they were registered. A task that returns an error is a fault:
//! [`run`] stops and hands the error to its caller, leaving the remaining
//! work queued so the loop can be resumed.
//!

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// unit of work run by the loop
pub type Task = Box<dyn FnOnce() -> Result<()>>;

struct TimerEntry {
    deadline: Instant,
    seq: u64,
    task: Task,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

// BinaryHeap is a max heap, the earliest deadline must compare greatest
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct EventLoop {
    ready: VecDeque<Task>,
    timers: BinaryHeap<TimerEntry>,
    seq: u64,
}

impl EventLoop {
    fn new() -> Self {
        EventLoop {
            ready: VecDeque::new(),
            timers: BinaryHeap::new(),
            seq: 0,
        }
    }
}

thread_local! {
    static LOOP: RefCell<EventLoop> = RefCell::new(EventLoop::new());
}

/// schedule `f` to run on the next tick of the loop
pub fn next_tick<F>(f: F)
where
    F: FnOnce() -> Result<()> + 'static,
{
    LOOP.with(|l| l.borrow_mut().ready.push_back(Box::new(f)));
}

/// schedule `f` to run once `delay` has elapsed
pub fn set_timeout<F>(delay: Duration, f: F)
where
    F: FnOnce() -> Result<()> + 'static,
{
    LOOP.with(|l| {
        let mut l = l.borrow_mut();
        let seq = l.seq;
        l.seq += 1;
        l.timers.push(TimerEntry {
            deadline: Instant::now() + delay,
            seq,
            task: Box::new(f),
        });
    });
}

/// surface `err` as a fault on the next tick
pub fn raise(err: Error) {
    next_tick(move || Err(err));
}

/// check if any task or timer is still queued
pub fn has_pending() -> bool {
    LOOP.with(|l| {
        let l = l.borrow();
        !l.ready.is_empty() || !l.timers.is_empty()
    })
}

fn pop_ready() -> Option<Task> {
    LOOP.with(|l| l.borrow_mut().ready.pop_front())
}

fn pop_timer() -> Option<(Instant, Task)> {
    LOOP.with(|l| l.borrow_mut().timers.pop().map(|t| (t.deadline, t.task)))
}

/// run queued ticks until none is left, timers are not fired
pub fn run_until_idle() -> Result<()> {
    while let Some(task) = pop_ready() {
        task()?;
    }
    Ok(())
}

/// run the loop until no task or timer is left
///
/// returns the first fault raised by a task
pub fn run() -> Result<()> {
    loop {
        run_until_idle()?;

        let (deadline, task) = match pop_timer() {
            Some(timer) => timer,
            None => return Ok(()),
        };

        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
        task()?;
    }
}
