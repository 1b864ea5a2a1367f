//! # suspend run time support
//!
//! tracks the coroutine contexts whose body is on the call stack
//!

use std::cell::RefCell;
use std::rc::Rc;

use crate::driver::Context;

thread_local! {
    // each thread has its own active context stack
    static ACTIVE: RefCell<Vec<Rc<Context>>> = RefCell::new(Vec::new());
}

/// stack of the contexts currently being advanced
///
/// a nested coroutine started from a body pushes on top of its parent and
/// is popped again before the parent body continues
pub(crate) struct ContextStack;

impl ContextStack {
    /// get the innermost active context
    #[inline]
    pub fn top() -> Option<Rc<Context>> {
        ACTIVE.with(|s| s.borrow().last().cloned())
    }

    /// get the active context or report the misuse
    #[inline]
    pub fn current() -> crate::Result<Rc<Context>> {
        Self::top().ok_or(crate::Error::NotInGeneratorBody)
    }

    #[inline]
    fn push(ctx: Rc<Context>) {
        ACTIVE.with(|s| s.borrow_mut().push(ctx));
    }

    #[inline]
    fn pop(ctx: &Rc<Context>) {
        let top = ACTIVE.with(|s| s.borrow_mut().pop());
        debug_assert!(top.map_or(false, |t| Rc::ptr_eq(&t, ctx)));
    }
}

/// scoped marker for one synchronous advance
///
/// sets the resumption guard and pushes the context, both are released when
/// the marker drops, which also covers a panicking body
pub(crate) struct Active {
    ctx: Rc<Context>,
}

impl Active {
    pub fn enter(ctx: &Rc<Context>) -> Active {
        ctx.set_guard(true);
        ContextStack::push(ctx.clone());
        Active { ctx: ctx.clone() }
    }
}

impl Drop for Active {
    fn drop(&mut self) {
        ContextStack::pop(&self.ctx);
        self.ctx.set_guard(false);
    }
}

/// check if the current code runs inside a generator body
pub fn is_generator() -> bool {
    ACTIVE.with(|s| !s.borrow().is_empty())
}

#[cfg(test)]
mod test {
    use super::is_generator;

    #[test]
    fn test_is_context() {
        // this is the root context
        assert!(!is_generator());
    }

    #[test]
    fn test_inside_body() {
        use crate::*;
        use std::cell::Cell;
        use std::rc::Rc;

        let seen = Rc::new(Cell::new(false));
        let s = seen.clone();
        run(
            move |_co| {
                s.set(is_generator());
                Ok(())
            },
            None,
        );
        assert!(seen.get());
        assert!(!is_generator());
        event_loop::run().unwrap();
    }
}
