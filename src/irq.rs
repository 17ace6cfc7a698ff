// Licensed under the Apache-2.0 license

//! Hand-off of driver state to interrupt handlers.
//!
//! An interrupt handler cannot take arguments, so the state it works on has
//! to live in a `static`. [`IsrCell`] is that static: thread mode registers a
//! context (a controller plus its event handler) while the peripheral is in
//! use, the ISR borrows it inside a critical section, and thread mode takes it
//! back with [`IsrCell::unregister`] when done.
//!
//! ```rust,ignore
//! static I2C1_CONTEXT: IsrCell<I2cContext> = IsrCell::new();
//!
//! fn i2c1_ev() {
//!     I2C1_CONTEXT.with(|ctx| ctx.i2c.on_event_interrupt(&mut ctx.events));
//! }
//! ```

use core::cell::RefCell;
use critical_section::Mutex;

pub struct IsrCell<T> {
    inner: Mutex<RefCell<Option<T>>>,
}

impl<T> IsrCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Installs `context`, returning the one it replaces.
    pub fn register(&self, context: T) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(context))
    }

    /// Removes the registered context; later `with` calls do nothing.
    pub fn unregister(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    pub fn is_registered(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).is_some())
    }

    /// Runs `f` on the registered context with interrupts masked.
    ///
    /// Returns `None` when nothing is registered. Calling `with` again from
    /// inside `f` on the same cell panics on the inner `RefCell` borrow.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }
}

impl<T> Default for IsrCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
