// Licensed under the Apache-2.0 license

//! Delivery of interrupt-level events to application code.
//!
//! Controllers never call back into the application through a global hook.
//! Their interrupt entry points take an [`EventHandler`] and report one event
//! per raised condition. The handler's [`EventAction`] is the only way the
//! application can steer the driver from inside the ISR.

use heapless::spsc::Producer;

/// What the driver should do after reporting an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventAction {
    /// Leave the transfer as it is.
    Continue,
    /// Tear down the in-flight transfer and release the bus.
    Abort,
}

pub trait EventHandler<E> {
    fn on_event(&mut self, event: E) -> EventAction;
}

impl<E, H: EventHandler<E>> EventHandler<E> for &mut H {
    fn on_event(&mut self, event: E) -> EventAction {
        (**self).on_event(event)
    }
}

/// Reports `event`, returning true when the handler asked for an abort.
pub(crate) fn notify<E, H: EventHandler<E>>(handler: &mut H, event: E) -> bool {
    handler.on_event(event) == EventAction::Abort
}

/// Forwards events into a single-producer queue drained by thread mode.
///
/// An event that does not fit asks for [`EventAction::Abort`]: thread mode
/// will never see it, so the transfer it belongs to must not carry on.
/// Size the queue for the longest burst a single ISR can raise.
impl<E, const N: usize> EventHandler<E> for Producer<'_, E, N> {
    fn on_event(&mut self, event: E) -> EventAction {
        match self.enqueue(event) {
            Ok(()) => EventAction::Continue,
            Err(_) => EventAction::Abort,
        }
    }
}

/// Adapts a closure into an [`EventHandler`].
pub struct FnHandler<F>(pub F);

impl<E, F: FnMut(E) -> EventAction> EventHandler<E> for FnHandler<F> {
    fn on_event(&mut self, event: E) -> EventAction {
        (self.0)(event)
    }
}
