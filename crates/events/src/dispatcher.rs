//! Reentrancy-safe publish/subscribe dispatcher
//!
//! A dispatcher has at most one active drain. The `emit` call that finds no
//! drain in progress becomes the drain owner and walks the delivery queue by
//! index; every `emit` made while that walk is running (including from inside
//! a listener) only appends to the same queue. The owner keeps walking until
//! the index catches up with the end of the queue, so pairs run exactly once,
//! in append order, with no nested drain loops.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Listener callback; identity is the `Rc` allocation
pub type Listener<A> = Rc<dyn Fn(&A)>;

/// Wrap a closure as a [`Listener`]
pub fn listener<A>(f: impl Fn(&A) + 'static) -> Listener<A> {
    Rc::new(f)
}

struct Registration<A> {
    listener: Listener<A>,
    once: bool,
}

type Delivery<A> = (Listener<A>, Rc<A>);

/// Delivery queue of the drain in progress
struct ActiveDrain<A> {
    queue: Vec<Delivery<A>>,
    index: usize,
}

struct DispatcherState<A> {
    registry: RefCell<HashMap<String, Vec<Registration<A>>>>,
    drain: RefCell<Option<ActiveDrain<A>>>,
}

/// Named-event dispatcher
///
/// Cloning yields another handle to the same registry and delivery queue,
/// which is how listeners emit back into the dispatcher that called them.
pub struct Dispatcher<A> {
    state: Rc<DispatcherState<A>>,
}

impl<A> Clone for Dispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<A: 'static> Default for Dispatcher<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Dispatcher<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: Vec<String> = self.state.registry.borrow().keys().cloned().collect();
        f.debug_struct("Dispatcher")
            .field("events", &events)
            .field("draining", &self.state.drain.borrow().is_some())
            .finish()
    }
}

impl<A: 'static> Dispatcher<A> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(DispatcherState {
                registry: RefCell::new(HashMap::new()),
                drain: RefCell::new(None),
            }),
        }
    }

    /// Register `listener` for every emission of `event`
    ///
    /// Registering the same listener twice for one event is a no-op.
    pub fn on(&self, event: &str, listener: &Listener<A>) {
        self.register(event, listener, false);
    }

    /// Register `listener` for the next emission of `event` only
    ///
    /// The registration is dropped when the listener is queued for delivery,
    /// before it runs, so a listener that re-emits `event` does not see
    /// itself registered.
    pub fn once(&self, event: &str, listener: &Listener<A>) {
        self.register(event, listener, true);
    }

    fn register(&self, event: &str, listener: &Listener<A>, once: bool) {
        let mut registry = self.state.registry.borrow_mut();
        let entries = registry.entry(event.to_string()).or_default();
        if entries.iter().any(|r| Rc::ptr_eq(&r.listener, listener)) {
            return;
        }
        entries.push(Registration {
            listener: Rc::clone(listener),
            once,
        });
    }

    /// Unregister `listener` from `event`
    ///
    /// Deliveries already queued for the listener still run. Returns whether
    /// a registration was removed.
    pub fn remove_listener(&self, event: &str, listener: &Listener<A>) -> bool {
        let mut registry = self.state.registry.borrow_mut();
        let Some(entries) = registry.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|r| !Rc::ptr_eq(&r.listener, listener));
        let removed = entries.len() != before;
        if entries.is_empty() {
            registry.remove(event);
        }
        removed
    }

    /// Unregister every listener of `event`, or of all events when `None`
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        let mut registry = self.state.registry.borrow_mut();
        match event {
            Some(event) => {
                registry.remove(event);
            }
            None => registry.clear(),
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.state
            .registry
            .borrow()
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Whether a drain is in progress
    pub fn is_draining(&self) -> bool {
        self.state.drain.borrow().is_some()
    }

    /// Deliver `args` to every listener of `event`
    ///
    /// Returns `true` when this call finished delivery itself (no listeners,
    /// or it owned the drain) and `false` when it was appended to a drain
    /// already in progress, whose owner delivers it before returning.
    ///
    /// A panicking listener aborts the drain: the panic unwinds out of the
    /// owning `emit`, the rest of the queue is discarded and the dispatcher
    /// is left idle.
    pub fn emit(&self, event: &str, args: A) -> bool {
        let deliveries = self.take_deliveries(event, args);
        if deliveries.is_empty() {
            return true;
        }

        {
            let mut drain = self.state.drain.borrow_mut();
            if let Some(active) = drain.as_mut() {
                active.queue.extend(deliveries);
                return false;
            }
            *drain = Some(ActiveDrain {
                queue: deliveries,
                index: 0,
            });
        }

        let _guard = DrainGuard {
            drain: &self.state.drain,
        };
        while let Some((listener, args)) = self.next_delivery() {
            listener(&args);
        }
        true
    }

    /// Snapshot the listeners of `event`, retiring `once` registrations
    fn take_deliveries(&self, event: &str, args: A) -> Vec<Delivery<A>> {
        let mut registry = self.state.registry.borrow_mut();
        let Some(entries) = registry.get_mut(event) else {
            return Vec::new();
        };
        let args = Rc::new(args);
        let deliveries = entries
            .iter()
            .map(|r| (Rc::clone(&r.listener), Rc::clone(&args)))
            .collect();
        entries.retain(|r| !r.once);
        if entries.is_empty() {
            registry.remove(event);
        }
        deliveries
    }

    fn next_delivery(&self) -> Option<Delivery<A>> {
        let mut drain = self.state.drain.borrow_mut();
        let active = drain.as_mut()?;
        let delivery = active.queue.get(active.index).cloned()?;
        active.index += 1;
        Some(delivery)
    }
}

/// Discards the active drain when the owner finishes or unwinds
struct DrainGuard<'a, A> {
    drain: &'a RefCell<Option<ActiveDrain<A>>>,
}

impl<A> Drop for DrainGuard<'_, A> {
    fn drop(&mut self) {
        let finished = self.drain.borrow_mut().take();
        drop(finished);
    }
}
