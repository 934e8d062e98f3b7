//! Tether Events
//!
//! Single-threaded building blocks for callback wiring:
//!
//! - [`Dispatcher`]: named-event publish/subscribe that stays correct when
//!   listeners emit on the same dispatcher while it is delivering.
//! - [`Scheduler`]: runs deferred callbacks one per turn, in submission
//!   order, on top of a [`TurnDriver`](tether_ports::TurnDriver).
//!
//! ## Delivery model
//!
//! ```text
//! emit("x") ──► queue: [(f1,a) (f2,a)] ─┐
//!                 ▲                     │ owner loop walks by index
//!   f1 emits "x" ─┘ appends (f2,b)      ▼
//!                          f1(a) → f2(a) → f2(b) → queue dropped
//! ```
//!
//! Both types are `!Send`: state lives in `Rc`/`RefCell` and is only touched
//! from the thread that owns it.

pub mod dispatcher;
pub mod scheduler;

pub use dispatcher::{Dispatcher, Listener, listener};
pub use scheduler::{ManualTurns, Scheduler};
