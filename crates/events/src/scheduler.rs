//! Deferred-task scheduler
//!
//! Callbacks run strictly after the turn that deferred them, one per turn,
//! in submission order. The loop is armed lazily. Each step re-arms the loop
//! for the next queued callback *before* invoking the current one, so a
//! callback that panics cannot strand the callbacks queued behind it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use tether_ports::{TurnDriver, TurnStep};
use tracing::trace;

type Task = Box<dyn FnOnce()>;

struct SchedulerState {
    queue: RefCell<VecDeque<Task>>,
    armed: Cell<bool>,
    driver: Rc<dyn TurnDriver>,
}

/// FIFO, one-callback-per-turn scheduler
///
/// Clones share the same queue.
#[derive(Clone)]
pub struct Scheduler {
    state: Rc<SchedulerState>,
}

impl Scheduler {
    pub fn new(driver: Rc<dyn TurnDriver>) -> Self {
        Self {
            state: Rc::new(SchedulerState {
                queue: RefCell::new(VecDeque::new()),
                armed: Cell::new(false),
                driver,
            }),
        }
    }

    /// Queue `callback` to run in a later turn
    pub fn defer(&self, callback: impl FnOnce() + 'static) {
        self.state.queue.borrow_mut().push_back(Box::new(callback));
        if !self.state.armed.get() {
            trace!(driver = self.state.driver.name(), "arming scheduler loop");
            self.arm();
        }
    }

    /// Callbacks waiting for their turn
    pub fn pending(&self) -> usize {
        self.state.queue.borrow().len()
    }

    /// Hand the next step to the driver; the loop only counts as armed once
    /// the driver has accepted it
    fn arm(&self) {
        let scheduler = self.clone();
        self.state.driver.schedule(Box::new(move || scheduler.step()));
        self.state.armed.set(true);
    }

    fn step(&self) {
        let current = self.state.queue.borrow_mut().pop_front();
        self.state.armed.set(false);
        // Commit to the rest of the queue before running the current callback
        if !self.state.queue.borrow().is_empty() {
            self.arm();
        }
        if let Some(callback) = current {
            callback();
        }
    }
}

/// Turn driver that runs one step per explicit [`ManualTurns::run_turn`]
///
/// Useful where the caller owns the loop, and for deterministic tests.
#[derive(Default)]
pub struct ManualTurns {
    steps: RefCell<VecDeque<TurnStep>>,
}

impl ManualTurns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the oldest scheduled step; returns `false` when none is waiting
    pub fn run_turn(&self) -> bool {
        let step = self.steps.borrow_mut().pop_front();
        match step {
            Some(step) => {
                step();
                true
            }
            None => false,
        }
    }

    /// Run turns until none are left; returns how many ran
    pub fn run_until_idle(&self) -> usize {
        let mut turns = 0;
        while self.run_turn() {
            turns += 1;
        }
        turns
    }

    pub fn pending_turns(&self) -> usize {
        self.steps.borrow().len()
    }
}

impl TurnDriver for ManualTurns {
    fn schedule(&self, step: TurnStep) {
        self.steps.borrow_mut().push_back(step);
    }

    fn name(&self) -> &str {
        "manual"
    }
}
