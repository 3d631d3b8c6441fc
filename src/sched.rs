// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Single-threaded discrete-event scheduler.
//!
//! The simulation is implemented as a single-threaded dispatch of events in
//! chronological order. Virtual time starts at an epoch of zero and only
//! advances when the scheduler dispatches the next event, so "waiting" is
//! always expressed as a scheduling delay:
//!
//! - network latency is an RPC arrival scheduled after the latency duration
//! - heartbeats are tick events scheduled at the heartbeat interval
//! - block generation events are scheduled at random intervals
//!
//! Events scheduled for the same trigger time are dispatched in insertion
//! order (stable FIFO tie-break via a sequence counter). The configured end
//! time is exclusive: an event falling exactly on it is not dispatched.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

/// An opaque callable unit of work dispatched by the [`Scheduler`].
///
/// Handlers run to completion before the next event is dispatched. A handler
/// may schedule new events at future virtual times, including `now + 0`,
/// which still orders after the currently running event.
pub trait Event {
    fn trigger(&self);
}

/// A scheduled event together with its trigger time.
struct Task {
    trigger_time: Duration,
    /// Tie-breaker preserving insertion order among equal trigger times.
    seq: u64,
    event: Box<dyn Event>,
}

// Flipped comparisons turn the std max-heap into a min-heap on
// (trigger_time, seq).
impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .trigger_time
            .cmp(&self.trigger_time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.trigger_time == other.trigger_time && self.seq == other.seq
    }
}

impl Eq for Task {}

/// Priority queue of timed events with a monotone virtual clock.
pub struct Scheduler {
    /// Pending tasks, ordered chronologically.
    queue: RefCell<BinaryHeap<Task>>,
    /// Insertion counter for the FIFO tie-break.
    next_seq: Cell<u64>,
    /// Virtual time at which the current event is being dispatched.
    ///
    /// Only meaningful for interval calculations, not for its absolute value.
    cur_time: Cell<Duration>,
    /// End of the simulation, exclusive. Constant across the whole run.
    end_time: Duration,
    /// Total number of events dispatched so far.
    num_triggered: Cell<u64>,
}

impl Scheduler {
    /// Creates a scheduler that will run for the given total duration.
    pub fn new(duration: Duration) -> Self {
        Self {
            queue: RefCell::new(BinaryHeap::new()),
            next_seq: Cell::new(0),
            cur_time: Cell::new(Duration::ZERO),
            end_time: duration,
            num_triggered: Cell::new(0),
        }
    }

    /// Returns the current virtual time.
    pub fn now(&self) -> Duration {
        self.cur_time.get()
    }

    /// Schedules `event` to trigger `after` from the current virtual time.
    pub fn schedule<E: Event + 'static>(&self, after: Duration, event: E) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.queue.borrow_mut().push(Task {
            trigger_time: self.cur_time.get() + after,
            seq,
            event: Box::new(event),
        });
    }

    /// Dispatches events in chronological order until the queue runs dry or
    /// virtual time reaches the end of the simulation.
    ///
    /// New events may be added from within event handlers via
    /// [`Self::schedule`].
    pub fn run(&self) {
        loop {
            let Some(task) = self.queue.borrow_mut().pop() else {
                break;
            };
            self.cur_time.set(task.trigger_time);
            if task.trigger_time >= self.end_time {
                // end simulation, the end time is not inclusive
                break;
            }
            task.event.trigger();
            self.num_triggered.set(self.num_triggered.get() + 1);
        }
        // Drop any tasks left past the end time, releasing the references
        // their events hold.
        self.queue.borrow_mut().clear();
    }

    /// Returns true iff the queue is drained or virtual time has reached the
    /// end of the simulation.
    pub fn is_stopped(&self) -> bool {
        self.queue.borrow().is_empty() || self.cur_time.get() >= self.end_time
    }

    /// Returns the total number of events dispatched. Does not include events
    /// dropped at the end of the run.
    pub fn num_triggered(&self) -> u64 {
        self.num_triggered.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    struct SetEvent {
        flag: Rc<Cell<bool>>,
    }

    impl Event for SetEvent {
        fn trigger(&self) {
            self.flag.set(true);
        }
    }

    struct ChronoEvent {
        order: Rc<RefCell<Vec<u64>>>,
        seqno: u64,
    }

    impl Event for ChronoEvent {
        fn trigger(&self) {
            self.order.borrow_mut().push(self.seqno);
        }
    }

    struct Generator {
        sched: Rc<Scheduler>,
    }

    impl Event for Generator {
        fn trigger(&self) {
            self.sched.schedule(
                Duration::from_secs(1),
                Generator {
                    sched: Rc::clone(&self.sched),
                },
            );
        }
    }

    #[test]
    fn end_time_exclusive() {
        let sched = Scheduler::new(Duration::from_secs(1));
        let flag = Rc::new(Cell::new(false));
        sched.schedule(
            Duration::from_secs(2),
            SetEvent {
                flag: Rc::clone(&flag),
            },
        );
        sched.run();
        assert!(!flag.get(), "event scheduled after the end time triggered");
        assert!(sched.is_stopped());
    }

    #[test]
    fn chronological_dispatch() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let sched = Scheduler::new(Duration::from_secs(60));
        for seqno in [7, 22, 11] {
            sched.schedule(
                Duration::from_secs(seqno),
                ChronoEvent {
                    order: Rc::clone(&order),
                    seqno,
                },
            );
        }
        sched.run();
        assert_eq!(*order.borrow(), vec![7, 11, 22]);
        assert!(sched.is_stopped());
    }

    #[test]
    fn fifo_on_equal_trigger_times() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let sched = Scheduler::new(Duration::from_secs(10));
        for seqno in [3, 1, 2] {
            sched.schedule(
                Duration::from_secs(5),
                ChronoEvent {
                    order: Rc::clone(&order),
                    seqno,
                },
            );
        }
        sched.run();
        assert_eq!(*order.borrow(), vec![3, 1, 2]);
    }

    #[test]
    fn generative_events() {
        let sched = Rc::new(Scheduler::new(Duration::from_secs(3)));
        sched.schedule(
            Duration::ZERO,
            Generator {
                sched: Rc::clone(&sched),
            },
        );
        sched.run();
        assert_eq!(sched.num_triggered(), 3);
    }

    #[test]
    fn zero_duration_run() {
        let sched = Scheduler::new(Duration::ZERO);
        let flag = Rc::new(Cell::new(false));
        sched.schedule(
            Duration::ZERO,
            SetEvent {
                flag: Rc::clone(&flag),
            },
        );
        sched.run();
        assert!(!flag.get());
        assert_eq!(sched.num_triggered(), 0);
    }
}
