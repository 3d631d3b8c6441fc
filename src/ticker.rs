// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Periodic heartbeat generation for protocols that require it.
//!
//! No heartbeats exist in floodsub, so no ticker is registered with the
//! scheduler there. In gossipsub, mesh maintenance runs periodically,
//! independent of other messages.

use std::rc::Rc;
use std::time::Duration;

use log::debug;
use thiserror::Error;

use crate::NodeId;
use crate::sched::{Event, Scheduler};

/// Errors that may occur when starting a ticker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TickerError {
    #[error("ticker interval must be positive")]
    InvalidInterval,
}

/// Receiver of periodic tick notifications.
pub trait TickHandler {
    /// Called on every tick.
    fn on_tick(&self);

    /// ID of the node driven by this handler, for logging.
    fn id(&self) -> NodeId;
}

/// Periodic self-rescheduling event bound to a [`TickHandler`].
///
/// A ticker lives for the full simulation; there is no explicit cancel.
pub struct Ticker {
    sched: Rc<Scheduler>,
    interval: Duration,
    handler: Rc<dyn TickHandler>,
}

impl Ticker {
    /// Starts a new ticker firing every `interval`.
    ///
    /// The first tick triggers one full interval after the current virtual
    /// time.
    ///
    /// # Errors
    ///
    /// Returns [`TickerError::InvalidInterval`] if `interval` is zero.
    pub fn start(
        sched: &Rc<Scheduler>,
        interval: Duration,
        handler: Rc<dyn TickHandler>,
    ) -> Result<(), TickerError> {
        if interval.is_zero() {
            return Err(TickerError::InvalidInterval);
        }
        let ticker = Rc::new(Self {
            sched: Rc::clone(sched),
            interval,
            handler,
        });
        ticker.schedule_tick();
        Ok(())
    }

    fn tick(self: &Rc<Self>) {
        debug!(
            "firing a heartbeat at {:?} on node {}",
            self.sched.now(),
            self.handler.id()
        );
        self.handler.on_tick();
        // heartbeats are periodic, not a one-time event
        self.schedule_tick();
    }

    fn schedule_tick(self: &Rc<Self>) {
        self.sched.schedule(
            self.interval,
            TickEvent {
                ticker: Rc::clone(self),
            },
        );
    }
}

struct TickEvent {
    ticker: Rc<Ticker>,
}

impl Event for TickEvent {
    fn trigger(&self) {
        self.ticker.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TickerNode;

    impl TickHandler for TickerNode {
        fn on_tick(&self) {}

        fn id(&self) -> NodeId {
            0
        }
    }

    #[test]
    fn zero_interval() {
        let sched = Rc::new(Scheduler::new(Duration::from_secs(5)));
        let err = Ticker::start(&sched, Duration::ZERO, Rc::new(TickerNode));
        assert_eq!(err, Err(TickerError::InvalidInterval));
    }

    #[test]
    fn tick_count() {
        let ticks = 4;
        // ticks+1 since the scheduler does not dispatch events falling
        // exactly on the end time
        let sched = Rc::new(Scheduler::new(Duration::from_secs(ticks + 1)));
        Ticker::start(&sched, Duration::from_secs(1), Rc::new(TickerNode)).unwrap();
        sched.run();
        assert_eq!(sched.num_triggered(), ticks);
    }
}
