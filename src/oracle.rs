// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Block generation oracle.
//!
//! Blocks in a blockchain are generated at random intervals, which we model
//! as a Poisson process: the time between consecutive block generation
//! events is drawn from an exponential distribution whose mean equals the
//! configured block interval. On each fire the oracle picks one of the
//! registered publishers uniformly at random and asks it to publish a new
//! block.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use log::debug;
use rand::Rng;

use crate::dist::{Dist, Exponential};
use crate::sched::{Event, Scheduler};
use crate::{NodeId, SimRng};

/// A node that can publish new blocks when asked to by the oracle.
pub trait BlockPublisher {
    /// Creates and publishes the next locally originated block.
    fn publish_new_block(&self);

    /// ID of the publishing node, for logging.
    fn id(&self) -> NodeId;
}

/// Exponentially-spaced publish triggers to a random publisher.
///
/// Installed once at simulation start.
pub struct BlockOracle {
    sched: Rc<Scheduler>,
    publishers: RefCell<Vec<Rc<dyn BlockPublisher>>>,
    interval_dist: Exponential,
    rng: SimRng,
}

impl BlockOracle {
    /// Creates an oracle generating blocks every `block_interval` in
    /// expectation.
    pub fn new(sched: Rc<Scheduler>, block_interval: Duration, rng: SimRng) -> Self {
        Self {
            sched,
            publishers: RefCell::new(Vec::new()),
            interval_dist: Exponential::new(1.0 / block_interval.as_secs_f64()),
            rng,
        }
    }

    /// Registers a publisher eligible to generate blocks.
    pub fn add_publisher(&self, publisher: Rc<dyn BlockPublisher>) {
        self.publishers.borrow_mut().push(publisher);
    }

    /// Schedules the first block generation event.
    pub fn start(self: &Rc<Self>) {
        self.schedule_next();
    }

    fn generate(self: &Rc<Self>) {
        {
            let publishers = self.publishers.borrow();
            if !publishers.is_empty() {
                let index = self.rng.borrow_mut().random_range(0..publishers.len());
                let publisher = &publishers[index];
                debug!(
                    "generating a block at {:?} on node {}",
                    self.sched.now(),
                    publisher.id()
                );
                publisher.publish_new_block();
            }
        }
        self.schedule_next();
    }

    fn schedule_next(self: &Rc<Self>) {
        let interval_secs = self.interval_dist.sample(&mut *self.rng.borrow_mut());
        self.sched.schedule(
            Duration::from_secs_f64(interval_secs),
            BlockGenEvent {
                oracle: Rc::clone(self),
            },
        );
    }
}

struct BlockGenEvent {
    oracle: Rc<BlockOracle>,
}

impl Event for BlockGenEvent {
    fn trigger(&self) {
        self.oracle.generate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct CountingPublisher {
        published: Cell<u64>,
    }

    impl BlockPublisher for CountingPublisher {
        fn publish_new_block(&self) {
            self.published.set(self.published.get() + 1);
        }

        fn id(&self) -> NodeId {
            0
        }
    }

    #[test]
    fn publishes_at_expected_rate() {
        let sched = Rc::new(Scheduler::new(Duration::from_secs(3600)));
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(42)));
        let oracle = Rc::new(BlockOracle::new(
            Rc::clone(&sched),
            Duration::from_secs(15),
            rng,
        ));
        let publisher = Rc::new(CountingPublisher {
            published: Cell::new(0),
        });
        oracle.add_publisher(Rc::clone(&publisher) as Rc<dyn BlockPublisher>);
        oracle.start();
        sched.run();

        // expect 3600 / 15 = 240 blocks, allow 25% tolerance
        let published = publisher.published.get();
        assert!((180..=300).contains(&published), "published {published}");
    }
}
