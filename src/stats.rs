// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Final result record of a simulation run.
//!
//! The metrics collected here decide the performance of a p2p routing
//! protocol:
//!
//! - *Mean message delay*: lower latency leads to faster consensus among
//!   peers. Floodsub has the potential for minimal latencies since it simply
//!   forwards every incoming message to all its peers.
//! - *Bandwidth consumption*: low latencies in isolation do not mean much if
//!   the wire is saturated and messages are dropped frequently. Floodsub
//!   floods the network, making inefficient use of bandwidth.
//! - *Reach*: messages must reach all corners of the network. A protocol
//!   that never forwards anything has zero latency and zero bandwidth usage,
//!   and is useless.
//!
//! Control messages are not counted as messages; they count as overhead for
//! data messages.

use serde::Serialize;

/// Running arithmetic mean over a stream of values.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct MeanStat {
    count: i64,
    value: f64,
}

impl MeanStat {
    /// Creates a mean stat from an already computed mean of `count` values.
    pub fn from_parts(count: i64, value: f64) -> Self {
        Self { count, value }
    }

    /// Number of values folded into the mean.
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Current mean value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Folds a single value into the running mean.
    //
    // The mean of n values is (sum of first n-1 values + nth value) / n and
    // the sum of the first n-1 values is (mean of n-1 values) * (n-1);
    // substituting yields the expression below.
    pub fn add_value(&mut self, value: f64) {
        self.count += 1;
        self.value += (value - self.value) / self.count as f64;
    }

    /// Folds another running mean into this one.
    pub fn add_mean(&mut self, other: &MeanStat) {
        self.count += other.count;
        if self.count > 0 {
            self.value += (other.value - self.value) * other.count as f64 / self.count as f64;
        }
    }
}

/// The four mean statistics produced by a simulation run.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct Stats {
    /// Mean number of packets transferred per message.
    pub packet_count_per_msg: MeanStat,
    /// Mean number of bytes transferred per message.
    pub traffic_per_msg: MeanStat,
    /// Mean delivery delay per message, in milliseconds.
    pub delay_ms_per_msg: MeanStat,
    /// Mean percentage of nodes that received a message.
    pub delivered_part: MeanStat,
}
