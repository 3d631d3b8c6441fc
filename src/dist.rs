// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Probability distributions used throughout the simulation.
//!
//! Simulations make extensive use of random numbers:
//! - network latency is not deterministic and depends on external factors
//! - peers are connected at random
//! - blocks are generated at random intervals
//!
//! The [`Dist`] trait abstracts over these sources so that components can be
//! parameterized with a distribution without caring about its shape.

use rand::RngCore;
use rand::prelude::*;
use rand_distr::Exp;

/// Abstraction of a real-valued probability distribution.
pub trait Dist {
    /// Draws a single sample from the distribution.
    fn sample(&self, rng: &mut dyn RngCore) -> f64;

    /// Returns the expected value of the distribution.
    fn mean(&self) -> f64;
}

/// Degenerate distribution that always yields the same value.
pub struct Constant(pub f64);

impl Dist for Constant {
    fn sample(&self, _rng: &mut dyn RngCore) -> f64 {
        self.0
    }

    fn mean(&self) -> f64 {
        self.0
    }
}

/// Continuous uniform distribution on the half-open interval `[low, high)`.
pub struct Uniform {
    low: f64,
    high: f64,
}

impl Uniform {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

impl Dist for Uniform {
    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        rng.random_range(self.low..self.high)
    }

    fn mean(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}

/// Bernoulli distribution yielding 1.0 with probability `p` and 0.0 otherwise.
pub struct Bernoulli {
    p: f64,
    inner: rand_distr::Bernoulli,
}

impl Bernoulli {
    /// Creates a new Bernoulli distribution with success probability `p`.
    pub fn new(p: f64) -> Self {
        let inner = rand_distr::Bernoulli::new(p).expect("probability should be in [0, 1]");
        Self { p, inner }
    }
}

impl Dist for Bernoulli {
    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        if self.inner.sample(rng) { 1.0 } else { 0.0 }
    }

    fn mean(&self) -> f64 {
        self.p
    }
}

/// Exponential distribution with the given rate parameter.
///
/// The mean inter-arrival time is `1 / rate`.
pub struct Exponential {
    rate: f64,
    inner: Exp<f64>,
}

impl Exponential {
    /// Creates a new exponential distribution with rate `rate`.
    pub fn new(rate: f64) -> Self {
        let inner = Exp::new(rate).expect("rate should be positive");
        Self { rate, inner }
    }
}

impl Dist for Exponential {
    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        self.inner.sample(rng)
    }

    fn mean(&self) -> f64 {
        1.0 / self.rate
    }
}

/// Two-level network latency model, measured in milliseconds.
///
/// Modelling latency is not simple. Real latency depends on numerous factors
/// such as processing, queueing, transmission and propagation delays. To keep
/// matters simple we assume there is only normal latency and spiked latency:
/// every sample is `base + spike_dist * spike`.
pub struct Latency<S: Dist> {
    pub spike_dist: S,
    pub base_ms: f64,
    pub spike_ms: f64,
}

impl<S: Dist> Dist for Latency<S> {
    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        self.base_ms + self.spike_dist.sample(rng) * self.spike_ms
    }

    fn mean(&self) -> f64 {
        self.base_ms + self.spike_dist.mean() * self.spike_ms
    }
}
