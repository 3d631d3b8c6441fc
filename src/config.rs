// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Simulation configuration.
//!
//! The configuration record is supplied by an outside component (the CLI
//! decodes it from a TOML file). Options with defaults may be omitted;
//! required options are validated by the driver before any work is done.

use std::time::Duration;

use serde::Deserialize;

use crate::router::GossipsubConfig;

/// Default RNG seed for all randomness in a run.
pub const DEFAULT_SEED: u64 = 42;
/// Default retention of seen message IDs and collector entries.
pub const DEFAULT_SEEN_TTL: Duration = Duration::from_secs(120);

/// Name of the flooding baseline router.
pub const FLOODSUB: &str = "floodsub";
/// Name of the mesh+gossip router.
pub const GOSSIPSUB: &str = "gossipsub";

/// Full configuration of a simulation run.
///
/// Options specified in the config file take preference over the defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// RNG seed; different seeds produce different simulation runs.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Duration for which the simulation must run. Required.
    #[serde(default, with = "humantime_serde::option")]
    pub run_duration: Option<Duration>,

    /// Total number of nodes in the network. Required.
    pub total_peers: Option<usize>,

    /// Duration for which messages are marked as seen.
    #[serde(default = "default_seen_ttl", with = "humantime_serde")]
    pub seen_ttl: Duration,

    /// Expected time between block generations. Required.
    #[serde(default, with = "humantime_serde::option")]
    pub block_interval: Option<Duration>,

    /// The type of router to use, [`FLOODSUB`] or [`GOSSIPSUB`]. Required.
    pub router: Option<String>,

    /// Configuration options for the gossip router.
    ///
    /// Only takes effect iff the router is specified as [`GOSSIPSUB`].
    #[serde(default)]
    pub gossipsub: GossipsubConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            run_duration: None,
            total_peers: None,
            seen_ttl: DEFAULT_SEEN_TTL,
            block_interval: None,
            router: None,
            gossipsub: GossipsubConfig::default(),
        }
    }
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_seen_ttl() -> Duration {
    DEFAULT_SEEN_TTL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_fields() {
        let cfg: Config = toml::from_str(
            r#"
            run_duration = "1h"
            total_peers = 64
            block_interval = "15s"
            router = "floodsub"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.seed, DEFAULT_SEED);
        assert_eq!(cfg.seen_ttl, DEFAULT_SEEN_TTL);
        assert_eq!(cfg.run_duration, Some(Duration::from_secs(3600)));
        assert_eq!(cfg.total_peers, Some(64));
        assert_eq!(cfg.gossipsub.d, 6);
    }

    #[test]
    fn gossipsub_section_overrides() {
        let cfg: Config = toml::from_str(
            r#"
            run_duration = "10m"
            total_peers = 16
            block_interval = "15s"
            router = "gossipsub"

            [gossipsub]
            heartbeat_interval = "1m"
            Dhigh = 8
            "#,
        )
        .unwrap();
        assert_eq!(cfg.gossipsub.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(cfg.gossipsub.d_high, 8);
        // untouched knobs keep their defaults
        assert_eq!(cfg.gossipsub.d_low, 4);
        assert_eq!(cfg.gossipsub.history_length, 5);
    }

    #[test]
    fn unknown_options_are_rejected() {
        let parsed: Result<Config, _> = toml::from_str("does_not_exist = 3");
        assert!(parsed.is_err());
    }
}
