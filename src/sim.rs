// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Simulation driver.
//!
//! Builds the topology, spawns and wires the nodes, starts the routers,
//! installs the block oracle and drains the event queue, returning the final
//! statistics. Once the event loop begins no error paths exist: every event
//! runs to completion and malformed conditions are silently ignored by
//! design.

use std::cell::RefCell;
use std::rc::Rc;

use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;

use crate::config::{Config, FLOODSUB, GOSSIPSUB};
use crate::oracle::BlockOracle;
use crate::pubsub::network::Network;
use crate::pubsub::node::Node;
use crate::router::{FloodsubRouter, GossipsubRouter, Router, RouterError};
use crate::sched::Scheduler;
use crate::stats::Stats;
use crate::topology::{self, TopologyError};
use crate::{NodeId, SimRng};

/// Errors that may occur while setting up a simulation.
///
/// All of them surface before any simulation work is done.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("did not configure a run duration")]
    MissingRunDuration,
    #[error("did not configure the total number of peers")]
    MissingTotalPeers,
    #[error("did not configure the block interval")]
    MissingBlockInterval,
    #[error("did not configure the router type")]
    MissingRouter,
    #[error("could not recognize the requested router type: {0}")]
    UnknownRouter(String),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Router(#[from] RouterError),
}

/// Runs a full simulation described by `cfg` and returns the final stats.
///
/// Deterministic for a fixed configuration: a single simulation cannot be
/// parallelized if reproducibility is desired, but multiple simulations can
/// run in parallel.
///
/// # Errors
///
/// Fails if a required configuration option is missing or invalid. Once the
/// event loop starts, no further errors can occur.
pub fn simulate(cfg: &Config) -> Result<Stats, SimError> {
    // fix the seed for reproducible runs
    let rng: SimRng = Rc::new(RefCell::new(StdRng::seed_from_u64(cfg.seed)));

    // triggers events in chronological order
    let run_duration = cfg.run_duration.ok_or(SimError::MissingRunDuration)?;
    info!("starting a simulator to be run for {run_duration:?}");
    let sched = Rc::new(Scheduler::new(run_duration));

    // construct the static network topology
    let total_peers = cfg.total_peers.ok_or(SimError::MissingTotalPeers)?;
    let graph = topology::new_graph(total_peers, &rng)?;

    // latency simulator
    let net = Rc::new(Network::new(
        Rc::clone(&sched),
        cfg.seen_ttl,
        Rc::clone(&rng),
    ));

    let block_interval = cfg.block_interval.ok_or(SimError::MissingBlockInterval)?;
    let oracle = Rc::new(BlockOracle::new(
        Rc::clone(&sched),
        block_interval,
        Rc::clone(&rng),
    ));

    // spawn the nodes and connect them to their neighbors
    info!("spawning {total_peers} new nodes in the network");
    let nodes = spawn_new_nodes(&sched, &graph, &net, &oracle, cfg, &rng)?;

    // start the routers, only then begin generating blocks
    for node in &nodes {
        node.start()?;
    }
    oracle.start();

    sched.run();
    Ok(net.final_stats())
}

fn spawn_new_nodes(
    sched: &Rc<Scheduler>,
    graph: &topology::Graph,
    net: &Rc<Network>,
    oracle: &Rc<BlockOracle>,
    cfg: &Config,
    rng: &SimRng,
) -> Result<Vec<Rc<Node>>, SimError> {
    let mut nodes = Vec::with_capacity(graph.num_nodes());
    for node_id in graph.node_ids() {
        nodes.push(spawn_new_node(sched, net, oracle, cfg, node_id, rng)?);
    }

    // Connect every node with its peers. The connections are made in one
    // direction only (send paths); the reverse direction is wired while
    // visiting the neighbor.
    for node in &nodes {
        for &neighbor_id in graph.neighbors(node.id()) {
            node.add_peer(neighbor_id);
        }
    }

    Ok(nodes)
}

fn spawn_new_node(
    sched: &Rc<Scheduler>,
    net: &Rc<Network>,
    oracle: &Rc<BlockOracle>,
    cfg: &Config,
    node_id: NodeId,
    rng: &SimRng,
) -> Result<Rc<Node>, SimError> {
    let router_name = cfg.router.as_deref().ok_or(SimError::MissingRouter)?;
    let router: Rc<dyn Router> = match router_name {
        FLOODSUB => Rc::new(FloodsubRouter::new()),
        GOSSIPSUB => Rc::new(GossipsubRouter::new(cfg.gossipsub.clone(), Rc::clone(rng))),
        unknown => return Err(SimError::UnknownRouter(unknown.to_owned())),
    };
    Ok(Node::spawn(
        Rc::clone(sched),
        net,
        oracle,
        cfg.seen_ttl,
        router,
        node_id,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    fn base_config() -> Config {
        Config {
            run_duration: Some(Duration::from_secs(60)),
            total_peers: Some(16),
            block_interval: Some(Duration::from_secs(15)),
            router: Some(FLOODSUB.to_owned()),
            ..Config::default()
        }
    }

    #[test]
    fn missing_required_options() {
        let mut cfg = base_config();
        cfg.run_duration = None;
        assert_eq!(simulate(&cfg).err(), Some(SimError::MissingRunDuration));

        let mut cfg = base_config();
        cfg.total_peers = None;
        assert_eq!(simulate(&cfg).err(), Some(SimError::MissingTotalPeers));

        let mut cfg = base_config();
        cfg.block_interval = None;
        assert_eq!(simulate(&cfg).err(), Some(SimError::MissingBlockInterval));

        let mut cfg = base_config();
        cfg.router = None;
        assert_eq!(simulate(&cfg).err(), Some(SimError::MissingRouter));
    }

    #[test]
    fn unknown_router() {
        let mut cfg = base_config();
        cfg.router = Some("epidemic".to_owned());
        assert_eq!(
            simulate(&cfg).err(),
            Some(SimError::UnknownRouter("epidemic".to_owned()))
        );
    }

    #[test]
    fn too_few_peers() {
        let mut cfg = base_config();
        cfg.total_peers = Some(1);
        assert_eq!(
            simulate(&cfg).err(),
            Some(SimError::Topology(TopologyError::TooFewNodes))
        );
    }

    #[test]
    fn invalid_gossipsub_degrees() {
        let mut cfg = base_config();
        cfg.router = Some(GOSSIPSUB.to_owned());
        cfg.gossipsub.d_low = 8;
        cfg.gossipsub.d = 6;
        assert_eq!(
            simulate(&cfg).err(),
            Some(SimError::Router(RouterError::InvalidDegree))
        );
    }

    #[test]
    fn invalid_gossipsub_history() {
        let mut cfg = base_config();
        cfg.router = Some(GOSSIPSUB.to_owned());
        cfg.gossipsub.history_gossip = 6;
        cfg.gossipsub.history_length = 5;
        assert_eq!(
            simulate(&cfg).err(),
            Some(SimError::Router(RouterError::InvalidHistory))
        );
    }

    #[test]
    fn zero_duration_run_is_empty() {
        let mut cfg = base_config();
        cfg.run_duration = Some(Duration::ZERO);
        let stats = simulate(&cfg).unwrap();
        assert_eq!(stats.packet_count_per_msg.count(), 0);
        assert!(stats.delivered_part.value().abs() < 1e-6);
    }
}
