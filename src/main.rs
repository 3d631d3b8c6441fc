// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI entry point running a single simulation from a TOML config file.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::Context;
use log::info;
use meshsim::{Config, Stats, logging, simulate};

/// Discrete-event simulator for p2p pubsub routing protocols.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Loads TOML based configuration from this file.
    #[arg(short, long)]
    config: PathBuf,
}

fn main() -> Result<()> {
    // enable fancy `color_eyre` error messages
    color_eyre::install()?;

    logging::enable_logforth();

    let args = Args::parse();
    info!("loading config file at {}", args.config.display());
    let raw = fs::read_to_string(&args.config)
        .wrap_err_with(|| format!("reading config file {}", args.config.display()))?;
    let cfg: Config = toml::from_str(&raw).wrap_err("decoding config file")?;

    let stats = simulate(&cfg)?;
    print_stats(&stats);

    Ok(())
}

fn print_stats(stats: &Stats) {
    println!(
        "mean packet count:   {:.2} packets/msg ({} msgs)",
        stats.packet_count_per_msg.value(),
        stats.packet_count_per_msg.count(),
    );
    println!(
        "mean traffic:        {:.0} bytes/msg",
        stats.traffic_per_msg.value(),
    );
    println!(
        "mean delay:          {:?}",
        Duration::from_millis(stats.delay_ms_per_msg.value() as u64),
    );
    println!(
        "delivered percent:   {:.2}%",
        stats.delivered_part.value(),
    );
}
