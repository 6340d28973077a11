#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a gridbots scenario headlessly.

mod run;
mod scenario;

use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Result;
use clap::Parser;
use gridbots_rendering::TextBackend;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    run::RunOptions,
    scenario::{Scenario, BUILTIN_SCENARIO},
};

#[derive(Debug, Parser)]
#[command(name = "gridbots")]
#[command(about = "Simulates bots steering around obstacles on a navigation grid")]
struct Cli {
    /// Scenario file to load; the built-in obstacle course runs when omitted.
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Overrides the number of steps declared by the scenario.
    #[arg(long)]
    ticks: Option<u64>,
    /// Renders a frame every N steps; zero renders only the final frame.
    #[arg(long, default_value_t = 60)]
    render_every: u64,
}

/// Entry point for the gridbots command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let scenario = match &cli.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::parse(BUILTIN_SCENARIO)?,
    };

    let mut events = Vec::new();
    let mut setup = scenario.build(&mut events)?;
    info!(
        title = %scenario.title,
        bots = setup.names.len(),
        events = events.len(),
        "scenario loaded"
    );

    let options = RunOptions {
        title: scenario.title.clone(),
        ticks: cli.ticks.unwrap_or(scenario.ticks),
        render_every: cli.render_every,
        highlight: setup.highlight.clone(),
    };
    let mut backend = TextBackend::new(io::stdout().lock());
    let summary = run::run(&mut setup.world, setup.pursuit.take(), &options, &mut backend)?;

    let mut out = backend.into_inner();
    writeln!(out, "{summary}")?;
    Ok(())
}
