//! # cpolicy
//!
//! Command-line interface for capsule policy evaluation.
//!
//! - `cpolicy evaluate` — compute the effective policy for a layer stack
//! - `cpolicy verify` — check that a lower layer never grants more than a higher one
//! - `cpolicy diff` — explain which parts of a request the effective policy denied
//! - `cpolicy check` — ask whether one named capability is allowed

mod commands;

use std::path::PathBuf;

use capsule_policy::PolicyDomain;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Capsule policy CLI — evaluate and verify layered policies.
#[derive(Parser)]
#[command(name = "cpolicy", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the effective policy for a layer stack (JSON on stdout).
    Evaluate {
        /// Local node policy (required).
        #[arg(long)]
        local: PathBuf,
        /// Network baseline policy.
        #[arg(long)]
        network: Option<PathBuf>,
        /// Handshake (sender) policy.
        #[arg(long)]
        handshake: Option<PathBuf>,
        /// Capsule (per-request) policy.
        #[arg(long)]
        capsule: Option<PathBuf>,
        /// Evaluator config (defaults to ./evaluator.toml if present).
        #[arg(long, default_value = "evaluator.toml")]
        config: PathBuf,
        /// Skip layer-tag and active-flag validation.
        #[arg(long)]
        lenient: bool,
    },
    /// Check that the lower policy grants nothing beyond the higher one.
    Verify {
        /// The more authoritative policy.
        #[arg(long)]
        higher: PathBuf,
        /// The less authoritative policy.
        #[arg(long)]
        lower: PathBuf,
    },
    /// List the requested capabilities the effective policy does not grant.
    Diff {
        /// The requested (e.g., capsule) policy.
        #[arg(long)]
        requested: PathBuf,
        /// The effective policy: a policy document or `evaluate` output.
        #[arg(long)]
        effective: PathBuf,
    },
    /// Ask whether a named capability is allowed by a policy.
    Check {
        /// Policy to consult: a policy document or `evaluate` output.
        #[arg(long)]
        policy: PathBuf,
        /// Which half of the policy to consult.
        #[arg(long, value_enum)]
        domain: DomainArg,
        /// Capability name (e.g., allowDynamicContent, unapprovedEgress).
        #[arg(long)]
        capability: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DomainArg {
    Ingress,
    Egress,
}

impl From<DomainArg> for PolicyDomain {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::Ingress => PolicyDomain::Ingress,
            DomainArg::Egress => PolicyDomain::Egress,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't interfere with JSON on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("capsule_policy=info".parse()?)
                .add_directive("cpolicy=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Evaluate {
            local,
            network,
            handshake,
            capsule,
            config,
            lenient,
        } => commands::evaluate::execute(
            local,
            network.as_deref(),
            handshake.as_deref(),
            capsule.as_deref(),
            config,
            *lenient,
        ),
        Commands::Verify { higher, lower } => commands::verify::execute(higher, lower),
        Commands::Diff {
            requested,
            effective,
        } => commands::diff::execute(requested, effective),
        Commands::Check {
            policy,
            domain,
            capability,
        } => commands::check::execute(policy, (*domain).into(), capability),
    }
}
