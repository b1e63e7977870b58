use clap::{Parser, Subcommand};
use std::path::PathBuf;
use surety_cli::config::{load_config, render_config};
use surety_cli::replay::replay;
use surety_cli::script::Script;
use surety_cli::simulate::{self, SimulationParams};
use surety_cli::store::{load_journal, save_journal};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "surety", version, about = "Flight-delay insurance ledger driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a JSON transaction script against a fresh ledger.
    Replay {
        script: PathBuf,
        /// Protocol configuration (TOML). Defaults apply when absent.
        #[arg(long, env = "SURETY_CONFIG")]
        config: Option<PathBuf>,
        /// Write the resulting event journal to this file.
        #[arg(long)]
        journal: Option<PathBuf>,
    },
    /// Reload a persisted journal and verify its hash chain.
    Verify { journal: PathBuf },
    /// Run the delayed-flight flow with seeded synthetic reporters.
    Simulate {
        #[arg(long, default_value_t = 20)]
        reporters: usize,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Probability an eligible reporter answers with the airline-fault code.
        #[arg(long, default_value_t = 0.8)]
        status_bias: f64,
        #[arg(long, env = "SURETY_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print the effective protocol configuration.
    Config {
        #[arg(long, env = "SURETY_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "surety_cli=info,surety_core=info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Replay {
            script,
            config,
            journal,
        } => {
            let config = load_config(config.as_deref())?;
            let script = Script::load(&script)?;
            let run = replay(&script, config)?;

            for outcome in &run.outcomes {
                println!("{}", serde_json::to_string(outcome)?);
            }
            println!(
                "{} committed, {} rejected, {} journal entries",
                run.committed(),
                run.rejected(),
                run.app.journal().len()
            );

            if let Some(path) = journal {
                save_journal(&path, run.app.journal())?;
                info!(path = %path.display(), "Journal written");
            }
        }
        Command::Verify { journal } => {
            let loaded = load_journal(&journal)?;
            println!(
                "journal ok: {} entries, head {}",
                loaded.len(),
                loaded.head_hash().unwrap_or("<empty>")
            );
        }
        Command::Simulate {
            reporters,
            seed,
            status_bias,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let params = SimulationParams {
                reporters,
                seed,
                status_bias,
                ..SimulationParams::default()
            };
            let report = simulate::run(&params, config)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", render_config(&config)?);
        }
    }

    Ok(())
}
