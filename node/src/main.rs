mod config;
mod consensus;
mod keys;

use std::fs;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use evml_engine::Engine;
use evml_genesis::GenesisDoc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use config::Config;
use consensus::SoloConsensus;
use keys::KeysCommand;

#[derive(Parser)]
#[command(name = "evml", about = "A consensus-agnostic EVM state engine node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node: load genesis, start the solo consensus shim and the HTTP server.
    Run(Config),
    /// Manage local encrypted keyfiles (a client-side concern; the engine never signs).
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(config) => run(config).await,
        Command::Keys { command } => {
            match command {
                KeysCommand::Generate(args) => keys::generate(args),
                KeysCommand::Inspect(args) => keys::inspect(args),
                KeysCommand::Update(args) => keys::update(args),
            }
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let min_gas_price = config.min_gas_price_atomic()?;
    let db_path = config.chain_data_path();
    fs::create_dir_all(&db_path)?;

    let engine = Arc::new(Engine::open_with_cache_megabytes(
        &db_path,
        min_gas_price,
        config.eth_cache_megabytes,
    )?);

    if engine.genesis_doc().is_none() {
        let genesis_bytes = fs::read(&config.genesis_file_path)?;
        let doc = GenesisDoc::from_json(&genesis_bytes)?;
        let root = engine.load_genesis(doc)?;
        tracing::info!(%root, "genesis loaded");
    }

    let (submit_tx, submit_rx) = mpsc::channel::<Vec<u8>>(1_024);

    let consensus_engine = engine.clone();
    let consensus_task = tokio::spawn(async move {
        SoloConsensus::new(consensus_engine, submit_rx).run().await;
    });

    tracing::info!(addr = %config.eth_api_bind_addr, "starting HTTP surface");
    let routes = evml_rpc::routes(engine, submit_tx);
    warp::serve(routes).run(config.eth_api_bind_addr).await;

    consensus_task.abort();
    Ok(())
}
