use std::net::SocketAddr;
use std::path::PathBuf;

use alloy::primitives::U256;
use clap::Args;

/// The embedding-shell config surface (`SPEC_FULL.md` §6): everything the node needs to
/// open its store, load genesis, and bind its HTTP server.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Root directory for all node data; the chain database lives under `<datadir>/eth/chaindata`.
    #[arg(long, default_value = "./evml-data")]
    pub datadir: PathBuf,

    /// `error`, `warn`, `info`, `debug` or `trace`, or a full `tracing` env-filter directive.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Path to the genesis JSON document.
    #[arg(long)]
    pub genesis_file_path: PathBuf,

    /// Directory holding encrypted keyfiles (consulted by the `keys` subcommand only;
    /// the engine never signs on a client's behalf).
    #[arg(long, default_value = "./keystore")]
    pub keystore_path: PathBuf,

    /// Path to a file containing the keystore passphrase, used by the `keys` subcommand.
    #[arg(long)]
    pub password_file: Option<PathBuf>,

    /// Overrides `<datadir>/eth/chaindata` when set.
    #[arg(long)]
    pub db_file_path: Option<PathBuf>,

    /// Bind address for the HTTP surface.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub eth_api_bind_addr: SocketAddr,

    /// Advisory cache size for the underlying KV store; `evml-storage` passes this
    /// through as a RocksDB block-cache hint.
    #[arg(long, default_value_t = 128)]
    pub eth_cache_megabytes: u64,

    /// Transactions below this gas price are rejected before a receipt promise is
    /// created, both at `check_tx` and at `apply_transaction`.
    #[arg(long, default_value = "0")]
    pub min_gas_price: String,
}

impl Config {
    pub fn chain_data_path(&self) -> PathBuf {
        self.db_file_path
            .clone()
            .unwrap_or_else(|| self.datadir.join("eth").join("chaindata"))
    }

    pub fn min_gas_price_atomic(&self) -> anyhow::Result<U256> {
        let amount = evml_currency::parse_atomic_units(&self.min_gas_price)
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(U256::from(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn chain_data_path_defaults_under_datadir() {
        let wrapper = Wrapper::parse_from([
            "evml",
            "--genesis-file-path",
            "genesis.json",
        ]);
        assert_eq!(
            wrapper.config.chain_data_path(),
            PathBuf::from("./evml-data/eth/chaindata")
        );
    }

    #[test]
    fn db_file_path_overrides_the_default() {
        let wrapper = Wrapper::parse_from([
            "evml",
            "--genesis-file-path",
            "genesis.json",
            "--db-file-path",
            "/tmp/custom",
        ]);
        assert_eq!(wrapper.config.chain_data_path(), PathBuf::from("/tmp/custom"));
    }

    #[test]
    fn min_gas_price_parses_currency_strings() {
        let wrapper = Wrapper::parse_from([
            "evml",
            "--genesis-file-path",
            "genesis.json",
            "--min-gas-price",
            "1n",
        ]);
        assert_eq!(wrapper.config.min_gas_price_atomic().unwrap(), U256::from(1u64));
    }
}
