//! Binary entry point: parse CLI/config, open the header store, and run
//! a single peer session until shutdown or retries are exhausted.

use std::net::{SocketAddr, ToSocketAddrs};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::{error, info};

use bllvm_spv_node::chain::ChainEngine;
use bllvm_spv_node::config::{Cli, NodeConfig};
use bllvm_spv_node::net::PeerSession;
use bllvm_spv_node::storage::HeaderStore;
use bllvm_spv_node::utils::{init_logging, TerminateFlag};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match NodeConfig::from_cli(cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(None);
    info!(network = %config.network, fullnode = %config.fullnode, port = config.port, "starting spv-node");

    let store = match HeaderStore::open(&config.data_dir) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to open header store");
            return ExitCode::FAILURE;
        }
    };

    let chain = Arc::new(Mutex::new(ChainEngine::with_store(config.network, Some(Arc::clone(&store)))));

    let peer_addr = match resolve(&config.fullnode, config.port) {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "failed to resolve peer address");
            return ExitCode::FAILURE;
        }
    };

    let terminate = TerminateFlag::default();
    bllvm_spv_node::utils::signal::install(terminate.clone());

    let session = PeerSession::new(peer_addr, config.network, chain, terminate, config.max_retries);
    match session.run().await {
        Ok(()) => {
            info!("shut down cleanly");
            if let Err(e) = store.close() {
                error!(error = %e, "error flushing header store on shutdown");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "session ended with a fatal error");
            ExitCode::FAILURE
        }
    }
}

fn resolve(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved"))
}
