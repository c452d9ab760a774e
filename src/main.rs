/*
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Gibson
//!
//! Gibson is a single-process, in-memory key/value cache server. See the
//! module docs for the storage index (`trie`), item model (`store`), wire
//! protocol (`protocol`), query processor (`query`), reactor (`dbnet`) and
//! maintenance cron (`cron`).

mod config;
mod cron;
mod dbnet;
#[cfg(test)]
mod e2e_tests;
mod lzf;
mod mem;
mod protocol;
mod query;
mod server;
mod store;
mod trie;
mod util;

use std::env;
use std::process::ExitCode;

use config::{CliAction, Config};
use server::Server;
use tokio::sync::broadcast;
use tokio::task::LocalSet;

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const HELP: &str = "gibsond [-h|--help] [-c|--config FILE]";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let action = match config::parse_args(args) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("gibsond: {e}");
            eprintln!("{HELP}");
            return ExitCode::from(1);
        }
    };

    let config_path = match action {
        CliAction::Help => {
            println!("{HELP}");
            return ExitCode::SUCCESS;
        }
        CliAction::Run { config_path } => config_path,
    };

    let mut config = match config_path {
        Some(path) => match Config::load(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("gibsond: {e}");
                return ExitCode::from(1);
            }
        },
        None => Config::default(),
    };
    config.clamp_to_available_memory();

    init_logger(&config.loglevel);
    log::info!(
        "starting gibsond: {}",
        match &config.unix_socket {
            Some(path) => format!("unix socket {}", path.display()),
            None => format!("{}:{}", config.address, config.port),
        }
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build the tokio runtime");

    let server = Server::new(config);
    let local = LocalSet::new();
    local.block_on(&runtime, run(server))
}

/// Races the listener, the cron, and SIGTERM handling on the same
/// reactor thread (spec §4.6: one thread multiplexes accept, read,
/// write, and periodic maintenance). Whichever finishes first — the
/// listener erroring out, or a termination signal arriving and the cron
/// tearing everything down — ends the process.
async fn run(server: Server) -> ExitCode {
    let (shutdown_tx, _rx) = broadcast::channel(1);

    let serve = dbnet::serve(server.clone(), shutdown_tx.clone());
    let cron = cron::run(server.clone(), shutdown_tx.clone());
    let signals = wait_for_sigterm(server.clone(), shutdown_tx.clone());

    tokio::select! {
        res = serve => {
            if let Err(e) = res {
                log::error!("listener exited: {e}");
            }
        }
        _ = cron => {}
        _ = signals => {}
    }

    log::info!("goodbye");
    ExitCode::SUCCESS
}

/// SIGTERM sets the shutdown flag observed by the next cron tick (spec
/// §4.7, §7); SIGHUP/SIGPIPE are ignored by simply never being
/// registered — tokio's default disposition for signals nobody asked for.
async fn wait_for_sigterm(server: Server, shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        term.recv().await;
        log::info!("received SIGTERM, shutting down");
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    server.request_shutdown();
    let _ = shutdown_tx.send(());
}

fn init_logger(loglevel: &str) {
    let filter = env::var("GIBSON_LOG").unwrap_or_else(|_| loglevel.to_owned());
    env_logger::Builder::new().parse_filters(&filter).init();
}
