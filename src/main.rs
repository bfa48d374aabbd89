//! driftkv server binary.
//!
//! Wires the pieces together: logging, the shared store, the expiry
//! sweeper, and a TCP accept loop that gives every socket its own
//! connection task. Runs until ctrl-c.

use anyhow::Context;
use driftkv::commands::CommandHandler;
use driftkv::connection::{handle_connection, ConnectionStats};
use driftkv::storage::{start_expiry_sweeper, Store};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const USAGE: &str = "\
driftkv — in-memory cache server with progressive rehashing

usage: driftkv [--host <addr>] [--port <port>]

  -h, --host <addr>   bind address (default 0.0.0.0)
  -p, --port <port>   listen port (default 2203)
  -v, --version       print the version and exit
      --help          print this text and exit
";

/// What the command line asked for.
enum CliAction {
    Run(ServerConfig),
    Help,
    Version,
}

/// Listener settings, CLI-overridable.
struct ServerConfig {
    host: String,
    port: u16,
}

impl ServerConfig {
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Folds the argument list into a config. Flags may appear in any order;
/// the last occurrence of a repeated flag wins.
fn parse_cli(mut args: impl Iterator<Item = String>) -> anyhow::Result<CliAction> {
    let mut config = ServerConfig {
        host: driftkv::DEFAULT_HOST.to_string(),
        port: driftkv::DEFAULT_PORT,
    };

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--help" => return Ok(CliAction::Help),
            "--version" | "-v" => return Ok(CliAction::Version),
            "--host" | "-h" => {
                config.host = args.next().context("--host takes an address")?;
            }
            "--port" | "-p" => {
                let raw = args.next().context("--port takes a number")?;
                config.port = raw
                    .parse()
                    .with_context(|| format!("'{}' is not a valid port", raw))?;
            }
            other => anyhow::bail!("unrecognized argument '{}'", other),
        }
    }

    Ok(CliAction::Run(config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match parse_cli(std::env::args().skip(1)) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            print!("{}", USAGE);
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("driftkv {}", driftkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("driftkv: {}", e);
            eprint!("{}", USAGE);
            std::process::exit(2);
        }
    };

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let store = Arc::new(Store::new());
    let _sweeper = start_expiry_sweeper(Arc::clone(&store));
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("binding {}", config.bind_address()))?;
    info!(
        "driftkv v{} listening on {}",
        driftkv::VERSION,
        config.bind_address()
    );

    tokio::select! {
        _ = serve(listener, Arc::clone(&store), stats) => {}
        result = signal::ctrl_c() => {
            result.context("installing the ctrl-c handler")?;
            info!("Ctrl-c received, shutting down");
        }
    }

    let totals = store.stats();
    info!(
        keys = totals.keys,
        get_ops = totals.get_ops,
        set_ops = totals.set_ops,
        del_ops = totals.del_ops,
        expired = totals.expired,
        evicted = totals.evicted,
        "Final store counters"
    );
    Ok(())
}

/// Accepts sockets until the surrounding select drops this future. Each
/// accepted connection runs as its own task against the shared store.
async fn serve(listener: TcpListener, store: Arc<Store>, stats: Arc<ConnectionStats>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let handler = CommandHandler::new(Arc::clone(&store));
        tokio::spawn(handle_connection(stream, peer, handler, Arc::clone(&stats)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<CliAction> {
        parse_cli(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_when_no_flags() {
        match parse(&[]).unwrap() {
            CliAction::Run(config) => {
                assert_eq!(config.host, driftkv::DEFAULT_HOST);
                assert_eq!(config.port, driftkv::DEFAULT_PORT);
                assert_eq!(config.bind_address(), "0.0.0.0:2203");
            }
            _ => panic!("expected a run action"),
        }
    }

    #[test]
    fn host_and_port_flags() {
        match parse(&["--host", "127.0.0.1", "-p", "2300"]).unwrap() {
            CliAction::Run(config) => {
                assert_eq!(config.host, "127.0.0.1");
                assert_eq!(config.port, 2300);
            }
            _ => panic!("expected a run action"),
        }
    }

    #[test]
    fn repeated_flags_last_one_wins() {
        match parse(&["-p", "1000", "-p", "2000"]).unwrap() {
            CliAction::Run(config) => assert_eq!(config.port, 2000),
            _ => panic!("expected a run action"),
        }
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(parse(&["--port", "many"]).is_err());
        assert!(parse(&["--port"]).is_err());
        assert!(parse(&["--host"]).is_err());
        assert!(parse(&["--frobnicate"]).is_err());
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert!(matches!(parse(&["--help"]).unwrap(), CliAction::Help));
        assert!(matches!(parse(&["-v"]).unwrap(), CliAction::Version));
        // Help wins even with other flags ahead of it.
        assert!(matches!(
            parse(&["--port", "1", "--help"]).unwrap(),
            CliAction::Help
        ));
    }
}
