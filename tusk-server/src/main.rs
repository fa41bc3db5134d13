//! tusk server binary

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tusk_core::ChecksumRegistry;
use tusk_engine::{FileStore, StorageEngine};
use tusk_server::{HttpServer, ServerConfig, TusServer};

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tusk_server=info,tusk_engine=info"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn cli() -> Command {
    Command::new("tusk-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Resumable upload server speaking TUS 1.0.0")
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .env("TUSK_DATA_DIR")
                .value_name("PATH")
                .help("Data directory path")
                .default_value("./data"),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .env("TUSK_BIND")
                .value_name("ADDR")
                .help("Bind address")
                .default_value("127.0.0.1:1080"),
        )
        .arg(
            Arg::new("base-path")
                .long("base-path")
                .env("TUSK_BASE_PATH")
                .value_name("PATH")
                .help("URL prefix uploads are created under")
                .default_value("/files"),
        )
        .arg(
            Arg::new("max-size")
                .long("max-size")
                .env("TUSK_MAX_SIZE")
                .value_name("BYTES")
                .help("Largest accepted upload, 0 for unlimited")
                .value_parser(clap::value_parser!(u64))
                .default_value("0"),
        )
        .arg(
            Arg::new("checksum-algorithm")
                .long("checksum-algorithm")
                .value_name("NAME")
                .help("Digest accepted in Upload-Checksum (md5, sha1, sha256), \"none\" to disable")
                .default_value("sha1"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .help("Emit logs as JSON lines")
                .action(ArgAction::SetTrue),
        )
}

/// Protocol settings from the command line, checked before anything binds
fn server_config(matches: &ArgMatches) -> anyhow::Result<ServerConfig> {
    let base_path = matches
        .get_one::<String>("base-path")
        .context("missing --base-path")?;
    let max_size = matches.get_one::<u64>("max-size").copied().unwrap_or(0);
    let checksum = matches
        .get_one::<String>("checksum-algorithm")
        .filter(|name| !name.eq_ignore_ascii_case("none"))
        .map(String::as_str);

    let config = ServerConfig::new(base_path)
        .with_max_size(max_size)
        .with_checksum_algorithm(checksum);
    config
        .validate(&ChecksumRegistry::default())
        .context("invalid --checksum-algorithm")?;

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("log-json"));

    let data_dir: PathBuf = matches
        .get_one::<String>("data-dir")
        .context("missing --data-dir")?
        .into();

    let bind_addr: SocketAddr = matches
        .get_one::<String>("bind")
        .context("missing --bind")?
        .parse()
        .context("invalid bind address")?;

    let config = server_config(&matches)?;

    info!("Starting tusk server");
    info!("Data directory: {}", data_dir.display());
    info!("Bind address: {}", bind_addr);

    let engine = StorageEngine::new(&data_dir).context("failed to open storage")?;
    let store = FileStore::new(engine).context("failed to open upload index")?;

    let uploads = store.uploads().context("failed to scan uploads")?;
    let incomplete = uploads.iter().filter(|u| !u.is_complete()).count();
    info!(
        "Recovered {} uploads ({} incomplete)",
        uploads.len(),
        incomplete
    );

    let server = TusServer::new(Arc::new(store), config);

    tokio::select! {
        result = HttpServer::new(server).serve(bind_addr) => {
            result.context("server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let matches = cli().try_get_matches_from(["tusk-server"]).unwrap();
        assert_eq!(matches.get_one::<String>("base-path").unwrap(), "/files");
        assert_eq!(matches.get_one::<u64>("max-size"), Some(&0));
        assert!(!matches.get_flag("log-json"));
    }

    fn config_from(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let mut argv = vec!["tusk-server"];
        argv.extend_from_slice(args);
        server_config(&cli().try_get_matches_from(argv).unwrap())
    }

    #[test]
    fn test_checksum_algorithm_flag() {
        assert_eq!(config_from(&[]).unwrap().checksum_algorithm.as_deref(), Some("sha1"));
        assert_eq!(
            config_from(&["--checksum-algorithm", "SHA256"]).unwrap().checksum_algorithm.as_deref(),
            Some("sha256")
        );
        assert_eq!(
            config_from(&["--checksum-algorithm", "none"]).unwrap().checksum_algorithm,
            None
        );
        assert!(config_from(&["--checksum-algorithm", "foo"]).is_err());
    }

    #[test]
    fn test_cli_rejects_non_numeric_max_size() {
        assert!(cli()
            .try_get_matches_from(["tusk-server", "--max-size", "lots"])
            .is_err());
    }
}
