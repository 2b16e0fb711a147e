use chat_replica::{try_create_chat_server, LocalHub, ServerConfig, ServerId, ServerOptions};
use chrono::Utc;
use clap::Parser;
use slog::Drain;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "chat-server")]
#[command(about = "Partition tolerant replicated chat server")]
struct Args {
    /// This server's id, 1 to 5.
    #[arg(value_parser = parse_server_id)]
    server_id: ServerId,

    /// One of critical, error, warning, info, debug, trace.
    #[arg(default_value = "info", value_parser = parse_level)]
    log_level: slog::Level,

    /// Directory for update logs and chatroom history.
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Start from empty logs and history.
    #[arg(long)]
    recreate: bool,

    /// Also run these servers in this process, in the same server group.
    #[arg(long = "peer", value_parser = parse_server_id)]
    peers: Vec<ServerId>,

    /// Log to a timestamped file in the data directory instead of the terminal.
    #[arg(long)]
    log_to_file: bool,
}

fn parse_server_id(value: &str) -> Result<ServerId, String> {
    let id: u32 = value.parse().map_err(|_| format!("'{}' is not a number", value))?;
    ServerId::new(id).map_err(|e| e.to_string())
}

fn parse_level(value: &str) -> Result<slog::Level, String> {
    value
        .parse::<slog::Level>()
        .map_err(|_| format!("unknown log level '{}'", value))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let logger = match create_root_logger(&args) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let hub = LocalHub::spawn(logger.clone());

    let mut servers = Vec::with_capacity(1 + args.peers.len());
    for server_id in std::iter::once(args.server_id).chain(args.peers.iter().copied()) {
        let config = ServerConfig {
            server_id,
            logger: logger.clone(),
            options: ServerOptions {
                data_directory: Some(args.data_dir.clone()),
                recreate_files: Some(args.recreate),
                ..Default::default()
            },
        };

        match try_create_chat_server(config, &hub) {
            Ok(server) => servers.push(server),
            Err(e) => {
                slog::crit!(logger, "Failed to start server {}: {}", server_id, e);
                return ExitCode::FAILURE;
            }
        }
    }
    slog::info!(logger, "Started servers {:?}", servers.iter().map(|s| s.server_id()).collect::<Vec<_>>());

    let main_server = servers.remove(0);
    tokio::select! {
        result = main_server.wait() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                slog::crit!(logger, "Server {} stopped: {}", args.server_id, e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            slog::info!(logger, "Interrupted. Shutting down.");
            ExitCode::SUCCESS
        }
    }
}

fn create_root_logger(args: &Args) -> io::Result<slog::Logger> {
    let drain = if args.log_to_file {
        fs::create_dir_all(&args.data_dir)?;
        let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let log_path = args
            .data_dir
            .join(format!("chat-server-{}_{}_info.log", args.server_id, now));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_path)?;

        let decorator = slog_term::PlainDecorator::new(file);
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        slog_async::Async::new(drain).build().fuse()
    } else {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
        slog_async::Async::new(drain).build().fuse()
    };

    let drain = slog::LevelFilter::new(drain, args.log_level).fuse();
    Ok(slog::Logger::root(drain, slog::o!()))
}
