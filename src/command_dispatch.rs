//! Purpose: Hold top-level CLI command dispatch for `starnotary`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: `--url` routes a command to a server; otherwise the local registry is used.

use std::io;
use std::net::SocketAddr;

use clap::CommandFactory;
use serde_json::json;
use starnotary::api::LocalClient;

use super::*;

pub(super) fn dispatch_command(command: Command, data_dir: PathBuf) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "starnotary", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Register(args) => {
            let star = match args.url.clone() {
                Some(url) => remote_client(&url)?.register(&args.into_new_star())?,
                None => LocalClient::new()
                    .with_data_dir(&data_dir)
                    .register(args.into_new_star())?,
            };
            emit_json(json!({ "star": star }));
            Ok(RunOutcome::ok())
        }
        Command::Range(args) => {
            let request = args.to_request();
            let stars = match args.url.as_deref() {
                Some(url) => remote_client(url)?.star_range(&request)?,
                None => LocalClient::new()
                    .with_data_dir(&data_dir)
                    .star_range(&request)?,
            };
            emit_json(stars_json(&stars));
            Ok(RunOutcome::ok())
        }
        Command::Serve(args) => {
            let config = serve_config_from_args(args, data_dir)?;
            serve::preflight_config(&config)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}

fn serve_config_from_args(args: ServeArgs, data_dir: PathBuf) -> Result<serve::ServeConfig, Error> {
    let bind: SocketAddr = args.bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid bind address")
            .with_hint("Use host:port, for example 127.0.0.1:9800.")
    })?;
    Ok(serve::ServeConfig {
        bind,
        data_dir,
        cors_allowed_origins: args.cors_origin,
        max_body_bytes: args.max_body_bytes,
    })
}
