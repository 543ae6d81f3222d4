// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use chat_server_rs::{
    cfg::{
        cli::{Args, resolve_config_path},
        config::Config,
        logger::init_logger,
    },
    server::Server,
    store::credentials::CredentialStore,
};
use clap::Parser;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => Config::load_from_file(resolve_config_path(path)?)
            .context("failed to resolve or load config")?,
        None => Config::default(),
    };

    let _logger_guard = init_logger(&cfg.logger)?;

    let store = CredentialStore::open(&cfg.store.dir)
        .context("failed to open credential store")?;

    let server = Server::bind(args.listen_addr(), args.manager_addr(), &cfg, store).await?;
    info!(addr = %server.local_addr()?, "listening");

    // Interrupt flips the flag; the loop exits at the next iteration
    // boundary and persists the user pk on the way out.
    let cancel = server.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            cancel.cancel();
        }
    });

    server.run().await
}
