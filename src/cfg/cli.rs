// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;

/// BER-framed multi-user chat server.
#[derive(Parser, Debug)]
#[command(name = "server", version, about)]
pub struct Args {
    /// IP address to listen on (IPv4 or IPv6 literal).
    #[arg(short = 'a', long = "address")]
    pub address: IpAddr,

    /// Port to listen on.
    #[arg(short = 'p', long = "port")]
    pub port: u16,

    /// IP address of the server manager. Optional; the server runs without
    /// a manager if the connect attempt fails.
    #[arg(short = 'A', long = "manager-address", requires = "manager_port")]
    pub manager_address: Option<IpAddr>,

    /// Port of the server manager.
    #[arg(short = 'P', long = "manager-port", requires = "manager_address")]
    pub manager_port: Option<u16>,

    /// Optional YAML config with runtime tunables and logger settings.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    pub fn manager_addr(&self) -> Option<SocketAddr> {
        match (self.manager_address, self.manager_port) {
            (Some(ip), Some(port)) => Some(SocketAddr::new(ip, port)),
            _ => None,
        }
    }
}

pub fn resolve_config_path(rel: &Path) -> Result<PathBuf> {
    let abs = if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(rel)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}
