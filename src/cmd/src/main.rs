// Copyright 2022 eau2 authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The `eau2` node binary: parses flags, merges the optional TOML
//! config, brings up the network and runs the selected application.

mod apps;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use eau2_common::config::NodeConfig;
use eau2_dataframe::Application;
use eau2_network::ip::IpNetwork;
use eau2_network::pseudo::PseudoNetwork;
use eau2_network::NetworkRef;
use tracing::Level;
use tracing_subscriber::filter;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AppKind {
    /// Single-node array round trip.
    Trivial,
    /// Three-node producer / counter / summarizer.
    Demo,
    /// Distributed word count over an input file.
    Wc,
}

#[derive(Parser, Debug)]
#[command(name = "eau2", about = "distributed in-memory tabular data engine", version)]
struct Args {
    /// Address this node binds its listener to.
    #[arg(long)]
    ip: Option<String>,

    /// Port this node listens on.
    #[arg(long)]
    port: Option<u16>,

    /// Address of the rendezvous node (node 0).
    #[arg(long)]
    server_ip: Option<String>,

    /// Port of the rendezvous node.
    #[arg(long)]
    server_port: Option<u16>,

    /// This node's index within the cluster.
    #[arg(long)]
    index: Option<u32>,

    /// Total number of nodes in the cluster.
    #[arg(long)]
    num_nodes: Option<usize>,

    /// Run every node in this process over the in-process network.
    #[arg(long)]
    pseudo: bool,

    /// Application to run.
    #[arg(long, value_enum, default_value_t = AppKind::Trivial)]
    app: AppKind,

    /// Input file for the word-count application.
    #[arg(long)]
    file: Option<PathBuf>,

    /// TOML settings file; explicit flags win over its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logger() {
    let fmt_layer = tracing_subscriber::fmt::layer().compact();
    let filter = filter::Targets::new()
        .with_target("eau2_network", Level::INFO)
        .with_target("eau2_storage", Level::INFO)
        .with_target("eau2_dataframe", Level::INFO)
        .with_target("eau2_cmd", Level::INFO)
        .with_default(Level::WARN);
    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger();

    let config = match &args.config {
        Some(path) => NodeConfig::init(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => NodeConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building runtime")?;
    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: NodeConfig) -> anyhow::Result<()> {
    let index = args.index.unwrap_or(config.cluster.index);
    let num_nodes = args.num_nodes.unwrap_or(config.cluster.num_nodes);
    let pseudo = args.pseudo || config.cluster.pseudo;

    if pseudo {
        // One process hosts the whole cluster, one task per node.
        let mut handles = Vec::new();
        for network in PseudoNetwork::create(num_nodes) {
            let app = args.app;
            let file = args.file.clone();
            handles.push(tokio::spawn(async move {
                node_main(Arc::new(network), app, file).await
            }));
        }
        for handle in handles {
            handle.await??;
        }
        return Ok(());
    }

    let ip = args.ip.unwrap_or(config.server.ip);
    let port = args.port.unwrap_or(config.server.port);
    let server_ip = args.server_ip.unwrap_or(config.server.server_ip);
    let server_port = args.server_port.unwrap_or(config.server.server_port);

    let network = IpNetwork::bind(index, num_nodes, &ip, port, &server_ip, server_port)
        .await
        .with_context(|| format!("binding node {} on {}:{}", index, ip, port))?;
    node_main(Arc::new(network), args.app, args.file).await
}

async fn node_main(network: NetworkRef, app: AppKind, file: Option<PathBuf>) -> anyhow::Result<()> {
    let application = Application::new(network).await?;
    match app {
        AppKind::Trivial => apps::trivial::run(&application).await?,
        AppKind::Demo => apps::demo::run(&application).await?,
        AppKind::Wc => apps::wordcount::run(&application, file).await?,
    }
    Ok(())
}
