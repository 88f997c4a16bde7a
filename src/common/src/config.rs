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

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::NodeId;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Per-node settings, loadable from a TOML file. Command-line flags
/// override whatever the file supplies.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl NodeConfig {
    pub fn init(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// This node's index within the cluster.
    #[serde(default = "default::index")]
    pub index: NodeId,

    /// Total number of nodes participating in the rendezvous.
    #[serde(default = "default::num_nodes")]
    pub num_nodes: usize,

    /// Use the in-process network instead of TCP.
    #[serde(default = "default::pseudo")]
    pub pseudo: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        toml::from_str("").unwrap()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address this node binds its listener to.
    #[serde(default = "default::ip")]
    pub ip: String,

    #[serde(default = "default::port")]
    pub port: u16,

    /// Address of the rendezvous node (node 0).
    #[serde(default = "default::ip")]
    pub server_ip: String,

    #[serde(default = "default::server_port")]
    pub server_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        toml::from_str("").unwrap()
    }
}

mod default {
    use crate::types::NodeId;

    pub fn index() -> NodeId {
        0
    }

    pub fn num_nodes() -> usize {
        1
    }

    pub fn pseudo() -> bool {
        false
    }

    pub fn ip() -> String {
        "127.0.0.1".to_owned()
    }

    pub fn port() -> u16 {
        9000
    }

    pub fn server_port() -> u16 {
        9000
    }
}
