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

use eau2_common::error::SerialError;
use eau2_common::types::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("network i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode inbound frame: {0}")]
    Serial(#[from] SerialError),

    #[error("unknown message kind: {0}")]
    UnknownMessageKind(u64),

    #[error("no such node in the cluster: {0}")]
    UnknownNode(NodeId),

    #[error("node {0} has not registered yet")]
    Unregistered(NodeId),

    #[error("the network channel is closed")]
    Closed,
}

pub type NetworkResult<T> = std::result::Result<T, NetworkError>;
