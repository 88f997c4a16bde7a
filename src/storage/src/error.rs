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
use eau2_common::types::Key;
use eau2_network::error::NetworkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// A local get found nothing. Callers without a presence
    /// precondition must use `get_and_wait_value`.
    #[error("key not present in this store: {0}")]
    KeyNotFound(Key),

    #[error("store is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Serial(#[from] SerialError),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
