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
use eau2_storage::error::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataFrameError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Serial(#[from] SerialError),

    #[error("failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed input at line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

pub type DataFrameResult<T> = std::result::Result<T, DataFrameError>;
