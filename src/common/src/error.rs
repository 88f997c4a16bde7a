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

use thiserror::Error;

/// Faults raised by the serialization framework. Callers that hold a
/// precondition (a buffer they just produced) may unwrap; everything
/// arriving off the wire propagates with `?` and aborts at the top.
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("read past end of buffer: need {need} bytes at offset {offset}, {len} total")]
    UnexpectedEof {
        offset: usize,
        need: usize,
        len: usize,
    },

    #[error("unknown column type tag: {0:#x}")]
    UnknownTypeTag(u8),

    #[error("string payload is not valid utf-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

pub type SerialResult<T> = std::result::Result<T, SerialError>;
