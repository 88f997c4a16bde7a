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

use std::fmt;

use bytes::Bytes;

use crate::error::{SerialError, SerialResult};
use crate::serial::{Deserializer, Serial, Serializer};

/// Index of a node within the cluster.
pub type NodeId = u32;

/// The four element types a column may hold, tagged `B`, `I`, `F`, `S`
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Str,
}

impl ColumnType {
    pub fn tag(self) -> u8 {
        match self {
            ColumnType::Bool => b'B',
            ColumnType::Int => b'I',
            ColumnType::Float => b'F',
            ColumnType::Str => b'S',
        }
    }

    pub fn from_tag(tag: u8) -> SerialResult<Self> {
        match tag {
            b'B' => Ok(ColumnType::Bool),
            b'I' => Ok(ColumnType::Int),
            b'F' => Ok(ColumnType::Float),
            b'S' => Ok(ColumnType::Str),
            other => Err(SerialError::UnknownTypeTag(other)),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag() as char)
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
}

impl Scalar {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Scalar::Bool(_) => ColumnType::Bool,
            Scalar::Int(_) => ColumnType::Int,
            Scalar::Float(_) => ColumnType::Float,
            Scalar::Str(_) => ColumnType::Str,
        }
    }
}

/// A cell value or missing.
pub type Datum = Option<Scalar>;

/// Names a logical cell and the node that owns it. Keys are value
/// types: equality and hashing are over both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    name: String,
    node: NodeId,
}

impl Key {
    pub fn new(name: impl Into<String>, node: NodeId) -> Self {
        Self {
            name: name.into(),
            node,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.node)
    }
}

impl Serial for Key {
    fn serialize(&self, ser: &mut Serializer) {
        ser.put_str(&self.name);
        ser.put_u64(self.node as u64);
    }

    fn deserialize(de: &mut Deserializer<'_>) -> SerialResult<Self> {
        let name = de.read_str()?;
        let node = de.read_u64()? as NodeId;
        Ok(Self { name, node })
    }
}

/// An opaque serialized blob. Transfer across the network is by
/// serialize-then-reconstruct; clones share the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value(Bytes);

impl Value {
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn blob(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for Value {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl Serial for Value {
    fn serialize(&self, ser: &mut Serializer) {
        ser.put_usize(self.0.len());
        ser.put_raw(&self.0);
    }

    fn deserialize(de: &mut Deserializer<'_>) -> SerialResult<Self> {
        let len = de.read_usize()?;
        let blob = de.read_raw(len)?;
        Ok(Self(Bytes::copy_from_slice(blob)))
    }
}
