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

//! The tagged messages nodes exchange. Every message shares the
//! `[kind][sender][target][id]` header, four wire words; the payload is
//! variant-specific. The decoder peeks the kind word to pick a variant.

use eau2_common::error::SerialResult;
use eau2_common::serial::{Deserializer, Serial, Serializer};
use eau2_common::types::{Key, NodeId, Value};

use crate::error::{NetworkError, NetworkResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum MsgKind {
    Status = 0,
    Register = 1,
    Directory = 2,
    Get = 3,
    Put = 4,
    Reply = 5,
    Kill = 6,
}

impl MsgKind {
    fn from_u64(v: u64) -> NetworkResult<Self> {
        Ok(match v {
            0 => MsgKind::Status,
            1 => MsgKind::Register,
            2 => MsgKind::Directory,
            3 => MsgKind::Get,
            4 => MsgKind::Put,
            5 => MsgKind::Reply,
            6 => MsgKind::Kill,
            other => return Err(NetworkError::UnknownMessageKind(other)),
        })
    }
}

/// Variant payloads. `Status`, `Register` and `Directory` only matter
/// during diagnostics and bring-up; the KV servicer ignores them in
/// steady state.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Status(String),
    Register { host: String, port: u16 },
    Directory { hosts: Vec<String>, ports: Vec<u16> },
    Get(Key),
    Put(Key, Value),
    Reply(Key, Value),
    Kill,
}

impl Body {
    pub fn kind(&self) -> MsgKind {
        match self {
            Body::Status(_) => MsgKind::Status,
            Body::Register { .. } => MsgKind::Register,
            Body::Directory { .. } => MsgKind::Directory,
            Body::Get(_) => MsgKind::Get,
            Body::Put(..) => MsgKind::Put,
            Body::Reply(..) => MsgKind::Reply,
            Body::Kill => MsgKind::Kill,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub sender: NodeId,
    pub target: NodeId,
    pub id: u64,
    pub body: Body,
}

impl Message {
    pub fn new(sender: NodeId, target: NodeId, id: u64, body: Body) -> Self {
        Self {
            sender,
            target,
            id,
            body,
        }
    }

    pub fn kind(&self) -> MsgKind {
        self.body.kind()
    }

    pub fn encode(&self) -> bytes::Bytes {
        let mut ser = Serializer::new();
        self.serialize(&mut ser);
        ser.finish()
    }

    pub fn decode(bytes: &[u8]) -> NetworkResult<Self> {
        let mut de = Deserializer::new(bytes);
        // Peek the kind word first so an unknown variant surfaces as a
        // protocol violation rather than a buffer fault downstream.
        MsgKind::from_u64(de.peek_u64()?)?;
        Ok(Self::deserialize(&mut de)?)
    }
}

impl Serial for Message {
    fn serialize(&self, ser: &mut Serializer) {
        ser.put_u64(self.kind() as u64);
        ser.put_u64(self.sender as u64);
        ser.put_u64(self.target as u64);
        ser.put_u64(self.id);
        match &self.body {
            Body::Status(msg) => ser.put_str(msg),
            Body::Register { host, port } => {
                ser.put_str(host);
                ser.put_u64(*port as u64);
            }
            Body::Directory { hosts, ports } => {
                ser.put_usize(hosts.len());
                for host in hosts {
                    ser.put_str(host);
                }
                for port in ports {
                    ser.put_u64(*port as u64);
                }
            }
            Body::Get(key) => key.serialize(ser),
            Body::Put(key, value) | Body::Reply(key, value) => {
                key.serialize(ser);
                value.serialize(ser);
            }
            Body::Kill => {}
        }
    }

    fn deserialize(de: &mut Deserializer<'_>) -> SerialResult<Self> {
        let kind = de.read_u64()?;
        let sender = de.read_u64()? as NodeId;
        let target = de.read_u64()? as NodeId;
        let id = de.read_u64()?;
        // The caller already validated the kind word via peek; anything
        // slipping through here is unreachable by construction.
        let kind = MsgKind::from_u64(kind).expect("kind validated by peek");
        let body = match kind {
            MsgKind::Status => Body::Status(de.read_str()?),
            MsgKind::Register => Body::Register {
                host: de.read_str()?,
                port: de.read_u64()? as u16,
            },
            MsgKind::Directory => {
                let count = de.read_usize()?;
                let mut hosts = Vec::with_capacity(count);
                for _ in 0..count {
                    hosts.push(de.read_str()?);
                }
                let mut ports = Vec::with_capacity(count);
                for _ in 0..count {
                    ports.push(de.read_u64()? as u16);
                }
                Body::Directory { hosts, ports }
            }
            MsgKind::Get => Body::Get(Key::deserialize(de)?),
            MsgKind::Put => Body::Put(Key::deserialize(de)?, Value::deserialize(de)?),
            MsgKind::Reply => Body::Reply(Key::deserialize(de)?, Value::deserialize(de)?),
            MsgKind::Kill => Body::Kill,
        };
        Ok(Self {
            sender,
            target,
            id,
            body,
        })
    }
}
