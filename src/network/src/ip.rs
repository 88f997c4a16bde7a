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

//! TCP transport. Node 0 is the rendezvous: every other node announces
//! itself with `Register`, node 0 answers with the cluster `Directory`.
//! After bring-up each message travels over its own short-lived
//! connection as a `[length: word][payload]` frame.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use eau2_common::types::NodeId;
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{NetworkError, NetworkResult};
use crate::message::{Body, Message};
use crate::Network;

pub struct IpNetwork {
    index: NodeId,
    num_nodes: usize,
    listener: TcpListener,
    /// Address other nodes can reach this node at.
    advertised: SocketAddr,
    /// Peer addresses by node index, filled during bring-up.
    peers: RwLock<Vec<Option<SocketAddr>>>,
    next_id: AtomicU64,
}

impl IpNetwork {
    /// Binds the node's listener. `server` is node 0's address; node 0
    /// passes its own.
    pub async fn bind(
        index: NodeId,
        num_nodes: usize,
        ip: &str,
        port: u16,
        server_ip: &str,
        server_port: u16,
    ) -> NetworkResult<Self> {
        assert!((index as usize) < num_nodes, "node index outside cluster");
        let listener = TcpListener::bind((ip, port)).await?;
        // Re-read the local address so an ephemeral port (0) is
        // advertised correctly.
        let advertised = listener.local_addr()?;

        let mut peers = vec![None; num_nodes];
        peers[index as usize] = Some(advertised);
        if index != 0 {
            peers[0] = Some(parse_addr(server_ip, server_port)?);
        }

        Ok(Self {
            index,
            num_nodes,
            listener,
            advertised,
            peers: RwLock::new(peers),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn advertised(&self) -> SocketAddr {
        self.advertised
    }

    fn peer(&self, node: NodeId) -> NetworkResult<SocketAddr> {
        self.peers
            .read()
            .get(node as usize)
            .ok_or(NetworkError::UnknownNode(node))?
            .ok_or(NetworkError::Unregistered(node))
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Node 0: collect one `Register` per peer, then broadcast the
    /// roster.
    async fn serve_rendezvous(&self) -> NetworkResult<()> {
        let mut registered = 0;
        while registered < self.num_nodes - 1 {
            let msg = self.recv().await?;
            match msg.body {
                Body::Register { host, port } => {
                    let addr = parse_addr(&host, port)?;
                    let mut peers = self.peers.write();
                    if peers[msg.sender as usize].replace(addr).is_none() {
                        registered += 1;
                    }
                    tracing::info!(node = msg.sender, %addr, "node registered");
                }
                other => {
                    tracing::warn!(kind = ?other.kind(), "ignoring message during bring-up");
                }
            }
        }

        let (hosts, ports) = {
            let peers = self.peers.read();
            let addrs: Vec<_> = peers.iter().map(|a| a.expect("roster complete")).collect();
            (
                addrs.iter().map(|a| a.ip().to_string()).collect::<Vec<_>>(),
                addrs.iter().map(|a| a.port()).collect::<Vec<_>>(),
            )
        };
        for node in 1..self.num_nodes as NodeId {
            self.send(Message::new(
                self.index,
                node,
                self.next_id(),
                Body::Directory {
                    hosts: hosts.clone(),
                    ports: ports.clone(),
                },
            ))
            .await?;
        }
        tracing::info!(num_nodes = self.num_nodes, "cluster roster broadcast");
        Ok(())
    }

    /// Non-zero node: announce, then wait for the roster.
    async fn join_rendezvous(&self) -> NetworkResult<()> {
        self.send(Message::new(
            self.index,
            0,
            self.next_id(),
            Body::Register {
                host: self.advertised.ip().to_string(),
                port: self.advertised.port(),
            },
        ))
        .await?;

        loop {
            let msg = self.recv().await?;
            match msg.body {
                Body::Directory { hosts, ports } if msg.sender == 0 => {
                    assert_eq!(hosts.len(), self.num_nodes, "directory size mismatch");
                    let mut peers = self.peers.write();
                    for (node, (host, port)) in hosts.iter().zip(ports.iter()).enumerate() {
                        peers[node] = Some(parse_addr(host, *port)?);
                    }
                    tracing::info!(peers = self.num_nodes - 1, "registered with rendezvous");
                    return Ok(());
                }
                other => {
                    tracing::warn!(kind = ?other.kind(), "ignoring message during bring-up");
                }
            }
        }
    }
}

#[async_trait]
impl Network for IpNetwork {
    async fn register(&self) -> NetworkResult<()> {
        if self.num_nodes == 1 {
            return Ok(());
        }
        if self.index == 0 {
            self.serve_rendezvous().await
        } else {
            self.join_rendezvous().await
        }
    }

    fn index(&self) -> NodeId {
        self.index
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    async fn send(&self, msg: Message) -> NetworkResult<()> {
        let addr = self.peer(msg.target)?;
        let mut stream = TcpStream::connect(addr).await?;
        let payload = msg.encode();
        stream.write_all(&(payload.len() as u64).to_ne_bytes()).await?;
        stream.write_all(&payload).await?;
        stream.shutdown().await?;
        Ok(())
    }

    async fn recv(&self) -> NetworkResult<Message> {
        let (mut stream, _) = self.listener.accept().await?;
        let mut len_bytes = [0u8; 8];
        stream.read_exact(&mut len_bytes).await?;
        let len = u64::from_ne_bytes(len_bytes) as usize;
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await?;
        Message::decode(&payload)
    }
}

fn parse_addr(host: &str, port: u16) -> NetworkResult<SocketAddr> {
    let ip = host
        .parse()
        .map_err(|_| NetworkError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid peer address: {}:{}", host, port),
        )))?;
    Ok(SocketAddr::new(ip, port))
}
