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

//! Distributed word count: node 0 streams the input file into a
//! single-column table, every node counts its locally-homed chunks,
//! node 0 merges the per-node maps.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use eau2_common::array::Row;
use eau2_common::types::{Key, NodeId};
use eau2_dataframe::distributed::DistributedDataFrame;
use eau2_dataframe::{Application, DataFrameStore, Rower, Writer};

/// Streams whitespace-separated words out of a file, one row each.
struct FileReader {
    lines: Lines<BufReader<File>>,
    pending: Vec<String>,
    next: usize,
}

impl FileReader {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let lines = BufReader::new(File::open(path)?).lines();
        let mut reader = Self {
            lines,
            pending: Vec::new(),
            next: 0,
        };
        reader.refill();
        Ok(reader)
    }

    fn refill(&mut self) {
        while self.next >= self.pending.len() {
            match self.lines.next() {
                Some(Ok(line)) => {
                    self.pending = line.split_whitespace().map(str::to_owned).collect();
                    self.next = 0;
                }
                Some(Err(err)) => {
                    tracing::warn!(%err, "stopping at unreadable input line");
                    self.pending.clear();
                    self.next = 0;
                    return;
                }
                None => {
                    self.pending.clear();
                    self.next = 0;
                    return;
                }
            }
        }
    }
}

impl Writer for FileReader {
    fn visit(&mut self, row: &mut Row) {
        row.set_str(0, self.pending[self.next].clone());
        self.next += 1;
        self.refill();
    }

    fn done(&mut self) -> bool {
        self.next >= self.pending.len()
    }
}

/// Counts each word it sees.
struct Adder {
    counts: HashMap<String, i32>,
    words_seen: usize,
}

impl Rower for Adder {
    fn accept(&mut self, row: &Row) -> bool {
        *self.counts.entry(row.get_str(0).to_owned()).or_insert(0) += 1;
        self.words_seen += 1;
        false
    }
}

/// Replays a count map as (word, count) rows.
struct Summer {
    entries: Vec<(String, i32)>,
    next: usize,
}

impl Writer for Summer {
    fn visit(&mut self, row: &mut Row) {
        let (word, count) = &self.entries[self.next];
        row.set_str(0, word.clone());
        row.set_int(1, *count);
        self.next += 1;
    }

    fn done(&mut self) -> bool {
        self.next >= self.entries.len()
    }
}

/// Merges per-node (word, count) tables.
struct Merger {
    counts: HashMap<String, i32>,
}

impl Rower for Merger {
    fn accept(&mut self, row: &Row) -> bool {
        *self.counts.entry(row.get_str(0).to_owned()).or_insert(0) += row.get_int(1);
        false
    }
}

fn data_key() -> Key {
    Key::new("data", 0)
}

fn partial_key(node: NodeId) -> Key {
    Key::new(format!("wc-map-{}", node), node)
}

pub async fn run(app: &Application, file: Option<PathBuf>) -> anyhow::Result<()> {
    if app.this_node() == 0 {
        let path = file.ok_or_else(|| anyhow::anyhow!("word count needs --file on node 0"))?;
        let mut reader = FileReader::open(&path)?;
        let df =
            DistributedDataFrame::from_visitor(&data_key(), app.this_store(), "S", &mut reader)
                .await?;
        tracing::info!(words = df.nrows(), "input distributed");
    }

    local_count(app).await?;

    if app.this_node() == 0 {
        reduce(app).await?;
        app.stop_all().await?;
    } else {
        app.await_stop().await;
    }
    Ok(())
}

/// Counts words over the chunks homed on this node and publishes the
/// partial map.
async fn local_count(app: &Application) -> anyhow::Result<()> {
    let mut words = app.this_store().get_and_wait(&data_key()).await?;
    let mut adder = Adder {
        counts: HashMap::new(),
        words_seen: 0,
    };
    words.local_map(&mut adder).await?;
    tracing::info!(
        node = app.this_node(),
        distinct = adder.counts.len(),
        total = adder.words_seen,
        "local count finished"
    );

    let mut summer = Summer {
        entries: adder.counts.into_iter().collect(),
        next: 0,
    };
    DistributedDataFrame::from_visitor(
        &partial_key(app.this_node()),
        app.this_store(),
        "SI",
        &mut summer,
    )
    .await?;
    Ok(())
}

/// Gathers every node's partial map into one.
async fn reduce(app: &Application) -> anyhow::Result<()> {
    let mut merger = Merger {
        counts: HashMap::new(),
    };
    for node in 0..app.num_nodes() as NodeId {
        let mut partial = app.this_store().get_and_wait(&partial_key(node)).await?;
        partial.distributed_map(&mut merger).await?;
    }
    let total: i64 = merger.counts.values().map(|c| *c as i64).sum();
    tracing::info!(distinct = merger.counts.len(), total, "word count complete");
    Ok(())
}
