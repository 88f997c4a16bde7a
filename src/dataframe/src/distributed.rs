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

//! The distributed data frame: the same read surface as a local frame
//! over a table scattered chunk-by-chunk across the cluster. Each
//! column keeps a one-chunk window that is reloaded lazily on reads.

use std::path::Path;

use async_trait::async_trait;
use eau2_common::array::{Column, FloatColumn, Row, Schema};
use eau2_common::serial::Serial;
use eau2_common::types::{Key, NodeId, Value};
use eau2_storage::KVStoreRef;

use crate::error::DataFrameResult;
use crate::sor::SorReader;
use crate::visitor::{Rower, Writer};

/// Rows per chunk. Every peer derives chunk boundaries from this
/// constant, so it is fixed at compile time.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// One column's sliding window: the chunk currently held locally.
#[derive(Debug)]
struct ChunkWindow {
    column: Column,
    loaded: usize,
    /// Set while no load has happened yet (or after a factory reset);
    /// any read forces a load regardless of `loaded`.
    must_load: bool,
}

pub struct DistributedDataFrame {
    key: Key,
    /// The true schema: its length is the logical row count of the
    /// whole table, not of the loaded windows.
    schema: Schema,
    store: KVStoreRef,
    windows: Vec<ChunkWindow>,
}

impl DistributedDataFrame {
    /// Wires a frame over an already-stored table. Every window starts
    /// unloaded.
    pub fn open(key: Key, schema: Schema, store: KVStoreRef) -> Self {
        let windows = schema
            .types()
            .iter()
            .map(|ty| ChunkWindow {
                column: Column::new(*ty),
                loaded: 0,
                must_load: true,
            })
            .collect();
        Self {
            key,
            schema,
            store,
            windows,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn nrows(&self) -> usize {
        self.schema.length()
    }

    pub fn ncols(&self) -> usize {
        self.schema.width()
    }

    pub fn num_chunks(&self) -> usize {
        (self.nrows() + CHUNK_SIZE - 1) / CHUNK_SIZE
    }

    /// The key of chunk `chunk` of column `col` for a table rooted at
    /// `root`. Placement is round-robin from the root's home node, so
    /// every reader computes it without a directory.
    pub fn chunk_key(root: &Key, col: usize, chunk: usize, num_nodes: usize) -> Key {
        let home = ((root.node() as usize + chunk) % num_nodes) as NodeId;
        Key::new(
            format!("{}-column{}-chunk{}", root.name(), col, chunk),
            home,
        )
    }

    /// Whether `chunk` is homed on this node.
    pub fn is_locally_stored(&self, chunk: usize) -> bool {
        let num_nodes = self.store.num_nodes();
        (self.key.node() as usize + chunk) % num_nodes == self.store.index() as usize
    }

    async fn load_chunk(&mut self, col: usize, chunk: usize) -> DataFrameResult<()> {
        let chunk_key = Self::chunk_key(&self.key, col, chunk, self.store.num_nodes());
        let value = self.store.get_and_wait_value(&chunk_key).await?;
        let column = Column::from_bytes(value.blob())?;
        assert_eq!(
            column.column_type(),
            self.schema.col_type(col),
            "chunk {} does not match the schema",
            chunk_key
        );
        let window = &mut self.windows[col];
        window.column = column;
        window.loaded = chunk;
        window.must_load = false;
        Ok(())
    }

    async fn ensure_loaded(&mut self, col: usize, chunk: usize) -> DataFrameResult<()> {
        let window = &self.windows[col];
        if window.must_load || window.loaded != chunk {
            self.load_chunk(col, chunk).await?;
        }
        Ok(())
    }

    pub async fn get_bool(&mut self, col: usize, row: usize) -> DataFrameResult<bool> {
        assert!(row < self.nrows(), "row {} out of bounds", row);
        self.ensure_loaded(col, row / CHUNK_SIZE).await?;
        Ok(*self.windows[col].column.as_bool().get(row % CHUNK_SIZE))
    }

    pub async fn get_int(&mut self, col: usize, row: usize) -> DataFrameResult<i32> {
        assert!(row < self.nrows(), "row {} out of bounds", row);
        self.ensure_loaded(col, row / CHUNK_SIZE).await?;
        Ok(*self.windows[col].column.as_int().get(row % CHUNK_SIZE))
    }

    pub async fn get_float(&mut self, col: usize, row: usize) -> DataFrameResult<f32> {
        assert!(row < self.nrows(), "row {} out of bounds", row);
        self.ensure_loaded(col, row / CHUNK_SIZE).await?;
        Ok(*self.windows[col].column.as_float().get(row % CHUNK_SIZE))
    }

    pub async fn get_str(&mut self, col: usize, row: usize) -> DataFrameResult<String> {
        assert!(row < self.nrows(), "row {} out of bounds", row);
        self.ensure_loaded(col, row / CHUNK_SIZE).await?;
        Ok(self.windows[col].column.as_str().get(row % CHUNK_SIZE).clone())
    }

    pub async fn is_missing(&mut self, col: usize, row: usize) -> DataFrameResult<bool> {
        assert!(row < self.nrows(), "row {} out of bounds", row);
        self.ensure_loaded(col, row / CHUNK_SIZE).await?;
        Ok(self.windows[col].column.is_missing(row % CHUNK_SIZE))
    }

    /// Populates `row` from global row `idx`, loading every column's
    /// window onto the covering chunk first.
    pub async fn fill_row(&mut self, idx: usize, row: &mut Row) -> DataFrameResult<()> {
        assert!(idx < self.nrows(), "row {} out of bounds", idx);
        let chunk = idx / CHUNK_SIZE;
        for col in 0..self.ncols() {
            self.ensure_loaded(col, chunk).await?;
        }
        row.set_idx(idx);
        for col in 0..self.ncols() {
            row.set_datum(col, self.windows[col].column.datum_at(idx % CHUNK_SIZE));
        }
        Ok(())
    }

    /// Visits the rows of one chunk in order, clamping the last chunk
    /// to the logical length.
    async fn map_chunk(
        &mut self,
        chunk: usize,
        row: &mut Row,
        rower: &mut dyn Rower,
    ) -> DataFrameResult<()> {
        for col in 0..self.ncols() {
            self.ensure_loaded(col, chunk).await?;
        }
        let start = chunk * CHUNK_SIZE;
        let end = self.nrows().min(start + CHUNK_SIZE);
        for idx in start..end {
            row.set_idx(idx);
            for col in 0..self.ncols() {
                row.set_datum(col, self.windows[col].column.datum_at(idx % CHUNK_SIZE));
            }
            rower.accept(row);
        }
        Ok(())
    }

    /// Visits every row of every locally-homed chunk, in chunk order.
    pub async fn local_map(&mut self, rower: &mut dyn Rower) -> DataFrameResult<()> {
        let mut row = Row::new(&self.schema);
        for chunk in 0..self.num_chunks() {
            if self.is_locally_stored(chunk) {
                self.map_chunk(chunk, &mut row, rower).await?;
            }
        }
        Ok(())
    }

    /// Visits every row of every chunk, fetching remote chunks as it
    /// goes. Runs entirely on the caller's task; rowers are never
    /// cloned.
    pub async fn distributed_map(&mut self, rower: &mut dyn Rower) -> DataFrameResult<()> {
        let mut row = Row::new(&self.schema);
        for chunk in 0..self.num_chunks() {
            self.map_chunk(chunk, &mut row, rower).await?;
        }
        Ok(())
    }

    /// Builds and distributes a single-column float table, then stores
    /// the root schema at `key`.
    pub async fn from_array(
        key: &Key,
        store: &KVStoreRef,
        values: &[f32],
    ) -> DataFrameResult<Self> {
        let num_nodes = store.num_nodes();
        for (chunk, slice) in values.chunks(CHUNK_SIZE).enumerate() {
            let column: FloatColumn = slice.iter().copied().collect();
            let chunk_key = Self::chunk_key(key, 0, chunk, num_nodes);
            store
                .put(chunk_key, Value::new(Column::Float(column).to_bytes()))
                .await?;
        }
        let mut schema = Schema::from_types("F");
        schema.grow_rows(values.len());
        store.put(key.clone(), Value::new(schema.to_bytes())).await?;
        Ok(Self::open(key.clone(), schema, store.clone()))
    }

    /// Stores a 1x1 float table whose single chunk lives at the root
    /// key's own node.
    pub async fn from_scalar(key: &Key, store: &KVStoreRef, value: f32) -> DataFrameResult<Self> {
        Self::from_array(key, store, &[value]).await
    }

    /// Drives the writer until exhausted, distributing one chunk per
    /// column for every `CHUNK_SIZE` completed rows and once more for
    /// the final partial batch, then stores the root schema.
    pub async fn from_visitor(
        key: &Key,
        store: &KVStoreRef,
        types: &str,
        writer: &mut dyn Writer,
    ) -> DataFrameResult<Self> {
        let template = Schema::from_types(types);
        let num_nodes = store.num_nodes();
        let mut columns: Vec<Column> = template.types().iter().map(|ty| Column::new(*ty)).collect();
        let mut row = Row::new(&template);
        let mut total = 0usize;
        let mut chunk = 0usize;
        let mut in_batch = 0usize;

        while !writer.done() {
            writer.visit(&mut row);
            for (col, column) in columns.iter_mut().enumerate() {
                column.push_datum(row.datum(col));
            }
            total += 1;
            in_batch += 1;
            if in_batch == CHUNK_SIZE {
                Self::distribute_batch(key, store, &mut columns, chunk, num_nodes).await?;
                chunk += 1;
                in_batch = 0;
            }
        }
        if in_batch > 0 {
            Self::distribute_batch(key, store, &mut columns, chunk, num_nodes).await?;
        }

        let mut schema = template;
        schema.grow_rows(total);
        store.put(key.clone(), Value::new(schema.to_bytes())).await?;
        tracing::debug!(key = %key, rows = total, "distributed table stored");
        Ok(Self::open(key.clone(), schema, store.clone()))
    }

    /// Streams an SoR text file, inferring the schema from its leading
    /// lines, and distributes it with the same chunking rule. A
    /// malformed line or a read fault mid-file fails the whole load.
    pub async fn from_file(
        path: impl AsRef<Path>,
        key: &Key,
        store: &KVStoreRef,
    ) -> DataFrameResult<Self> {
        let mut reader = SorReader::open(path)?;
        let types = reader.types_string();
        let df = Self::from_visitor(key, store, &types, &mut reader).await?;
        reader.take_error()?;
        Ok(df)
    }

    /// Ships every column's accumulated batch as chunk `chunk` and
    /// resets the local columns to empty.
    async fn distribute_batch(
        key: &Key,
        store: &KVStoreRef,
        columns: &mut [Column],
        chunk: usize,
        num_nodes: usize,
    ) -> DataFrameResult<()> {
        for (col, column) in columns.iter_mut().enumerate() {
            let ty = column.column_type();
            let full = std::mem::replace(column, Column::new(ty));
            let chunk_key = Self::chunk_key(key, col, chunk, num_nodes);
            store.put(chunk_key, Value::new(full.to_bytes())).await?;
        }
        Ok(())
    }
}

/// The store-side conveniences: fetch a root schema and hand back a
/// frame pre-wired for lazy chunk loading.
#[async_trait]
pub trait DataFrameStore {
    /// Local-only; the root schema must already be present.
    fn get(&self, key: &Key) -> DataFrameResult<DistributedDataFrame>;

    /// Blocks until the root schema exists, fetching remotely when the
    /// key is homed elsewhere.
    async fn get_and_wait(&self, key: &Key) -> DataFrameResult<DistributedDataFrame>;
}

#[async_trait]
impl DataFrameStore for KVStoreRef {
    fn get(&self, key: &Key) -> DataFrameResult<DistributedDataFrame> {
        let value = self.get_value(key)?;
        let schema = Schema::from_bytes(value.blob())?;
        Ok(DistributedDataFrame::open(key.clone(), schema, self.clone()))
    }

    async fn get_and_wait(&self, key: &Key) -> DataFrameResult<DistributedDataFrame> {
        let value = self.get_and_wait_value(key).await?;
        let schema = Schema::from_bytes(value.blob())?;
        Ok(DistributedDataFrame::open(key.clone(), schema, self.clone()))
    }
}
