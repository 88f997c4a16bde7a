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

//! The local data frame: columns of equal length under a schema.

use eau2_common::array::{Column, Row, Schema};

use crate::visitor::{ParallelRower, Rower};

/// Below this many rows per worker, `pmap` stays sequential.
pub const MIN_ROWS_PER_THREAD: usize = 500_000;

/// Upper bound on `pmap` workers.
pub const MAX_THREADS: usize = 8;

/// A table of typed columns of equal length. Not thread-safe; `pmap`
/// parallelizes by handing disjoint row ranges to its workers.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    schema: Schema,
    columns: Vec<Column>,
}

impl DataFrame {
    /// A frame with the schema's columns, all empty.
    pub fn from_schema(schema: &Schema) -> Self {
        let mut schema = schema.clone();
        schema.clear_rows();
        let columns = schema.types().iter().map(|ty| Column::new(*ty)).collect();
        Self { schema, columns }
    }

    /// A frame with the same columns as `other` but no rows.
    pub fn from_frame(other: &DataFrame) -> Self {
        Self::from_schema(&other.schema)
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

    pub fn column(&self, col: usize) -> &Column {
        &self.columns[col]
    }

    /// Appends a column. The first non-empty column grows the logical
    /// length to match; afterwards every column must arrive at exactly
    /// the current length.
    pub fn add_column(&mut self, column: Column) {
        if self.columns.is_empty() {
            self.schema.grow_rows(column.len());
        } else {
            assert_eq!(
                column.len(),
                self.nrows(),
                "column length does not match the frame"
            );
        }
        self.schema.add_column(column.column_type());
        self.columns.push(column);
    }

    /// Appends the row's values to every column, honoring missing
    /// flags. The row must match the schema.
    pub fn add_row(&mut self, row: &Row) {
        assert_eq!(row.width(), self.ncols(), "row width does not match");
        for (col, column) in self.columns.iter_mut().enumerate() {
            column.push_datum(row.datum(col));
        }
        self.schema.add_row();
    }

    /// Populates `row` from the values at `idx` and records the index.
    pub fn fill_row(&self, idx: usize, row: &mut Row) {
        assert!(idx < self.nrows(), "row {} out of bounds", idx);
        row.set_idx(idx);
        for (col, column) in self.columns.iter().enumerate() {
            row.set_datum(col, column.datum_at(idx));
        }
    }

    pub fn get_bool(&self, col: usize, row: usize) -> bool {
        *self.columns[col].as_bool().get(row)
    }

    pub fn get_int(&self, col: usize, row: usize) -> i32 {
        *self.columns[col].as_int().get(row)
    }

    pub fn get_float(&self, col: usize, row: usize) -> f32 {
        *self.columns[col].as_float().get(row)
    }

    pub fn get_str(&self, col: usize, row: usize) -> &str {
        self.columns[col].as_str().get(row)
    }

    pub fn is_missing(&self, col: usize, row: usize) -> bool {
        self.columns[col].is_missing(row)
    }

    pub fn set_bool(&mut self, col: usize, row: usize, v: bool) {
        self.columns[col].as_bool_mut().set(row, v);
    }

    pub fn set_int(&mut self, col: usize, row: usize, v: i32) {
        self.columns[col].as_int_mut().set(row, v);
    }

    pub fn set_float(&mut self, col: usize, row: usize, v: f32) {
        self.columns[col].as_float_mut().set(row, v);
    }

    pub fn set_str(&mut self, col: usize, row: usize, v: impl Into<String>) {
        self.columns[col].as_str_mut().set(row, v.into());
    }

    /// Visits rows 0..nrows in order.
    pub fn map<R: Rower + ?Sized>(&self, rower: &mut R) {
        let mut row = Row::new(&self.schema);
        for idx in 0..self.nrows() {
            self.fill_row(idx, &mut row);
            rower.accept(&row);
        }
    }

    /// A new frame holding exactly the rows the rower accepted, in
    /// order.
    pub fn filter<R: Rower + ?Sized>(&self, rower: &mut R) -> DataFrame {
        let mut out = DataFrame::from_schema(&self.schema);
        let mut row = Row::new(&self.schema);
        for idx in 0..self.nrows() {
            self.fill_row(idx, &mut row);
            if rower.accept(&row) {
                out.add_row(&row);
            }
        }
        out
    }

    /// Parallel `map`. Picks a worker count so each slice holds at
    /// least [`MIN_ROWS_PER_THREAD`] rows (else runs sequentially),
    /// runs the caller's rower on the first slice and clones on the
    /// rest, then reduces the clones right-to-left into the original.
    pub fn pmap(&self, rower: &mut dyn ParallelRower) {
        let nrows = self.nrows();
        let mut num_threads = 1;
        let mut rows_per_thread = nrows / num_threads + 1;
        while rows_per_thread >= MIN_ROWS_PER_THREAD * 2 && num_threads < MAX_THREADS {
            num_threads += 1;
            rows_per_thread = nrows / num_threads + 1;
        }
        if num_threads == 1 {
            self.map(rower);
            return;
        }

        let mut clones: Vec<Box<dyn ParallelRower>> = (1..num_threads)
            .map(|_| rower.clone_rower())
            .collect();

        std::thread::scope(|scope| {
            let mut workers: Vec<&mut dyn ParallelRower> = Vec::with_capacity(num_threads);
            workers.push(&mut *rower);
            for clone in clones.iter_mut() {
                workers.push(&mut **clone);
            }
            for (i, worker) in workers.into_iter().enumerate() {
                let start = i * rows_per_thread;
                let end = nrows.min(start + rows_per_thread);
                scope.spawn(move || {
                    let mut row = Row::new(&self.schema);
                    for idx in start..end {
                        self.fill_row(idx, &mut row);
                        worker.accept(&row);
                    }
                });
            }
        });

        while let Some(last) = clones.pop() {
            match clones.last_mut() {
                Some(prev) => prev.join(last),
                None => rower.join(last),
            }
        }
    }
}
