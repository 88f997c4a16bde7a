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

use super::Schema;
use crate::types::{ColumnType, Datum, Scalar};

/// A field visitor invoked by [`Row::visit`], yielding fields in column
/// order.
pub trait Fielder {
    /// Called before the fields, with the row's offset in the frame.
    fn start(&mut self, _idx: usize) {}

    fn accept_bool(&mut self, _v: bool) {}
    fn accept_int(&mut self, _v: i32) {}
    fn accept_float(&mut self, _v: f32) {}
    fn accept_str(&mut self, _v: &str) {}
    fn accept_missing(&mut self) {}

    /// Called after all fields have been seen.
    fn done(&mut self) {}
}

/// A single row shaped by a schema: one datum slot per column plus an
/// informational row index. Reading a missing slot yields the type
/// default.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    types: Vec<ColumnType>,
    values: Vec<Datum>,
    idx: usize,
}

impl Row {
    /// Builds a row following a schema, every slot missing.
    pub fn new(schema: &Schema) -> Self {
        Self {
            types: schema.types().to_vec(),
            values: vec![None; schema.width()],
            idx: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.types.len()
    }

    pub fn col_type(&self, col: usize) -> ColumnType {
        self.types[col]
    }

    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn set_idx(&mut self, idx: usize) {
        self.idx = idx;
    }

    fn check(&self, col: usize, ty: ColumnType) {
        assert_eq!(
            self.types[col], ty,
            "column {} is {}, not {}",
            col, self.types[col], ty
        );
    }

    pub fn set_bool(&mut self, col: usize, v: bool) {
        self.check(col, ColumnType::Bool);
        self.values[col] = Some(Scalar::Bool(v));
    }

    pub fn set_int(&mut self, col: usize, v: i32) {
        self.check(col, ColumnType::Int);
        self.values[col] = Some(Scalar::Int(v));
    }

    pub fn set_float(&mut self, col: usize, v: f32) {
        self.check(col, ColumnType::Float);
        self.values[col] = Some(Scalar::Float(v));
    }

    pub fn set_str(&mut self, col: usize, v: impl Into<String>) {
        self.check(col, ColumnType::Str);
        self.values[col] = Some(Scalar::Str(v.into()));
    }

    pub fn set_missing(&mut self, col: usize) {
        assert!(col < self.width(), "column {} out of bounds", col);
        self.values[col] = None;
    }

    pub fn set_datum(&mut self, col: usize, datum: Datum) {
        if let Some(scalar) = &datum {
            self.check(col, scalar.column_type());
        }
        self.values[col] = datum;
    }

    pub fn is_missing(&self, col: usize) -> bool {
        self.values[col].is_none()
    }

    pub fn datum(&self, col: usize) -> &Datum {
        &self.values[col]
    }

    pub fn get_bool(&self, col: usize) -> bool {
        self.check(col, ColumnType::Bool);
        match &self.values[col] {
            Some(Scalar::Bool(v)) => *v,
            _ => false,
        }
    }

    pub fn get_int(&self, col: usize) -> i32 {
        self.check(col, ColumnType::Int);
        match &self.values[col] {
            Some(Scalar::Int(v)) => *v,
            _ => 0,
        }
    }

    pub fn get_float(&self, col: usize) -> f32 {
        self.check(col, ColumnType::Float);
        match &self.values[col] {
            Some(Scalar::Float(v)) => *v,
            _ => 0.0,
        }
    }

    pub fn get_str(&self, col: usize) -> &str {
        self.check(col, ColumnType::Str);
        match &self.values[col] {
            Some(Scalar::Str(v)) => v,
            _ => "",
        }
    }

    /// Yields every field to the fielder, in column order.
    pub fn visit(&self, fielder: &mut dyn Fielder) {
        fielder.start(self.idx);
        for col in 0..self.width() {
            match &self.values[col] {
                None => fielder.accept_missing(),
                Some(Scalar::Bool(v)) => fielder.accept_bool(*v),
                Some(Scalar::Int(v)) => fielder.accept_int(*v),
                Some(Scalar::Float(v)) => fielder.accept_float(*v),
                Some(Scalar::Str(v)) => fielder.accept_str(v),
            }
        }
        fielder.done();
    }
}
