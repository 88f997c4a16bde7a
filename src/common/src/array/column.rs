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

use super::ChunkedArray;
use crate::error::SerialResult;
use crate::serial::{Deserializer, Serial, Serializer};
use crate::types::{ColumnType, Datum, Scalar};

/// An element type a column can hold.
pub trait ColumnValue: Clone + Default + PartialEq + std::fmt::Debug + Send {
    const TYPE: ColumnType;

    fn write(&self, ser: &mut Serializer);
    fn read(de: &mut Deserializer<'_>) -> SerialResult<Self>;

    fn to_scalar(&self) -> Scalar;
    /// Panics when the scalar is of a different type.
    fn from_scalar(scalar: &Scalar) -> Self;
}

impl ColumnValue for bool {
    const TYPE: ColumnType = ColumnType::Bool;

    fn write(&self, ser: &mut Serializer) {
        ser.put_bool(*self);
    }

    fn read(de: &mut Deserializer<'_>) -> SerialResult<Self> {
        de.read_bool()
    }

    fn to_scalar(&self) -> Scalar {
        Scalar::Bool(*self)
    }

    fn from_scalar(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Bool(v) => *v,
            other => panic!("expected a bool scalar, got {:?}", other),
        }
    }
}

impl ColumnValue for i32 {
    const TYPE: ColumnType = ColumnType::Int;

    fn write(&self, ser: &mut Serializer) {
        ser.put_i32(*self);
    }

    fn read(de: &mut Deserializer<'_>) -> SerialResult<Self> {
        de.read_i32()
    }

    fn to_scalar(&self) -> Scalar {
        Scalar::Int(*self)
    }

    fn from_scalar(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Int(v) => *v,
            other => panic!("expected an int scalar, got {:?}", other),
        }
    }
}

impl ColumnValue for f32 {
    const TYPE: ColumnType = ColumnType::Float;

    fn write(&self, ser: &mut Serializer) {
        ser.put_f32(*self);
    }

    fn read(de: &mut Deserializer<'_>) -> SerialResult<Self> {
        de.read_f32()
    }

    fn to_scalar(&self) -> Scalar {
        Scalar::Float(*self)
    }

    fn from_scalar(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Float(v) => *v,
            other => panic!("expected a float scalar, got {:?}", other),
        }
    }
}

impl ColumnValue for String {
    const TYPE: ColumnType = ColumnType::Str;

    fn write(&self, ser: &mut Serializer) {
        ser.put_str(self);
    }

    fn read(de: &mut Deserializer<'_>) -> SerialResult<Self> {
        de.read_str()
    }

    fn to_scalar(&self) -> Scalar {
        Scalar::Str(self.clone())
    }

    fn from_scalar(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Str(v) => v.clone(),
            other => panic!("expected a string scalar, got {:?}", other),
        }
    }
}

/// One column of a single element type: an append-only value sequence
/// plus a parallel missing bitmap. A missing slot holds the type default
/// so reads never branch.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedColumn<T: ColumnValue> {
    values: ChunkedArray<T>,
    missing: ChunkedArray<bool>,
}

impl<T: ColumnValue> Default for TypedColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ColumnValue> TypedColumn<T> {
    pub fn new() -> Self {
        Self {
            values: ChunkedArray::new(),
            missing: ChunkedArray::new(),
        }
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.values.len(), self.missing.len());
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, value: T) {
        self.values.push(value);
        self.missing.push(false);
    }

    pub fn push_missing(&mut self) {
        self.values.push(T::default());
        self.missing.push(true);
    }

    /// Returns the stored value, the type default when missing.
    pub fn get(&self, idx: usize) -> &T {
        self.values.get(idx)
    }

    pub fn set(&mut self, idx: usize, value: T) {
        self.values.set(idx, value);
        self.missing.set(idx, false);
    }

    pub fn set_missing(&mut self, idx: usize) {
        self.values.set(idx, T::default());
        self.missing.set(idx, true);
    }

    pub fn is_missing(&self, idx: usize) -> bool {
        *self.missing.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }
}

impl<T: ColumnValue> FromIterator<T> for TypedColumn<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut col = Self::new();
        for v in iter {
            col.push(v);
        }
        col
    }
}

impl<T: ColumnValue> Serial for TypedColumn<T> {
    /// `[type_tag][length][missing bitmap][all length values]`. Missing
    /// slots write their placeholder so the reader consumes a fixed
    /// count either way.
    fn serialize(&self, ser: &mut Serializer) {
        ser.put_u8(T::TYPE.tag());
        ser.put_usize(self.len());
        for missing in self.missing.iter() {
            ser.put_bool(*missing);
        }
        for value in self.values.iter() {
            value.write(ser);
        }
    }

    fn deserialize(de: &mut Deserializer<'_>) -> SerialResult<Self> {
        let tag = de.read_u8()?;
        let ty = ColumnType::from_tag(tag)?;
        assert_eq!(ty, T::TYPE, "column tag {} does not match target type", ty);
        Self::deserialize_body(de)
    }
}

impl<T: ColumnValue> TypedColumn<T> {
    /// Body decode after the tag byte was consumed by the dispatcher.
    fn deserialize_body(de: &mut Deserializer<'_>) -> SerialResult<Self> {
        let len = de.read_usize()?;
        let mut missing = ChunkedArray::new();
        for _ in 0..len {
            missing.push(de.read_bool()?);
        }
        let mut values = ChunkedArray::new();
        for _ in 0..len {
            values.push(T::read(de)?);
        }
        Ok(Self { values, missing })
    }
}

pub type BoolColumn = TypedColumn<bool>;
pub type IntColumn = TypedColumn<i32>;
pub type FloatColumn = TypedColumn<f32>;
pub type StrColumn = TypedColumn<String>;

/// Dynamic view over the four concrete columns. Typed narrowing panics
/// when misused; every other capability dispatches exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Bool(BoolColumn),
    Int(IntColumn),
    Float(FloatColumn),
    Str(StrColumn),
}

impl Column {
    pub fn new(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Bool => Column::Bool(BoolColumn::new()),
            ColumnType::Int => Column::Int(IntColumn::new()),
            ColumnType::Float => Column::Float(FloatColumn::new()),
            ColumnType::Str => Column::Str(StrColumn::new()),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Bool(_) => ColumnType::Bool,
            Column::Int(_) => ColumnType::Int,
            Column::Float(_) => ColumnType::Float,
            Column::Str(_) => ColumnType::Str,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Bool(c) => c.len(),
            Column::Int(c) => c.len(),
            Column::Float(c) => c.len(),
            Column::Str(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_missing(&mut self) {
        match self {
            Column::Bool(c) => c.push_missing(),
            Column::Int(c) => c.push_missing(),
            Column::Float(c) => c.push_missing(),
            Column::Str(c) => c.push_missing(),
        }
    }

    pub fn is_missing(&self, idx: usize) -> bool {
        match self {
            Column::Bool(c) => c.is_missing(idx),
            Column::Int(c) => c.is_missing(idx),
            Column::Float(c) => c.is_missing(idx),
            Column::Str(c) => c.is_missing(idx),
        }
    }

    /// Appends a datum of the column's own type; `None` appends missing.
    pub fn push_datum(&mut self, datum: &Datum) {
        match datum {
            None => self.push_missing(),
            Some(scalar) => match self {
                Column::Bool(c) => c.push(bool::from_scalar(scalar)),
                Column::Int(c) => c.push(i32::from_scalar(scalar)),
                Column::Float(c) => c.push(f32::from_scalar(scalar)),
                Column::Str(c) => c.push(String::from_scalar(scalar)),
            },
        }
    }

    /// Reads the cell at `idx` as a datum, `None` when missing.
    pub fn datum_at(&self, idx: usize) -> Datum {
        if self.is_missing(idx) {
            return None;
        }
        Some(match self {
            Column::Bool(c) => c.get(idx).to_scalar(),
            Column::Int(c) => c.get(idx).to_scalar(),
            Column::Float(c) => c.get(idx).to_scalar(),
            Column::Str(c) => c.get(idx).to_scalar(),
        })
    }

    pub fn as_bool(&self) -> &BoolColumn {
        match self {
            Column::Bool(c) => c,
            other => panic!("column is {}, not B", other.column_type()),
        }
    }

    pub fn as_int(&self) -> &IntColumn {
        match self {
            Column::Int(c) => c,
            other => panic!("column is {}, not I", other.column_type()),
        }
    }

    pub fn as_float(&self) -> &FloatColumn {
        match self {
            Column::Float(c) => c,
            other => panic!("column is {}, not F", other.column_type()),
        }
    }

    pub fn as_str(&self) -> &StrColumn {
        match self {
            Column::Str(c) => c,
            other => panic!("column is {}, not S", other.column_type()),
        }
    }

    pub fn as_bool_mut(&mut self) -> &mut BoolColumn {
        match self {
            Column::Bool(c) => c,
            other => panic!("column is {}, not B", other.column_type()),
        }
    }

    pub fn as_int_mut(&mut self) -> &mut IntColumn {
        match self {
            Column::Int(c) => c,
            other => panic!("column is {}, not I", other.column_type()),
        }
    }

    pub fn as_float_mut(&mut self) -> &mut FloatColumn {
        match self {
            Column::Float(c) => c,
            other => panic!("column is {}, not F", other.column_type()),
        }
    }

    pub fn as_str_mut(&mut self) -> &mut StrColumn {
        match self {
            Column::Str(c) => c,
            other => panic!("column is {}, not S", other.column_type()),
        }
    }
}

impl Serial for Column {
    fn serialize(&self, ser: &mut Serializer) {
        match self {
            Column::Bool(c) => c.serialize(ser),
            Column::Int(c) => c.serialize(ser),
            Column::Float(c) => c.serialize(ser),
            Column::Str(c) => c.serialize(ser),
        }
    }

    fn deserialize(de: &mut Deserializer<'_>) -> SerialResult<Self> {
        let ty = ColumnType::from_tag(de.read_u8()?)?;
        Ok(match ty {
            ColumnType::Bool => Column::Bool(BoolColumn::deserialize_body(de)?),
            ColumnType::Int => Column::Int(IntColumn::deserialize_body(de)?),
            ColumnType::Float => Column::Float(FloatColumn::deserialize_body(de)?),
            ColumnType::Str => Column::Str(StrColumn::deserialize_body(de)?),
        })
    }
}
