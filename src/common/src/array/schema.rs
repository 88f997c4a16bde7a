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

use crate::error::SerialResult;
use crate::serial::{Deserializer, Serial, Serializer};
use crate::types::ColumnType;

/// Describes the contents of a data frame: one type tag per column and
/// the logical row count. Equality is by column types alone.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: Vec<ColumnType>,
    height: usize,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from a tag string such as `"SIF"`. An unknown tag
    /// is a fatal error.
    pub fn from_types(types: &str) -> Self {
        let types = types
            .bytes()
            .map(|tag| {
                ColumnType::from_tag(tag)
                    .unwrap_or_else(|_| panic!("invalid schema tag {:?}", tag as char))
            })
            .collect();
        Self { types, height: 0 }
    }

    pub fn width(&self) -> usize {
        self.types.len()
    }

    pub fn length(&self) -> usize {
        self.height
    }

    pub fn col_type(&self, col: usize) -> ColumnType {
        self.types[col]
    }

    pub fn types(&self) -> &[ColumnType] {
        &self.types
    }

    pub fn add_column(&mut self, ty: ColumnType) {
        self.types.push(ty);
    }

    pub fn add_row(&mut self) {
        self.height += 1;
    }

    pub fn grow_rows(&mut self, n: usize) {
        self.height += n;
    }

    pub fn clear_rows(&mut self) {
        self.height = 0;
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.types == other.types
    }
}

impl Serial for Schema {
    /// `[width][height][types: width tag bytes]`.
    fn serialize(&self, ser: &mut Serializer) {
        ser.put_usize(self.width());
        ser.put_usize(self.height);
        for ty in &self.types {
            ser.put_u8(ty.tag());
        }
    }

    fn deserialize(de: &mut Deserializer<'_>) -> SerialResult<Self> {
        let width = de.read_usize()?;
        let height = de.read_usize()?;
        let mut types = Vec::with_capacity(width);
        for _ in 0..width {
            types.push(ColumnType::from_tag(de.read_u8()?)?);
        }
        Ok(Self { types, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_types() {
        let schema = Schema::from_types("BIFS");
        assert_eq!(schema.width(), 4);
        assert_eq!(schema.length(), 0);
        assert_eq!(schema.col_type(0), ColumnType::Bool);
        assert_eq!(schema.col_type(3), ColumnType::Str);
    }

    #[test]
    fn test_round_trip() {
        let mut schema = Schema::from_types("FSI");
        schema.grow_rows(100_001);
        let restored = Schema::from_bytes(&schema.to_bytes()).unwrap();
        assert_eq!(restored.width(), 3);
        assert_eq!(restored.length(), 100_001);
        assert_eq!(restored.types(), schema.types());
    }

    #[test]
    fn test_equality_ignores_height() {
        let mut a = Schema::from_types("IF");
        let b = Schema::from_types("IF");
        a.grow_rows(10);
        assert_eq!(a, b);
        assert_ne!(a, Schema::from_types("FI"));
    }

    #[test]
    #[should_panic(expected = "invalid schema tag")]
    fn test_bad_tag_panics() {
        Schema::from_types("IX");
    }
}
