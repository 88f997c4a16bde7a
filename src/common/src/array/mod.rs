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

//! The columnar data model: a generic chunked array, the four typed
//! columns behind one closed sum, schemas and rows.

mod chunked;
mod column;
mod row;
mod schema;

pub use chunked::ChunkedArray;
pub use column::{BoolColumn, Column, ColumnValue, FloatColumn, IntColumn, StrColumn, TypedColumn};
pub use row::{Fielder, Row};
pub use schema::Schema;
