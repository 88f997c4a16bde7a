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

//! Row-visiting and row-producing callbacks used by the map and
//! factory operations.

use eau2_common::array::Row;

/// Visits each row of a frame in order. The row is on loan and reused
/// for the next call; the return value marks rows a filter keeps.
pub trait Rower: Send {
    fn accept(&mut self, row: &Row) -> bool;
}

/// The optional parallel-reduction hooks on top of [`Rower`], required
/// by `pmap`. A clone runs one slice; joins reduce right-to-left, at
/// most one join per clone.
pub trait ParallelRower: Rower + Send {
    /// A fresh rower for one worker's slice.
    fn clone_rower(&self) -> Box<dyn ParallelRower>;

    /// Folds a finished clone's state into this rower, consuming it.
    /// The engine only ever passes back what `clone_rower` produced, so
    /// implementations may downcast via [`ParallelRower::into_any`].
    fn join(&mut self, other: Box<dyn ParallelRower>);

    /// Upcast for downcasting in `join`; implementations return `self`.
    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any>;
}

/// Produces rows one at a time until `done`; drives chunk distribution
/// in `from_visitor`.
pub trait Writer: Send {
    /// Fills the next row. Called only while `done` is false.
    fn visit(&mut self, row: &mut Row);

    fn done(&mut self) -> bool;
}
