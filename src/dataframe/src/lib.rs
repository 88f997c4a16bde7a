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

//! Data frames over the distributed store: the local frame with its
//! map/filter/pmap surface, and the distributed frame that scatters a
//! table across the cluster and loads chunks lazily on read.

pub mod application;
pub mod dataframe;
pub mod distributed;
pub mod error;
pub mod sor;
pub mod visitor;

pub use application::Application;
pub use dataframe::{DataFrame, MAX_THREADS, MIN_ROWS_PER_THREAD};
pub use distributed::{DataFrameStore, DistributedDataFrame, CHUNK_SIZE};
pub use visitor::{ParallelRower, Rower, Writer};
