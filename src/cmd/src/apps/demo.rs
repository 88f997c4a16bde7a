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

//! Three-node hand-off: node 0 produces an array and its sum, node 1
//! recomputes the sum from the distributed table, node 2 compares the
//! two and stops the cluster.

use eau2_common::types::Key;
use eau2_dataframe::distributed::DistributedDataFrame;
use eau2_dataframe::{Application, DataFrameStore};

const SZ: usize = 100_000;

fn main_key() -> Key {
    Key::new("main", 0)
}

fn verify_key() -> Key {
    Key::new("verif", 0)
}

fn check_key() -> Key {
    Key::new("ck", 0)
}

pub async fn run(app: &Application) -> anyhow::Result<()> {
    anyhow::ensure!(app.num_nodes() >= 3, "the demo needs at least 3 nodes");
    match app.this_node() {
        0 => producer(app).await,
        1 => counter(app).await,
        2 => summarizer(app).await,
        _ => {
            // Extra nodes only serve their share of chunks.
            app.await_stop().await;
            Ok(())
        }
    }
}

/// Generates the numbers and the expected sum.
async fn producer(app: &Application) -> anyhow::Result<()> {
    let mut sum = 0f32;
    let values: Vec<f32> = (0..SZ)
        .map(|i| {
            sum += i as f32;
            i as f32
        })
        .collect();
    DistributedDataFrame::from_array(&main_key(), app.this_store(), &values).await?;
    DistributedDataFrame::from_scalar(&check_key(), app.this_store(), sum).await?;
    tracing::info!(rows = SZ, sum, "produced");
    app.await_stop().await;
    Ok(())
}

/// Reads the array back and publishes the recomputed sum.
async fn counter(app: &Application) -> anyhow::Result<()> {
    let mut df = app.this_store().get_and_wait(&main_key()).await?;
    let mut sum = 0f32;
    for i in 0..SZ {
        sum += df.get_float(0, i).await?;
    }
    DistributedDataFrame::from_scalar(&verify_key(), app.this_store(), sum).await?;
    tracing::info!(sum, "counted");
    app.await_stop().await;
    Ok(())
}

/// Fetches both sums and compares them.
async fn summarizer(app: &Application) -> anyhow::Result<()> {
    let mut result = app.this_store().get_and_wait(&verify_key()).await?;
    let mut expected = app.this_store().get_and_wait(&check_key()).await?;
    let got = result.get_float(0, 0).await?;
    let want = expected.get_float(0, 0).await?;
    if got == want {
        tracing::info!(sum = got, "SUCCESS");
    } else {
        tracing::error!(got, want, "FAILURE");
    }
    app.stop_all().await?;
    anyhow::ensure!(got == want, "sum mismatch: {} != {}", got, want);
    Ok(())
}
