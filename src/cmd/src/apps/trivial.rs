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

//! Single-node smoke application: distribute an array, read it back,
//! check the sum.

use eau2_common::types::Key;
use eau2_dataframe::distributed::DistributedDataFrame;
use eau2_dataframe::{Application, DataFrameStore};

const SZ: usize = 1_000_000;

pub async fn run(app: &Application) -> anyhow::Result<()> {
    let mut expected = 0f64;
    let values: Vec<f32> = (0..SZ)
        .map(|i| {
            expected += i as f64;
            i as f32
        })
        .collect();

    let key = Key::new("triv", 0);
    DistributedDataFrame::from_array(&key, app.this_store(), &values).await?;

    let mut df = app.this_store().get(&key)?;
    let mut sum = 0f64;
    for i in 0..SZ {
        sum += df.get_float(0, i).await? as f64;
    }
    anyhow::ensure!(sum == expected, "sum mismatch: {} != {}", sum, expected);
    tracing::info!(rows = SZ, sum, "trivial round trip verified");

    app.stop().await?;
    Ok(())
}
