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

/// Elements per block. Growth allocates a new block; existing elements
/// never move, so references within a block stay valid across pushes.
const BLOCK_SIZE: usize = 1024;

/// Append-only array of fixed-size blocks. The single generic container
/// behind every typed column.
#[derive(Debug, Clone)]
pub struct ChunkedArray<T> {
    blocks: Vec<Vec<T>>,
    len: usize,
}

impl<T> Default for ChunkedArray<T> {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            len: 0,
        }
    }
}

impl<T> ChunkedArray<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, value: T) {
        if self.len % BLOCK_SIZE == 0 {
            self.blocks.push(Vec::with_capacity(BLOCK_SIZE));
        }
        self.blocks.last_mut().unwrap().push(value);
        self.len += 1;
    }

    /// Panics on an out-of-bounds index.
    pub fn get(&self, idx: usize) -> &T {
        assert!(idx < self.len, "index {} out of bounds (len {})", idx, self.len);
        &self.blocks[idx / BLOCK_SIZE][idx % BLOCK_SIZE]
    }

    /// Panics on an out-of-bounds index.
    pub fn set(&mut self, idx: usize, value: T) {
        assert!(idx < self.len, "index {} out of bounds (len {})", idx, self.len);
        self.blocks[idx / BLOCK_SIZE][idx % BLOCK_SIZE] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.blocks.iter().flatten()
    }
}

impl<T: PartialEq> PartialEq for ChunkedArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T> FromIterator<T> for ChunkedArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut arr = Self::new();
        for v in iter {
            arr.push(v);
        }
        arr
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_push_get_across_blocks() {
        let mut arr = ChunkedArray::new();
        for i in 0..(BLOCK_SIZE * 3 + 17) {
            arr.push(i as i32);
        }
        assert_eq!(arr.len(), BLOCK_SIZE * 3 + 17);
        assert_eq!(*arr.get(0), 0);
        assert_eq!(*arr.get(BLOCK_SIZE), BLOCK_SIZE as i32);
        assert_eq!(*arr.get(BLOCK_SIZE * 3 + 16), (BLOCK_SIZE * 3 + 16) as i32);
    }

    #[test]
    fn test_set() {
        let mut arr: ChunkedArray<i32> = (0..2000).collect();
        arr.set(1500, -1);
        assert_eq!(*arr.get(1500), -1);
        assert_eq!(*arr.get(1499), 1499);
    }

    #[test]
    fn test_iter_order() {
        let arr: ChunkedArray<usize> = (0..5000).collect();
        let collected = arr.iter().copied().collect_vec();
        assert_eq!(collected, (0..5000).collect_vec());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_get_out_of_bounds() {
        let arr: ChunkedArray<i32> = (0..10).collect();
        arr.get(10);
    }

    #[test]
    fn test_equality() {
        let a: ChunkedArray<i32> = (0..3000).collect();
        let b: ChunkedArray<i32> = (0..3000).collect();
        let c: ChunkedArray<i32> = (0..2999).collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
