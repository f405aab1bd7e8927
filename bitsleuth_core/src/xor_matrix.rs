use crate::normalizer::BitVector;

/// Symmetric message×message matrix of bitwise differences.
///
/// Entry `(i, j)` is the XOR of vectors `i` and `j` over their common prefix.
/// Only the upper triangle is stored; `get` mirrors lookups below the diagonal.
#[derive(Debug, Clone, Default)]
pub struct XorMatrix {
    size: usize,
    cells: Vec<BitVector>,
}

impl XorMatrix {
    /// Computes every pairwise difference of `bitvectors`.
    pub fn build(bitvectors: &[BitVector]) -> Self {
        let size = bitvectors.len();
        let mut cells = Vec::with_capacity(size * (size + 1) / 2);
        for (i, a) in bitvectors.iter().enumerate() {
            for b in &bitvectors[i..] {
                cells.push(a.iter().zip(b).map(|(x, y)| x ^ y).collect());
            }
        }
        Self { size, cells }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn cell_index(&self, i: usize, j: usize) -> usize {
        let (row, col) = if i <= j { (i, j) } else { (j, i) };
        // rows 0..row hold size, size-1, ... cells
        row * self.size - row * (row.saturating_sub(1)) / 2 + (col - row)
    }

    /// Difference vector of messages `i` and `j`, or `None` when out of bounds.
    pub fn get(&self, i: usize, j: usize) -> Option<&[u8]> {
        if i >= self.size || j >= self.size {
            return None;
        }
        self.cells.get(self.cell_index(i, j)).map(Vec::as_slice)
    }

    /// Number of differing bits between messages `i` and `j` over their common prefix.
    pub fn hamming(&self, i: usize, j: usize) -> Option<usize> {
        self.get(i, j)
            .map(|diff| diff.iter().filter(|&&bit| bit != 0).count())
    }

    /// Bit positions, within the shortest vector, where every pair of messages agrees.
    pub fn constant_positions(&self) -> Vec<usize> {
        let common_len = (0..self.size)
            .filter_map(|i| self.get(i, i).map(<[u8]>::len))
            .min()
            .unwrap_or(0);
        (0..common_len)
            .filter(|&pos| self.cells.iter().all(|diff| diff.get(pos).is_none_or(|&b| b == 0)))
            .collect()
    }
}
