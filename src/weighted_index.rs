//! A segment tree over integer weights that supports weight-proportional
//! draws, point updates and permanent removal in O(log n).

use crate::{Error, Participant, Result};
use rand::Rng;

const WORD_BITS: usize = u64::BITS as usize;

/// A complete binary tree of partial sums with a tombstone bit per entry.
///
/// Node `1` is the root and node `i` has children `2i` and `2i + 1`. Leaves
/// start at `leaves`, the length rounded up to a power of two, so walking down
/// from the root visits entries in index order and [`find_by_prefix_sum`]
/// really is a prefix-sum search. Padding leaves hold zero forever.
///
/// Every internal node equals the sum of its two children. Updates restore
/// this along a single leaf-to-root path.
///
/// [`find_by_prefix_sum`]: WeightedIndex::find_by_prefix_sum
#[derive(Debug, Clone)]
pub struct WeightedIndex {
    tree: Vec<u64>,
    /// One bit per entry, set once the entry has been drawn.
    tombstones: Vec<u64>,
    len: usize,
    leaves: usize,
}

impl WeightedIndex {
    /// Builds the tree bottom-up in O(n).
    ///
    /// Fails with [`Error::WeightOverflow`] if the weights do not sum within a
    /// `u64`, which also bounds every internal node.
    pub fn build(weights: &[u64]) -> Result<Self> {
        weights
            .iter()
            .try_fold(0u64, |acc, &w| acc.checked_add(w))
            .ok_or(Error::WeightOverflow)?;

        let len = weights.len();
        let leaves = len.next_power_of_two();
        let mut tree = vec![0u64; 2 * leaves];
        tree[leaves..leaves + len].copy_from_slice(weights);
        for i in (1..leaves).rev() {
            tree[i] = tree[2 * i] + tree[2 * i + 1];
        }

        Ok(Self {
            tree,
            tombstones: vec![0u64; len.div_ceil(WORD_BITS)],
            len,
            leaves,
        })
    }

    /// Builds an index over the weights of `participants`, in order.
    pub fn from_participants(participants: &[Participant]) -> Result<Self> {
        let weights: Vec<u64> = participants.iter().map(|p| p.weight).collect();
        Self::build(&weights)
    }

    /// Number of entries, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sum of all live weights. Same as `sum(0, len)`, but O(1).
    pub fn total_weight(&self) -> u64 {
        self.tree[1]
    }

    /// Current weight of entry `index` (zero once tombstoned).
    pub fn weight(&self, index: usize) -> u64 {
        assert!(index < self.len, "index {index} out of bounds for {} entries", self.len);
        self.tree[self.leaves + index]
    }

    /// Sum of current weights in the half-open range `[lo, hi)`.
    pub fn sum(&self, lo: usize, hi: usize) -> u64 {
        assert!(lo <= hi && hi <= self.len, "range {lo}..{hi} out of bounds for {} entries", self.len);
        let mut left = lo + self.leaves;
        let mut right = hi + self.leaves;
        let mut sum = 0;
        while left < right {
            if left % 2 == 1 {
                sum += self.tree[left];
                left += 1;
            }
            if right % 2 == 1 {
                right -= 1;
                sum += self.tree[right];
            }
            left /= 2;
            right /= 2;
        }
        sum
    }

    /// Sets entry `index` to `weight` and recomputes its ancestors.
    ///
    /// Fails with [`Error::WeightOverflow`] if the new total would not fit in
    /// a `u64`; the index is left untouched in that case.
    pub fn update(&mut self, index: usize, weight: u64) -> Result<()> {
        let old = self.weight(index);
        (self.total_weight() - old)
            .checked_add(weight)
            .ok_or(Error::WeightOverflow)?;

        self.set_leaf(index, weight);
        Ok(())
    }

    fn set_leaf(&mut self, index: usize, weight: u64) {
        let mut node = index + self.leaves;
        self.tree[node] = weight;
        while node > 1 {
            node /= 2;
            self.tree[node] = self.tree[2 * node] + self.tree[2 * node + 1];
        }
    }

    /// Returns the first entry whose inclusive prefix sum reaches `target`.
    ///
    /// `None` if `target` is outside `[1, total_weight]`. Entries with zero
    /// current weight are never returned.
    pub fn find_by_prefix_sum(&self, mut target: u64) -> Option<usize> {
        if target == 0 || target > self.total_weight() {
            return None;
        }
        let mut node = 1;
        while node < self.leaves {
            let left = self.tree[2 * node];
            if left >= target {
                node *= 2;
            } else {
                target -= left;
                node = 2 * node + 1;
            }
        }
        Some(node - self.leaves)
    }

    /// Draws one entry with probability proportional to its current weight.
    ///
    /// `None` once every live weight is zero. Nothing is removed.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Option<usize> {
        let total = self.total_weight();
        if total == 0 {
            return None;
        }
        self.find_by_prefix_sum(rng.gen_range(1..=total))
    }

    /// Tombstones entry `index` and zeroes its weight in the tree.
    pub fn mark_deleted(&mut self, index: usize) {
        assert!(index < self.len, "index {index} out of bounds for {} entries", self.len);
        self.tombstones[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
        // Lowering a weight can never overflow.
        self.set_leaf(index, 0);
    }

    /// Sets the tombstone bit but leaves the weight in the tree, breaking the
    /// invariant that removed entries contribute nothing.
    #[cfg(test)]
    pub(crate) fn corrupt_tombstone(&mut self, index: usize) {
        self.tombstones[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
    }

    pub fn is_deleted(&self, index: usize) -> bool {
        assert!(index < self.len, "index {index} out of bounds for {} entries", self.len);
        self.tombstones[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }
}
