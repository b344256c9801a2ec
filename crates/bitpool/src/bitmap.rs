//! One bit per slot: `0` = free, `1` = in use

use std::collections::TryReserveError;

const WORD_BITS: usize = u64::BITS as usize;

/// Fixed-length bitset tracking slot state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotBitmap {
    words: Box<[u64]>,
    len: usize,
}

impl SlotBitmap {
    /// Creates a bitmap of `len` cleared bits
    pub fn try_new(len: usize) -> Result<Self, TryReserveError> {
        let word_count = len.div_ceil(WORD_BITS);
        let mut words = Vec::new();
        words.try_reserve_exact(word_count)?;
        words.resize(word_count, 0);

        Ok(Self {
            words: words.into_boxed_slice(),
            len,
        })
    }

    /// Number of bits
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the bitmap tracks zero slots
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, u64) {
        debug_assert!(index < self.len, "bit {index} out of range {}", self.len);
        (index / WORD_BITS, 1 << (index % WORD_BITS))
    }

    /// Returns the bit at `index`
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        let (word, mask) = self.locate(index);
        self.words[word] & mask != 0
    }

    /// Sets the bit at `index`, returning its previous value
    #[inline]
    pub fn set(&mut self, index: usize) -> bool {
        let (word, mask) = self.locate(index);
        let previous = self.words[word] & mask != 0;
        self.words[word] |= mask;
        previous
    }

    /// Clears the bit at `index`, returning its previous value
    #[inline]
    pub fn clear(&mut self, index: usize) -> bool {
        let (word, mask) = self.locate(index);
        let previous = self.words[word] & mask != 0;
        self.words[word] &= !mask;
        previous
    }

    /// Clears every bit
    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates the indices of set bits in ascending order
    pub fn iter_ones(&self) -> IterOnes<'_> {
        IterOnes {
            words: &self.words,
            word_index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }
}

/// Iterator over set bit indices of a [`SlotBitmap`]
#[derive(Debug, Clone)]
pub struct IterOnes<'a> {
    words: &'a [u64],
    word_index: usize,
    current: u64,
}

impl Iterator for IterOnes<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_index * WORD_BITS + bit);
            }
            self.word_index += 1;
            self.current = *self.words.get(self.word_index)?;
        }
    }
}
