use core::{fmt, hash::Hash};

const WORDS: usize = 4;

/// The number of distinct bits a [`BitSet`] can hold.
///
/// This is also the upper bound of registered component and tag types.
pub const BITSET_CAPACITY: usize = WORDS * 64;

/// Fixed capacity bit vector
///
/// Used both for the set of component types and the set of tags of a signature.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BitSet {
    words: [u64; WORDS],
}

impl BitSet {
    pub const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    #[inline]
    fn locate(index: usize) -> (usize, u64) {
        assert!(
            index < BITSET_CAPACITY,
            "Bit index {index} exceeds the bitset capacity of {BITSET_CAPACITY}"
        );

        (index / 64, 1 << (index % 64))
    }

    pub fn set_bit(&mut self, index: usize) {
        let (word, mask) = Self::locate(index);
        self.words[word] |= mask;
    }

    pub fn clear_bit(&mut self, index: usize) {
        let (word, mask) = Self::locate(index);
        self.words[word] &= !mask;
    }

    #[inline]
    pub fn has(&self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        self.words[word] & mask != 0
    }

    /// Returns true if every bit of `other` is set in `self`
    #[inline]
    pub fn has_all(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words)
            .all(|(&a, b)| a & b == b)
    }

    /// Returns true if at least one bit of `other` is set in `self`
    #[inline]
    pub fn has_any(&self, other: &Self) -> bool {
        self.words.iter().zip(other.words).any(|(&a, b)| a & b != 0)
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a | b)
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a & b)
    }

    /// Bits set in `self` but not in `other`
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a & !b)
    }

    fn zip_with(&self, other: &Self, f: impl Fn(u64, u64) -> u64) -> Self {
        let mut words = self.words;
        for (a, b) in words.iter_mut().zip(other.words) {
            *a = f(*a, b);
        }

        Self { words }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&v| v == 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|v| v.count_ones() as usize).sum()
    }

    /// Iterate the indices of all set bits in ascending order
    pub fn iter(&self) -> BitSetIter {
        BitSetIter {
            words: self.words,
            word: 0,
        }
    }

    /// Hash of the set bits.
    ///
    /// Two bitsets with the same bits set always produce the same hash, regardless of the order
    /// the bits were set in.
    pub fn combined_hash(&self) -> u64 {
        const PRIME: u64 = 0x100000001b3;
        self.words
            .iter()
            .fold(0xcbf29ce484222325, |acc, &word| {
                (acc ^ word).wrapping_mul(PRIME).rotate_left(5)
            })
    }
}

impl Hash for BitSet {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.combined_hash())
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut set = Self::new();
        iter.into_iter().for_each(|v| set.set_bit(v));
        set
    }
}

impl<'a> IntoIterator for &'a BitSet {
    type Item = usize;

    type IntoIter = BitSetIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct BitSetIter {
    words: [u64; WORDS],
    word: usize,
}

impl Iterator for BitSetIter {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        while self.word < WORDS {
            let bits = self.words[self.word];
            if bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                // Clear lowest set bit
                self.words[self.word] = bits & (bits - 1);
                return Some(self.word * 64 + bit);
            }

            self.word += 1;
        }

        None
    }
}
