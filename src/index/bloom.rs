use serde::{Serialize, Deserialize};

const MIN_BITS: usize = 1000;
const BITS_PER_ITEM: usize = 10;

/// Two-hash bloom filter over a shard's vocabulary.
///
/// No false negatives: `contains` returning false means the term is
/// definitely absent from the shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: usize,
    item_count: usize,
}

impl BloomFilter {
    pub fn with_capacity(expected_items: usize) -> Self {
        let num_bits = MIN_BITS.max(BITS_PER_ITEM * expected_items);
        BloomFilter {
            bits: vec![0; num_bits.div_ceil(64)],
            num_bits,
            item_count: 0,
        }
    }

    pub fn from_terms<'a, I>(terms: I) -> Self
    where
        I: ExactSizeIterator<Item = &'a str>,
    {
        let mut filter = BloomFilter::with_capacity(terms.len());
        for term in terms {
            filter.insert(term);
        }
        filter
    }

    pub fn insert(&mut self, term: &str) {
        for bit in self.bit_positions(term) {
            self.bits[bit / 64] |= 1u64 << (bit % 64);
        }
        self.item_count += 1;
    }

    pub fn contains(&self, term: &str) -> bool {
        if self.bits.is_empty() {
            return false;
        }
        self.bit_positions(term)
            .iter()
            .all(|&bit| self.bits[bit / 64] & (1u64 << (bit % 64)) != 0)
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn len(&self) -> usize {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    fn bit_positions(&self, term: &str) -> [usize; 2] {
        let bytes = term.as_bytes();
        let h1 = fnv1a(bytes) as usize;
        let h2 = crc32fast::hash(bytes) as usize;
        [h1 % self.num_bits, h2 % self.num_bits]
    }
}

impl Default for BloomFilter {
    fn default() -> Self {
        BloomFilter::with_capacity(0)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
