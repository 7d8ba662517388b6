//! Canonical binary encoding of chain objects.
//!
//! Integers are 8-byte little-endian, variable-length fields carry an 8-byte
//! length prefix, currencies are length-prefixed big-endian magnitudes.
//! Transaction ids, signature hashes and size estimates are all derived from it.
//! Every digest is blake2b-256.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::currency::Currency;

type Blake2b256 = Blake2b<U32>;

const LEAF_PREFIX: u8 = 0;
const NODE_PREFIX: u8 = 1;

pub fn blake2b(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Blake2b256::digest(data));
    out
}

fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Merkle root over already-encoded leaves.
///
/// Leaves are hashed with a 0x00 prefix and nodes with 0x01. Subtrees are
/// perfect on the left, so an odd leaf is joined at the top.
pub fn merkle_root(leaves: &[Vec<u8>]) -> [u8; 32] {
    // (height, hash) stack of completed subtrees
    let mut stack: Vec<(u32, [u8; 32])> = Vec::new();
    for leaf in leaves {
        let mut data = Vec::with_capacity(leaf.len() + 1);
        data.push(LEAF_PREFIX);
        data.extend_from_slice(leaf);
        let mut current = (0, blake2b(&data));
        while let Some(&(height, left)) = stack.last() {
            if height != current.0 {
                break;
            }
            stack.pop();
            current = (height + 1, node_hash(&left, &current.1));
        }
        stack.push(current);
    }
    let mut iter = stack.into_iter().rev();
    let mut root = match iter.next() {
        Some((_, hash)) => hash,
        None => return [0u8; 32],
    };
    for (_, left) in iter {
        root = node_hash(&left, &root);
    }
    root
}

/// Width reserved for a currency magnitude when estimating sizes.
pub const MAX_CURRENCY_WIDTH: usize = 16;

pub trait Encode {
    fn encode(&self, e: &mut Encoder);

    fn encoded_len(&self) -> usize {
        let mut e = Encoder::default();
        self.encode(&mut e);
        e.len()
    }
}

#[derive(Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    /// Raw bytes without a length prefix.
    pub fn write_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Length-prefixed bytes.
    pub fn write_prefixed(&mut self, bytes: &[u8]) {
        self.write_u64(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_currency(&mut self, c: &Currency) {
        self.write_prefixed(&c.to_bytes_be());
    }

    /// Count prefix of a list this crate never populates.
    pub fn write_empty(&mut self) {
        self.write_u64(0);
    }

    pub fn write_slice<T: Encode>(&mut self, items: &[T]) {
        self.write_u64(items.len() as u64);
        for item in items {
            item.encode(self);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn hash(&self) -> [u8; 32] {
        blake2b(&self.buf)
    }
}

impl Encode for Currency {
    fn encode(&self, e: &mut Encoder) {
        e.write_currency(self);
    }
}

#[cfg(test)]
mod tests {
    use crate::currency::Currency;
    use crate::encoding::{blake2b, merkle_root, Encode, Encoder};

    #[test]
    fn currency_is_length_prefixed_big_endian() {
        let mut e = Encoder::default();
        e.write_currency(&Currency::from(0x0102));
        assert_eq!(e.into_bytes(), vec![2, 0, 0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(Currency::zero().encoded_len(), 8);
    }

    #[test]
    fn slices_carry_count() {
        let mut e = Encoder::default();
        e.write_slice(&[Currency::from(1), Currency::from(2)]);
        assert_eq!(e.len(), 8 + 9 + 9);
    }

    #[test]
    fn blake2b_of_zero_hash() {
        assert!(hex::encode(blake2b(&[0u8; 32])).starts_with("89eb0d6a8a69"));
    }

    #[test]
    fn merkle_root_joins_odd_leaf_last() {
        let leaves: Vec<Vec<u8>> = vec![vec![1], vec![2], vec![3]];
        let leaf = |b: u8| blake2b(&[0, b]);
        let node = |l: [u8; 32], r: [u8; 32]| {
            let mut data = vec![1u8];
            data.extend_from_slice(&l);
            data.extend_from_slice(&r);
            blake2b(&data)
        };
        let expected = node(node(leaf(1), leaf(2)), leaf(3));
        assert_eq!(merkle_root(&leaves), expected);
        assert_eq!(merkle_root(&leaves[..1]), leaf(1));
        assert_eq!(merkle_root(&[]), [0u8; 32]);
    }
}
