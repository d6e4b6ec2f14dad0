//! Binary hash (Merkle) tree over opaque data blocks: build a tree, generate and verify membership
//! proofs for single blocks, and append or replace blocks.
//!
//! ```
//! use merkle_hashtree::{BinaryHashTree, Hasher, Sha3_128, verify_proof};
//!
//! let mut tree = BinaryHashTree::<Sha3_128>::new([b"data1", b"data2", b"data3"]);
//! let proof = tree.generate_proof(2).unwrap();
//! let root = tree.root_hash().unwrap();
//! assert!(verify_proof::<Sha3_128>(&root, &Sha3_128::hash(b"data3"), &proof));
//!
//! tree.insert_leaf(b"data4");
//! assert_ne!(Some(root), tree.root_hash());
//! ```

pub mod error;
pub mod hash;
pub mod hashtree;
pub mod proof;

pub use error::{Error, Result};
pub use hash::{Blake3, Hasher, Sha3_128};
pub use hashtree::HashTree;
pub use hashtree::binary::{BinaryHashTree, RebuildStrategy};
pub use proof::{Proof, ProofStep, Side, verify_proof, verify_proof_bytes};

#[inline]
pub fn u64_to_rand_bytes(value: u64, buffer: &mut [u8; 8]) {
  // SplitMix64
  let mut z = value.wrapping_add(0x9e3779b97f4a7c15);
  z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
  let z = z ^ (z >> 31);

  buffer.copy_from_slice(&z.to_le_bytes());
}
