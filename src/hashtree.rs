use crate::proof::Proof;

pub mod binary;

/// Core hash tree abstraction
pub trait HashTree {
  type Digest;
  type Error;

  /// Append a new data block to the tree and return its leaf index
  fn append(&mut self, data: &[u8]) -> u64;

  /// Replace the data block at the given leaf index
  fn update(&mut self, index: u64, data: &[u8]) -> Result<(), Self::Error>;

  /// Get the digest of the leaf at the given index
  fn leaf(&self, index: u64) -> Option<Self::Digest>;

  /// Get the current size (number of leaf nodes)
  fn size(&self) -> u64;

  /// Get the root hash, `None` while the tree is empty
  fn root_hash(&self) -> Option<Self::Digest>;

  /// Verify that `data` is stored at `index` under the current root
  fn verify_path(&self, index: u64, data: &[u8], proof: &Proof<Self::Digest>) -> Result<bool, Self::Error>;

  /// Generate proof path for given index
  fn generate_proof(&self, index: u64) -> Result<Proof<Self::Digest>, Self::Error>;
}
