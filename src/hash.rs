use sha3::{Digest as _, Sha3_256};
use std::fmt::Debug;

use crate::error::{Error, Result};

/// Hash function used for both leaves and branches of a tree.
///
/// A branch digest is `combine(left, right)`, i.e. the hash of the two child digests concatenated in
/// left-then-right order.
pub trait Hasher {
  type Digest: Copy + Eq + std::hash::Hash + Debug + AsRef<[u8]> + Send + Sync;

  /// Width of [`Self::Digest`] in bytes.
  const OUT_LEN: usize;

  fn hash(data: &[u8]) -> Self::Digest;

  fn combine(left: &Self::Digest, right: &Self::Digest) -> Self::Digest;

  /// Interpret raw bytes as a digest. Fails with [`Error::InvalidInput`] unless exactly
  /// [`Self::OUT_LEN`] bytes are given.
  fn digest_from_slice(bytes: &[u8]) -> Result<Self::Digest>;
}

/// SHA3-256 truncated to 128 bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha3_128;

pub const SHA3_128_OUT_LEN: usize = 16;

impl Hasher for Sha3_128 {
  type Digest = [u8; SHA3_128_OUT_LEN];

  const OUT_LEN: usize = SHA3_128_OUT_LEN;

  fn hash(data: &[u8]) -> Self::Digest {
    truncate(Sha3_256::digest(data).as_slice())
  }

  fn combine(left: &Self::Digest, right: &Self::Digest) -> Self::Digest {
    let mut hasher = Sha3_256::new();
    hasher.update(left);
    hasher.update(right);
    truncate(hasher.finalize().as_slice())
  }

  fn digest_from_slice(bytes: &[u8]) -> Result<Self::Digest> {
    from_slice(bytes)
  }
}

fn truncate(full: &[u8]) -> [u8; SHA3_128_OUT_LEN] {
  let mut digest = [0u8; SHA3_128_OUT_LEN];
  digest.copy_from_slice(&full[..SHA3_128_OUT_LEN]);
  digest
}

/// BLAKE3 with its full 256-bit output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3;

impl Hasher for Blake3 {
  type Digest = [u8; blake3::OUT_LEN];

  const OUT_LEN: usize = blake3::OUT_LEN;

  fn hash(data: &[u8]) -> Self::Digest {
    *blake3::hash(data).as_bytes()
  }

  fn combine(left: &Self::Digest, right: &Self::Digest) -> Self::Digest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
  }

  fn digest_from_slice(bytes: &[u8]) -> Result<Self::Digest> {
    from_slice(bytes)
  }
}

fn from_slice<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
  <[u8; N]>::try_from(bytes)
    .map_err(|_| Error::InvalidInput(format!("expected a {N}-byte digest, got {} bytes", bytes.len())))
}
