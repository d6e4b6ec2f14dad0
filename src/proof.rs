use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::hash::Hasher;

/// Which side of the running hash a proof sibling is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
  Left,
  Right,
}

impl Side {
  fn tag(self) -> u8 {
    match self {
      Side::Left => 0,
      Side::Right => 1,
    }
  }

  fn from_tag(tag: u8) -> Result<Self> {
    match tag {
      0 => Ok(Side::Left),
      1 => Ok(Side::Right),
      _ => Err(Error::InvalidInput(format!("unknown proof side tag: {tag}"))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofStep<D> {
  pub sibling: D,
  pub side: Side,
}

/// Authentication path of a single leaf, ordered from the leaf's sibling up to the level just below
/// the root. A single-leaf tree yields an empty proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof<D> {
  steps: Vec<ProofStep<D>>,
}

impl<D: Copy + AsRef<[u8]>> Proof<D> {
  pub fn new(steps: Vec<ProofStep<D>>) -> Self {
    Proof { steps }
  }

  pub fn steps(&self) -> &[ProofStep<D>] {
    &self.steps
  }

  pub fn steps_mut(&mut self) -> &mut [ProofStep<D>] {
    &mut self.steps
  }

  /// Sibling digests in fold order.
  pub fn siblings(&self) -> impl Iterator<Item = &D> {
    self.steps.iter().map(|step| &step.sibling)
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  /// Recompute the root that this proof commits `leaf` to.
  pub fn compute_root<H: Hasher<Digest = D>>(&self, leaf: &D) -> D {
    self.steps.iter().fold(*leaf, |current, step| match step.side {
      Side::Left => H::combine(&step.sibling, &current),
      Side::Right => H::combine(&current, &step.sibling),
    })
  }

  /// Encode as `count:u32`, then `side:u8 | len:u8 | digest` for every step.
  pub fn write<W: Write>(&self, w: &mut W) -> Result<usize> {
    w.write_u32::<LittleEndian>(self.steps.len() as u32)?;
    let mut len = 4;
    for step in self.steps.iter() {
      let digest = step.sibling.as_ref();
      let width = u8::try_from(digest.len())
        .map_err(|_| Error::InvalidInput(format!("digest too wide to encode: {} bytes", digest.len())))?;
      w.write_u8(step.side.tag())?;
      w.write_u8(width)?;
      w.write_all(digest)?;
      len += 2 + digest.len();
    }
    Ok(len)
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(4 + self.steps.len() * (2 + 32));
    self.write(&mut buffer)?;
    Ok(buffer)
  }

  /// Decode a proof written by [`Proof::write`]; every digest is validated by `H`.
  pub fn read<H: Hasher<Digest = D>, R: Read>(r: &mut R) -> Result<Self> {
    let count = r.read_u32::<LittleEndian>()? as usize;
    // a proof never has more steps than a u64-indexed tree has levels
    if count > u64::BITS as usize {
      return Err(Error::InvalidInput(format!("too many proof steps: {count}")));
    }
    let mut steps = Vec::with_capacity(count);
    for _ in 0..count {
      let side = Side::from_tag(r.read_u8()?)?;
      let width = r.read_u8()? as usize;
      let mut buffer = vec![0u8; width];
      r.read_exact(&mut buffer)?;
      let sibling = H::digest_from_slice(&buffer)?;
      steps.push(ProofStep { sibling, side });
    }
    Ok(Proof { steps })
  }

  pub fn from_bytes<H: Hasher<Digest = D>>(mut bytes: &[u8]) -> Result<Self> {
    let proof = Self::read::<H, _>(&mut bytes)?;
    if !bytes.is_empty() {
      return Err(Error::InvalidInput(format!("{} trailing bytes after proof", bytes.len())));
    }
    Ok(proof)
  }
}

/// Check that `proof` folds `leaf` into `root`. Needs neither the tree nor any other leaf.
pub fn verify_proof<H: Hasher>(root: &H::Digest, leaf: &H::Digest, proof: &Proof<H::Digest>) -> bool {
  proof.compute_root::<H>(leaf) == *root
}

/// Like [`verify_proof`] for digests received as raw bytes. Widths are checked by `H`, so a
/// truncated or oversized digest is an [`Error::InvalidInput`] rather than a failed verification.
pub fn verify_proof_bytes<H: Hasher>(root: &[u8], leaf: &[u8], proof: &Proof<H::Digest>) -> Result<bool> {
  let root = H::digest_from_slice(root)?;
  let leaf = H::digest_from_slice(leaf)?;
  Ok(verify_proof::<H>(&root, &leaf, proof))
}
