use log::{debug, trace};
use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::hash::{Hasher, Sha3_128};
use crate::hashtree::HashTree;
use crate::proof::{Proof, ProofStep, Side};

/// Position of a node in the tree's arena.
pub type Position = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
  /// Derived from one input data block.
  Leaf,
  /// Copy of an odd node's digest, created only to complete its pair. Never a member of `leaves`.
  Padding,
  Branch { left: Position, right: Position },
}

/// Node representation in the hash tree
#[derive(Debug, Clone)]
pub struct Node<D> {
  pub hash: D,
  pub parent: Option<Position>,
  pub kind: NodeKind,
}

impl<D> Node<D> {
  fn new_leaf(hash: D) -> Self {
    Node { hash, parent: None, kind: NodeKind::Leaf }
  }

  fn new_padding(hash: D) -> Self {
    Node { hash, parent: None, kind: NodeKind::Padding }
  }

  fn new_internal(hash: D, left: Position, right: Position) -> Self {
    Node { hash, parent: None, kind: NodeKind::Branch { left, right } }
  }

  pub fn is_leaf(&self) -> bool {
    !matches!(self.kind, NodeKind::Branch { .. })
  }
}

/// How [`BinaryHashTree::update_leaf`] brings the root up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebuildStrategy {
  /// Discard every internal node and build the tree again from the leaves. O(n).
  #[default]
  Full,
  /// Rehash only the ancestors of the updated leaf. O(log n), same roots as `Full`.
  Path,
}

/// In-memory binary hash tree.
///
/// All nodes live in one arena. Positions `0..size` are the leaves in input order, the rest hold the
/// padding and branch nodes of the current build; children and parents refer to each other by
/// position. Levels are built by pairing consecutive nodes left to right, and an odd node at the end
/// of a level is paired with a padding copy of itself:
///
/// ```text
///            root = H(H(a|b) | H(c|c'))
///            /                    \
///       H(a|b)                  H(c|c')
///       /    \                  /     \
///   H(A)=a  H(B)=b          H(C)=c   c' (padding)
/// ```
#[derive(Debug, Clone)]
pub struct BinaryHashTree<H: Hasher = Sha3_128> {
  nodes: Vec<Node<H::Digest>>,
  size: usize,
  root: Option<Position>,
  strategy: RebuildStrategy,
  _hasher: PhantomData<H>,
}

impl<H: Hasher> BinaryHashTree<H> {
  /// Build a tree whose leaves are the digests of the given data blocks.
  pub fn new<I, B>(blocks: I) -> Self
  where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
  {
    Self::from_digests(blocks.into_iter().map(|block| H::hash(block.as_ref())))
  }

  /// Build a tree over already hashed leaves.
  pub fn from_digests<I: IntoIterator<Item = H::Digest>>(digests: I) -> Self {
    let nodes = digests.into_iter().map(Node::new_leaf).collect::<Vec<_>>();
    let size = nodes.len();
    let strategy = RebuildStrategy::default();
    let mut tree = BinaryHashTree { nodes, size, root: None, strategy, _hasher: PhantomData };
    tree.rebuild();
    tree
  }

  pub fn with_strategy(mut self, strategy: RebuildStrategy) -> Self {
    self.strategy = strategy;
    self
  }

  pub fn strategy(&self) -> RebuildStrategy {
    self.strategy
  }

  pub fn size(&self) -> u64 {
    self.size as u64
  }

  pub fn is_empty(&self) -> bool {
    self.size == 0
  }

  pub fn root_hash(&self) -> Option<H::Digest> {
    self.root.map(|position| self.nodes[position].hash)
  }

  pub fn leaf(&self, index: u64) -> Option<H::Digest> {
    self.leaf_position(index).ok().map(|position| self.nodes[position].hash)
  }

  pub fn leaves(&self) -> impl Iterator<Item = &H::Digest> {
    self.nodes[..self.size].iter().map(|node| &node.hash)
  }

  /// Number of levels above the leaves, i.e. the length of every proof.
  pub fn height(&self) -> usize {
    let mut height = 0;
    let mut current = 0;
    while let Some(parent) = self.nodes.get(current).and_then(|node| node.parent) {
      height += 1;
      current = parent;
    }
    height
  }

  /// Collect the sibling digests on the way from the leaf at `index` up to the root.
  pub fn generate_proof(&self, index: u64) -> Result<Proof<H::Digest>> {
    let mut current = self.leaf_position(index)?;
    let mut steps = Vec::with_capacity(self.height());
    while let Some(parent) = self.nodes[current].parent {
      let (sibling, side) = match self.nodes[parent].kind {
        NodeKind::Branch { left, right } if left == current => (right, Side::Right),
        NodeKind::Branch { left, .. } => (left, Side::Left),
        // a parent always has two children; fall back to the node's own digest
        _ => (current, Side::Right),
      };
      steps.push(ProofStep { sibling: self.nodes[sibling].hash, side });
      current = parent;
    }
    debug_assert_eq!(self.root, Some(current));
    Ok(Proof::new(steps))
  }

  /// Append a leaf for `data` and rebuild the tree. Returns the new leaf's index.
  pub fn insert_leaf(&mut self, data: &[u8]) -> u64 {
    let index = self.size;
    self.nodes.truncate(self.size);
    self.nodes.push(Node::new_leaf(H::hash(data)));
    self.size += 1;
    debug!("insert leaf #{index}");
    self.rebuild();
    index as u64
  }

  /// Replace the digest of the leaf at `index` with the digest of `data`. The leaf keeps its position;
  /// on error nothing is modified.
  pub fn update_leaf(&mut self, index: u64, data: &[u8]) -> Result<()> {
    let position = self.leaf_position(index)?;
    self.nodes[position].hash = H::hash(data);
    debug!("update leaf #{index} ({:?})", self.strategy);
    match self.strategy {
      RebuildStrategy::Full => self.rebuild(),
      RebuildStrategy::Path => self.rehash_path(position),
    }
    Ok(())
  }

  fn leaf_position(&self, index: u64) -> Result<Position> {
    if index >= self.size as u64 {
      Err(Error::OutOfRange { index, size: self.size as u64 })
    } else {
      Ok(index as Position)
    }
  }

  /// Drop every node above the leaves and build them again.
  fn rebuild(&mut self) {
    self.nodes.truncate(self.size);
    for leaf in self.nodes.iter_mut() {
      leaf.parent = None;
    }
    self.root = build::<H>(&mut self.nodes, (0..self.size).collect());
    debug!("rebuilt tree: {} leaves, {} nodes, height {}", self.size, self.nodes.len(), self.height());
  }

  fn rehash_path(&mut self, position: Position) {
    let mut current = position;
    while let Some(parent) = self.nodes[current].parent {
      if let NodeKind::Branch { left, right } = self.nodes[parent].kind {
        if self.nodes[right].kind == NodeKind::Padding {
          self.nodes[right].hash = self.nodes[left].hash;
        }
        self.nodes[parent].hash = H::combine(&self.nodes[left].hash, &self.nodes[right].hash);
      }
      current = parent;
    }
  }
}

/// Pair up `level` bottom-up until one node remains and return its position. New padding and
/// branch nodes are appended to `nodes`; both children of a branch point back to it.
fn build<H: Hasher>(nodes: &mut Vec<Node<H::Digest>>, mut level: Vec<Position>) -> Option<Position> {
  while level.len() > 1 {
    let mut parents = Vec::with_capacity(level.len().div_ceil(2));
    for pair in level.chunks(2) {
      let left = pair[0];
      let right = match pair.get(1) {
        Some(right) => *right,
        None => {
          let copy = Node::new_padding(nodes[left].hash);
          nodes.push(copy);
          nodes.len() - 1
        }
      };
      let position = nodes.len();
      let hash = H::combine(&nodes[left].hash, &nodes[right].hash);
      nodes[left].parent = Some(position);
      nodes[right].parent = Some(position);
      nodes.push(Node::new_internal(hash, left, right));
      trace!("branch @{position}: {left} + {right}");
      parents.push(position);
    }
    level = parents;
  }
  level.first().copied()
}

/// Side on which the sibling of the leaf at `index` sits at each level, bottom-up.
fn expected_sides(mut index: u64, height: usize) -> impl Iterator<Item = Side> {
  (0..height).map(move |_| {
    let side = if index % 2 == 0 { Side::Right } else { Side::Left };
    index /= 2;
    side
  })
}

impl<H: Hasher> HashTree for BinaryHashTree<H> {
  type Digest = H::Digest;
  type Error = Error;

  fn append(&mut self, data: &[u8]) -> u64 {
    self.insert_leaf(data)
  }

  fn update(&mut self, index: u64, data: &[u8]) -> Result<()> {
    self.update_leaf(index, data)
  }

  fn leaf(&self, index: u64) -> Option<H::Digest> {
    BinaryHashTree::leaf(self, index)
  }

  fn size(&self) -> u64 {
    BinaryHashTree::size(self)
  }

  fn root_hash(&self) -> Option<H::Digest> {
    BinaryHashTree::root_hash(self)
  }

  /// Besides folding to the root, the proof must have one step per level with the sibling on the side
  /// that `index` implies, so a valid proof for another position is rejected.
  fn verify_path(&self, index: u64, data: &[u8], proof: &Proof<H::Digest>) -> Result<bool> {
    self.leaf_position(index)?;
    let Some(root) = self.root_hash() else {
      return Ok(false);
    };
    let height = self.height();
    if proof.len() != height || !proof.steps().iter().map(|step| step.side).eq(expected_sides(index, height)) {
      return Ok(false);
    }
    Ok(crate::proof::verify_proof::<H>(&root, &H::hash(data), proof))
  }

  fn generate_proof(&self, index: u64) -> Result<Proof<H::Digest>> {
    BinaryHashTree::generate_proof(self, index)
  }
}

#[cfg(test)]
mod test;
