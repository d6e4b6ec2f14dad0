use super::*;
use crate::hash::Blake3;
use crate::proof::verify_proof;

fn blocks(n: usize) -> Vec<Vec<u8>> {
  (1..=n).map(|i| format!("data{i}").into_bytes()).collect()
}

fn h(data: &[u8]) -> <Sha3_128 as Hasher>::Digest {
  Sha3_128::hash(data)
}

fn c(left: &[u8; 16], right: &[u8; 16]) -> [u8; 16] {
  Sha3_128::combine(left, right)
}

/// Every leaf reaches the root, every branch digest matches its children and every padding node
/// copies its left sibling.
fn assert_well_formed<H: Hasher>(tree: &BinaryHashTree<H>) {
  for position in 0..tree.size {
    assert_eq!(NodeKind::Leaf, tree.nodes[position].kind);
    let mut current = position;
    while let Some(parent) = tree.nodes[current].parent {
      current = parent;
    }
    assert_eq!(tree.root, Some(current), "leaf #{position} does not reach the root");
  }
  for (position, node) in tree.nodes.iter().enumerate() {
    match node.kind {
      NodeKind::Branch { left, right } => {
        assert_eq!(node.hash, H::combine(&tree.nodes[left].hash, &tree.nodes[right].hash), "@{position}");
        assert_eq!(Some(position), tree.nodes[left].parent);
        assert_eq!(Some(position), tree.nodes[right].parent);
        if tree.nodes[right].kind == NodeKind::Padding {
          assert_eq!(tree.nodes[left].hash, tree.nodes[right].hash);
        }
      }
      NodeKind::Leaf => assert!(position < tree.size),
      NodeKind::Padding => assert!(position >= tree.size),
    }
  }
  if let Some(root) = tree.root {
    assert_eq!(None, tree.nodes[root].parent);
  }
}

#[test]
fn test_new_tree() {
  let tree = BinaryHashTree::<Sha3_128>::new(blocks(4));
  assert_eq!(4, tree.size());
  assert!(tree.root_hash().is_some());
  assert_eq!(2, tree.height());
  assert_eq!(7, tree.nodes.len());
  assert_well_formed(&tree);
}

#[test]
fn known_roots() {
  for (n, expected) in [
    (1, "1feff33a31fe7bd710f738ec96e95a8a"),
    (2, "139cd84b001dd166bbf7bf71bc8590e2"),
    (3, "7aff3c83ac7da4522c7d0d48953c204b"),
    (4, "d48704c3e1eefa2a6ad9d7e6b941b12d"),
    (5, "6169e7604044c3812e71ba51626c92e5"),
  ] {
    let tree = BinaryHashTree::<Sha3_128>::new(blocks(n));
    assert_eq!(expected, hex::encode(tree.root_hash().unwrap()), "n={n}");
  }
}

#[test]
fn deterministic_root() {
  for n in 1..=17 {
    let tree1 = BinaryHashTree::<Blake3>::new(blocks(n));
    let tree2 = BinaryHashTree::<Blake3>::new(blocks(n));
    assert_eq!(tree1.root_hash(), tree2.root_hash());
  }
}

#[test]
fn odd_leaf_is_paired_with_a_copy() {
  let tree = BinaryHashTree::<Sha3_128>::new([b"A", b"B", b"C"]);
  let (a, b, cc) = (h(b"A"), h(b"B"), h(b"C"));
  assert_eq!(Some(c(&c(&a, &b), &c(&cc, &cc))), tree.root_hash());

  // the copy is a separate node that is not one of the leaves
  let paddings = tree.nodes.iter().filter(|node| node.kind == NodeKind::Padding).count();
  assert_eq!(1, paddings);
  assert_eq!(3, tree.leaves().count());
  assert_well_formed(&tree);
}

#[test]
fn odd_branch_is_paired_with_a_copy() {
  // five leaves: the lone fifth leaf is copied on level 0, and its parent again on level 1
  let tree = BinaryHashTree::<Sha3_128>::new(blocks(5));
  let l = blocks(5).iter().map(|b| h(b)).collect::<Vec<_>>();
  let e = c(&l[4], &l[4]);
  let expected = c(&c(&c(&l[0], &l[1]), &c(&l[2], &l[3])), &c(&e, &e));
  assert_eq!(Some(expected), tree.root_hash());
  assert_eq!(3, tree.height());
  assert_well_formed(&tree);
}

#[test]
fn single_leaf_tree() {
  let tree = BinaryHashTree::<Sha3_128>::new([b"only"]);
  let root = tree.root_hash().unwrap();
  assert_eq!(h(b"only"), root);
  assert_eq!(0, tree.height());

  let proof = tree.generate_proof(0).unwrap();
  assert!(proof.is_empty());
  assert!(verify_proof::<Sha3_128>(&root, &h(b"only"), &proof));
}

#[test]
fn empty_tree() {
  let mut tree = BinaryHashTree::<Sha3_128>::new(Vec::<Vec<u8>>::new());
  assert!(tree.is_empty());
  assert_eq!(None, tree.root_hash());
  assert_eq!(None, tree.leaf(0));
  assert_eq!(0, tree.height());
  assert!(matches!(tree.generate_proof(0), Err(Error::OutOfRange { index: 0, size: 0 })));
  assert!(matches!(tree.update_leaf(0, b"x"), Err(Error::OutOfRange { .. })));

  assert_eq!(0, tree.insert_leaf(b"first"));
  assert_eq!(Some(h(b"first")), tree.root_hash());
  assert_well_formed(&tree);
}

#[test]
fn generate_proof() {
  let tree = BinaryHashTree::<Sha3_128>::new(blocks(4));
  let proof = tree.generate_proof(0).unwrap();
  assert_eq!(2, proof.len());
  assert_eq!(ProofStep { sibling: h(b"data2"), side: Side::Right }, proof.steps()[0]);
  assert_eq!(ProofStep { sibling: c(&h(b"data3"), &h(b"data4")), side: Side::Right }, proof.steps()[1]);

  // the sibling of a right child is the left leaf
  let proof = tree.generate_proof(1).unwrap();
  assert_eq!(Some(&tree.leaf(0).unwrap()), proof.siblings().next());
  assert_eq!(Side::Left, proof.steps()[0].side);
}

#[test]
fn proof_of_padded_leaf_contains_its_own_digest() {
  let tree = BinaryHashTree::<Sha3_128>::new(blocks(3));
  let proof = tree.generate_proof(2).unwrap();
  assert_eq!(ProofStep { sibling: h(b"data3"), side: Side::Right }, proof.steps()[0]);
  assert_eq!(ProofStep { sibling: c(&h(b"data1"), &h(b"data2")), side: Side::Left }, proof.steps()[1]);
}

#[test]
fn every_proof_verifies() {
  for n in 1..=33 {
    let data = blocks(n);
    let tree = BinaryHashTree::<Blake3>::new(&data);
    let root = tree.root_hash().unwrap();
    for (i, block) in data.iter().enumerate() {
      let proof = tree.generate_proof(i as u64).unwrap();
      assert_eq!(tree.height(), proof.len());
      assert!(verify_proof::<Blake3>(&root, &Blake3::hash(block), &proof), "n={n}, i={i}");
      assert!(tree.verify_path(i as u64, block, &proof).unwrap(), "n={n}, i={i}");
    }
  }
}

#[test]
fn tampered_proofs_are_rejected() {
  let data = blocks(7);
  let tree = BinaryHashTree::<Sha3_128>::new(&data);
  let root = tree.root_hash().unwrap();
  for i in 0..data.len() {
    let proof = tree.generate_proof(i as u64).unwrap();
    let leaf = h(&data[i]);

    assert!(!verify_proof::<Sha3_128>(&root, &h(b"forged"), &proof));
    for step in 0..proof.len() {
      for byte in [0, 15] {
        let mut tampered = proof.clone();
        tampered.steps_mut()[step].sibling[byte] ^= 0x01;
        assert!(!verify_proof::<Sha3_128>(&root, &leaf, &tampered), "i={i}, step={step}, byte={byte}");
      }
    }
  }

  // flipping a side matters unless both operands are equal (a padded leaf paired with itself)
  let mut flipped = tree.generate_proof(1).unwrap();
  flipped.steps_mut()[0].side = Side::Right;
  assert!(!verify_proof::<Sha3_128>(&root, &h(&data[1]), &flipped));
}

#[test]
fn verify_path_binds_the_position() {
  let data = blocks(4);
  let tree = BinaryHashTree::<Sha3_128>::new(&data);
  let proof = tree.generate_proof(1).unwrap();
  assert!(tree.verify_path(1, &data[1], &proof).unwrap());
  assert!(!tree.verify_path(1, &data[0], &proof).unwrap());
  assert!(!tree.verify_path(0, &data[1], &proof).unwrap());
  assert!(matches!(tree.verify_path(4, &data[1], &proof), Err(Error::OutOfRange { index: 4, size: 4 })));

  // a proof for the padded leaf replayed at another position
  let data = blocks(3);
  let tree = BinaryHashTree::<Sha3_128>::new(&data);
  let proof = tree.generate_proof(2).unwrap();
  assert!(tree.verify_path(2, &data[2], &proof).unwrap());
  assert!(!tree.verify_path(0, &data[2], &proof).unwrap());
}

#[test]
fn out_of_range() {
  let mut tree = BinaryHashTree::<Sha3_128>::new(blocks(4));
  let root = tree.root_hash();

  for index in [4, 5, u64::MAX] {
    match tree.generate_proof(index) {
      Err(err @ Error::OutOfRange { .. }) => {
        assert_eq!(format!("index out of bounds: {index} (size 4)"), err.to_string())
      }
      other => panic!("unexpected result: {other:?}"),
    }
    assert!(matches!(tree.update_leaf(index, b"updated_data1"), Err(Error::OutOfRange { size: 4, .. })));
    assert_eq!(root, tree.root_hash());
  }
  assert_eq!(blocks(4).iter().map(|b| h(b)).collect::<Vec<_>>(), tree.leaves().copied().collect::<Vec<_>>());
}

#[test]
fn insert_leaf_changes_root() {
  let mut tree = BinaryHashTree::<Sha3_128>::new(blocks(2));
  let original = tree.root_hash();

  assert_eq!(2, tree.insert_leaf(b"data3"));
  assert_ne!(original, tree.root_hash());
  assert_eq!(BinaryHashTree::<Sha3_128>::new(blocks(3)).root_hash(), tree.root_hash());
  assert_eq!(3, tree.size());
  assert_well_formed(&tree);
}

#[test]
fn insert_discards_previous_internal_nodes() {
  let mut tree = BinaryHashTree::<Sha3_128>::new(Vec::<&[u8]>::new());
  for (n, block) in blocks(16).iter().enumerate() {
    tree.insert_leaf(block);
    let rebuilt = BinaryHashTree::<Sha3_128>::new(blocks(n + 1));
    assert_eq!(rebuilt.root_hash(), tree.root_hash());
    assert_eq!(rebuilt.nodes.len(), tree.nodes.len());
    assert_well_formed(&tree);
  }
}

#[test]
fn update_leaf_changes_root() {
  let mut tree = BinaryHashTree::<Sha3_128>::new(blocks(2));
  let original = tree.root_hash();

  tree.update_leaf(0, b"updated_data1").unwrap();
  assert_ne!(original, tree.root_hash());
  assert_eq!(Some(h(b"updated_data1")), tree.leaf(0));
  assert_eq!(BinaryHashTree::<Sha3_128>::new([b"updated_data1".as_slice(), b"data2"]).root_hash(), tree.root_hash());
  assert_well_formed(&tree);
}

#[test]
fn update_keeps_leaf_positions() {
  let mut tree = BinaryHashTree::<Sha3_128>::new(blocks(5));
  tree.update_leaf(4, b"updated_data5").unwrap();
  assert_eq!(NodeKind::Leaf, tree.nodes[4].kind);
  assert_eq!(h(b"updated_data5"), tree.nodes[4].hash);
  for i in 0..4 {
    assert_eq!(h(&blocks(5)[i]), tree.nodes[i].hash);
  }
}

#[test]
fn path_strategy_matches_full_rebuild() {
  for n in 1..=19 {
    let mut full = BinaryHashTree::<Blake3>::new(blocks(n));
    let mut path = BinaryHashTree::<Blake3>::new(blocks(n)).with_strategy(RebuildStrategy::Path);
    assert_eq!(RebuildStrategy::Path, path.strategy());
    for i in 0..n as u64 {
      let data = format!("updated{i}");
      full.update_leaf(i, data.as_bytes()).unwrap();
      path.update_leaf(i, data.as_bytes()).unwrap();
      assert_eq!(full.root_hash(), path.root_hash(), "n={n}, i={i}");
      assert_well_formed(&path);
    }
    for i in 0..n as u64 {
      assert_eq!(full.generate_proof(i).unwrap(), path.generate_proof(i).unwrap());
    }

    // inserts always rebuild, whatever the strategy
    full.insert_leaf(b"tail");
    path.insert_leaf(b"tail");
    assert_eq!(full.root_hash(), path.root_hash());
  }
}

#[test]
fn path_strategy_refreshes_padding_copies() {
  let mut tree = BinaryHashTree::<Sha3_128>::new(blocks(5)).with_strategy(RebuildStrategy::Path);
  tree.update_leaf(4, b"X").unwrap();
  let l = blocks(4).iter().map(|b| h(b)).collect::<Vec<_>>();
  let e = c(&h(b"X"), &h(b"X"));
  let expected = c(&c(&c(&l[0], &l[1]), &c(&l[2], &l[3])), &c(&e, &e));
  assert_eq!(Some(expected), tree.root_hash());
}

#[test]
fn from_digests_matches_new() {
  let digests = blocks(6).iter().map(|b| Blake3::hash(b)).collect::<Vec<_>>();
  let tree = BinaryHashTree::<Blake3>::from_digests(digests.clone());
  assert_eq!(BinaryHashTree::<Blake3>::new(blocks(6)).root_hash(), tree.root_hash());
  assert_eq!(digests, tree.leaves().copied().collect::<Vec<_>>());
}

#[test]
fn hash_tree_trait() {
  fn fill<T: HashTree<Error = Error>>(tree: &mut T, n: usize) {
    for block in blocks(n) {
      tree.append(&block);
    }
  }
  let mut tree = BinaryHashTree::<Sha3_128>::new(Vec::<Vec<u8>>::new());
  fill(&mut tree, 4);
  assert_eq!(4, HashTree::size(&tree));
  assert_eq!(BinaryHashTree::<Sha3_128>::new(blocks(4)).root_hash(), HashTree::root_hash(&tree));
  HashTree::update(&mut tree, 3, b"x").unwrap();
  assert_eq!(Some(h(b"x")), HashTree::leaf(&tree, 3));
  let proof = HashTree::generate_proof(&tree, 3).unwrap();
  assert!(tree.verify_path(3, b"x", &proof).unwrap());
}
