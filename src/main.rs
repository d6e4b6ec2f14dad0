use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use merkle_hashtree::{
  BinaryHashTree, Blake3, HashTree, Hasher, Proof, RebuildStrategy, Sha3_128, Side, u64_to_rand_bytes, verify_proof,
};
use rand::Rng;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::time::Instant;

mod stat;

#[derive(Parser)]
#[command(name = "merkle")]
#[command(author, version, about = "Build binary hash trees, prove membership of blocks and benchmark mutations")]
struct Args {
  /// Hash function for leaves and branches
  #[arg(long, value_enum, global = true, default_value_t = HashKind::Sha3)]
  hash: HashKind,

  /// How a leaf update brings the root up to date
  #[arg(long, value_enum, global = true, default_value_t = Strategy::Full)]
  strategy: Strategy,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Build a tree, prove one block, then insert and update blocks
  Demo(DemoArgs),
  /// Measure build, insert, update and proof times over growing trees
  Bench(BenchArgs),
}

#[derive(clap::Args)]
struct DemoArgs {
  /// Data blocks, one leaf each [default: data1 data2 data3 data4]
  blocks: Vec<String>,

  /// Leaf to prove
  #[arg(short, long, default_value_t = 0)]
  index: u64,

  /// Block appended after the proof
  #[arg(long, default_value = "data5")]
  insert: String,

  /// Leaf replaced after the insertion
  #[arg(long, default_value_t = 1)]
  update_index: u64,

  /// Replacement block for --update-index
  #[arg(long, default_value = "updated_data2")]
  update_data: String,

  /// Also print the wire encoding of the proof
  #[arg(long, default_value_t = false)]
  encode: bool,
}

#[derive(clap::Args)]
struct BenchArgs {
  /// Largest number of leaves
  #[arg(short = 'n', long, default_value_t = 64 * 1024)]
  max_n: u64,

  /// Number of steps between 0 and --max-n
  #[arg(short, long, default_value_t = 8)]
  division: u64,

  /// Measurements per leaf count
  #[arg(short, long, default_value_t = 10)]
  trials: usize,

  /// Output directory for the CSV reports
  #[arg(short, long, default_value = ".")]
  output: PathBuf,

  /// Prefix of the report files
  #[arg(short, long, default_value_t = Local::now().format("%Y%m%d%H%M%S").to_string())]
  session: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum HashKind {
  /// SHA3-256 truncated to 128 bits
  Sha3,
  /// BLAKE3, 256 bits
  Blake3,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
  Full,
  Path,
}

impl From<Strategy> for RebuildStrategy {
  fn from(strategy: Strategy) -> Self {
    match strategy {
      Strategy::Full => RebuildStrategy::Full,
      Strategy::Path => RebuildStrategy::Path,
    }
  }
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  let args = Args::parse();
  let strategy = RebuildStrategy::from(args.strategy);

  match (&args.command, args.hash) {
    (Command::Demo(demo), HashKind::Sha3) => run_demo::<Sha3_128>(demo, strategy),
    (Command::Demo(demo), HashKind::Blake3) => run_demo::<Blake3>(demo, strategy),
    (Command::Bench(bench), HashKind::Sha3) => run_bench::<Sha3_128>(bench, "sha3", strategy),
    (Command::Bench(bench), HashKind::Blake3) => run_bench::<Blake3>(bench, "blake3", strategy),
  }
}

fn run_demo<H: Hasher>(args: &DemoArgs, strategy: RebuildStrategy) -> Result<()> {
  let blocks = if args.blocks.is_empty() {
    (1..=4).map(|i| format!("data{i}")).collect()
  } else {
    args.blocks.clone()
  };

  let mut tree = BinaryHashTree::<H>::new(&blocks).with_strategy(strategy);
  println!("Merkle Root Hash: {}", root_hex(&tree));

  let proof =
    tree.generate_proof(args.index).with_context(|| format!("cannot generate proof for leaf {}", args.index))?;
  println!("Merkle proof for leaf {}:", args.index);
  for step in proof.steps() {
    let side = match step.side {
      Side::Left => "L",
      Side::Right => "R",
    };
    println!("  {side} {}", hex::encode(step.sibling));
  }
  if args.encode {
    println!("Encoded proof: {}", hex::encode(proof.to_bytes()?));
  }

  let leaf = H::hash(blocks[args.index as usize].as_bytes());
  let valid = tree.root_hash().is_some_and(|root| verify_proof::<H>(&root, &leaf, &proof));
  println!("Proof valid: {valid}");

  tree.insert_leaf(args.insert.as_bytes());
  println!("New Merkle Root Hash after insertion: {}", root_hex(&tree));

  tree
    .update_leaf(args.update_index, args.update_data.as_bytes())
    .with_context(|| format!("cannot update leaf {}", args.update_index))?;
  println!("New Merkle Root Hash after updating leaf {}: {}", args.update_index, root_hex(&tree));
  Ok(())
}

fn root_hex<H: Hasher>(tree: &BinaryHashTree<H>) -> String {
  tree.root_hash().map(hex::encode).unwrap_or_else(|| "(empty)".to_string())
}

fn run_bench<H: Hasher>(args: &BenchArgs, hash: &str, strategy: RebuildStrategy) -> Result<()> {
  create_dir_all(&args.output)?;
  info!("Output directory: {:?}", &args.output);

  let step = (args.max_n / args.division.max(1)).max(1) as usize;
  let sizes = (0..=args.max_n).step_by(step).collect::<Vec<_>>();
  let blocks = (0..=args.max_n)
    .map(|i| {
      let mut buffer = [0u8; 8];
      u64_to_rand_bytes(i, &mut buffer);
      buffer
    })
    .collect::<Vec<_>>();

  let case = |name: &str| format!("{name}-{hash}");

  // build
  let mut report = stat::Report::new();
  println!("[{}]", case("build"));
  for &n in sizes.iter() {
    for _ in 0..args.trials {
      let t0 = Instant::now();
      let tree = BinaryHashTree::<H>::new(&blocks[..n as usize]);
      report.add(n, t0.elapsed());
      drop(tree);
    }
    println!("  n={n}: {}", report.single(n));
  }
  save(&report, args, &case("build"))?;

  // insert
  let mut report = stat::Report::new();
  println!("[{}]", case("insert"));
  for &n in sizes.iter() {
    for _ in 0..args.trials {
      let mut tree = BinaryHashTree::<H>::new(&blocks[..n as usize]);
      let t0 = Instant::now();
      tree.append(&blocks[n as usize]);
      report.add(n, t0.elapsed());
    }
    println!("  n={n}: {}", report.single(n));
  }
  save(&report, args, &case("insert"))?;

  // update and proof need at least one leaf
  let mut rng = rand::rng();
  let mut update = stat::Report::new();
  let mut proof = stat::Report::new();
  let name = format!("update-{}", if strategy == RebuildStrategy::Path { "path" } else { "full" });
  println!("[{}] [{}]", case(&name), case("proof"));
  for &n in sizes.iter().filter(|&&n| n > 0) {
    let mut tree = BinaryHashTree::<H>::new(&blocks[..n as usize]).with_strategy(strategy);
    for trial in 0..args.trials {
      let index = rng.random_range(0..n);
      let t0 = Instant::now();
      tree.update(index, &(trial as u64).to_le_bytes())?;
      update.add(n, t0.elapsed());

      let t0 = Instant::now();
      let valid = prove_and_verify(&tree, index, &(trial as u64).to_le_bytes())?;
      proof.add(n, t0.elapsed());
      anyhow::ensure!(valid, "proof of leaf {index} in a tree of {n} leaves does not verify");
    }
    println!("  n={n}: {} | {}", update.single(n), proof.single(n));
  }
  save(&update, args, &case(&name))?;
  save(&proof, args, &case("proof"))?;
  Ok(())
}

#[inline(never)]
fn prove_and_verify<T: HashTree<Error = merkle_hashtree::Error>>(tree: &T, index: u64, data: &[u8]) -> Result<bool> {
  let proof: Proof<T::Digest> = tree.generate_proof(index)?;
  Ok(tree.verify_path(index, data, &proof)?)
}

fn save(report: &stat::Report, args: &BenchArgs, case: &str) -> Result<()> {
  let path = report_path(&args.output, &args.session, case);
  report.save_to_csv(&path).with_context(|| format!("cannot write {}", path.to_string_lossy()))?;
  println!("==> {}", path.to_string_lossy());
  Ok(())
}

fn report_path(dir: &Path, session: &str, case: &str) -> PathBuf {
  dir.join(format!("{session}-{case}.csv"))
}
