//! pagedb workload driver - runs concurrent transactions against a
//! file-backed heap table and checks what survives.

use anyhow::{bail, Context, Result};
use clap::Parser as ClapParser;
use log::{debug, info, warn};
use pagedb::access::HeapFile;
use pagedb::catalog::Catalog;
use pagedb::config::{BufferPoolConfig, DEFAULT_PAGES, DEFAULT_PAGE_SIZE};
use pagedb::storage::{BufferPool, BufferPoolError, FilePageStore, PageId, Permission, TableId};
use pagedb::transaction::Transaction;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const MAX_ATTEMPTS: u32 = 100;

/// pagedb - transactional buffer pool workload driver
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory
    #[arg(short = 'D', long, default_value = "./pagedb_data")]
    data_dir: PathBuf,

    /// Buffer pool capacity in pages
    #[arg(short, long, default_value_t = DEFAULT_PAGES)]
    capacity: usize,

    /// Page size in bytes
    #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Worker threads
    #[arg(short, long, default_value = "4")]
    threads: usize,

    /// Transactions per thread
    #[arg(short = 'n', long, default_value = "50")]
    transactions: usize,

    /// Operations per transaction
    #[arg(short, long, default_value = "8")]
    ops: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Row {
    worker: u32,
    seq: u64,
    payload: Vec<u8>,
}

#[derive(Default)]
struct Stats {
    committed: AtomicU64,
    aborted: AtomicU64,
    rows: AtomicU64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    std::fs::create_dir_all(&args.data_dir).context("Failed to create data directory")?;

    let config = BufferPoolConfig::new(args.capacity, args.page_size);
    config.validate().context("Invalid buffer pool configuration")?;

    let catalog = Arc::new(Catalog::new());
    let table_id = catalog.next_table_id();
    let path = args.data_dir.join(format!("{}.dat", table_id));
    let store = FilePageStore::create(&path, table_id, args.page_size)
        .with_context(|| format!("Failed to create table file {}", path.display()))?;
    let heap = Arc::new(HeapFile::new(Arc::new(store)));
    catalog.add_table("rows", heap.clone());
    info!("Table {} at {}", table_id, path.display());

    let pool = BufferPool::new(config, catalog).context("Failed to create buffer pool")?;
    let stats = Stats::default();

    info!(
        "Running {} threads x {} transactions x {} ops (capacity {}, page size {})",
        args.threads, args.transactions, args.ops, args.capacity, args.page_size
    );
    let started = Instant::now();

    thread::scope(|scope| -> Result<()> {
        let workers: Vec<_> = (0..args.threads)
            .map(|worker| {
                let pool = &pool;
                let heap = &heap;
                let stats = &stats;
                let args = &args;
                scope.spawn(move || run_worker(worker as u32, pool, heap, table_id, args, stats))
            })
            .collect();

        for worker in workers {
            match worker.join() {
                Ok(result) => result?,
                Err(_) => bail!("Worker thread panicked"),
            }
        }
        Ok(())
    })?;

    let elapsed = started.elapsed();
    let committed = stats.committed.load(Ordering::SeqCst);
    let aborted = stats.aborted.load(Ordering::SeqCst);
    let expected_rows = stats.rows.load(Ordering::SeqCst);

    let reader = Transaction::begin(&pool);
    let rows = heap
        .scan(&pool, reader.id())
        .context("Failed to scan table")?;
    reader.commit()?;

    for (record_id, bytes) in &rows {
        bincode::deserialize::<Row>(bytes)
            .with_context(|| format!("Corrupt row at {:?}", record_id))?;
    }

    println!("Committed transactions: {}", committed);
    println!("Aborted attempts:       {}", aborted);
    println!("Rows committed:         {}", expected_rows);
    println!("Rows on disk:           {}", rows.len());
    println!("Pages:                  {}", heap.num_pages()?);
    println!("Elapsed:                {:?}", elapsed);

    if rows.len() as u64 != expected_rows {
        bail!(
            "Row count mismatch: committed {} but found {}",
            expected_rows,
            rows.len()
        );
    }
    Ok(())
}

fn run_worker(
    worker: u32,
    pool: &BufferPool,
    heap: &HeapFile,
    table_id: TableId,
    args: &Args,
    stats: &Stats,
) -> Result<()> {
    let mut rng = rand::thread_rng();
    let mut seq = 0u64;

    for _ in 0..args.transactions {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let plan: Vec<bool> = (0..args.ops).map(|_| rng.gen_bool(0.6)).collect();

            match run_transaction(worker, &mut seq, pool, heap, table_id, &plan, &mut rng) {
                Ok(inserted) => {
                    stats.committed.fetch_add(1, Ordering::SeqCst);
                    stats.rows.fetch_add(inserted, Ordering::SeqCst);
                    break;
                }
                Err(e) if is_retryable(&e) && attempt < MAX_ATTEMPTS => {
                    stats.aborted.fetch_add(1, Ordering::SeqCst);
                    debug!("Worker {} retrying after: {}", worker, e);
                    thread::sleep(Duration::from_millis(rng.gen_range(1..10)));
                }
                Err(e) => {
                    warn!("Worker {} giving up after {} attempts", worker, attempt);
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}

/// Deadlock victims and pools full of uncommitted pages can succeed later.
fn is_retryable(error: &anyhow::Error) -> bool {
    match error.downcast_ref::<BufferPoolError>() {
        Some(e) => e.is_deadlock() || matches!(e, BufferPoolError::EvictionExhausted { .. }),
        None => false,
    }
}

/// Runs one transaction and returns how many rows it inserted. The handle
/// aborts on every early return.
fn run_transaction(
    worker: u32,
    seq: &mut u64,
    pool: &BufferPool,
    heap: &HeapFile,
    table_id: TableId,
    plan: &[bool],
    rng: &mut impl Rng,
) -> Result<u64> {
    let txn = Transaction::begin(pool);
    let mut inserted = 0;

    for &insert in plan {
        if insert {
            let row = Row {
                worker,
                seq: *seq,
                payload: (0..rng.gen_range(8..64)).map(|_| rng.gen()).collect(),
            };
            *seq += 1;
            let bytes = bincode::serialize(&row).context("Failed to encode row")?;
            txn.insert(table_id, bytes)?;
            inserted += 1;
        } else {
            let num_pages = heap.num_pages()?;
            if num_pages > 0 {
                let page_id = PageId::new(table_id, rng.gen_range(0..num_pages));
                txn.fetch_page(page_id, Permission::ReadOnly)?;
            }
        }
    }

    txn.commit()?;
    Ok(inserted)
}
