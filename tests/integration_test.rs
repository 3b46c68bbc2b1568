use anyhow::Result;
use pagedb::access::{HeapFile, Mutation, TableFile};
use pagedb::catalog::Catalog;
use pagedb::concurrency::{LockManager, LockMode, WaitForGraph};
use pagedb::config::BufferPoolConfig;
use pagedb::storage::{
    BufferPool, BufferPoolError, FilePageStore, MemoryPageStore, PageId, PageStore, Permission,
    TableId,
};
use pagedb::transaction::{Transaction, TransactionId};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const PAGE_SIZE: usize = 256;
const TABLE: TableId = TableId(1);

fn memory_pool(capacity: usize, num_pages: u32) -> BufferPool {
    let store = MemoryPageStore::with_pages(TABLE, PAGE_SIZE, num_pages);
    let catalog = Arc::new(Catalog::new());
    catalog.add_table("t", Arc::new(HeapFile::new(Arc::new(store))));
    let config = BufferPoolConfig {
        capacity,
        page_size: PAGE_SIZE,
        lock_retry_ms: 1,
    };
    BufferPool::new(config, catalog).unwrap()
}

fn file_pool(path: &Path, create: bool) -> Result<(BufferPool, Arc<HeapFile>)> {
    let store = if create {
        FilePageStore::create(path, TABLE, PAGE_SIZE)?
    } else {
        FilePageStore::open(path, TABLE, PAGE_SIZE)?
    };
    let heap = Arc::new(HeapFile::new(Arc::new(store)));
    let catalog = Arc::new(Catalog::new());
    catalog.add_table("t", heap.clone());
    let pool = BufferPool::new(BufferPoolConfig::new(8, PAGE_SIZE), catalog)?;
    Ok((pool, heap))
}

fn page(n: u32) -> PageId {
    PageId::new(TABLE, n)
}

/// Polls until `condition` holds or a generous deadline passes.
fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn test_shared_upgrade_waits_for_co_holder() {
    let manager = LockManager::new();
    let t1 = TransactionId::fresh();
    let t2 = TransactionId::fresh();

    assert!(manager.acquire(t1, page(1), LockMode::Shared));
    assert!(manager.acquire(t2, page(1), LockMode::Shared));
    assert!(!manager.acquire(t1, page(1), LockMode::Exclusive));

    manager.release(t2, page(1));
    assert!(manager.acquire(t1, page(1), LockMode::Exclusive));
    assert_eq!(manager.holders_of(page(1)), vec![t1]);
    assert_eq!(manager.lock_mode(t1, page(1)), Some(LockMode::Exclusive));
}

#[test]
fn test_wait_for_graph_soundness() {
    let a = TransactionId::new(1);
    let b = TransactionId::new(2);
    let c = TransactionId::new(3);

    let mut graph = WaitForGraph::new();
    graph.add_edge(a, b);
    graph.add_edge(b, c);
    assert!(!graph.has_cycle());

    graph.add_edge(c, a);
    assert!(graph.has_cycle());
}

#[test]
fn test_requester_is_deadlock_victim() -> Result<()> {
    let pool = memory_pool(8, 2);
    let t1 = Transaction::begin(&pool);
    let t2 = Transaction::begin(&pool);
    let (t1_id, t2_id) = (t1.id(), t2.id());

    t1.fetch_page(page(0), Permission::ReadWrite)?;
    t2.fetch_page(page(1), Permission::ReadWrite)?;

    thread::scope(|scope| -> Result<()> {
        let waiter = scope.spawn(|| t2.fetch_page(page(0), Permission::ReadWrite).map(|_| ()));

        assert!(wait_until(|| pool.deadlock_detector().waits_for(t2_id) == vec![t1_id]));

        let result = t1.fetch_page(page(1), Permission::ReadWrite);
        assert!(matches!(
            result,
            Err(BufferPoolError::Deadlock { txn, page_id }) if txn == t1_id && page_id == page(1)
        ));
        assert!(pool.deadlock_detector().waits_for(t1_id).is_empty());

        // The victim aborts and the survivor proceeds
        t1.abort()?;
        match waiter.join() {
            Ok(result) => result?,
            Err(_) => panic!("waiter panicked"),
        }
        Ok(())
    })?;

    assert!(pool.holds_lock(t2_id, page(0)));
    assert!(pool.deadlock_detector().waits_for(t2_id).is_empty());
    t2.commit()?;
    Ok(())
}

#[test]
fn test_eviction_exhausted_then_recovers_after_commit() -> Result<()> {
    let pool = memory_pool(2, 3);
    let writer = Transaction::begin(&pool);

    for n in 0..2 {
        let page = writer.fetch_page(page(n), Permission::ReadWrite)?;
        let mut page = page.write();
        page.data_mut()[0] = 1;
        page.mark_dirty(writer.id());
    }

    let reader = Transaction::begin(&pool);
    let result = reader.fetch_page(page(2), Permission::ReadOnly);
    assert!(matches!(
        result,
        Err(BufferPoolError::EvictionExhausted { capacity: 2 })
    ));

    writer.commit()?;
    reader.fetch_page(page(2), Permission::ReadOnly)?;
    assert_eq!(pool.cached_page_count(), 2);
    reader.commit()?;
    Ok(())
}

#[test]
fn test_committed_rows_survive_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("table1.dat");

    {
        let (pool, _) = file_pool(&path, true)?;
        let txn = Transaction::begin(&pool);
        for i in 0..20u32 {
            txn.insert(TABLE, format!("row-{}", i).into_bytes())?;
        }
        txn.commit()?;

        // Uncommitted work is never forced
        let loser = Transaction::begin(&pool);
        loser.insert(TABLE, b"lost".to_vec())?;
        loser.abort()?;
    }

    let (pool, heap) = file_pool(&path, false)?;
    let txn = Transaction::begin(&pool);
    let rows: Vec<String> = heap
        .scan(&pool, txn.id())?
        .into_iter()
        .map(|(_, bytes)| String::from_utf8(bytes))
        .collect::<Result<_, _>>()?;
    txn.commit()?;

    assert_eq!(rows.len(), 20);
    assert!(rows.contains(&"row-0".to_string()));
    assert!(rows.contains(&"row-19".to_string()));
    assert!(!rows.contains(&"lost".to_string()));
    Ok(())
}

#[test]
fn test_abort_leaves_cache_matching_store() -> Result<()> {
    let dir = tempdir()?;
    let (pool, heap) = file_pool(&dir.path().join("table1.dat"), true)?;

    let setup = Transaction::begin(&pool);
    setup.insert(TABLE, b"committed".to_vec())?;
    setup.commit()?;

    let txn = Transaction::begin(&pool);
    let pages = txn.insert(TABLE, b"doomed".to_vec())?;
    let record_id = heap.scan(&pool, txn.id())?[0].0;
    pool.apply_mutation(txn.id(), TABLE, Mutation::Delete(record_id))?;
    txn.abort()?;

    for page in pages {
        let page = page.read();
        assert!(!page.is_dirty());
        assert_eq!(page.data(), heap.page_store().read_page(page.id())?.data());
    }

    let reader = Transaction::begin(&pool);
    let rows = heap.scan(&pool, reader.id())?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, b"committed".to_vec());
    Ok(())
}

#[test]
fn test_concurrent_inserts_all_committed() -> Result<()> {
    const THREADS: usize = 4;
    const ROWS: usize = 25;

    let dir = tempdir()?;
    let (pool, heap) = file_pool(&dir.path().join("table1.dat"), true)?;

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let pool = &pool;
            scope.spawn(move || {
                for i in 0..ROWS {
                    loop {
                        let txn = Transaction::begin(pool);
                        let row = format!("{}:{}", worker, i).into_bytes();
                        match txn.insert(TABLE, row).and_then(|_| txn.commit()) {
                            Ok(()) => break,
                            Err(e) if e.is_deadlock() => continue,
                            Err(e) => panic!("insert failed: {}", e),
                        }
                    }
                }
            });
        }
    });

    let reader = Transaction::begin(&pool);
    let rows = heap.scan(&pool, reader.id())?;
    reader.commit()?;
    assert_eq!(rows.len(), THREADS * ROWS);
    assert!(pool.lock_manager().holders_of(page(0)).is_empty());
    Ok(())
}
