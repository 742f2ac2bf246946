use std::sync::Arc;

use anyhow::Context;
use extendible_hash_index::{
    BufferPoolManager, DefaultKeyComparator, DiskManager, ExtendibleHashTable, IdentityHashFunction,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(|| "index.db".into());
    let disk_manager =
        DiskManager::new(&db_path).with_context(|| format!("failed to open {db_path}"))?;
    let buffer_pool_manager = Arc::new(BufferPoolManager::new(disk_manager, 64, 4));

    let table = ExtendibleHashTable::<u64, u64, _, _>::new(
        "demo".into(),
        buffer_pool_manager,
        2,
        4,
        4,
        IdentityHashFunction,
        DefaultKeyComparator,
    )
    .context("invalid hash table configuration")?;

    for key in 0..16u64 {
        let inserted = table.insert(key, key * 10)?;
        log::info!("insert({key}) -> {inserted}");
    }

    table.verify_integrity()?;
    table.print_ht()?;

    for key in [3u64, 99] {
        match table.get_value(&key)? {
            Some(value) => log::info!("get({key}) -> {value}"),
            None => log::info!("get({key}) -> absent"),
        }
    }

    Ok(())
}
