//! Backend Integration Tests
//!
//! Cross-cutting tests run against every StorageBackend implementation:
//! - Trait compliance
//! - Batch and transaction atomicity
//! - Persistence across reopen for sled

use anyhow::Result;
use lib_storage::keys;
use lib_storage::{BatchOp, MemoryBackend, SledBackend, StateTx, StorageBackend};
use lib_types::Address;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a sled backend in a fresh temporary directory
fn create_temp_sled() -> Result<(SledBackend, TempDir)> {
    let temp_dir = TempDir::new()?;
    let backend = SledBackend::open(temp_dir.path())?;
    Ok((backend, temp_dir))
}

// ============================================================================
// Trait Compliance Tests
// ============================================================================

/// Generic suite run against any StorageBackend implementation
mod trait_compliance {
    use super::*;

    fn check_crud<B: StorageBackend>(backend: &B) -> Result<()> {
        backend.put(b"key1", b"value1")?;
        backend.put(b"key2", b"value2")?;

        assert_eq!(backend.get(b"key1")?, Some(b"value1".to_vec()));
        assert_eq!(backend.get(b"nonexistent")?, None);
        assert!(backend.contains_key(b"key2")?);

        backend.put(b"key1", b"updated")?;
        assert_eq!(backend.get(b"key1")?, Some(b"updated".to_vec()));

        backend.remove(b"key1")?;
        assert!(!backend.contains_key(b"key1")?);

        // Removing a missing key is not an error
        assert_eq!(backend.remove(b"nonexistent")?, None);
        Ok(())
    }

    fn check_prefix_scan<B: StorageBackend>(backend: &B) -> Result<()> {
        for i in 0..20u64 {
            backend.put(&keys::rotation::snapshot_key(i), b"s")?;
        }
        for i in 0..5u8 {
            backend.put(&keys::staking::validator_key(&Address::new([i + 1; 32])), b"v")?;
        }

        let snaps = backend.keys_with_prefix(keys::rotation::SNAPSHOT_PREFIX)?;
        assert_eq!(snaps.len(), 20);
        let slots: Vec<u64> = snaps.iter().filter_map(|k| keys::parse_u64_suffix(k)).collect();
        assert_eq!(slots, (0..20).collect::<Vec<_>>());

        let validators = backend.keys_with_prefix(keys::staking::VALIDATOR_PREFIX)?;
        assert_eq!(validators.len(), 5);
        assert!(backend.keys_with_prefix(b"nothing/")?.is_empty());
        Ok(())
    }

    fn check_batch<B: StorageBackend>(backend: &B) -> Result<()> {
        backend.put(b"to_delete", b"delete_me")?;
        backend.write_batch(vec![
            BatchOp::Put { key: b"batch:1".to_vec(), value: b"value1".to_vec() },
            BatchOp::Put { key: b"batch:2".to_vec(), value: b"value2".to_vec() },
            BatchOp::Delete { key: b"to_delete".to_vec() },
        ])?;

        assert_eq!(backend.get(b"batch:1")?, Some(b"value1".to_vec()));
        assert_eq!(backend.get(b"batch:2")?, Some(b"value2".to_vec()));
        assert_eq!(backend.get(b"to_delete")?, None);
        Ok(())
    }

    fn check_state_tx<B: StorageBackend>(backend: &B) -> Result<()> {
        let addr = Address::new([9u8; 32]);
        let mut tx = StateTx::new(backend);
        tx.put(keys::staking::MIN_STAKE, &1_000u128)?;
        tx.put(keys::staking::PENDING_SET, &vec![addr])?;
        assert_eq!(backend.get(keys::staking::MIN_STAKE)?, None);
        tx.commit()?;

        let tx = StateTx::new(backend);
        assert_eq!(tx.get::<u128>(keys::staking::MIN_STAKE)?, Some(1_000));
        assert_eq!(tx.get::<Vec<Address>>(keys::staking::PENDING_SET)?, Some(vec![addr]));
        Ok(())
    }

    #[test]
    fn test_memory_compliance() -> Result<()> {
        check_crud(&MemoryBackend::new())?;
        check_prefix_scan(&MemoryBackend::new())?;
        check_batch(&MemoryBackend::new())?;
        check_state_tx(&MemoryBackend::new())
    }

    #[test]
    fn test_sled_compliance() -> Result<()> {
        let (backend, _dir) = create_temp_sled()?;
        check_crud(&backend)?;
        let (backend, _dir) = create_temp_sled()?;
        check_prefix_scan(&backend)?;
        let (backend, _dir) = create_temp_sled()?;
        check_batch(&backend)?;
        let (backend, _dir) = create_temp_sled()?;
        check_state_tx(&backend)
    }
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[test]
fn test_committed_state_survives_reopen() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("chain");

    {
        let backend = SledBackend::open(&path)?;
        let mut tx = StateTx::new(&backend);
        tx.put(keys::meta::SCHEMA_VERSION, &keys::meta::CURRENT_SCHEMA_VERSION)?;
        tx.put(&keys::STAKE_BALLOTS.next_id(), &3u64)?;
        tx.commit()?;
        backend.flush()?;
    }

    let backend = SledBackend::open(&path)?;
    let tx = StateTx::new(&backend);
    assert_eq!(
        tx.get::<u32>(keys::meta::SCHEMA_VERSION)?,
        Some(keys::meta::CURRENT_SCHEMA_VERSION)
    );
    assert_eq!(tx.get::<u64>(&keys::STAKE_BALLOTS.next_id())?, Some(3));
    Ok(())
}

#[test]
fn test_uncommitted_state_never_persists() -> Result<()> {
    let (backend, _dir) = create_temp_sled()?;
    {
        let mut tx = StateTx::new(&backend);
        tx.put(b"ghost", &1u8)?;
    }
    assert!(backend.is_empty()?);
    Ok(())
}
