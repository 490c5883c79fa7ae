//! Signed and sealed documents travelling through the cache.

use doccache_core::{DocCacheResult, EnvelopeState, Operation};
use doccache_storage::{CacheStore, StoreConfig};
use doccache_test_utils::assertions::*;
use doccache_test_utils::fixtures::*;
use doccache_test_utils::keys;

#[tokio::test]
async fn end_to_end_scenario() -> DocCacheResult<()> {
    let store = CacheStore::open_with_config(StoreConfig::default()).await?;

    let token = store.set(b"hello world")?;
    assert_eq!(token.as_str().len(), 27);
    assert_eq!(store.get(&token)?, b"hello world");

    // Sign and verify
    let mut op = sample_operation("op-1");
    op.sign(keys::signing_key())?;
    op.verify(&keys::verifying_key())?;

    // Flip one character of the signature
    let mut tampered = op.clone();
    if let Some(payload) = tampered.payload_data.as_mut() {
        payload.signature = flip_signature_char(&payload.signature);
    }
    assert_signature_invalid(&tampered.verify(&keys::verifying_key()));

    // Seal under k1, open under k1 and k2
    let original_payload = op.payload_data.clone();
    let sealed_json = op.seal("k1")?;
    assert_state(&op, EnvelopeState::Sealed);

    let opened = Operation::open_serialized(&sealed_json, "k1")?;
    assert_eq!(opened.payload_data, original_payload);
    assert_authentication_failed(&Operation::open_serialized(&sealed_json, "k2"));
    Ok(())
}

#[tokio::test]
async fn sealed_document_survives_the_cache() -> DocCacheResult<()> {
    let store = CacheStore::open_with_config(StoreConfig::default()).await?;

    let mut op = signed_operation("op-2");
    let payload = op.payload_data.clone();
    op.seal("vault-pass")?;

    let token = store.set_struct(&op)?;
    let mut fetched: Operation = store.get_struct(&token)?;
    assert_eq!(fetched, op);
    assert!(fetched.payload_data.is_none());

    fetched.open("vault-pass")?;
    assert_eq!(fetched.payload_data, payload);
    assert_state(&fetched, EnvelopeState::Signed);
    fetched.verify(&keys::verifying_key())?;
    Ok(())
}

#[test]
fn unrelated_key_rejects_signature() {
    let op = signed_operation("op-3");
    assert_signature_invalid(&op.verify(&keys::unrelated_verifying_key()));
}
