//! In-memory [`CustodyStore`].
//!
//! All three relations sit behind one `parking_lot::RwLock`, so every
//! commit is a single critical section. The lock is never held across an
//! `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use custody_core::{CredentialId, DisputeReason, EventId, ItemId, ItemKey, Timestamp};
use parking_lot::RwLock;

use super::{
    ArtifactRef, ClaimCommit, CredentialRecord, CustodyStore, ItemRecord, OwnershipEventRecord,
    StoreError, StoreSnapshot,
};

#[derive(Debug, Default)]
struct Tables {
    items: HashMap<ItemId, ItemRecord>,
    keys: HashMap<ItemKey, ItemId>,
    /// Insertion order is creation order.
    credentials: Vec<CredentialRecord>,
    events: Vec<OwnershipEventRecord>,
}

impl Tables {
    fn item_mut(&mut self, id: ItemId) -> Result<&mut ItemRecord, StoreError> {
        self.items
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("item {id}")))
    }

    fn credential_index(&self, item: ItemId, id: CredentialId) -> Result<usize, StoreError> {
        self.credentials
            .iter()
            .position(|c| c.id == id && c.item_id == item)
            .ok_or_else(|| StoreError::NotFound(format!("credential {id}")))
    }

    fn live_credential(&self, item: ItemId, id: CredentialId) -> Result<usize, StoreError> {
        let idx = self.credential_index(item, id)?;
        if self.credentials[idx].revoked {
            return Err(StoreError::Conflict(format!("credential {id} already revoked")));
        }
        Ok(idx)
    }
}

/// Process-local store. Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustodyStore for MemoryStore {
    async fn find_item(&self, key: &ItemKey) -> Result<Option<ItemRecord>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .keys
            .get(key)
            .and_then(|id| tables.items.get(id))
            .cloned())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<ItemRecord>, StoreError> {
        Ok(self.tables.read().items.get(&id).cloned())
    }

    async fn credentials(&self, item: ItemId) -> Result<Vec<CredentialRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .credentials
            .iter()
            .filter(|c| c.item_id == item)
            .cloned()
            .collect())
    }

    async fn events(&self, item: ItemId) -> Result<Vec<OwnershipEventRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .events
            .iter()
            .filter(|e| e.item_id == item)
            .cloned()
            .collect())
    }

    async fn get_event(&self, id: EventId) -> Result<Option<OwnershipEventRecord>, StoreError> {
        Ok(self.tables.read().events.iter().find(|e| e.id == id).cloned())
    }

    async fn create_item(
        &self,
        item: ItemRecord,
        first: CredentialRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.keys.contains_key(&item.key) {
            return Err(StoreError::Conflict(format!("item {} already exists", item.key)));
        }
        if first.item_id != item.id || first.revoked {
            return Err(StoreError::Corrupt(
                "first credential must be live and belong to the item".into(),
            ));
        }
        tables.keys.insert(item.key.clone(), item.id);
        tables.items.insert(item.id, item);
        tables.credentials.push(first);
        Ok(())
    }

    async fn commit_claim(&self, commit: ClaimCommit) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let idx = tables.live_credential(commit.item_id, commit.consumed)?;
        // Validate the item before the first write so a miss leaves nothing behind.
        tables.item_mut(commit.item_id)?;

        let at = commit.event.created_at;
        let consumed = &mut tables.credentials[idx];
        consumed.revoked = true;
        consumed.revoked_at = Some(at);

        let item = tables.item_mut(commit.item_id)?;
        if item.pending_credential == Some(commit.consumed) {
            item.pending_credential = None;
        }
        item.certificate = Some(commit.certificate);

        tables.credentials.push(commit.next);
        tables.events.push(commit.event);
        Ok(())
    }

    async fn commit_transfer(
        &self,
        item: ItemId,
        credential: CredentialId,
        handoff: ArtifactRef,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let idx = tables.live_credential(item, credential)?;
        let pending = tables.item_mut(item)?.pending_credential;
        if let Some(pending) = pending {
            let pending_live = tables
                .credentials
                .iter()
                .any(|c| c.id == pending && !c.revoked);
            if pending_live {
                return Err(StoreError::Conflict(format!(
                    "transfer already pending under {pending}"
                )));
            }
        }
        tables.credentials[idx].handoff = Some(handoff);
        tables.item_mut(item)?.pending_credential = Some(credential);
        Ok(())
    }

    async fn commit_cancel(
        &self,
        item: ItemId,
        credential: CredentialId,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.item_mut(item)?.pending_credential != Some(credential) {
            return Err(StoreError::Conflict(format!(
                "no transfer pending under {credential}"
            )));
        }
        let idx = tables.live_credential(item, credential)?;
        let record = &mut tables.credentials[idx];
        record.revoked = true;
        record.revoked_at = Some(at);
        tables.item_mut(item)?.pending_credential = None;
        Ok(())
    }

    async fn mark_disputed(
        &self,
        item: ItemId,
        credential: CredentialId,
        event: EventId,
        reason: DisputeReason,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        tables.live_credential(item, credential)?;
        let record = tables
            .events
            .iter_mut()
            .find(|e| e.id == event && e.item_id == item)
            .ok_or_else(|| StoreError::NotFound(format!("event {event}")))?;
        record.disputed = true;
        record.dispute_reason.get_or_insert(reason);
        Ok(())
    }

    async fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        let tables = self.tables.read();
        let mut items: Vec<ItemRecord> = tables.items.values().cloned().collect();
        items.sort_by(|a, b| (a.created_at, &a.key).cmp(&(b.created_at, &b.key)));
        Ok(StoreSnapshot {
            items,
            credentials: tables.credentials.clone(),
            events: tables.events.clone(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::derive_state;
    use custody_core::ContentId;
    use custody_crypto::SecretDigest;
    use custody_state::CustodyState;

    fn digest() -> SecretDigest {
        SecretDigest {
            hash: "$argon2id$stub".into(),
            salt: "stub".into(),
        }
    }

    fn artifact(tag: &str) -> ArtifactRef {
        let cid = ContentId::new(format!("Qm{}", tag.repeat(44 / tag.len()))).unwrap();
        ArtifactRef {
            url: format!("https://gateway.test/ipfs/{cid}"),
            cid,
        }
    }

    async fn seeded() -> (MemoryStore, ItemRecord, CredentialRecord) {
        let store = MemoryStore::new();
        let now = Timestamp::now();
        let item = ItemRecord {
            id: ItemId::new(),
            key: ItemKey::new("SKU1", "S1").unwrap(),
            item_name: Some("Watch".into()),
            item_description: None,
            photo_cid: None,
            certificate: Some(artifact("a")),
            pending_credential: None,
            created_by: None,
            created_at: now,
        };
        let first = CredentialRecord::issued(item.id, digest(), now);
        store.create_item(item.clone(), first.clone()).await.unwrap();
        (store, item, first)
    }

    fn claim(item: &ItemRecord, consumed: CredentialId) -> ClaimCommit {
        let now = Timestamp::now();
        ClaimCommit {
            item_id: item.id,
            consumed,
            next: CredentialRecord::issued(item.id, digest(), now),
            event: OwnershipEventRecord {
                id: EventId::new(),
                item_id: item.id,
                credential_id: consumed,
                claimant_name: "Alice".into(),
                certificate: Some(artifact("b")),
                disputed: false,
                dispute_reason: None,
                created_at: now,
            },
            certificate: artifact("b"),
        }
    }

    #[tokio::test]
    async fn duplicate_key_conflicts() {
        let (store, item, _) = seeded().await;
        let again = ItemRecord {
            id: ItemId::new(),
            ..item
        };
        let cred = CredentialRecord::issued(again.id, digest(), Timestamp::now());
        let err = store.create_item(again, cred).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn claim_rotates_and_second_claim_conflicts() {
        let (store, item, first) = seeded().await;
        store.commit_claim(claim(&item, first.id)).await.unwrap();

        let creds = store.credentials(item.id).await.unwrap();
        assert_eq!(creds.len(), 2);
        assert!(creds[0].revoked);
        assert!(!creds[1].revoked);
        assert_eq!(store.events(item.id).await.unwrap().len(), 1);

        let err = store.commit_claim(claim(&item, first.id)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.events(item.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transfer_then_cancel_revokes() {
        let (store, item, first) = seeded().await;
        store
            .commit_transfer(item.id, first.id, artifact("c"))
            .await
            .unwrap();
        let err = store
            .commit_transfer(item.id, first.id, artifact("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store
            .commit_cancel(item.id, first.id, Timestamp::now())
            .await
            .unwrap();
        let item = store.get_item(item.id).await.unwrap().unwrap();
        let creds = store.credentials(item.id).await.unwrap();
        assert_eq!(item.pending_credential, None);
        assert!(matches!(
            derive_state(&item, &creds).unwrap(),
            CustodyState::Revoked { .. }
        ));
    }

    #[tokio::test]
    async fn cancel_without_pending_conflicts() {
        let (store, item, first) = seeded().await;
        let err = store
            .commit_cancel(item.id, first.id, Timestamp::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(!store.credentials(item.id).await.unwrap()[0].revoked);
    }

    #[tokio::test]
    async fn claim_clears_pending_pointer() {
        let (store, item, first) = seeded().await;
        store
            .commit_transfer(item.id, first.id, artifact("c"))
            .await
            .unwrap();
        store.commit_claim(claim(&item, first.id)).await.unwrap();
        let item = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(item.pending_credential, None);
        assert_eq!(item.certificate, Some(artifact("b")));
    }

    #[tokio::test]
    async fn dispute_is_sticky_and_keeps_first_reason() {
        let (store, item, first) = seeded().await;
        let commit = claim(&item, first.id);
        let (event_id, live) = (commit.event.id, commit.next.id);
        store.commit_claim(commit).await.unwrap();

        store
            .mark_disputed(item.id, live, event_id, DisputeReason::Lost)
            .await
            .unwrap();
        store
            .mark_disputed(item.id, live, event_id, DisputeReason::Fraud)
            .await
            .unwrap();
        let event = store.get_event(event_id).await.unwrap().unwrap();
        assert!(event.disputed);
        assert_eq!(event.dispute_reason, Some(DisputeReason::Lost));

        let missing = store
            .mark_disputed(item.id, live, EventId::new(), DisputeReason::Lost)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn dispute_under_revoked_credential_conflicts() {
        let (store, item, first) = seeded().await;
        let commit = claim(&item, first.id);
        let event_id = commit.event.id;
        store.commit_claim(commit).await.unwrap();

        // `first` was consumed by the claim that produced the event.
        let err = store
            .mark_disputed(item.id, first.id, event_id, DisputeReason::Stolen)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        let event = store.get_event(event_id).await.unwrap().unwrap();
        assert!(!event.disputed);
        assert_eq!(event.dispute_reason, None);
    }
}
