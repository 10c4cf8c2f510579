//! PostgreSQL [`CustodyStore`].
//!
//! Every commit runs in one transaction that first locks the item row with
//! `SELECT ... FOR UPDATE`, so concurrent commits on one item queue behind
//! each other across processes. Revocations are written as
//! `UPDATE ... WHERE revoked = FALSE` and checked through `rows_affected`;
//! zero rows means another commit consumed the credential first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custody_core::{
    ContentId, CredentialId, DisputeReason, EventId, ItemId, ItemKey, Timestamp,
};
use custody_crypto::SecretDigest;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::store::{
    ArtifactRef, ClaimCommit, CredentialRecord, CustodyStore, ItemRecord, OwnershipEventRecord,
    StoreError, StoreSnapshot,
};

const ITEM_COLUMNS: &str = "id, sku, serial, item_name, item_description, photo_cid, \
     certificate_cid, certificate_url, pending_credential_id, created_by, created_at";

const CREDENTIAL_COLUMNS: &str =
    "id, item_id, secret_hash, salt, handoff_cid, handoff_url, revoked, revoked_at, created_at";

const EVENT_COLUMNS: &str = "id, item_id, credential_id, claimant_name, certificate_cid, \
     certificate_url, disputed, dispute_reason, created_at";

/// Store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Lock the item row for the rest of the transaction.
async fn lock_item(tx: &mut Transaction<'_, Postgres>, item: ItemId) -> Result<ItemRow, StoreError> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, ItemRow>(&sql)
        .bind(item.into_uuid())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("item {item}")))
}

/// Revoke `credential` only if it is still live.
async fn revoke_live(
    tx: &mut Transaction<'_, Postgres>,
    item: ItemId,
    credential: CredentialId,
    at: Timestamp,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE credentials SET revoked = TRUE, revoked_at = $1
         WHERE id = $2 AND item_id = $3 AND revoked = FALSE",
    )
    .bind(*at.as_datetime())
    .bind(credential.into_uuid())
    .bind(item.into_uuid())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Conflict(format!(
            "credential {credential} is not live"
        )));
    }
    Ok(())
}

async fn insert_credential(
    tx: &mut Transaction<'_, Postgres>,
    record: &CredentialRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO credentials (id, item_id, secret_hash, salt, handoff_cid, handoff_url,
         revoked, revoked_at, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(record.id.into_uuid())
    .bind(record.item_id.into_uuid())
    .bind(&record.digest.hash)
    .bind(&record.digest.salt)
    .bind(record.handoff.as_ref().map(|a| a.cid.as_str().to_string()))
    .bind(record.handoff.as_ref().map(|a| a.url.clone()))
    .bind(record.revoked)
    .bind(record.revoked_at.map(|t| *t.as_datetime()))
    .bind(*record.created_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(conflict_on_unique)?;
    Ok(())
}

/// Unique violations are commit conflicts, not database faults.
fn conflict_on_unique(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl CustodyStore for PgStore {
    async fn find_item(&self, key: &ItemKey) -> Result<Option<ItemRecord>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE sku = $1 AND serial = $2");
        sqlx::query_as::<_, ItemRow>(&sql)
            .bind(key.sku())
            .bind(key.serial())
            .fetch_optional(&self.pool)
            .await?
            .map(ItemRow::into_record)
            .transpose()
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<ItemRecord>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1");
        sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(ItemRow::into_record)
            .transpose()
    }

    async fn credentials(&self, item: ItemId) -> Result<Vec<CredentialRecord>, StoreError> {
        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE item_id = $1
             ORDER BY seq"
        );
        let rows = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(item.into_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(CredentialRow::into_record).collect()
    }

    async fn events(&self, item: ItemId) -> Result<Vec<OwnershipEventRecord>, StoreError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM ownership_events WHERE item_id = $1
             ORDER BY seq"
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(item.into_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(EventRow::into_record).collect()
    }

    async fn get_event(&self, id: EventId) -> Result<Option<OwnershipEventRecord>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM ownership_events WHERE id = $1");
        sqlx::query_as::<_, EventRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(EventRow::into_record)
            .transpose()
    }

    async fn create_item(
        &self,
        item: ItemRecord,
        first: CredentialRecord,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO items (id, sku, serial, item_name, item_description, photo_cid,
             certificate_cid, certificate_url, pending_credential_id, created_by, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL, $9, $10)",
        )
        .bind(item.id.into_uuid())
        .bind(item.key.sku())
        .bind(item.key.serial())
        .bind(&item.item_name)
        .bind(&item.item_description)
        .bind(item.photo_cid.as_ref().map(|c| c.as_str().to_string()))
        .bind(item.certificate.as_ref().map(|a| a.cid.as_str().to_string()))
        .bind(item.certificate.as_ref().map(|a| a.url.clone()))
        .bind(&item.created_by)
        .bind(*item.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(conflict_on_unique)?;

        insert_credential(&mut tx, &first).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_claim(&self, commit: ClaimCommit) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        lock_item(&mut tx, commit.item_id).await?;

        revoke_live(&mut tx, commit.item_id, commit.consumed, commit.event.created_at).await?;

        sqlx::query(
            "UPDATE items SET
               pending_credential_id = CASE WHEN pending_credential_id = $1 THEN NULL
                                            ELSE pending_credential_id END,
               certificate_cid = $2,
               certificate_url = $3
             WHERE id = $4",
        )
        .bind(commit.consumed.into_uuid())
        .bind(commit.certificate.cid.as_str())
        .bind(&commit.certificate.url)
        .bind(commit.item_id.into_uuid())
        .execute(&mut *tx)
        .await?;

        insert_credential(&mut tx, &commit.next).await?;

        let event = &commit.event;
        sqlx::query(
            "INSERT INTO ownership_events (id, item_id, credential_id, claimant_name,
             certificate_cid, certificate_url, disputed, dispute_reason, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.id.into_uuid())
        .bind(event.item_id.into_uuid())
        .bind(event.credential_id.into_uuid())
        .bind(&event.claimant_name)
        .bind(event.certificate.as_ref().map(|a| a.cid.as_str().to_string()))
        .bind(event.certificate.as_ref().map(|a| a.url.clone()))
        .bind(event.disputed)
        .bind(event.dispute_reason.map(|r| r.as_str()))
        .bind(*event.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(conflict_on_unique)?;

        tx.commit().await?;
        Ok(())
    }

    async fn commit_transfer(
        &self,
        item: ItemId,
        credential: CredentialId,
        handoff: ArtifactRef,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = lock_item(&mut tx, item).await?;

        if let Some(pending) = row.pending_credential_id {
            let live: Option<bool> = sqlx::query_scalar(
                "SELECT NOT revoked FROM credentials WHERE id = $1",
            )
            .bind(pending)
            .fetch_optional(&mut *tx)
            .await?;
            if live == Some(true) {
                return Err(StoreError::Conflict(format!(
                    "transfer already pending under {pending}"
                )));
            }
        }

        let result = sqlx::query(
            "UPDATE credentials SET handoff_cid = $1, handoff_url = $2
             WHERE id = $3 AND item_id = $4 AND revoked = FALSE",
        )
        .bind(handoff.cid.as_str())
        .bind(&handoff.url)
        .bind(credential.into_uuid())
        .bind(item.into_uuid())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "credential {credential} is not live"
            )));
        }

        sqlx::query("UPDATE items SET pending_credential_id = $1 WHERE id = $2")
            .bind(credential.into_uuid())
            .bind(item.into_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn commit_cancel(
        &self,
        item: ItemId,
        credential: CredentialId,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = lock_item(&mut tx, item).await?;
        if row.pending_credential_id != Some(credential.into_uuid()) {
            return Err(StoreError::Conflict(format!(
                "no transfer pending under {credential}"
            )));
        }

        revoke_live(&mut tx, item, credential, at).await?;

        sqlx::query("UPDATE items SET pending_credential_id = NULL WHERE id = $1")
            .bind(item.into_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn mark_disputed(
        &self,
        item: ItemId,
        credential: CredentialId,
        event: EventId,
        reason: DisputeReason,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        lock_item(&mut tx, item).await?;

        let live: Option<bool> = sqlx::query_scalar(
            "SELECT NOT revoked FROM credentials WHERE id = $1 AND item_id = $2",
        )
        .bind(credential.into_uuid())
        .bind(item.into_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        match live {
            None => return Err(StoreError::NotFound(format!("credential {credential}"))),
            Some(false) => {
                return Err(StoreError::Conflict(format!(
                    "credential {credential} already revoked"
                )))
            }
            Some(true) => {}
        }

        let result = sqlx::query(
            "UPDATE ownership_events
             SET disputed = TRUE, dispute_reason = COALESCE(dispute_reason, $1)
             WHERE id = $2 AND item_id = $3",
        )
        .bind(reason.as_str())
        .bind(event.into_uuid())
        .bind(item.into_uuid())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("event {event}")));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        let items = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY created_at, sku, serial"
        ))
        .fetch_all(&self.pool)
        .await?;
        let credentials = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials ORDER BY seq"
        ))
        .fetch_all(&self.pool)
        .await?;
        let events = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM ownership_events ORDER BY seq"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(StoreSnapshot {
            items: items
                .into_iter()
                .map(ItemRow::into_record)
                .collect::<Result<_, _>>()?,
            credentials: credentials
                .into_iter()
                .map(CredentialRow::into_record)
                .collect::<Result<_, _>>()?,
            events: events
                .into_iter()
                .map(EventRow::into_record)
                .collect::<Result<_, _>>()?,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// -- Row types ----------------------------------------------------------------

fn artifact(cid: Option<String>, url: Option<String>) -> Result<Option<ArtifactRef>, StoreError> {
    match (cid, url) {
        (Some(cid), Some(url)) => Ok(Some(ArtifactRef {
            cid: ContentId::new(cid).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            url,
        })),
        _ => Ok(None),
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    sku: String,
    serial: String,
    item_name: Option<String>,
    item_description: Option<String>,
    photo_cid: Option<String>,
    certificate_cid: Option<String>,
    certificate_url: Option<String>,
    pending_credential_id: Option<Uuid>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_record(self) -> Result<ItemRecord, StoreError> {
        let key = ItemKey::new(&self.sku, &self.serial)
            .map_err(|e| StoreError::Corrupt(format!("item {}: {e}", self.id)))?;
        let photo_cid = self
            .photo_cid
            .map(ContentId::new)
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(ItemRecord {
            id: ItemId::from_uuid(self.id),
            key,
            item_name: self.item_name,
            item_description: self.item_description,
            photo_cid,
            certificate: artifact(self.certificate_cid, self.certificate_url)?,
            pending_credential: self.pending_credential_id.map(CredentialId::from_uuid),
            created_by: self.created_by,
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    item_id: Uuid,
    secret_hash: String,
    salt: String,
    handoff_cid: Option<String>,
    handoff_url: Option<String>,
    revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl CredentialRow {
    fn into_record(self) -> Result<CredentialRecord, StoreError> {
        Ok(CredentialRecord {
            id: CredentialId::from_uuid(self.id),
            item_id: ItemId::from_uuid(self.item_id),
            digest: SecretDigest {
                hash: self.secret_hash,
                salt: self.salt,
            },
            handoff: artifact(self.handoff_cid, self.handoff_url)?,
            revoked: self.revoked,
            revoked_at: self.revoked_at.map(Timestamp::from_utc),
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    item_id: Uuid,
    credential_id: Uuid,
    claimant_name: String,
    certificate_cid: Option<String>,
    certificate_url: Option<String>,
    disputed: bool,
    dispute_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl EventRow {
    fn into_record(self) -> Result<OwnershipEventRecord, StoreError> {
        let dispute_reason = self
            .dispute_reason
            .as_deref()
            .map(str::parse::<DisputeReason>)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("event {}: {e}", self.id)))?;
        Ok(OwnershipEventRecord {
            id: EventId::from_uuid(self.id),
            item_id: ItemId::from_uuid(self.item_id),
            credential_id: CredentialId::from_uuid(self.credential_id),
            claimant_name: self.claimant_name,
            certificate: artifact(self.certificate_cid, self.certificate_url)?,
            disputed: self.disputed,
            dispute_reason,
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}
