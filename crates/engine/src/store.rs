use async_trait::async_trait;
use uptree_model::{
    ActivationId, Amount, IncomeKind, LedgerEntry, LedgerEntryId, MemberAccount, MemberCode,
    MemberId, Placement, Rank, TreeNode,
};

use crate::ledger::BalanceEffect;

/// Error type of the member store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No such document.
    #[error("document not found")]
    NotFound,
    /// A transactional precondition no longer held at commit time
    /// (occupied slot, stale balance). The caller retries from scratch.
    #[error("transaction conflict")]
    Conflict,
    /// A conditional debit found insufficient balance.
    #[error("insufficient balance")]
    InsufficientBalance,
    /// The store is unreachable or failed unexpectedly.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Profile fields of a member document.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MemberProfile {
    /// Display name.
    pub display_name: String,
    /// Unique email.
    pub email: String,
    /// Unique contact number.
    pub contact: String,
    /// Unique wallet address.
    pub wallet_address: String,
}

/// One member document: tree links, balances, profile.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MemberDocument {
    /// Tree-link snapshot. Carries the member id.
    pub node: TreeNode,
    /// Balances and bookkeeping.
    pub account: MemberAccount,
    /// Profile fields.
    pub profile: MemberProfile,
    /// Unique human-readable code.
    pub code: MemberCode,
    /// Creation time, unix seconds (server-assigned).
    pub created_at: i64,
}

impl MemberDocument {
    /// Get the member id.
    pub fn id(&self) -> &MemberId {
        &self.node.id
    }
}

/// The document-store surface the engine needs.
///
/// Contract notes, mirroring the backing store's primitives:
/// - [`insert_member`](Self::insert_member) is one atomic multi-document
///   transaction: it re-checks that the placement slot is still free,
///   writes the new member document, and sets the parent's child link.
///   A lost race fails with [`StoreError::Conflict`] and writes nothing.
/// - Balance mutations happen inside [`apply_entry`](Self::apply_entry),
///   atomically with the ledger append; effects that were computed
///   against a snapshot carry the expected prior state and fail with
///   [`StoreError::Conflict`] when it moved.
/// - Ledger entries are append-only.
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Get a member document.
    async fn member(&self, id: &MemberId) -> Result<Option<MemberDocument>, StoreError>;

    /// Find a member id by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<MemberId>, StoreError>;

    /// Find a member id by contact number.
    async fn find_by_contact(&self, contact: &str) -> Result<Option<MemberId>, StoreError>;

    /// Find a member id by wallet address.
    async fn find_by_wallet(&self, wallet: &str) -> Result<Option<MemberId>, StoreError>;

    /// Atomically advance and return the member-code sequence.
    async fn next_member_sequence(&self) -> Result<u64, StoreError>;

    /// Create the member document and claim its slot on the upline
    /// document in one transaction. `placement` must match
    /// `member.node`; a root placement claims no slot.
    async fn insert_member(
        &self,
        member: MemberDocument,
        placement: &Placement,
    ) -> Result<(), StoreError>;

    /// Append a ledger entry and apply its balance effect atomically.
    async fn apply_entry(
        &self,
        entry: LedgerEntry,
        effect: BalanceEffect,
    ) -> Result<LedgerEntryId, StoreError>;

    /// Find an entry by its idempotency key.
    async fn entry_by_dedup(
        &self,
        activation: &ActivationId,
        kind: IncomeKind,
        member: &MemberId,
        level: Option<u8>,
    ) -> Result<Option<LedgerEntryId>, StoreError>;

    /// Get all entries credited to a member, in append order.
    async fn entries_for_member(&self, id: &MemberId) -> Result<Vec<LedgerEntry>, StoreError>;

    /// One-way flip of the claim-eligibility flag. Idempotent.
    async fn set_claim_eligible(&self, id: &MemberId) -> Result<(), StoreError>;

    /// Batched transition of the member's `Pending` pool entries to
    /// `Credited`, returning how many moved. Idempotent.
    async fn mark_pool_entries_claimable(&self, id: &MemberId) -> Result<u32, StoreError>;

    /// Mark a rank's pool as unlocked for the member. Idempotent.
    async fn unlock_rank(&self, id: &MemberId, rank: Rank) -> Result<(), StoreError>;

    /// Set the member's current rank.
    async fn set_rank(&self, id: &MemberId, rank: Rank) -> Result<(), StoreError>;
}

/// Extension helpers over [`MemberStore`].
#[async_trait]
pub trait MemberStoreExt: MemberStore {
    /// Get a member document, failing with [`StoreError::NotFound`].
    async fn try_member(&self, id: &MemberId) -> Result<MemberDocument, StoreError> {
        self.member(id).await?.ok_or(StoreError::NotFound)
    }

    /// Sum of `amount` over entries matching `kind` for the member.
    async fn total_for_kind(&self, id: &MemberId, kind: IncomeKind) -> crate::Result<Amount> {
        let mut total = Amount::ZERO;
        for entry in self.entries_for_member(id).await? {
            if entry.kind() == kind {
                total = total.checked_add(&entry.amount()).map_err(crate::Error::Model)?;
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl<S: MemberStore + ?Sized> MemberStoreExt for S {}
