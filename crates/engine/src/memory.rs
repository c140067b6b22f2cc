use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;
use uptree_model::{
    ActivationId, EntryStatus, IncomeKind, LedgerEntry, LedgerEntryId, MemberId, Placement, Rank,
    Side,
};

use crate::{
    ledger::BalanceEffect,
    provider::{AccountId, CustomClaims, IdentityProvider, ProviderError, SessionToken},
    store::{MemberDocument, MemberStore, StoreError},
};

/// In-memory [`MemberStore`] with conflict and failure injection.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    /// Number of upcoming `insert_member` calls to fail with `Conflict`.
    inject_conflicts: AtomicU32,
    /// Number of upcoming `insert_member` calls to fail hard.
    inject_failures: AtomicU32,
    /// Number of upcoming `apply_entry` calls to fail with `Conflict`.
    inject_entry_conflicts: AtomicU32,
}

#[derive(Debug, Default)]
struct Inner {
    members: IndexMap<MemberId, MemberDocument>,
    entries: Vec<LedgerEntry>,
    sequence: u64,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` member inserts with a transaction conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.inject_conflicts.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` member inserts with an unavailable error.
    pub fn inject_failures(&self, count: u32) {
        self.inject_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` ledger appends with a transaction conflict.
    pub fn inject_entry_conflicts(&self, count: u32) {
        self.inject_entry_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of stored members.
    pub fn member_count(&self) -> usize {
        self.inner.lock().unwrap().members.len()
    }

    /// Snapshot of all ledger entries, in append order.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.lock().unwrap().entries.clone()
    }

    /// Directly overwrite a member document. Test setup only.
    pub fn put_member(&self, document: MemberDocument) {
        let mut inner = self.inner.lock().unwrap();
        inner.members.insert(document.id().clone(), document);
    }

    fn take_injected(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MemberStore for InMemoryStore {
    async fn member(&self, id: &MemberId) -> Result<Option<MemberDocument>, StoreError> {
        Ok(self.inner.lock().unwrap().members.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<MemberId>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .members
            .values()
            .find(|m| m.profile.email == email)
            .map(|m| m.id().clone()))
    }

    async fn find_by_contact(&self, contact: &str) -> Result<Option<MemberId>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .members
            .values()
            .find(|m| m.profile.contact == contact)
            .map(|m| m.id().clone()))
    }

    async fn find_by_wallet(&self, wallet: &str) -> Result<Option<MemberId>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .members
            .values()
            .find(|m| m.profile.wallet_address == wallet)
            .map(|m| m.id().clone()))
    }

    async fn next_member_sequence(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sequence += 1;
        Ok(inner.sequence)
    }

    async fn insert_member(
        &self,
        member: MemberDocument,
        placement: &Placement,
    ) -> Result<(), StoreError> {
        if Self::take_injected(&self.inject_failures) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        if Self::take_injected(&self.inject_conflicts) {
            return Err(StoreError::Conflict);
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.members.contains_key(member.id()) {
            return Err(StoreError::Conflict);
        }
        if let Some(upline) = &placement.upline {
            let id = member.id().clone();
            let parent = inner
                .members
                .get_mut(upline)
                .ok_or(StoreError::NotFound)?;
            let slot = match placement.side {
                Side::Left => &mut parent.node.left,
                Side::Right => &mut parent.node.right,
            };
            // The transactional re-check of the claimed slot.
            if slot.is_some() {
                return Err(StoreError::Conflict);
            }
            *slot = Some(id);
        }
        inner.members.insert(member.id().clone(), member);
        Ok(())
    }

    async fn apply_entry(
        &self,
        entry: LedgerEntry,
        effect: BalanceEffect,
    ) -> Result<LedgerEntryId, StoreError> {
        if Self::take_injected(&self.inject_entry_conflicts) {
            return Err(StoreError::Conflict);
        }
        let mut inner = self.inner.lock().unwrap();
        let member = inner
            .members
            .get_mut(entry.member())
            .ok_or(StoreError::NotFound)?;
        let account = &mut member.account;
        let amount = entry.amount();
        match &effect {
            BalanceEffect::CreditAvailable | BalanceEffect::CreditReferral => {
                account.available_balance = account
                    .available_balance
                    .checked_add(&amount)
                    .map_err(|_| StoreError::Unavailable("balance overflow".into()))?;
                account.total_earnings = account
                    .total_earnings
                    .checked_add(&amount)
                    .map_err(|_| StoreError::Unavailable("balance overflow".into()))?;
                if effect == BalanceEffect::CreditReferral {
                    account.direct_referrals += 1;
                }
            }
            BalanceEffect::CreditPool { rank, expected } => {
                // The transactional re-check of the clamp's snapshot.
                if account.pool_balance(*rank) != *expected {
                    return Err(StoreError::Conflict);
                }
                let balance = account.pool_balances.entry(*rank).or_default();
                *balance = balance
                    .checked_add(&amount)
                    .map_err(|_| StoreError::Unavailable("balance overflow".into()))?;
                account.total_earnings = account
                    .total_earnings
                    .checked_add(&amount)
                    .map_err(|_| StoreError::Unavailable("balance overflow".into()))?;
            }
            BalanceEffect::DebitAvailable => {
                if account.available_balance < amount {
                    return Err(StoreError::InsufficientBalance);
                }
                account.available_balance = account.available_balance - amount;
                account.total_withdrawals = account
                    .total_withdrawals
                    .checked_add(&amount)
                    .map_err(|_| StoreError::Unavailable("balance overflow".into()))?;
            }
            BalanceEffect::SettlePool(per_rank) => {
                for (rank, expected) in per_rank {
                    if account.pool_balance(*rank) != *expected {
                        return Err(StoreError::Conflict);
                    }
                }
                for (rank, expected) in per_rank {
                    account.pool_balances.insert(*rank, Default::default());
                    account.available_balance = account
                        .available_balance
                        .checked_add(expected)
                        .map_err(|_| StoreError::Unavailable("balance overflow".into()))?;
                }
            }
            BalanceEffect::None => {}
        }
        inner.entries.push(entry);
        Ok(LedgerEntryId(inner.entries.len() as u64))
    }

    async fn entry_by_dedup(
        &self,
        activation: &ActivationId,
        kind: IncomeKind,
        member: &MemberId,
        level: Option<u8>,
    ) -> Result<Option<LedgerEntryId>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .entries
            .iter()
            .position(|e| e.dedup_key() == (activation, kind, member, level))
            .map(|index| LedgerEntryId(index as u64 + 1)))
    }

    async fn entries_for_member(&self, id: &MemberId) -> Result<Vec<LedgerEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.member() == id)
            .cloned()
            .collect())
    }

    async fn set_claim_eligible(&self, id: &MemberId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let member = inner.members.get_mut(id).ok_or(StoreError::NotFound)?;
        member.account.claim_eligible = true;
        Ok(())
    }

    async fn mark_pool_entries_claimable(&self, id: &MemberId) -> Result<u32, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut moved = 0;
        for entry in inner.entries.iter_mut() {
            if entry.member() == id
                && entry.kind() == IncomeKind::Pool
                && entry.status() == EntryStatus::Pending
            {
                *entry = entry.clone().credited();
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn unlock_rank(&self, id: &MemberId, rank: Rank) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let member = inner.members.get_mut(id).ok_or(StoreError::NotFound)?;
        member.account.unlocked_ranks.insert(rank);
        Ok(())
    }

    async fn set_rank(&self, id: &MemberId, rank: Rank) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let member = inner.members.get_mut(id).ok_or(StoreError::NotFound)?;
        member.account.rank = rank;
        Ok(())
    }
}

/// Build a standalone member document for tests, placed as a root.
pub fn test_member(id: &str) -> MemberDocument {
    use uptree_model::{MemberAccount, MemberCode, TreeNode};

    MemberDocument {
        node: TreeNode::root(MemberId::from(id)),
        account: MemberAccount::new_signup(),
        profile: crate::store::MemberProfile {
            display_name: id.to_owned(),
            email: format!("{id}@example.com"),
            contact: format!("contact-{id}"),
            wallet_address: format!("wallet-{id}"),
        },
        code: MemberCode::from_sequence(0),
        created_at: 0,
    }
}

#[derive(Debug, Clone)]
struct AccountRecord {
    email: String,
}

/// In-memory [`IdentityProvider`].
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    accounts: Mutex<HashMap<AccountId, AccountRecord>>,
    claims: Mutex<HashMap<AccountId, CustomClaims>>,
    counter: AtomicU64,
}

impl InMemoryProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the account exists.
    pub fn has_account(&self, id: &AccountId) -> bool {
        self.accounts.lock().unwrap().contains_key(id)
    }

    /// Number of live accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }

    /// Get the claims attached to an account.
    pub fn claims(&self, id: &AccountId) -> Option<CustomClaims> {
        self.claims.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryProvider {
    async fn create_account(
        &self,
        email: &str,
        _password: &str,
        _display_name: &str,
    ) -> Result<AccountId, ProviderError> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.values().any(|record| record.email == email) {
            return Err(ProviderError::AlreadyExists);
        }
        let id = AccountId::new(format!(
            "acct-{}",
            self.counter.fetch_add(1, Ordering::SeqCst) + 1
        ));
        accounts.insert(
            id.clone(),
            AccountRecord {
                email: email.to_owned(),
            },
        );
        Ok(id)
    }

    async fn delete_account(&self, id: &AccountId) -> Result<(), ProviderError> {
        self.accounts
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or(ProviderError::NotFound)
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<AccountId>, ProviderError> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts
            .iter()
            .find(|(_, record)| record.email == email)
            .map(|(id, _)| id.clone()))
    }

    async fn issue_session_token(&self, id: &AccountId) -> Result<SessionToken, ProviderError> {
        if !self.has_account(id) {
            return Err(ProviderError::NotFound);
        }
        Ok(SessionToken::new(format!(
            "session-{id}-{}",
            self.counter.fetch_add(1, Ordering::SeqCst)
        )))
    }

    async fn set_custom_claims(
        &self,
        id: &AccountId,
        claims: CustomClaims,
    ) -> Result<(), ProviderError> {
        if !self.has_account(id) {
            return Err(ProviderError::NotFound);
        }
        self.claims.lock().unwrap().insert(id.clone(), claims);
        Ok(())
    }
}
