use typed_builder::TypedBuilder;
use uptree_model::{
    ActivationId, Amount, DistributionAction, IncomeKind, LedgerEntry, LedgerEntryId, MemberId,
    PoolClaim, PoolClaimReport, Rank,
};

use crate::store::{MemberStore, MemberStoreExt, StoreError};

/// Claim settle attempts before surfacing the conflict.
const MAX_CLAIM_ATTEMPTS: u32 = 3;

/// The balance movement a store applies atomically with a ledger append.
///
/// Dispatch over the closed set of income kinds happens in the writer;
/// stores only execute the already-resolved effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceEffect {
    /// Increment available balance and total earnings.
    CreditAvailable,
    /// Increment available balance, total earnings, and the
    /// direct-referral count in the same transaction.
    CreditReferral,
    /// Increment the rank-scoped pool balance. The store re-checks that
    /// the balance still equals `expected` at commit and fails with
    /// [`StoreError::Conflict`] when it moved, so a cap clamp computed
    /// against a stale snapshot can never overshoot.
    CreditPool {
        /// Scoped rank.
        rank: Rank,
        /// Pool balance the credit was computed against.
        expected: Amount,
    },
    /// Conditionally decrement available balance and increment total
    /// withdrawals; fails with [`StoreError::InsufficientBalance`]
    /// instead of going negative.
    DebitAvailable,
    /// Move the given per-rank pool balances into available balance.
    /// The store re-checks the balances at commit and fails with
    /// [`StoreError::Conflict`] when they moved.
    SettlePool(Vec<(Rank, Amount)>),
    /// Record only, no balance movement.
    None,
}

/// A request to append an income credit.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CreditRequest {
    /// Credited member.
    pub member: MemberId,
    /// Income kind. Only `Referral`, `Level` and `Pool` are credits.
    pub kind: IncomeKind,
    /// Amount, already rounded by the model.
    pub amount: Amount,
    /// Member who triggered the credit.
    #[builder(default, setter(strip_option))]
    pub source: Option<MemberId>,
    /// Level tag for `Level` credits.
    #[builder(default, setter(strip_option))]
    pub level: Option<u8>,
    /// Rank scope for `Pool` credits.
    #[builder(default, setter(strip_option))]
    pub rank: Option<Rank>,
    /// Rank-scoped pool balance the credit was computed against, for
    /// `Pool` credits.
    #[builder(default, setter(strip_option))]
    pub expected_pool_balance: Option<Amount>,
    /// Whether the entry starts locked (`Pending`).
    #[builder(default)]
    pub pending: bool,
    /// Idempotency key of the triggering activation.
    pub activation: ActivationId,
}

/// Outcome of a credit: freshly appended, or collapsed onto an entry an
/// earlier invocation already wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// A new entry was appended and the balance moved.
    Created(LedgerEntryId),
    /// The idempotency key matched an existing entry; nothing moved.
    Duplicate(LedgerEntryId),
}

impl CreditOutcome {
    /// Get the entry id.
    pub fn entry_id(&self) -> LedgerEntryId {
        match self {
            Self::Created(id) | Self::Duplicate(id) => *id,
        }
    }

    /// Whether the invocation was collapsed onto an existing entry.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Appends immutable ledger entries and applies balance deltas.
#[derive(Debug)]
pub struct LedgerWriter<'a, S> {
    store: &'a S,
}

impl<'a, S: MemberStore> LedgerWriter<'a, S> {
    /// Create a new writer over the store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Append an income credit and move the matching balance.
    ///
    /// Idempotent per `(activation, kind, member, level)`: re-invocation
    /// returns the existing entry id without crediting twice.
    pub async fn credit(&self, request: CreditRequest) -> crate::Result<CreditOutcome> {
        let effect = match request.kind {
            IncomeKind::Referral => BalanceEffect::CreditReferral,
            IncomeKind::Level => BalanceEffect::CreditAvailable,
            IncomeKind::Pool => {
                let rank = request.rank.ok_or_else(|| {
                    crate::Error::InvalidArgument("pool credit without a rank scope".into())
                })?;
                let expected = request.expected_pool_balance.ok_or_else(|| {
                    crate::Error::InvalidArgument(
                        "pool credit without the balance it was computed against".into(),
                    )
                })?;
                BalanceEffect::CreditPool { rank, expected }
            }
            _ => {
                return Err(crate::Error::InvalidArgument(
                    "not an income credit kind".into(),
                ))
            }
        };
        if let Some(existing) = self
            .store
            .entry_by_dedup(
                &request.activation,
                request.kind,
                &request.member,
                request.level,
            )
            .await?
        {
            tracing::debug!(
                activation = %request.activation,
                member = %request.member,
                kind = ?request.kind,
                "duplicate credit collapsed"
            );
            return Ok(CreditOutcome::Duplicate(existing));
        }
        let mut entry = LedgerEntry::new(
            request.kind,
            request.amount,
            request.member,
            request.source,
            request.activation,
            crate::now_unix(),
        )?;
        if let Some(level) = request.level {
            entry = entry.with_level(level)?;
        }
        if let Some(rank) = request.rank {
            entry = entry.with_rank(rank);
        }
        if request.pending {
            entry = entry.pending();
        }
        let id = self.store.apply_entry(entry, effect).await?;
        Ok(CreditOutcome::Created(id))
    }

    /// Record an approved withdrawal, conditionally debiting available
    /// balance.
    pub async fn debit(
        &self,
        member: MemberId,
        amount: Amount,
        activation: ActivationId,
    ) -> crate::Result<LedgerEntryId> {
        let entry = LedgerEntry::new(
            IncomeKind::Withdrawal,
            amount,
            member,
            None,
            activation,
            crate::now_unix(),
        )?;
        Ok(self
            .store
            .apply_entry(entry, BalanceEffect::DebitAvailable)
            .await?)
    }

    /// Record a rank activation payment.
    ///
    /// `paid_from_balance` debits available balance (rank upgrades);
    /// signup activations are paid externally and only recorded.
    pub async fn record_activation(
        &self,
        member: MemberId,
        rank: Rank,
        amount: Amount,
        activation: ActivationId,
        paid_from_balance: bool,
    ) -> crate::Result<LedgerEntryId> {
        if let Some(existing) = self
            .store
            .entry_by_dedup(&activation, IncomeKind::Activation, &member, None)
            .await?
        {
            tracing::debug!(%member, %activation, "duplicate activation record collapsed");
            return Ok(existing);
        }
        let entry = LedgerEntry::new(
            IncomeKind::Activation,
            amount,
            member,
            None,
            activation,
            crate::now_unix(),
        )?
        .with_rank(rank);
        let effect = if paid_from_balance {
            BalanceEffect::DebitAvailable
        } else {
            BalanceEffect::None
        };
        Ok(self.store.apply_entry(entry, effect).await?)
    }

    /// Move the member's claimable pool balance into available balance.
    ///
    /// Requires `claim_eligible`; retried a bounded number of times when
    /// a concurrent accumulation moves the balances underneath it.
    pub async fn claim(
        &self,
        member: &MemberId,
        activation: ActivationId,
    ) -> crate::Result<PoolClaimReport> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let document = self.store.try_member(member).await?;
            let report = PoolClaim::try_new(&document.account)?.execute()?;
            let entry = LedgerEntry::new(
                IncomeKind::Claim,
                report.claimed(),
                member.clone(),
                None,
                activation.clone(),
                crate::now_unix(),
            )?;
            let effect = BalanceEffect::SettlePool(report.per_rank().to_vec());
            match self.store.apply_entry(entry, effect).await {
                Ok(_) => return Ok(report),
                Err(StoreError::Conflict) if attempts < MAX_CLAIM_ATTEMPTS => {
                    tracing::debug!(%member, attempts, "claim settle conflict, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use uptree_model::{EntryStatus, Rank};

    use crate::memory::{test_member, InMemoryStore};

    use super::*;

    fn request(member: &str, amount: u64, activation: &str) -> CreditRequest {
        CreditRequest::builder()
            .member(MemberId::from(member))
            .kind(IncomeKind::Referral)
            .amount(Amount::from_minor_units(amount))
            .activation(ActivationId::from(activation))
            .build()
    }

    #[tokio::test]
    async fn credit_moves_available_balance_once() -> crate::Result<()> {
        let store = InMemoryStore::new();
        store.put_member(test_member("a"));
        let writer = LedgerWriter::new(&store);

        let first = writer.credit(request("a", 2_000, "act-1")).await?;
        assert!(!first.is_duplicate());
        let replay = writer.credit(request("a", 2_000, "act-1")).await?;
        assert!(replay.is_duplicate());
        assert_eq!(replay.entry_id(), first.entry_id());

        let member = store.try_member(&MemberId::from("a")).await?;
        assert_eq!(member.account.available_balance.minor_units(), 2_000);
        assert_eq!(member.account.total_earnings.minor_units(), 2_000);
        // The referral count moves with the credit, exactly once.
        assert_eq!(member.account.direct_referrals, 1);
        assert_eq!(store.entries().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn pool_credit_requires_a_rank_scope() {
        let store = InMemoryStore::new();
        store.put_member(test_member("a"));
        let writer = LedgerWriter::new(&store);
        let mut bad = request("a", 500, "act-1");
        bad.kind = IncomeKind::Pool;
        let err = writer.credit(bad.clone()).await.unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidArgument);
        bad.rank = Some(Rank::Starter);
        let err = writer.credit(bad).await.unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn stale_pool_snapshot_cannot_breach_the_cap() -> crate::Result<()> {
        let store = InMemoryStore::new();
        store.put_member(test_member("a"));
        let writer = LedgerWriter::new(&store);

        // Two accumulations clamped against the same snapshot: the
        // second commit sees a moved balance and fails instead of
        // stacking on top of the first.
        let mut first = request("a", 100, "batch-1");
        first.kind = IncomeKind::Pool;
        first.rank = Some(Rank::Starter);
        first.expected_pool_balance = Some(Amount::ZERO);
        let mut second = first.clone();
        second.activation = ActivationId::from("batch-2");

        writer.credit(first).await?;
        let err = writer.credit(second).await.unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::Aborted);

        let member = store.try_member(&MemberId::from("a")).await?;
        assert_eq!(member.account.pool_balance(Rank::Starter).minor_units(), 100);
        assert_eq!(store.entries().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn pending_pool_credit_locks_the_balance() -> crate::Result<()> {
        let store = InMemoryStore::new();
        store.put_member(test_member("a"));
        let writer = LedgerWriter::new(&store);
        let mut credit = request("a", 500, "act-1");
        credit.kind = IncomeKind::Pool;
        credit.rank = Some(Rank::Starter);
        credit.expected_pool_balance = Some(Amount::ZERO);
        credit.pending = true;
        writer.credit(credit).await?;

        let member = store.try_member(&MemberId::from("a")).await?;
        assert!(member.account.available_balance.is_zero());
        assert_eq!(member.account.pool_balance(Rank::Starter).minor_units(), 500);
        assert_eq!(store.entries()[0].status(), EntryStatus::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn debit_rejects_a_shortfall() -> crate::Result<()> {
        let store = InMemoryStore::new();
        store.put_member(test_member("a"));
        let writer = LedgerWriter::new(&store);
        writer.credit(request("a", 1_000, "act-1")).await?;

        let err = writer
            .debit(
                MemberId::from("a"),
                Amount::from_minor_units(1_500),
                ActivationId::from("wd-1"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::FailedPrecondition);

        writer
            .debit(
                MemberId::from("a"),
                Amount::from_minor_units(400),
                ActivationId::from("wd-2"),
            )
            .await?;
        let member = store.try_member(&MemberId::from("a")).await?;
        assert_eq!(member.account.available_balance.minor_units(), 600);
        assert_eq!(member.account.total_withdrawals.minor_units(), 400);
        Ok(())
    }

    #[tokio::test]
    async fn claim_requires_eligibility_and_balance() -> crate::Result<()> {
        let store = InMemoryStore::new();
        let mut member = test_member("a");
        member
            .account
            .pool_balances
            .insert(Rank::Starter, Amount::from_minor_units(900));
        store.put_member(member);
        let writer = LedgerWriter::new(&store);

        let err = writer
            .claim(&MemberId::from("a"), ActivationId::from("claim-1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::FailedPrecondition);

        store.set_claim_eligible(&MemberId::from("a")).await?;
        let report = writer
            .claim(&MemberId::from("a"), ActivationId::from("claim-2"))
            .await?;
        assert_eq!(report.claimed().minor_units(), 900);

        let member = store.try_member(&MemberId::from("a")).await?;
        assert_eq!(member.account.available_balance.minor_units(), 900);
        assert!(member.account.pool_balance(Rank::Starter).is_zero());
        Ok(())
    }
}
