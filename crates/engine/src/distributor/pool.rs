use uptree_model::{
    claimable, ActivationId, Amount, DistributionAction, DistributionParams, IncomeKind, MemberId,
    PoolAccumulation, PoolAccumulationReport, Rank,
};

use crate::{
    ledger::{CreditRequest, LedgerWriter},
    store::{MemberStore, MemberStoreExt, StoreError},
};

/// Accumulate attempts before surfacing the conflict.
const MAX_ACCUMULATE_ATTEMPTS: u32 = 3;

/// Accumulates rank-scoped pool income and exposes the gated claim.
#[derive(Debug)]
pub struct PoolDistributor<'a, S> {
    store: &'a S,
    params: &'a DistributionParams,
}

/// Response of the claim entrypoint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClaimResponse {
    /// Amount moved into available balance.
    pub claimed: Amount,
}

impl<'a, S: MemberStore> PoolDistributor<'a, S> {
    /// Create a new pool distributor.
    pub fn new(store: &'a S, params: &'a DistributionParams) -> Self {
        Self { store, params }
    }

    /// Accumulate pool income for the member's rank.
    ///
    /// Batch-triggered: an unknown member or a locked rank is logged
    /// and dropped, never an error. Accumulation beyond the rank cap is
    /// silently dropped. The cap clamp is recomputed and retried a
    /// bounded number of times when a concurrent balance movement
    /// invalidates its snapshot.
    pub async fn accumulate(
        &self,
        member: &MemberId,
        rank: Rank,
        amount: Amount,
        activation: &ActivationId,
    ) -> crate::Result<Option<PoolAccumulationReport>> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let Some(document) = self.store.member(member).await? else {
                tracing::warn!(%member, "pool accumulation for unknown member dropped");
                return Ok(None);
            };
            let action =
                match PoolAccumulation::try_new(self.params, &document.account, rank, amount) {
                    Ok(action) => action,
                    Err(err @ uptree_model::Error::RankNotUnlocked(_))
                    | Err(err @ uptree_model::Error::EmptyDistribution) => {
                        tracing::warn!(%member, ?rank, %err, "pool accumulation dropped");
                        return Ok(None);
                    }
                    Err(err) => return Err(err.into()),
                };
            let report = action.execute()?;
            if !report.dropped().is_zero() {
                tracing::debug!(
                    %member,
                    ?rank,
                    dropped = %report.dropped(),
                    "pool accumulation clamped at cap"
                );
            }
            if report.credited().is_zero() {
                return Ok(Some(report));
            }
            let result = LedgerWriter::new(self.store)
                .credit(
                    CreditRequest::builder()
                        .member(member.clone())
                        .kind(IncomeKind::Pool)
                        .amount(report.credited())
                        .rank(rank)
                        .expected_pool_balance(document.account.pool_balance(rank))
                        .pending(!document.account.claim_eligible)
                        .activation(activation.clone())
                        .build(),
                )
                .await;
            match result {
                Ok(_) => return Ok(Some(report)),
                Err(crate::Error::Store(StoreError::Conflict))
                    if attempts < MAX_ACCUMULATE_ATTEMPTS =>
                {
                    tracing::debug!(%member, ?rank, attempts, "pool balance moved, reclamping");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Sum of claimable pool balances; zero while the member is not
    /// claim-eligible.
    pub async fn claimable(&self, member: &MemberId) -> crate::Result<Amount> {
        let document = self.store.try_member(member).await?;
        Ok(claimable(&document.account)?)
    }

    /// Move the member's claimable pool balance into available balance.
    pub async fn claim(
        &self,
        member: &MemberId,
        activation: ActivationId,
    ) -> crate::Result<ClaimResponse> {
        let report = LedgerWriter::new(self.store).claim(member, activation).await?;
        tracing::info!(%member, claimed = %report.claimed(), "pool balance claimed");
        Ok(ClaimResponse {
            claimed: report.claimed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use uptree_model::MemberId;

    use crate::memory::{test_member, InMemoryStore};

    use super::*;

    #[tokio::test]
    async fn accumulation_reclamps_after_a_lost_race() -> crate::Result<()> {
        let store = InMemoryStore::new();
        store.put_member(test_member("a"));
        let params = DistributionParams::default();
        let pool = PoolDistributor::new(&store, &params);

        store.inject_entry_conflicts(1);
        let report = pool
            .accumulate(
                &MemberId::from("a"),
                Rank::Starter,
                Amount::from_minor_units(500),
                &ActivationId::from("batch-1"),
            )
            .await?
            .unwrap();
        assert_eq!(report.credited(), Amount::from_minor_units(500));

        let member = store.try_member(&MemberId::from("a")).await?;
        assert_eq!(member.account.pool_balance(Rank::Starter).minor_units(), 500);
        assert_eq!(store.entries().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn accumulation_surfaces_an_unresolved_conflict() {
        let store = InMemoryStore::new();
        store.put_member(test_member("a"));
        let params = DistributionParams::default();
        let pool = PoolDistributor::new(&store, &params);

        store.inject_entry_conflicts(3);
        let err = pool
            .accumulate(
                &MemberId::from("a"),
                Rank::Starter,
                Amount::from_minor_units(500),
                &ActivationId::from("batch-1"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::Aborted);
        assert!(store.entries().is_empty());
    }
}
