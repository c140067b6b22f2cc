use uptree_model::{ActivationId, DistributionParams, MemberId, Rank};

use crate::{
    distributor::{LevelDistributor, ReferralDistributor},
    ledger::LedgerWriter,
    store::{MemberStore, MemberStoreExt},
};

/// Unlocks a rank for a member, paying its activation amount from
/// available balance and triggering income distribution.
#[derive(Debug)]
pub struct RankActivator<'a, S> {
    store: &'a S,
    params: &'a DistributionParams,
}

/// Outcome of a rank activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankActivationOutcome {
    /// Unlocked rank.
    pub rank: Rank,
    /// Idempotency key under which distribution ran (and can be
    /// replayed).
    pub activation: ActivationId,
}

impl<'a, S: MemberStore> RankActivator<'a, S> {
    /// Create a new rank activator.
    pub fn new(store: &'a S, params: &'a DistributionParams) -> Self {
        Self { store, params }
    }

    /// Unlock `rank` for the member.
    ///
    /// Fails with a precondition error when the rank is already
    /// unlocked or available balance cannot cover the activation
    /// amount. Distribution failures after payment are logged and left
    /// to idempotent replay, as at signup.
    pub async fn activate(
        &self,
        member: &MemberId,
        rank: Rank,
    ) -> crate::Result<RankActivationOutcome> {
        let document = self.store.try_member(member).await?;
        if document.account.is_rank_unlocked(rank) {
            return Err(crate::Error::FailedPrecondition(
                "rank already unlocked".into(),
            ));
        }
        let amount = self.params.rank_params(rank)?.activation_amount;
        let activation = ActivationId::new(format!("upgrade:{member}:{rank:?}"));

        let writer = LedgerWriter::new(self.store);
        writer
            .record_activation(member.clone(), rank, amount, activation.clone(), true)
            .await?;
        self.store.unlock_rank(member, rank).await?;
        let current = self.params.rank_ordering.ordinal(document.account.rank);
        let unlocked = self.params.rank_ordering.ordinal(rank);
        if matches!((current, unlocked), (Some(c), Some(u)) if u > c) {
            self.store.set_rank(member, rank).await?;
        }

        let referral = ReferralDistributor::new(self.store, self.params);
        if let Err(err) = referral
            .on_activation(member, document.node.sponsor.as_ref(), amount, &activation)
            .await
        {
            tracing::warn!(%member, %err, "referral distribution failed, eligible for replay");
        }
        let level = LevelDistributor::new(self.store, self.params);
        if let Err(err) = level.on_activation(member, amount, &activation).await {
            tracing::warn!(%member, %err, "level distribution failed, eligible for replay");
        }

        Ok(RankActivationOutcome { rank, activation })
    }
}
