use uptree_model::{
    ActivationId, Amount, DistributionAction, DistributionParams, IncomeKind, MemberId,
    ReferralDistribution,
};

use crate::{
    ledger::{CreditOutcome, CreditRequest, LedgerWriter},
    store::{MemberStore, MemberStoreExt},
};

/// Awards the one-time direct referral bonus when a member activates.
#[derive(Debug)]
pub struct ReferralDistributor<'a, S> {
    store: &'a S,
    params: &'a DistributionParams,
}

/// Outcome of one referral distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralOutcome {
    /// The appended (or collapsed) commission credit.
    pub credit: CreditOutcome,
    /// Commission amount.
    pub commission: Amount,
    /// Sponsor's direct-referral count after the activation.
    pub direct_referrals: u32,
    /// Whether this invocation flipped the sponsor's claim eligibility.
    pub eligibility_flipped: bool,
}

impl<'a, S: MemberStore> ReferralDistributor<'a, S> {
    /// Create a new referral distributor.
    pub fn new(store: &'a S, params: &'a DistributionParams) -> Self {
        Self { store, params }
    }

    /// Distribute the referral bonus for one activation.
    ///
    /// A `None` sponsor (root member) is a no-op. The commission credit
    /// and the direct-referral increment commit in one store
    /// transaction, idempotent per activation id. The eligibility flip
    /// is reconciled on every invocation, so a replay heals a flip the
    /// original invocation lost.
    pub async fn on_activation(
        &self,
        new_member: &MemberId,
        sponsor: Option<&MemberId>,
        amount: Amount,
        activation: &ActivationId,
    ) -> crate::Result<Option<ReferralOutcome>> {
        let Some(sponsor) = sponsor else {
            return Ok(None);
        };
        let document = self.store.try_member(sponsor).await?;
        let report =
            ReferralDistribution::try_new(self.params, &document.account, amount)?.execute()?;

        let credit = LedgerWriter::new(self.store)
            .credit(
                CreditRequest::builder()
                    .member(sponsor.clone())
                    .kind(IncomeKind::Referral)
                    .amount(report.commission())
                    .source(new_member.clone())
                    .activation(activation.clone())
                    .build(),
            )
            .await?;

        let account = self.store.try_member(sponsor).await?.account;
        let count = account.direct_referrals;
        let mut flipped = false;
        if count >= self.params.claim_threshold && !account.claim_eligible {
            self.store.set_claim_eligible(sponsor).await?;
            let unlocked = self.store.mark_pool_entries_claimable(sponsor).await?;
            flipped = true;
            tracing::info!(
                %sponsor,
                count,
                unlocked_entries = unlocked,
                "sponsor became claim-eligible"
            );
        }
        Ok(Some(ReferralOutcome {
            credit,
            commission: report.commission(),
            direct_referrals: count,
            eligibility_flipped: flipped,
        }))
    }
}

#[cfg(test)]
mod tests {
    use uptree_model::{DistributionParams, Rank};

    use crate::{
        ledger::LedgerWriter,
        memory::{test_member, InMemoryStore},
        store::MemberStore,
    };

    use super::*;

    fn credit(sponsor: &str, source: &str, activation: &str) -> CreditRequest {
        CreditRequest::builder()
            .member(MemberId::from(sponsor))
            .kind(IncomeKind::Referral)
            .amount(Amount::from_minor_units(2_000))
            .source(MemberId::from(source))
            .activation(ActivationId::from(activation))
            .build()
    }

    #[tokio::test]
    async fn replay_does_not_credit_or_count_twice() -> crate::Result<()> {
        let store = InMemoryStore::new();
        store.put_member(test_member("a"));
        let params = DistributionParams::default();
        let referral = ReferralDistributor::new(&store, &params);
        let amount = Amount::from_minor_units(4_000);
        let activation = ActivationId::from("act-1");

        let first = referral
            .on_activation(&MemberId::from("b"), Some(&MemberId::from("a")), amount, &activation)
            .await?
            .unwrap();
        assert!(!first.credit.is_duplicate());
        assert_eq!(first.direct_referrals, 1);

        let replay = referral
            .on_activation(&MemberId::from("b"), Some(&MemberId::from("a")), amount, &activation)
            .await?
            .unwrap();
        assert!(replay.credit.is_duplicate());
        assert_eq!(replay.direct_referrals, 1);

        let account = store.try_member(&MemberId::from("a")).await?.account;
        assert_eq!(account.available_balance.minor_units(), 2_000);
        assert_eq!(account.direct_referrals, 1);
        Ok(())
    }

    #[tokio::test]
    async fn replay_heals_a_lost_eligibility_flip() -> crate::Result<()> {
        let store = InMemoryStore::new();
        store.put_member(test_member("a"));
        let writer = LedgerWriter::new(&store);
        // Two committed commission credits whose flip never ran, as if
        // the process died between the append and the flag update. Seed
        // a pending pool entry that the flip should unlock.
        writer.credit(credit("a", "b1", "act-1")).await?;
        writer.credit(credit("a", "b2", "act-2")).await?;
        let mut pool = credit("a", "b2", "pool-1");
        pool.kind = IncomeKind::Pool;
        pool.rank = Some(Rank::Starter);
        pool.expected_pool_balance = Some(Amount::ZERO);
        pool.pending = true;
        writer.credit(pool).await?;
        let account = store.try_member(&MemberId::from("a")).await?.account;
        assert_eq!(account.direct_referrals, 2);
        assert!(!account.claim_eligible);

        let params = DistributionParams::default();
        let replay = ReferralDistributor::new(&store, &params)
            .on_activation(
                &MemberId::from("b2"),
                Some(&MemberId::from("a")),
                Amount::from_minor_units(4_000),
                &ActivationId::from("act-2"),
            )
            .await?
            .unwrap();
        assert!(replay.credit.is_duplicate());
        assert!(replay.eligibility_flipped);

        let account = store.try_member(&MemberId::from("a")).await?.account;
        assert!(account.claim_eligible);
        let pending = store
            .entries_for_member(&MemberId::from("a"))
            .await?
            .into_iter()
            .filter(|e| e.status() == uptree_model::EntryStatus::Pending)
            .count();
        assert_eq!(pending, 0);
        Ok(())
    }
}
