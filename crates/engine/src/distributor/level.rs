use std::collections::HashSet;

use uptree_model::{
    ActivationId, Amount, DistributionAction, DistributionParams, IncomeKind, LevelDistribution,
    LevelReport, MemberId, UplineRef, MAX_LEVEL,
};

use crate::{
    ledger::{CreditOutcome, CreditRequest, LedgerWriter},
    store::{MemberStore, MemberStoreExt},
};

/// Credits per-level commissions up the activating member's upline
/// chain.
#[derive(Debug)]
pub struct LevelDistributor<'a, S> {
    store: &'a S,
    params: &'a DistributionParams,
}

/// Outcome of one level distribution.
#[derive(Debug)]
pub struct LevelOutcome {
    /// The model's per-level report.
    pub report: LevelReport,
    /// Appended (or collapsed) credits, in level order.
    pub credits: Vec<CreditOutcome>,
}

impl<'a, S: MemberStore> LevelDistributor<'a, S> {
    /// Create a new level distributor.
    pub fn new(store: &'a S, params: &'a DistributionParams) -> Self {
        Self { store, params }
    }

    /// Distribute level income for one activation.
    ///
    /// Walks `upline` pointers from the activating member, at most
    /// [`MAX_LEVEL`] deep, stopping at the root. Idempotent per
    /// activation id and level.
    pub async fn on_activation(
        &self,
        new_member: &MemberId,
        amount: Amount,
        activation: &ActivationId,
    ) -> crate::Result<LevelOutcome> {
        let document = self.store.try_member(new_member).await?;
        let uplines = self.collect_uplines(new_member, document.node.upline.clone()).await?;
        let report =
            LevelDistribution::try_new(self.params, document.account.rank, uplines, amount)?
                .execute()?;

        let writer = LedgerWriter::new(self.store);
        let mut credits = Vec::with_capacity(report.credits().len());
        for credit in report.credits() {
            let outcome = writer
                .credit(
                    CreditRequest::builder()
                        .member(credit.member.clone())
                        .kind(IncomeKind::Level)
                        .amount(credit.amount)
                        .source(new_member.clone())
                        .level(credit.level)
                        .activation(activation.clone())
                        .build(),
                )
                .await?;
            credits.push(outcome);
        }
        if !report.skipped().is_empty() {
            tracing::debug!(
                member = %new_member,
                skipped = ?report.skipped(),
                "levels skipped by the rank gate"
            );
        }
        Ok(LevelOutcome { report, credits })
    }

    /// Fetch the upline chain in level order, guarded against cycles.
    async fn collect_uplines(
        &self,
        start: &MemberId,
        mut next: Option<MemberId>,
    ) -> crate::Result<Vec<UplineRef>> {
        let mut uplines = Vec::new();
        let mut visited: HashSet<MemberId> = HashSet::from([start.clone()]);
        while let Some(id) = next {
            if uplines.len() >= usize::from(MAX_LEVEL) {
                break;
            }
            if !visited.insert(id.clone()) {
                return Err(uptree_model::Error::CycleDetected.into());
            }
            let document = self.store.try_member(&id).await?;
            uplines.push(UplineRef {
                id,
                rank: document.account.rank,
            });
            next = document.node.upline;
        }
        Ok(uplines)
    }
}
