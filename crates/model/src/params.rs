use std::collections::BTreeMap;

use typed_builder::TypedBuilder;

use crate::{
    amount::{Amount, BasisPoints, BPS_DENOMINATOR},
    ledger::MAX_LEVEL,
    member::Rank,
};

/// The rank ordering consulted by level-income gating.
///
/// Injected configuration: the progression used for eligibility is a
/// product decision and is deliberately not tied to the declaration
/// order of [`Rank`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankOrdering(BTreeMap<Rank, u32>);

impl RankOrdering {
    /// Create from explicit ordinals.
    pub fn new(ordinals: impl IntoIterator<Item = (Rank, u32)>) -> Self {
        Self(ordinals.into_iter().collect())
    }

    /// The natural progression following [`Rank`]'s declaration order.
    pub fn natural() -> Self {
        Self::new(
            [
                Rank::Starter,
                Rank::Builder,
                Rank::Leader,
                Rank::Director,
                Rank::Crown,
            ]
            .into_iter()
            .enumerate()
            .map(|(ordinal, rank)| (rank, ordinal as u32)),
        )
    }

    /// Get the ordinal of a rank, if the rank is part of the ordering.
    pub fn ordinal(&self, rank: Rank) -> Option<u32> {
        self.0.get(&rank).copied()
    }

    /// Whether `upline` ranks greater than or equal to `member`.
    ///
    /// A rank missing from the ordering is never eligible.
    pub fn outranks_or_equals(&self, upline: Rank, member: Rank) -> bool {
        match (self.ordinal(upline), self.ordinal(member)) {
            (Some(u), Some(m)) => u >= m,
            _ => false,
        }
    }
}

impl Default for RankOrdering {
    fn default() -> Self {
        Self::natural()
    }
}

/// Per-rank configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankParams {
    /// Price of unlocking the rank, paid from available balance.
    pub activation_amount: Amount,
    /// Cap on the rank's accumulated pool income. Accumulation beyond
    /// the cap is dropped, never carried over.
    pub max_pool_income: Amount,
}

/// Injected configuration for every distributor.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistributionParams {
    /// Direct referral commission factor.
    #[builder(default = BasisPoints::from_percent(50))]
    pub referral_percent: BasisPoints,
    /// Per-level commission factors, level 1 first.
    #[builder(default = [
        BasisPoints::from_percent(5),
        BasisPoints::from_percent(4),
        BasisPoints::from_percent(3),
        BasisPoints::from_percent(1),
        BasisPoints::from_percent(1),
        BasisPoints::from_percent(1),
    ])]
    pub level_percents: [BasisPoints; MAX_LEVEL as usize],
    /// Direct-referral count at which `claim_eligible` flips true.
    #[builder(default = 2)]
    pub claim_threshold: u32,
    /// Rank ordering for level-income gating.
    #[builder(default)]
    pub rank_ordering: RankOrdering,
    /// Per-rank activation amounts and pool caps.
    #[builder(default = default_rank_params())]
    pub rank_params: BTreeMap<Rank, RankParams>,
}

fn default_rank_params() -> BTreeMap<Rank, RankParams> {
    [
        (Rank::Starter, 40, 500),
        (Rank::Builder, 100, 1_500),
        (Rank::Leader, 250, 4_000),
        (Rank::Director, 500, 10_000),
        (Rank::Crown, 1_000, 25_000),
    ]
    .into_iter()
    .map(|(rank, activation, cap)| {
        (
            rank,
            RankParams {
                activation_amount: Amount::from_minor_units(activation * 100),
                max_pool_income: Amount::from_minor_units(cap * 100),
            },
        )
    })
    .collect()
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DistributionParams {
    /// Get the factor for a 1-indexed level.
    pub fn level_percent(&self, level: u8) -> Option<BasisPoints> {
        if !(1..=MAX_LEVEL).contains(&level) {
            return None;
        }
        self.level_percents.get(usize::from(level) - 1).copied()
    }

    /// Get the params of a rank.
    pub fn rank_params(&self, rank: Rank) -> crate::Result<&RankParams> {
        self.rank_params
            .get(&rank)
            .ok_or(crate::Error::BuildParams("missing rank params"))
    }

    /// Validate that one activation can never distribute more than it
    /// collected.
    pub fn validate(&self) -> crate::Result<()> {
        let total: u64 = self
            .level_percents
            .iter()
            .map(|bps| u64::from(bps.get()))
            .sum::<u64>()
            .checked_add(u64::from(self.referral_percent.get()))
            .ok_or(crate::Error::Overflow)?;
        if total > BPS_DENOMINATOR {
            return Err(crate::Error::BuildParams(
                "referral and level percents exceed 100%",
            ));
        }
        if self.claim_threshold == 0 {
            return Err(crate::Error::BuildParams("zero claim threshold"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let params = DistributionParams::default();
        params.validate().unwrap();
        assert_eq!(params.level_percent(1), Some(BasisPoints::from_percent(5)));
        assert_eq!(params.level_percent(6), Some(BasisPoints::from_percent(1)));
        assert_eq!(params.level_percent(0), None);
        assert_eq!(params.level_percent(7), None);
    }

    #[test]
    fn over_allocated_percents_are_rejected() {
        let params = DistributionParams::builder()
            .referral_percent(BasisPoints::from_percent(80))
            .level_percents([BasisPoints::from_percent(5); MAX_LEVEL as usize])
            .build();
        assert!(params.validate().is_err());
    }

    #[test]
    fn missing_rank_is_never_eligible() {
        let ordering = RankOrdering::new([(Rank::Starter, 0), (Rank::Builder, 1)]);
        assert!(ordering.outranks_or_equals(Rank::Builder, Rank::Starter));
        assert!(!ordering.outranks_or_equals(Rank::Starter, Rank::Builder));
        assert!(!ordering.outranks_or_equals(Rank::Crown, Rank::Starter));
    }
}
