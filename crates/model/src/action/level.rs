use std::collections::HashSet;

use crate::{
    amount::Amount,
    ledger::MAX_LEVEL,
    member::{MemberId, Rank},
    params::DistributionParams,
};

use super::DistributionAction;

/// One member of the upline chain, in level order (level 1 first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplineRef {
    /// Member id.
    pub id: MemberId,
    /// Current rank.
    pub rank: Rank,
}

/// Computes the per-level commissions of one activation over the
/// activating member's upline chain.
#[derive(Debug)]
#[must_use = "actions do nothing unless you `execute` them"]
pub struct LevelDistribution<'a> {
    params: &'a DistributionParams,
    member_rank: Rank,
    uplines: Vec<UplineRef>,
    amount: Amount,
}

impl<'a> LevelDistribution<'a> {
    /// Create a new level distribution.
    ///
    /// `uplines` is the chain starting at the activating member's
    /// immediate upline; anything beyond [`MAX_LEVEL`] entries is
    /// ignored. A repeated id in the chain is a corrupted tree.
    pub fn try_new(
        params: &'a DistributionParams,
        member_rank: Rank,
        uplines: Vec<UplineRef>,
        amount: Amount,
    ) -> crate::Result<Self> {
        if amount.is_zero() {
            return Err(crate::Error::EmptyDistribution);
        }
        let mut seen = HashSet::new();
        for upline in uplines.iter().take(usize::from(MAX_LEVEL)) {
            if !seen.insert(&upline.id) {
                return Err(crate::Error::CycleDetected);
            }
        }
        Ok(Self {
            params,
            member_rank,
            uplines,
            amount,
        })
    }
}

impl DistributionAction for LevelDistribution<'_> {
    type Report = LevelReport;

    fn execute(self) -> crate::Result<Self::Report> {
        let mut credits = Vec::new();
        let mut skipped = Vec::new();
        for (index, upline) in self
            .uplines
            .into_iter()
            .take(usize::from(MAX_LEVEL))
            .enumerate()
        {
            let level = index as u8 + 1;
            let Some(percent) = self.params.level_percent(level) else {
                break;
            };
            if !self
                .params
                .rank_ordering
                .outranks_or_equals(upline.rank, self.member_rank)
            {
                skipped.push(level);
                continue;
            }
            let amount = self.amount.apply_bps(percent)?;
            if amount.is_zero() {
                // Below one minor unit after rounding; nothing to credit.
                skipped.push(level);
                continue;
            }
            credits.push(LevelCredit {
                level,
                member: upline.id,
                amount,
            });
        }
        Ok(LevelReport { credits, skipped })
    }
}

/// A single level commission owed to an upline member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelCredit {
    /// 1-indexed level of the credit.
    pub level: u8,
    /// Credited upline member.
    pub member: MemberId,
    /// Commission amount.
    pub amount: Amount,
}

/// Report of the execution of a level distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelReport {
    credits: Vec<LevelCredit>,
    skipped: Vec<u8>,
}

impl LevelReport {
    /// Get the credits, one per eligible level.
    pub fn credits(&self) -> &[LevelCredit] {
        &self.credits
    }

    /// Get the levels skipped by the rank gate (or rounding to zero).
    pub fn skipped(&self) -> &[u8] {
        &self.skipped
    }

    /// Get the total credited amount.
    pub fn total(&self) -> crate::Result<Amount> {
        self.credits
            .iter()
            .try_fold(Amount::ZERO, |acc, credit| acc.checked_add(&credit.amount))
    }
}

#[cfg(test)]
mod tests {
    use crate::params::RankOrdering;

    use super::*;

    fn chain(ranks: &[Rank]) -> Vec<UplineRef> {
        ranks
            .iter()
            .enumerate()
            .map(|(i, rank)| UplineRef {
                id: MemberId::new(format!("u-{}", i + 1)),
                rank: *rank,
            })
            .collect()
    }

    #[test]
    fn six_equal_rank_uplines_all_credit() -> crate::Result<()> {
        let params = DistributionParams::default();
        let report = LevelDistribution::try_new(
            &params,
            Rank::Starter,
            chain(&[Rank::Starter; 6]),
            Amount::from_whole(40).unwrap(),
        )?
        .execute()?;
        let amounts: Vec<_> = report
            .credits()
            .iter()
            .map(|c| c.amount.minor_units())
            .collect();
        assert_eq!(amounts, [200, 160, 120, 40, 40, 40]);
        assert_eq!(report.total()?.minor_units(), 600);
        assert!(report.skipped().is_empty());
        Ok(())
    }

    #[test]
    fn lower_ranked_uplines_are_skipped() -> crate::Result<()> {
        let params = DistributionParams::default();
        let report = LevelDistribution::try_new(
            &params,
            Rank::Leader,
            chain(&[
                Rank::Starter,
                Rank::Leader,
                Rank::Crown,
                Rank::Builder,
                Rank::Director,
                Rank::Starter,
            ]),
            Amount::from_whole(100).unwrap(),
        )?
        .execute()?;
        let levels: Vec<_> = report.credits().iter().map(|c| c.level).collect();
        assert_eq!(levels, [2, 3, 5]);
        assert_eq!(report.skipped(), [1, 4, 6]);
        Ok(())
    }

    #[test]
    fn chain_is_truncated_at_max_depth() -> crate::Result<()> {
        let params = DistributionParams::default();
        let report = LevelDistribution::try_new(
            &params,
            Rank::Starter,
            chain(&[Rank::Starter; 10]),
            Amount::from_whole(40).unwrap(),
        )?
        .execute()?;
        assert_eq!(report.credits().len(), 6);
        Ok(())
    }

    #[test]
    fn short_chain_stops_at_root() -> crate::Result<()> {
        let params = DistributionParams::default();
        let report = LevelDistribution::try_new(
            &params,
            Rank::Starter,
            chain(&[Rank::Starter; 2]),
            Amount::from_whole(40).unwrap(),
        )?
        .execute()?;
        assert_eq!(report.credits().len(), 2);
        Ok(())
    }

    #[test]
    fn repeated_upline_is_a_cycle() {
        let params = DistributionParams::default();
        let mut uplines = chain(&[Rank::Starter; 3]);
        uplines[2].id = uplines[0].id.clone();
        let err = LevelDistribution::try_new(
            &params,
            Rank::Starter,
            uplines,
            Amount::from_whole(40).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::CycleDetected));
    }

    #[test]
    fn rank_outside_ordering_is_skipped() -> crate::Result<()> {
        let params = DistributionParams::builder()
            .rank_ordering(RankOrdering::new([(Rank::Starter, 0), (Rank::Builder, 1)]))
            .build();
        let report = LevelDistribution::try_new(
            &params,
            Rank::Starter,
            chain(&[Rank::Crown, Rank::Builder]),
            Amount::from_whole(40).unwrap(),
        )?
        .execute()?;
        let levels: Vec<_> = report.credits().iter().map(|c| c.level).collect();
        assert_eq!(levels, [2]);
        assert_eq!(report.skipped(), [1]);
        Ok(())
    }
}
