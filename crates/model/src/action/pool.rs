use crate::{
    amount::Amount,
    member::{MemberAccount, Rank},
    params::DistributionParams,
};

use super::DistributionAction;

/// Accumulates rank-scoped pool income for a member, clamped at the
/// rank's configured cap.
#[derive(Debug)]
#[must_use = "actions do nothing unless you `execute` them"]
pub struct PoolAccumulation<'a> {
    params: &'a DistributionParams,
    account: &'a MemberAccount,
    rank: Rank,
    amount: Amount,
}

impl<'a> PoolAccumulation<'a> {
    /// Create a new pool accumulation.
    ///
    /// The rank must be unlocked for the member; accumulation on a
    /// locked rank fails with [`Error::RankNotUnlocked`](crate::Error::RankNotUnlocked)
    /// and callers are expected to log and drop it.
    pub fn try_new(
        params: &'a DistributionParams,
        account: &'a MemberAccount,
        rank: Rank,
        amount: Amount,
    ) -> crate::Result<Self> {
        if amount.is_zero() {
            return Err(crate::Error::EmptyDistribution);
        }
        if !account.is_rank_unlocked(rank) {
            return Err(crate::Error::RankNotUnlocked(rank));
        }
        Ok(Self {
            params,
            account,
            rank,
            amount,
        })
    }
}

impl DistributionAction for PoolAccumulation<'_> {
    type Report = PoolAccumulationReport;

    fn execute(self) -> crate::Result<Self::Report> {
        let cap = self.params.rank_params(self.rank)?.max_pool_income;
        let current = self.account.pool_balance(self.rank);
        let headroom = cap.checked_sub(&current).unwrap_or(Amount::ZERO);
        let credited = self.amount.min(headroom);
        // Overflow beyond the cap is dropped, never carried over.
        let dropped = self.amount.checked_sub(&credited)?;
        Ok(PoolAccumulationReport {
            rank: self.rank,
            credited,
            dropped,
            new_balance: current.checked_add(&credited)?,
        })
    }
}

/// Report of the execution of a pool accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolAccumulationReport {
    rank: Rank,
    credited: Amount,
    dropped: Amount,
    new_balance: Amount,
}

impl PoolAccumulationReport {
    /// Get the scoped rank.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Get the credited amount. Zero when the pool was already at cap.
    pub fn credited(&self) -> Amount {
        self.credited
    }

    /// Get the amount dropped by the cap.
    pub fn dropped(&self) -> Amount {
        self.dropped
    }

    /// Get the rank's pool balance after accumulation.
    pub fn new_balance(&self) -> Amount {
        self.new_balance
    }
}

/// Moves every unlocked rank's pool balance into available balance.
#[derive(Debug)]
#[must_use = "actions do nothing unless you `execute` them"]
pub struct PoolClaim<'a> {
    account: &'a MemberAccount,
}

impl<'a> PoolClaim<'a> {
    /// Create a new pool claim.
    pub fn try_new(account: &'a MemberAccount) -> crate::Result<Self> {
        if !account.claim_eligible {
            return Err(crate::Error::ClaimNotEligible);
        }
        Ok(Self { account })
    }
}

impl DistributionAction for PoolClaim<'_> {
    type Report = PoolClaimReport;

    fn execute(self) -> crate::Result<Self::Report> {
        let mut per_rank = Vec::new();
        let mut claimed = Amount::ZERO;
        for rank in self.account.unlocked_ranks.iter().copied() {
            let balance = self.account.pool_balance(rank);
            if balance.is_zero() {
                continue;
            }
            claimed = claimed.checked_add(&balance)?;
            per_rank.push((rank, balance));
        }
        if claimed.is_zero() {
            return Err(crate::Error::EmptyClaim);
        }
        Ok(PoolClaimReport { claimed, per_rank })
    }
}

/// Report of the execution of a pool claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolClaimReport {
    claimed: Amount,
    per_rank: Vec<(Rank, Amount)>,
}

impl PoolClaimReport {
    /// Get the total claimed amount.
    pub fn claimed(&self) -> Amount {
        self.claimed
    }

    /// Get the claimed amount per rank.
    pub fn per_rank(&self) -> &[(Rank, Amount)] {
        &self.per_rank
    }
}

/// Sum of the member's pool balances across unlocked ranks, or zero
/// whenever the member is not claim-eligible.
pub fn claimable(account: &MemberAccount) -> crate::Result<Amount> {
    if !account.claim_eligible {
        return Ok(Amount::ZERO);
    }
    account
        .unlocked_ranks
        .iter()
        .try_fold(Amount::ZERO, |acc, rank| {
            acc.checked_add(&account.pool_balance(*rank))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_with_pool(rank: Rank, balance: u64) -> MemberAccount {
        let mut account = MemberAccount::new_signup();
        account.unlocked_ranks.insert(rank);
        account
            .pool_balances
            .insert(rank, Amount::from_minor_units(balance));
        account
    }

    #[test]
    fn accumulation_clamps_at_cap() -> crate::Result<()> {
        let params = DistributionParams::default();
        // Starter cap is 500.00; balance is 499.00.
        let account = account_with_pool(Rank::Starter, 49_900);
        let report = PoolAccumulation::try_new(
            &params,
            &account,
            Rank::Starter,
            Amount::from_whole(5).unwrap(),
        )?
        .execute()?;
        assert_eq!(report.credited(), Amount::from_whole(1).unwrap());
        assert_eq!(report.dropped(), Amount::from_whole(4).unwrap());
        assert_eq!(report.new_balance(), Amount::from_whole(500).unwrap());
        Ok(())
    }

    #[test]
    fn accumulation_at_cap_is_a_noop() -> crate::Result<()> {
        let params = DistributionParams::default();
        let account = account_with_pool(Rank::Starter, 50_000);
        let report = PoolAccumulation::try_new(
            &params,
            &account,
            Rank::Starter,
            Amount::from_whole(5).unwrap(),
        )?
        .execute()?;
        assert!(report.credited().is_zero());
        assert_eq!(report.dropped(), Amount::from_whole(5).unwrap());
        Ok(())
    }

    #[test]
    fn locked_rank_rejects_accumulation() {
        let params = DistributionParams::default();
        let account = MemberAccount::new_signup();
        let err = PoolAccumulation::try_new(
            &params,
            &account,
            Rank::Builder,
            Amount::from_whole(5).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::RankNotUnlocked(Rank::Builder)));
    }

    #[test]
    fn claim_requires_eligibility() {
        let account = account_with_pool(Rank::Starter, 1_000);
        assert!(matches!(
            PoolClaim::try_new(&account).unwrap_err(),
            crate::Error::ClaimNotEligible
        ));
    }

    #[test]
    fn claim_sums_unlocked_ranks() -> crate::Result<()> {
        let mut account = account_with_pool(Rank::Starter, 1_000);
        account.unlocked_ranks.insert(Rank::Builder);
        account
            .pool_balances
            .insert(Rank::Builder, Amount::from_minor_units(2_500));
        // Locked rank balances are never claimable.
        account
            .pool_balances
            .insert(Rank::Leader, Amount::from_minor_units(9_000));
        account.claim_eligible = true;

        assert_eq!(claimable(&account)?, Amount::from_minor_units(3_500));
        let report = PoolClaim::try_new(&account)?.execute()?;
        assert_eq!(report.claimed(), Amount::from_minor_units(3_500));
        assert_eq!(report.per_rank().len(), 2);
        Ok(())
    }

    #[test]
    fn claimable_is_zero_without_eligibility() -> crate::Result<()> {
        let account = account_with_pool(Rank::Starter, 1_000);
        assert_eq!(claimable(&account)?, Amount::ZERO);
        Ok(())
    }

    #[test]
    fn empty_claim_is_rejected() {
        let mut account = MemberAccount::new_signup();
        account.claim_eligible = true;
        assert!(matches!(
            PoolClaim::try_new(&account).unwrap().execute().unwrap_err(),
            crate::Error::EmptyClaim
        ));
    }
}
