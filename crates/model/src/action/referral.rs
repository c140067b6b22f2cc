use crate::{
    amount::Amount,
    member::MemberAccount,
    params::DistributionParams,
};

use super::DistributionAction;

/// Computes the direct referral bonus for one activation.
#[derive(Debug)]
#[must_use = "actions do nothing unless you `execute` them"]
pub struct ReferralDistribution<'a> {
    params: &'a DistributionParams,
    sponsor: &'a MemberAccount,
    amount: Amount,
}

impl<'a> ReferralDistribution<'a> {
    /// Create a new referral distribution for the sponsor of an
    /// activating member.
    pub fn try_new(
        params: &'a DistributionParams,
        sponsor: &'a MemberAccount,
        amount: Amount,
    ) -> crate::Result<Self> {
        if amount.is_zero() {
            return Err(crate::Error::EmptyDistribution);
        }
        Ok(Self {
            params,
            sponsor,
            amount,
        })
    }
}

impl DistributionAction for ReferralDistribution<'_> {
    type Report = ReferralReport;

    fn execute(self) -> crate::Result<Self::Report> {
        let commission = self.amount.apply_bps(self.params.referral_percent)?;
        let direct_referrals = self
            .sponsor
            .direct_referrals
            .checked_add(1)
            .ok_or(crate::Error::Overflow)?;
        // One-way: the flag never flips back once set.
        let eligibility_flipped =
            !self.sponsor.claim_eligible && direct_referrals >= self.params.claim_threshold;
        Ok(ReferralReport {
            commission,
            direct_referrals,
            eligibility_flipped,
        })
    }
}

/// Report of the execution of a referral distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralReport {
    commission: Amount,
    direct_referrals: u32,
    eligibility_flipped: bool,
}

impl ReferralReport {
    /// Get the commission owed to the sponsor.
    pub fn commission(&self) -> Amount {
        self.commission
    }

    /// Get the sponsor's direct-referral count after this activation.
    pub fn direct_referrals(&self) -> u32 {
        self.direct_referrals
    }

    /// Whether this activation flips the sponsor's claim eligibility.
    pub fn eligibility_flipped(&self) -> bool {
        self.eligibility_flipped
    }
}

#[cfg(test)]
mod tests {
    use crate::{action::DistributionAction, member::MemberAccount, params::DistributionParams};

    use super::*;

    #[test]
    fn commission_and_threshold() -> crate::Result<()> {
        let params = DistributionParams::default();
        let mut sponsor = MemberAccount::new_signup();
        sponsor.direct_referrals = 1;

        let report = ReferralDistribution::try_new(
            &params,
            &sponsor,
            Amount::from_whole(40).unwrap(),
        )?
        .execute()?;
        assert_eq!(report.commission(), Amount::from_whole(20).unwrap());
        assert_eq!(report.direct_referrals(), 2);
        assert!(report.eligibility_flipped());
        Ok(())
    }

    #[test]
    fn first_referral_does_not_flip() -> crate::Result<()> {
        let params = DistributionParams::default();
        let sponsor = MemberAccount::new_signup();
        let report =
            ReferralDistribution::try_new(&params, &sponsor, Amount::from_whole(40).unwrap())?
                .execute()?;
        assert_eq!(report.direct_referrals(), 1);
        assert!(!report.eligibility_flipped());
        Ok(())
    }

    #[test]
    fn already_eligible_sponsor_never_reflips() -> crate::Result<()> {
        let params = DistributionParams::default();
        let mut sponsor = MemberAccount::new_signup();
        sponsor.direct_referrals = 5;
        sponsor.claim_eligible = true;
        let report =
            ReferralDistribution::try_new(&params, &sponsor, Amount::from_whole(40).unwrap())?
                .execute()?;
        assert_eq!(report.direct_referrals(), 6);
        assert!(!report.eligibility_flipped());
        Ok(())
    }

    #[test]
    fn zero_amount_is_empty() {
        let params = DistributionParams::default();
        let sponsor = MemberAccount::new_signup();
        assert!(matches!(
            ReferralDistribution::try_new(&params, &sponsor, Amount::ZERO).unwrap_err(),
            crate::Error::EmptyDistribution
        ));
    }
}
