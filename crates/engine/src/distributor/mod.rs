/// Direct referral bonus.
pub mod referral;

/// Per-level commission.
pub mod level;

/// Pool/global income.
pub mod pool;

pub use self::{
    level::{LevelDistributor, LevelOutcome},
    pool::{ClaimResponse, PoolDistributor},
    referral::{ReferralDistributor, ReferralOutcome},
};
