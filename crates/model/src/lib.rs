#![deny(missing_docs)]
#![deny(unreachable_pub)]
#![warn(clippy::arithmetic_side_effects)]

//! Pure placement and income-distribution model for a binary-plan network.

/// Fixed-point currency amounts.
pub mod amount;

/// Members and ranks.
pub mod member;

/// Ledger entries.
pub mod ledger;

/// Binary tree and slot location.
pub mod tree;

/// Distribution params.
pub mod params;

/// Actions.
pub mod action;

/// Error type.
pub mod error;

/// Utils for testing.
#[cfg(any(test, feature = "test"))]
pub mod test;

pub use action::{
    level::{LevelCredit, LevelDistribution, LevelReport, UplineRef},
    pool::{claimable, PoolAccumulation, PoolAccumulationReport, PoolClaim, PoolClaimReport},
    referral::{ReferralDistribution, ReferralReport},
    DistributionAction,
};
pub use amount::{Amount, BasisPoints};
pub use error::Error;
pub use ledger::{ActivationId, EntryStatus, IncomeKind, LedgerEntry, LedgerEntryId, MAX_LEVEL};
pub use member::{MemberAccount, MemberCode, MemberId, MemberStatus, Rank, Side};
pub use params::{DistributionParams, RankOrdering, RankParams};
pub use tree::{locate, locate_at, Placement, TreeNode, TreeView, TreeViewExt};

/// Alias for result.
pub type Result<T> = std::result::Result<T, Error>;
