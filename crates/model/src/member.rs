use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::amount::Amount;

/// Opaque member identifier assigned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MemberId(String);

impl MemberId {
    /// Create a new member id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Human-readable unique member code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MemberCode(String);

/// Prefix of generated member codes.
pub const MEMBER_CODE_PREFIX: &str = "UT";

impl MemberCode {
    /// Generate the code for the given member sequence number.
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("{MEMBER_CODE_PREFIX}{sequence:06}"))
    }

    /// Get as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Side of a binary-tree slot.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    num_enum::TryFromPrimitive,
    num_enum::IntoPrimitive,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[cfg_attr(
    feature = "strum",
    derive(strum::EnumIter, strum::EnumString, strum::Display)
)]
#[cfg_attr(feature = "strum", strum(serialize_all = "snake_case"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum Side {
    /// Left slot.
    #[default]
    Left,
    /// Right slot.
    Right,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Member rank.
///
/// The declaration order is the default progression, but level-income
/// gating always consults the injected [`RankOrdering`](crate::params::RankOrdering)
/// rather than this order.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    num_enum::TryFromPrimitive,
    num_enum::IntoPrimitive,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[cfg_attr(
    feature = "strum",
    derive(strum::EnumIter, strum::EnumString, strum::Display)
)]
#[cfg_attr(feature = "strum", strum(serialize_all = "snake_case"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
#[non_exhaustive]
pub enum Rank {
    /// Entry rank assigned at signup.
    #[default]
    Starter,
    /// Builder.
    Builder,
    /// Leader.
    Leader,
    /// Director.
    Director,
    /// Crown.
    Crown,
}

/// Member lifecycle status. Members are never hard-deleted.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    num_enum::TryFromPrimitive,
    num_enum::IntoPrimitive,
    PartialEq,
    Eq,
)]
#[cfg_attr(
    feature = "strum",
    derive(strum::EnumIter, strum::EnumString, strum::Display)
)]
#[cfg_attr(feature = "strum", strum(serialize_all = "snake_case"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
#[non_exhaustive]
pub enum MemberStatus {
    /// Active.
    #[default]
    Active,
    /// Suspended by an operator.
    Suspended,
    /// Deactivated.
    Inactive,
}

/// Balance and bookkeeping state of a member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberAccount {
    /// Current rank.
    pub rank: Rank,
    /// Lifecycle status.
    pub status: MemberStatus,
    /// Withdrawable balance.
    pub available_balance: Amount,
    /// Locked pool balance per rank, pending claim.
    pub pool_balances: BTreeMap<Rank, Amount>,
    /// Ranks whose pool accumulation has been unlocked.
    pub unlocked_ranks: BTreeSet<Rank>,
    /// Lifetime credited earnings.
    pub total_earnings: Amount,
    /// Lifetime approved withdrawals.
    pub total_withdrawals: Amount,
    /// Number of direct referrals.
    pub direct_referrals: u32,
    /// Whether pool income may be claimed. One-way: never reset to `false`.
    pub claim_eligible: bool,
}

impl MemberAccount {
    /// Create the account state of a freshly signed-up member.
    pub fn new_signup() -> Self {
        let mut account = Self::default();
        account.unlocked_ranks.insert(Rank::default());
        account
    }

    /// Get the pool balance for a rank.
    pub fn pool_balance(&self, rank: Rank) -> Amount {
        self.pool_balances.get(&rank).copied().unwrap_or_default()
    }

    /// Whether the given rank's pool accumulation is unlocked.
    pub fn is_rank_unlocked(&self, rank: Rank) -> bool {
        self.unlocked_ranks.contains(&rank)
    }

    /// Whether the member is active.
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}
