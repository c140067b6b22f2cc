use std::fmt;

use crate::{
    amount::Amount,
    member::{MemberId, Rank},
};

/// Maximum depth of level income, inclusive.
pub const MAX_LEVEL: u8 = 6;

/// Identifier of an activation event, used as the idempotency key for
/// income distribution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ActivationId(String);

impl ActivationId {
    /// Create a new activation id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActivationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of a ledger entry, assigned by the store on append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct LedgerEntryId(pub u64);

/// Kind of an income or balance-movement event.
#[derive(
    Debug,
    Clone,
    Copy,
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
pub enum IncomeKind {
    /// Direct referral bonus.
    Referral,
    /// Per-level commission.
    Level,
    /// Rank-scoped pool income.
    Pool,
    /// Pool balance claimed into available balance.
    Claim,
    /// Approved withdrawal.
    Withdrawal,
    /// Rank activation payment.
    Activation,
}

/// Status of a ledger entry.
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
pub enum EntryStatus {
    /// Locked until the claim-eligibility gate is satisfied.
    Pending,
    /// Credited and final.
    #[default]
    Credited,
    /// Reversed by a correction. Corrections are always new entries;
    /// a `Credited` entry's amount and target are never edited.
    Reversed,
}

/// An immutable income/balance-movement record.
///
/// Entries are append-only. The only permitted in-place transition is
/// `Pending` → `Credited` when the owning member becomes claim-eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedgerEntry {
    kind: IncomeKind,
    amount: Amount,
    member: MemberId,
    source: Option<MemberId>,
    level: Option<u8>,
    rank: Option<Rank>,
    status: EntryStatus,
    activation: ActivationId,
    created_at: i64,
}

impl LedgerEntry {
    /// Create a new entry.
    ///
    /// `level` is only meaningful for [`IncomeKind::Level`] and must be in
    /// `1..=MAX_LEVEL`; `rank` scopes [`IncomeKind::Pool`] credits.
    pub fn new(
        kind: IncomeKind,
        amount: Amount,
        member: MemberId,
        source: Option<MemberId>,
        activation: ActivationId,
        created_at: i64,
    ) -> crate::Result<Self> {
        if amount.is_zero() {
            return Err(crate::Error::InvalidArgument("zero-amount ledger entry"));
        }
        Ok(Self {
            kind,
            amount,
            member,
            source,
            level: None,
            rank: None,
            status: EntryStatus::Credited,
            activation,
            created_at,
        })
    }

    /// Tag with a level number.
    pub fn with_level(mut self, level: u8) -> crate::Result<Self> {
        if !(1..=MAX_LEVEL).contains(&level) {
            return Err(crate::Error::InvalidArgument("level out of range"));
        }
        self.level = Some(level);
        Ok(self)
    }

    /// Scope to a rank.
    pub fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Mark as pending (locked until claim eligibility).
    pub fn pending(mut self) -> Self {
        self.status = EntryStatus::Pending;
        self
    }

    /// Get kind.
    pub fn kind(&self) -> IncomeKind {
        self.kind
    }

    /// Get amount.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Get the credited member.
    pub fn member(&self) -> &MemberId {
        &self.member
    }

    /// Get the member who triggered the entry.
    pub fn source(&self) -> Option<&MemberId> {
        self.source.as_ref()
    }

    /// Get the level tag.
    pub fn level(&self) -> Option<u8> {
        self.level
    }

    /// Get the rank scope.
    pub fn rank(&self) -> Option<Rank> {
        self.rank
    }

    /// Get status.
    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// Get the activation id the entry belongs to.
    pub fn activation(&self) -> &ActivationId {
        &self.activation
    }

    /// Get creation time as unix seconds (server-assigned).
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Transition `Pending` → `Credited`.
    pub fn credited(mut self) -> Self {
        if self.status == EntryStatus::Pending {
            self.status = EntryStatus::Credited;
        }
        self
    }

    /// The key under which duplicate distribution invocations collapse.
    pub fn dedup_key(&self) -> (&ActivationId, IncomeKind, &MemberId, Option<u8>) {
        (&self.activation, self.kind, &self.member, self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LedgerEntry {
        LedgerEntry::new(
            IncomeKind::Level,
            Amount::from_minor_units(160),
            MemberId::from("m-2"),
            Some(MemberId::from("m-9")),
            ActivationId::from("act-1"),
            1,
        )
        .unwrap()
    }

    #[test]
    fn level_tag_is_validated() {
        assert!(entry().with_level(0).is_err());
        assert!(entry().with_level(7).is_err());
        assert_eq!(entry().with_level(6).unwrap().level(), Some(6));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let err = LedgerEntry::new(
            IncomeKind::Referral,
            Amount::ZERO,
            MemberId::from("m-1"),
            None,
            ActivationId::from("act-1"),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidArgument(_)));
    }

    #[test]
    fn pending_transitions_once() {
        let pending = entry().pending();
        assert_eq!(pending.status(), EntryStatus::Pending);
        let credited = pending.credited();
        assert_eq!(credited.status(), EntryStatus::Credited);
    }
}
