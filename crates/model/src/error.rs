use crate::member::{Rank, Side};

/// Error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid Argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Unknown computation error.
    #[error("unknown computation error: {0}")]
    Computation(&'static str),
    /// Overflow.
    #[error("overflow")]
    Overflow,
    /// Divided by zero.
    #[error("divided by zero")]
    DividedByZero,
    /// Convert error.
    #[error("convert value error")]
    Convert,
    /// Member not found in the tree view.
    #[error("member not found in tree")]
    MemberNotFound,
    /// Sponsor is not active.
    #[error("sponsor is not active")]
    InactiveSponsor,
    /// The requested slot is already occupied.
    #[error("slot `{0:?}` already occupied")]
    SlotOccupied(Side),
    /// Tree link structure violates the acyclic invariant.
    #[error("cycle detected during traversal")]
    CycleDetected,
    /// No free slot reachable from the sponsor.
    #[error("no free slot found")]
    NoFreeSlot,
    /// Empty distribution.
    #[error("empty distribution")]
    EmptyDistribution,
    /// Claim is not allowed for the member.
    #[error("claim not eligible")]
    ClaimNotEligible,
    /// Nothing to claim.
    #[error("empty claim")]
    EmptyClaim,
    /// Rank is not unlocked for the member.
    #[error("rank `{0:?}` not unlocked")]
    RankNotUnlocked(Rank),
    /// Build params error.
    #[error("build params: {0}")]
    BuildParams(&'static str),
}
