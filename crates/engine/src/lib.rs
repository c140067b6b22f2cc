#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! Async signup, ledger and income-distribution engine over an external
//! document store and identity provider.

/// Error type.
pub mod error;

/// Identity provider interface.
pub mod provider;

/// Member store interface.
pub mod store;

/// Ledger writer.
pub mod ledger;

/// Income distributors.
pub mod distributor;

/// Rank activation.
pub mod activation;

/// Signup orchestrator.
pub mod signup;

/// In-memory store and provider for tests.
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use activation::{RankActivationOutcome, RankActivator};
pub use distributor::{
    ClaimResponse, LevelDistributor, LevelOutcome, PoolDistributor, ReferralDistributor,
    ReferralOutcome,
};
pub use error::{Error, ErrorCode, ErrorPayload};
pub use ledger::{BalanceEffect, CreditOutcome, CreditRequest, LedgerWriter};
pub use provider::{AccountId, CustomClaims, IdentityProvider, ProviderError, SessionToken};
pub use signup::{
    Admission, MemberSummary, PlacementTarget, SignupOrchestrator, SignupRequest, SignupResponse,
    SignupState,
};
pub use store::{MemberDocument, MemberProfile, MemberStore, MemberStoreExt, StoreError};

/// Alias for result.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
