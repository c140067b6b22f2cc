/// Direct referral bonus.
pub mod referral;

/// Per-level commission.
pub mod level;

/// Pool accumulation and claim.
pub mod pool;

/// Distribution Action.
#[must_use = "actions do nothing unless you `execute` them"]
pub trait DistributionAction {
    /// The type of the execution report of the action.
    type Report;

    /// Execute.
    fn execute(self) -> crate::Result<Self::Report>;
}
