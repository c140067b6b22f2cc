use std::fmt;

use num_traits::{CheckedAdd, CheckedSub, Zero};
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places carried by [`Amount`].
pub const DECIMALS: u32 = 2;

/// Minor units per whole currency unit.
pub const UNIT: u64 = 10u64.pow(DECIMALS);

/// Denominator of [`BasisPoints`] factors.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// A fixed-point currency amount in minor units (2 decimal places).
///
/// All arithmetic is checked. Factor application rounds down at the
/// point of computation, so a credit never exceeds its exact share; a
/// stored amount is never re-rounded on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Amount(u64);

impl Amount {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Create from minor units.
    pub const fn from_minor_units(units: u64) -> Self {
        Self(units)
    }

    /// Create from whole currency units.
    pub const fn from_whole(whole: u64) -> Option<Self> {
        match whole.checked_mul(UNIT) {
            Some(units) => Some(Self(units)),
            None => None,
        }
    }

    /// Get minor units.
    pub const fn minor_units(&self) -> u64 {
        self.0
    }

    /// Whether the amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(&self, other: &Self) -> crate::Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(crate::Error::Overflow)
    }

    /// Checked subtraction.
    pub fn checked_sub(&self, other: &Self) -> crate::Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(crate::Error::Computation("subtraction underflow"))
    }

    /// Apply a basis-point factor, rounding down to the nearest minor
    /// unit. The result is never more than the exact share.
    pub fn apply_bps(&self, factor: BasisPoints) -> crate::Result<Self> {
        let numerator = u128::from(self.0)
            .checked_mul(u128::from(factor.get()))
            .ok_or(crate::Error::Overflow)?;
        let truncated = numerator / u128::from(BPS_DENOMINATOR);
        u64::try_from(truncated)
            .map(Self)
            .map_err(|_| crate::Error::Overflow)
    }

    /// Convert to a [`Decimal`] in whole currency units.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0 as i64, DECIMALS)
    }

    /// Convert from a [`Decimal`], rounding half-up to 2 decimal places.
    ///
    /// Negative values are rejected.
    pub fn try_from_decimal(value: Decimal) -> crate::Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(crate::Error::Convert);
        }
        let rounded =
            value.round_dp_with_strategy(DECIMALS, RoundingStrategy::MidpointAwayFromZero);
        let units = rounded
            .checked_mul(Decimal::from(UNIT))
            .ok_or(crate::Error::Overflow)?;
        u64::try_from(units.trunc().mantissa())
            .map(Self)
            .map_err(|_| crate::Error::Convert)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Zero for Amount {
    fn zero() -> Self {
        Self::ZERO
    }

    fn is_zero(&self) -> bool {
        Self::is_zero(self)
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    /// Inherits integer overflow semantics; fallible paths use
    /// [`Amount::checked_add`].
    #[allow(clippy::arithmetic_side_effects)]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl CheckedAdd for Amount {
    fn checked_add(&self, other: &Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    #[allow(clippy::arithmetic_side_effects)]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl CheckedSub for Amount {
    fn checked_sub(&self, other: &Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

/// A percentage factor expressed in basis points (`10_000` = 100%).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct BasisPoints(u32);

impl BasisPoints {
    /// 100%.
    pub const ONE_HUNDRED_PERCENT: Self = Self(BPS_DENOMINATOR as u32);

    /// Create from raw basis points.
    pub const fn new(bps: u32) -> Self {
        Self(bps)
    }

    /// Create from whole percent.
    pub const fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    /// Get raw basis points.
    pub const fn get(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn factor_application_never_exceeds_the_exact_share() -> crate::Result<()> {
        let amount = Amount::from_whole(40).unwrap();
        assert_eq!(
            amount.apply_bps(BasisPoints::from_percent(50))?,
            Amount::from_whole(20).unwrap()
        );
        assert_eq!(
            amount.apply_bps(BasisPoints::from_percent(5))?,
            Amount::from_minor_units(200)
        );
        assert_eq!(
            amount.apply_bps(BasisPoints::from_percent(4))?,
            Amount::from_minor_units(160)
        );
        // 0.01 * 3% = 0.0003 rounds down to zero minor units.
        assert_eq!(
            Amount::from_minor_units(1).apply_bps(BasisPoints::from_percent(3))?,
            Amount::ZERO
        );
        // 0.30 * 5% = 0.015 truncates to one minor unit, never two.
        assert_eq!(
            Amount::from_minor_units(30).apply_bps(BasisPoints::from_percent(5))?,
            Amount::from_minor_units(1)
        );
        // 0.50 * 1% = 0.005 truncates to zero.
        assert_eq!(
            Amount::from_minor_units(50).apply_bps(BasisPoints::from_percent(1))?,
            Amount::ZERO
        );
        Ok(())
    }

    #[test]
    fn decimal_conversions() -> crate::Result<()> {
        let amount = Amount::try_from_decimal(dec!(12.345))?;
        assert_eq!(amount, Amount::from_minor_units(1235));
        assert_eq!(amount.to_decimal(), dec!(12.35));
        assert!(Amount::try_from_decimal(dec!(-1)).is_err());
        Ok(())
    }

    #[test]
    fn checked_math() {
        let max = Amount::from_minor_units(u64::MAX);
        assert!(max.checked_add(&Amount::from_minor_units(1)).is_err());
        assert!(Amount::ZERO
            .checked_sub(&Amount::from_minor_units(1))
            .is_err());
    }
}
