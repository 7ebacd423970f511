use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Signed money amount represented as **integer cents**.
///
/// Use this type for **all** monetary values in the engine (expense amounts,
/// shares, balances, settlements) to avoid floating-point drift.
///
/// The value is signed. In a balance:
/// - positive = the member is owed money
/// - negative = the member owes money
///
/// # Examples
///
/// ```rust
/// use engine::MoneyCents;
///
/// let amount = MoneyCents::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects >
/// 2 decimals):
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
/// assert_eq!("10,5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<MoneyCents>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Comparison tolerance for currency amounts (0.01).
    ///
    /// Amounts are whole cents, so two amounts are "within epsilon" only when
    /// they are equal.
    pub const EPSILON: MoneyCents = MoneyCents(1);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// `true` when `self` and `other` differ by less than [`Self::EPSILON`].
    #[must_use]
    pub const fn within_epsilon(self, other: MoneyCents) -> bool {
        (self.0 - other.0).abs() < Self::EPSILON.0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        f.pad(&format!("{sign}{}.{:02}", abs / 100, abs % 100))
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        self.0 += rhs.0;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl SubAssign for MoneyCents {
    fn sub_assign(&mut self, rhs: MoneyCents) {
        self.0 -= rhs.0;
    }
}

impl Neg for MoneyCents {
    type Output = MoneyCents;

    fn neg(self) -> Self::Output {
        MoneyCents(-self.0)
    }
}

impl Sum for MoneyCents {
    fn sum<I: Iterator<Item = MoneyCents>>(iter: I) -> Self {
        iter.fold(MoneyCents::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a MoneyCents> for MoneyCents {
    fn sum<I: Iterator<Item = &'a MoneyCents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses a decimal string into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - max 2 fractional digits (rejects `12.345`)
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hundredths(s)
            .map(MoneyCents)
            .map_err(|reason| EngineError::InvalidAmount(reason.to_string()))
    }
}

/// A percentage with two decimal digits, stored in hundredths of a percent.
///
/// `Percent::HUNDRED` (`100.00%`) is `10_000`.
///
/// ```rust
/// use engine::Percent;
///
/// let pct: Percent = "33.34".parse().unwrap();
/// assert_eq!(pct.hundredths(), 3334);
/// assert_eq!(pct.to_string(), "33.34%");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Percent(i64);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(10_000);

    #[must_use]
    pub const fn new(hundredths: i64) -> Self {
        Self(hundredths)
    }

    #[must_use]
    pub const fn hundredths(self) -> i64 {
        self.0
    }

    /// `true` when the value lies in `[0, 100]`.
    #[must_use]
    pub const fn in_range(self) -> bool {
        self.0 >= Self::ZERO.0 && self.0 <= Self::HUNDRED.0
    }

    /// Share of `amount` this percentage represents, floored to whole cents,
    /// with the dropped fraction in ten-thousandths of a cent.
    ///
    /// Flooring never overshoots, so the cents lost across a split can be
    /// handed back one at a time, largest fraction first.
    #[must_use]
    pub fn floor_share_of(self, amount: MoneyCents) -> (MoneyCents, i64) {
        let product = i128::from(amount.cents()) * i128::from(self.0);
        let hundred = i128::from(Self::HUNDRED.0);
        // |share| <= |amount| since the percentage is at most 100.
        let share = product.div_euclid(hundred) as i64;
        let remainder = product.rem_euclid(hundred) as i64;
        (MoneyCents(share), remainder)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        f.pad(&format!("{sign}{}.{:02}%", abs / 100, abs % 100))
    }
}

impl FromStr for Percent {
    type Err = EngineError;

    /// Same grammar as [`MoneyCents`], with an optional trailing `%`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed);
        parse_hundredths(trimmed)
            .map(Percent)
            .map_err(|reason| EngineError::InvalidSplit(format!("percentage: {reason}")))
    }
}

/// Parses a fixed-point decimal with at most two fractional digits into an
/// integer number of hundredths.
pub(crate) fn parse_hundredths(s: &str) -> Result<i64, &'static str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("empty amount");
    }

    let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
        (true, stripped)
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        (false, stripped)
    } else {
        (false, trimmed)
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Err("empty amount");
    }

    let rest = rest.replace(',', ".");
    let mut parts = rest.split('.');
    let units_str = parts.next().ok_or("invalid amount")?;
    let frac_str = parts.next();

    if parts.next().is_some() {
        return Err("invalid amount");
    }

    if units_str.is_empty() || !units_str.chars().all(|c| c.is_ascii_digit()) {
        return Err("invalid amount");
    }

    let units: i64 = units_str.parse().map_err(|_| "amount too large")?;

    let frac: i64 = match frac_str {
        None | Some("") => 0,
        Some(frac) => {
            if !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err("invalid amount");
            }
            match frac.len() {
                1 => frac.parse::<i64>().map_err(|_| "invalid amount")? * 10,
                2 => frac.parse::<i64>().map_err(|_| "invalid amount")?,
                _ => return Err("too many decimals"),
            }
        }
    };

    let total = units
        .checked_mul(100)
        .and_then(|v| v.checked_add(frac))
        .ok_or("amount too large")?;

    if negative {
        total.checked_neg().ok_or("amount too large")
    } else {
        Ok(total)
    }
}

/// Rejects non-positive amounts with a labeled error.
pub(crate) fn ensure_positive(amount: MoneyCents, label: &str) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "{label} must be > 0, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_two_decimals() {
        assert_eq!(MoneyCents::new(0).to_string(), "0.00");
        assert_eq!(MoneyCents::new(1).to_string(), "0.01");
        assert_eq!(MoneyCents::new(10).to_string(), "0.10");
        assert_eq!(MoneyCents::new(1050).to_string(), "10.50");
        assert_eq!(MoneyCents::new(-1050).to_string(), "-10.50");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
        assert_eq!("10.5".parse::<MoneyCents>().unwrap().cents(), 1050);
        assert_eq!("10,50".parse::<MoneyCents>().unwrap().cents(), 1050);
        assert_eq!("-0.01".parse::<MoneyCents>().unwrap().cents(), -1);
        assert_eq!("+1.00".parse::<MoneyCents>().unwrap().cents(), 100);
        assert_eq!("  2.30 ".parse::<MoneyCents>().unwrap().cents(), 230);
    }

    #[test]
    fn parse_rejects_more_than_two_decimals() {
        assert!("12.345".parse::<MoneyCents>().is_err());
        assert!("0.001".parse::<MoneyCents>().is_err());
        assert!("".parse::<MoneyCents>().is_err());
        assert!("1.2.3".parse::<MoneyCents>().is_err());
    }

    #[test]
    fn epsilon_is_one_cent() {
        assert!(MoneyCents::new(9000).within_epsilon(MoneyCents::new(9000)));
        assert!(!MoneyCents::new(8999).within_epsilon(MoneyCents::new(9000)));
    }

    #[test]
    fn percent_parses_with_optional_sign() {
        assert_eq!("33.33".parse::<Percent>().unwrap(), Percent::new(3333));
        assert_eq!("100%".parse::<Percent>().unwrap(), Percent::HUNDRED);
        assert!("12.345".parse::<Percent>().is_err());
        assert!(!Percent::new(10_001).in_range());
        assert!(!Percent::new(-1).in_range());
    }

    #[test]
    fn percent_share_is_floored() {
        let amount = MoneyCents::new(9000);
        assert_eq!(
            Percent::new(3333).floor_share_of(amount),
            (MoneyCents::new(2999), 7000)
        );
        assert_eq!(
            Percent::new(3334).floor_share_of(amount),
            (MoneyCents::new(3000), 6000)
        );
        assert_eq!(Percent::HUNDRED.floor_share_of(amount), (amount, 0));
    }
}
