//! Split resolution.
//!
//! Turns the raw split of one expense into a fully resolved share map whose
//! total is exactly the expense amount. Pure: the same input always yields
//! the same shares.
//!
//! Remainder policy: shares are first floored to whole cents, then the
//! leftover cents are handed out one each.
//!
//! - Equal splits: to the participants in ascending key order.
//! - Percentage splits: to the largest fractional remainders first (ties in
//!   ascending key order), so every share is its exact value rounded down
//!   or up and equal percentages never differ by more than one cent.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    EngineError, MemberKey, MoneyCents, Percent, ResultEngine, money::ensure_positive,
};

/// Resolved per-member shares of one expense.
pub type Shares = BTreeMap<MemberKey, MoneyCents>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    Equal,
    Unequal,
    Percentage,
}

impl SplitType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Unequal => "unequal",
            Self::Percentage => "percentage",
        }
    }
}

impl TryFrom<&str> for SplitType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "equal" => Ok(Self::Equal),
            "unequal" => Ok(Self::Unequal),
            "percentage" => Ok(Self::Percentage),
            other => Err(EngineError::InvalidSplit(format!(
                "invalid split type: {other}"
            ))),
        }
    }
}

/// How the participants of an expense are given.
///
/// Explicit values are fixed-point numbers with two decimals: cents for an
/// unequal split, hundredths of a percent for a percentage split. Under an
/// equal split an explicit map is read as a weighted subset and must carry
/// the same weight for everyone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitSpec {
    AllMembers,
    EqualSubset(BTreeSet<MemberKey>),
    Explicit(BTreeMap<MemberKey, i64>),
}

/// Resolves the shares of an expense of `amount` among `group_members`.
pub fn resolve_split(
    amount: MoneyCents,
    split_type: SplitType,
    spec: &SplitSpec,
    group_members: &BTreeSet<MemberKey>,
) -> ResultEngine<Shares> {
    ensure_positive(amount, "expense amount")?;

    let shares = match split_type {
        SplitType::Equal => {
            let participants = equal_participants(spec, group_members)?;
            split_evenly(amount, &participants)
        }
        SplitType::Unequal => {
            let values = explicit_values(spec, split_type, group_members)?;
            resolve_unequal(amount, values)?
        }
        SplitType::Percentage => {
            let values = explicit_values(spec, split_type, group_members)?;
            resolve_percentage(amount, values)?
        }
    };

    debug_assert_eq!(shares.values().sum::<MoneyCents>(), amount);
    Ok(shares)
}

fn equal_participants(
    spec: &SplitSpec,
    group_members: &BTreeSet<MemberKey>,
) -> ResultEngine<BTreeSet<MemberKey>> {
    let participants = match spec {
        SplitSpec::AllMembers => group_members.clone(),
        SplitSpec::EqualSubset(subset) => subset.clone(),
        SplitSpec::Explicit(weights) => {
            let mut distinct = weights.values().copied().collect::<BTreeSet<_>>();
            match (distinct.pop_first(), distinct.is_empty()) {
                (Some(weight), true) if weight > 0 => {}
                (Some(weight), true) => {
                    return Err(EngineError::InvalidSplit(format!(
                        "equal split weight must be > 0, got {weight}"
                    )));
                }
                _ if weights.is_empty() => {}
                _ => {
                    return Err(EngineError::InvalidSplit(
                        "equal split weights must be uniform".to_string(),
                    ));
                }
            }
            weights.keys().cloned().collect()
        }
    };

    ensure_participants(participants.iter(), group_members)?;
    Ok(participants)
}

fn explicit_values<'a>(
    spec: &'a SplitSpec,
    split_type: SplitType,
    group_members: &BTreeSet<MemberKey>,
) -> ResultEngine<&'a BTreeMap<MemberKey, i64>> {
    let SplitSpec::Explicit(values) = spec else {
        return Err(EngineError::InvalidSplit(format!(
            "{} split requires an explicit value per participant",
            split_type.as_str()
        )));
    };
    ensure_participants(values.keys(), group_members)?;
    Ok(values)
}

fn ensure_participants<'a>(
    mut participants: impl ExactSizeIterator<Item = &'a MemberKey>,
    group_members: &BTreeSet<MemberKey>,
) -> ResultEngine<()> {
    if participants.len() == 0 {
        return Err(EngineError::InvalidSplit(
            "split needs at least one participant".to_string(),
        ));
    }
    if let Some(unknown) = participants.find(|key| !group_members.contains(*key)) {
        return Err(EngineError::InvalidSplit(format!(
            "participant {unknown} is not a member of the group"
        )));
    }
    Ok(())
}

fn resolve_unequal(amount: MoneyCents, values: &BTreeMap<MemberKey, i64>) -> ResultEngine<Shares> {
    let mut shares = Shares::new();
    for (member, cents) in values {
        let share = MoneyCents::new(*cents);
        if share.is_negative() {
            return Err(EngineError::InvalidSplit(format!(
                "share of {member} must not be negative, got {share}"
            )));
        }
        shares.insert(member.clone(), share);
    }

    let total = shares
        .values()
        .try_fold(MoneyCents::ZERO, |acc, share| acc.checked_add(*share))
        .ok_or_else(|| {
            EngineError::InvalidSplit(format!("split amounts overflow, expected {amount}"))
        })?;
    if !total.within_epsilon(amount) {
        return Err(EngineError::InvalidSplit(format!(
            "split amounts sum to {total}, expected {amount}"
        )));
    }
    Ok(shares)
}

fn resolve_percentage(
    amount: MoneyCents,
    values: &BTreeMap<MemberKey, i64>,
) -> ResultEngine<Shares> {
    let mut percentages = BTreeMap::new();
    for (member, hundredths) in values {
        let pct = Percent::new(*hundredths);
        if !pct.in_range() {
            return Err(EngineError::InvalidSplit(format!(
                "percentage of {member} must be within [0, 100], got {pct}"
            )));
        }
        percentages.insert(member, pct);
    }

    let total = percentages.values().map(|p| p.hundredths()).sum::<i64>();
    if total != Percent::HUNDRED.hundredths() {
        return Err(EngineError::InvalidSplit(format!(
            "percentages sum to {}, expected {}",
            Percent::new(total),
            Percent::HUNDRED
        )));
    }

    let mut shares = Shares::new();
    let mut remainders = Vec::new();
    for (member, pct) in &percentages {
        let (share, remainder) = pct.floor_share_of(amount);
        shares.insert((*member).clone(), share);
        if remainder > 0 {
            remainders.push((remainder, (*member).clone()));
        }
    }
    // Largest remainder first, ascending key on ties.
    remainders.sort_by(|(ra, ka), (rb, kb)| rb.cmp(ra).then_with(|| ka.cmp(kb)));
    let receivers = remainders
        .into_iter()
        .map(|(_, member)| member)
        .collect::<Vec<_>>();
    let residual = amount - shares.values().sum::<MoneyCents>();
    hand_out_remainder(&mut shares, &receivers, residual);
    Ok(shares)
}

/// Even split among `participants`; the remainder goes one cent each in
/// ascending key order.
fn split_evenly(amount: MoneyCents, participants: &BTreeSet<MemberKey>) -> Shares {
    // Participants are validated non-empty by the caller.
    let count = participants.len() as i64;
    let base = MoneyCents::new(amount.cents() / count);
    let mut shares: Shares = participants
        .iter()
        .map(|member| (member.clone(), base))
        .collect();
    let receivers = participants.iter().cloned().collect::<Vec<_>>();
    let residual = MoneyCents::new(amount.cents() % count);
    hand_out_remainder(&mut shares, &receivers, residual);
    shares
}

/// Adds one cent to each of the first `residual` receivers.
fn hand_out_remainder(shares: &mut Shares, receivers: &[MemberKey], residual: MoneyCents) {
    let count = usize::try_from(residual.cents()).unwrap_or_default();
    for member in receivers.iter().take(count) {
        if let Some(share) = shares.get_mut(member) {
            *share += MoneyCents::new(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(keys: &[&str]) -> BTreeSet<MemberKey> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn explicit(values: &[(&str, i64)]) -> SplitSpec {
        SplitSpec::Explicit(values.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    fn cents(shares: &Shares, key: &str) -> i64 {
        shares.get(key).copied().unwrap_or_default().cents()
    }

    #[test]
    fn equal_split_among_everyone() {
        let group = members(&["a", "b", "c"]);
        let shares =
            resolve_split(MoneyCents::new(9000), SplitType::Equal, &SplitSpec::AllMembers, &group)
                .unwrap();
        assert_eq!(shares.len(), 3);
        assert!(shares.values().all(|s| *s == MoneyCents::new(3000)));
    }

    #[test]
    fn equal_split_among_subset_excludes_others() {
        let group = members(&["a", "b", "c"]);
        let spec = SplitSpec::EqualSubset(members(&["b", "c"]));
        let shares = resolve_split(MoneyCents::new(9000), SplitType::Equal, &spec, &group).unwrap();
        assert_eq!(cents(&shares, "b"), 4500);
        assert_eq!(cents(&shares, "c"), 4500);
        assert!(!shares.contains_key("a"));
    }

    #[test]
    fn uniform_weights_read_as_equal_subset() {
        let group = members(&["a", "b", "c"]);
        let spec = explicit(&[("a", 1), ("c", 1)]);
        let shares = resolve_split(MoneyCents::new(1000), SplitType::Equal, &spec, &group).unwrap();
        assert_eq!(cents(&shares, "a"), 500);
        assert_eq!(cents(&shares, "c"), 500);

        let uneven = explicit(&[("a", 1), ("c", 2)]);
        let err = resolve_split(MoneyCents::new(1000), SplitType::Equal, &uneven, &group);
        assert!(err.unwrap_err().is_validation());
    }

    #[test]
    fn equal_remainder_goes_to_lowest_keys_first() {
        let group = members(&["carol", "alice", "bob"]);
        let shares =
            resolve_split(MoneyCents::new(1000), SplitType::Equal, &SplitSpec::AllMembers, &group)
                .unwrap();
        assert_eq!(cents(&shares, "alice"), 334);
        assert_eq!(cents(&shares, "bob"), 333);
        assert_eq!(cents(&shares, "carol"), 333);

        let shares =
            resolve_split(MoneyCents::new(1001), SplitType::Equal, &SplitSpec::AllMembers, &group)
                .unwrap();
        assert_eq!(cents(&shares, "alice"), 334);
        assert_eq!(cents(&shares, "bob"), 334);
        assert_eq!(cents(&shares, "carol"), 333);
    }

    #[test]
    fn unequal_split_must_match_amount_exactly() {
        let group = members(&["a", "b"]);
        let short = explicit(&[("a", 4000), ("b", 4999)]);
        let err = resolve_split(MoneyCents::new(9000), SplitType::Unequal, &short, &group)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidSplit("split amounts sum to 89.99, expected 90.00".to_string())
        );

        let exact = explicit(&[("a", 4000), ("b", 5000)]);
        let shares =
            resolve_split(MoneyCents::new(9000), SplitType::Unequal, &exact, &group).unwrap();
        assert_eq!(cents(&shares, "a"), 4000);
        assert_eq!(cents(&shares, "b"), 5000);
    }

    #[test]
    fn unequal_split_rejects_negative_share() {
        let group = members(&["a", "b"]);
        let spec = explicit(&[("a", 10_000), ("b", -1000)]);
        let err = resolve_split(MoneyCents::new(9000), SplitType::Unequal, &spec, &group);
        assert!(err.unwrap_err().is_validation());
    }

    #[test]
    fn percentage_split_reconciles_rounding() {
        let group = members(&["a", "b", "c"]);
        let spec = explicit(&[("a", 3333), ("b", 3333), ("c", 3334)]);
        let shares =
            resolve_split(MoneyCents::new(9000), SplitType::Percentage, &spec, &group).unwrap();
        assert_eq!(shares.values().sum::<MoneyCents>(), MoneyCents::new(9000));
        assert_eq!(cents(&shares, "a"), 3000);
        assert_eq!(cents(&shares, "b"), 3000);
        assert_eq!(cents(&shares, "c"), 3000);
    }

    #[test]
    fn equal_percentages_get_equal_shares() {
        let group = members(&["a", "b", "c"]);
        let spec = explicit(&[("a", 3334), ("b", 3333), ("c", 3333)]);
        let shares =
            resolve_split(MoneyCents::new(9000), SplitType::Percentage, &spec, &group).unwrap();
        assert_eq!(cents(&shares, "a"), 3000);
        assert_eq!(cents(&shares, "b"), 3000);
        assert_eq!(cents(&shares, "c"), 3000);

        // 10.00 at 33.34/33.33/33.33: exact shares 3.334, 3.333, 3.333.
        let shares =
            resolve_split(MoneyCents::new(1000), SplitType::Percentage, &spec, &group).unwrap();
        assert_eq!(cents(&shares, "a"), 334);
        assert_eq!(cents(&shares, "b"), 333);
        assert_eq!(cents(&shares, "c"), 333);
    }

    #[test]
    fn percentage_leftover_goes_to_largest_remainder() {
        let group = members(&["a", "b"]);
        // 0.05 at 30/70: exact 1.5 and 3.5 cents, tie goes to "a".
        let spec = explicit(&[("a", 3000), ("b", 7000)]);
        let shares =
            resolve_split(MoneyCents::new(5), SplitType::Percentage, &spec, &group).unwrap();
        assert_eq!(cents(&shares, "a"), 2);
        assert_eq!(cents(&shares, "b"), 3);

        // 0.10 at 14/86: exact 1.4 and 8.6 cents, "b" has the larger remainder.
        let spec = explicit(&[("a", 1400), ("b", 8600)]);
        let shares =
            resolve_split(MoneyCents::new(10), SplitType::Percentage, &spec, &group).unwrap();
        assert_eq!(cents(&shares, "a"), 1);
        assert_eq!(cents(&shares, "b"), 9);
    }

    #[test]
    fn unequal_split_overflow_is_rejected() {
        let group = members(&["a", "b", "c"]);
        let spec = explicit(&[("a", i64::MAX), ("b", i64::MAX), ("c", 3)]);
        let err =
            resolve_split(MoneyCents::new(1), SplitType::Unequal, &spec, &group).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSplit(_)));
    }

    #[test]
    fn remainder_never_exceeds_one_cent_per_receiver() {
        let mut shares = Shares::from([("a".to_string(), MoneyCents::ZERO)]);
        hand_out_remainder(&mut shares, &["a".to_string()], MoneyCents::new(5));
        assert_eq!(cents(&shares, "a"), 1);

        hand_out_remainder(&mut shares, &[], MoneyCents::new(3));
        assert_eq!(cents(&shares, "a"), 1);
    }

    #[test]
    fn percentage_residual_skips_zero_percent_members() {
        let group = members(&["a", "b", "c"]);
        let spec = explicit(&[("a", 0), ("b", 5000), ("c", 5000)]);
        let shares =
            resolve_split(MoneyCents::new(1001), SplitType::Percentage, &spec, &group).unwrap();
        assert_eq!(cents(&shares, "a"), 0);
        assert_eq!(cents(&shares, "b"), 501);
        assert_eq!(cents(&shares, "c"), 500);
    }

    #[test]
    fn percentage_split_validates_range_and_total() {
        let group = members(&["a", "b"]);
        let over = explicit(&[("a", 12_000), ("b", -2000)]);
        assert!(
            resolve_split(MoneyCents::new(100), SplitType::Percentage, &over, &group)
                .unwrap_err()
                .is_validation()
        );

        let short = explicit(&[("a", 5000), ("b", 4999)]);
        assert!(
            resolve_split(MoneyCents::new(100), SplitType::Percentage, &short, &group)
                .unwrap_err()
                .is_validation()
        );
    }

    #[test]
    fn rejects_bad_inputs() {
        let group = members(&["a", "b"]);
        assert!(matches!(
            resolve_split(MoneyCents::ZERO, SplitType::Equal, &SplitSpec::AllMembers, &group),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(
            resolve_split(
                MoneyCents::new(100),
                SplitType::Equal,
                &SplitSpec::EqualSubset(BTreeSet::new()),
                &group
            )
            .unwrap_err()
            .is_validation()
        );
        assert!(
            resolve_split(
                MoneyCents::new(100),
                SplitType::Equal,
                &SplitSpec::EqualSubset(members(&["a", "zed"])),
                &group
            )
            .unwrap_err()
            .is_validation()
        );
        assert!(
            resolve_split(
                MoneyCents::new(100),
                SplitType::Unequal,
                &SplitSpec::AllMembers,
                &group
            )
            .unwrap_err()
            .is_validation()
        );
        assert!(
            resolve_split(
                MoneyCents::new(100),
                SplitType::Equal,
                &SplitSpec::AllMembers,
                &BTreeSet::new()
            )
            .unwrap_err()
            .is_validation()
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let group = members(&["a", "b", "c", "d"]);
        let spec = explicit(&[("a", 1250), ("b", 3750), ("c", 2500), ("d", 2500)]);
        let first =
            resolve_split(MoneyCents::new(12_345), SplitType::Percentage, &spec, &group).unwrap();
        let second =
            resolve_split(MoneyCents::new(12_345), SplitType::Percentage, &spec, &group).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.values().sum::<MoneyCents>(), MoneyCents::new(12_345));
    }
}
