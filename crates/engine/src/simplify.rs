//! Debt simplification.
//!
//! Turns a [`BalanceMap`] into an ordered list of direct payments that, once
//! all executed, bring every balance to zero.
//!
//! The matching is the usual greedy heuristic: repeatedly pair the member
//! who owes the most with the member who is owed the most and move the
//! smaller of the two amounts. Every step zeroes at least one side, so at
//! most `n - 1` transfers are emitted for `n` unsettled members. It is not an
//! exact minimizer: some inputs admit a solution with fewer transfers (for
//! example when a subset of debts cancels out on its own).
//!
//! Ties are broken by ascending member key, so the output is fully
//! determined by the balances.

use std::{cmp::Ordering, collections::BinaryHeap};

use serde::{Deserialize, Serialize};

use crate::{BalanceMap, EngineError, MemberKey, MoneyCents, ResultEngine};

/// A proposed payment from `payer` to `payee`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Transfer {
    pub payer: MemberKey,
    pub payee: MemberKey,
    pub amount: MoneyCents,
}

/// An outstanding amount (always positive) in one of the two heaps.
#[derive(Debug, PartialEq, Eq)]
struct Outstanding {
    amount: MoneyCents,
    member: MemberKey,
}

impl Ord for Outstanding {
    /// Larger amounts first; on equal amounts the smaller key wins.
    fn cmp(&self, other: &Self) -> Ordering {
        self.amount
            .cmp(&other.amount)
            .then_with(|| other.member.cmp(&self.member))
    }
}

impl PartialOrd for Outstanding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Proposes the transfers that settle `balances`.
///
/// Returns an empty list when everybody is already within epsilon of zero.
/// Fails with [`EngineError::InternalConsistency`] when the balances do not
/// sum to zero: no partial proposal is ever returned.
pub fn propose_settlements(balances: &BalanceMap) -> ResultEngine<Vec<Transfer>> {
    let mut debtors = BinaryHeap::new();
    let mut creditors = BinaryHeap::new();

    for (member, balance) in balances.iter() {
        if balance.within_epsilon(MoneyCents::ZERO) {
            continue;
        }
        let outstanding = Outstanding {
            amount: balance.abs(),
            member: member.clone(),
        };
        if balance.is_negative() {
            debtors.push(outstanding);
        } else {
            creditors.push(outstanding);
        }
    }

    let mut transfers = Vec::with_capacity(debtors.len() + creditors.len());
    while !debtors.is_empty() && !creditors.is_empty() {
        let (Some(mut debtor), Some(mut creditor)) = (debtors.pop(), creditors.pop()) else {
            break;
        };
        let amount = debtor.amount.min(creditor.amount);
        transfers.push(Transfer {
            payer: debtor.member.clone(),
            payee: creditor.member.clone(),
            amount,
        });

        debtor.amount -= amount;
        creditor.amount -= amount;
        if !debtor.amount.within_epsilon(MoneyCents::ZERO) {
            debtors.push(debtor);
        }
        if !creditor.amount.within_epsilon(MoneyCents::ZERO) {
            creditors.push(creditor);
        }
    }

    let unmatched = debtors
        .into_iter()
        .chain(creditors)
        .map(|o| format!("{} ({})", o.member, o.amount))
        .collect::<Vec<_>>();
    if !unmatched.is_empty() {
        return Err(EngineError::internal(format!(
            "balances do not net to zero, unmatched: {}",
            unmatched.join(", ")
        )));
    }

    Ok(transfers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balances(values: &[(&str, i64)]) -> BalanceMap {
        values
            .iter()
            .map(|(k, v)| (k.to_string(), MoneyCents::new(*v)))
            .collect()
    }

    fn transfer(payer: &str, payee: &str, cents: i64) -> Transfer {
        Transfer {
            payer: payer.to_string(),
            payee: payee.to_string(),
            amount: MoneyCents::new(cents),
        }
    }

    #[test]
    fn one_creditor_two_debtors() {
        let proposal =
            propose_settlements(&balances(&[("a", 6000), ("b", -3000), ("c", -3000)])).unwrap();
        assert_eq!(
            proposal,
            vec![transfer("b", "a", 3000), transfer("c", "a", 3000)]
        );
    }

    #[test]
    fn settled_balances_produce_nothing() {
        assert!(propose_settlements(&balances(&[("a", 0), ("b", 0)])).unwrap().is_empty());
        assert!(propose_settlements(&BalanceMap::default()).unwrap().is_empty());
    }

    #[test]
    fn largest_debtor_pays_largest_creditor_first() {
        let proposal = propose_settlements(&balances(&[
            ("a", 5000),
            ("b", 2000),
            ("c", -1000),
            ("d", -6000),
        ]))
        .unwrap();
        assert_eq!(
            proposal,
            vec![
                transfer("d", "a", 5000),
                transfer("c", "b", 1000),
                transfer("d", "b", 1000),
            ]
        );
    }

    #[test]
    fn ties_break_on_ascending_key() {
        let proposal = propose_settlements(&balances(&[
            ("zoe", 1000),
            ("amy", 1000),
            ("max", -1000),
            ("bob", -1000),
        ]))
        .unwrap();
        assert_eq!(
            proposal,
            vec![transfer("bob", "amy", 1000), transfer("max", "zoe", 1000)]
        );
    }

    #[test]
    fn at_most_n_minus_one_transfers_and_idempotent() {
        let map = balances(&[
            ("a", 1234),
            ("b", -999),
            ("c", 4321),
            ("d", -2000),
            ("e", -2556),
            ("f", 0),
        ]);
        let first = propose_settlements(&map).unwrap();
        let second = propose_settlements(&map).unwrap();
        assert_eq!(first, second);
        assert!(first.len() <= map.unsettled_count() - 1);

        // Applying the transfers settles everybody.
        let mut remaining: std::collections::BTreeMap<_, _> =
            map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        for t in &first {
            *remaining.get_mut(&t.payer).unwrap() += t.amount;
            *remaining.get_mut(&t.payee).unwrap() -= t.amount;
        }
        assert!(remaining.values().all(|v| v.is_zero()));
    }

    #[test]
    fn non_zero_sum_is_reported_not_truncated() {
        let err = propose_settlements(&balances(&[("a", 1000), ("b", -500)])).unwrap_err();
        assert!(err.is_internal());
    }
}
