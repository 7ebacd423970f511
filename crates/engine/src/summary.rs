//! Read-only reports built from the same snapshots as the balances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Expense, Group, MemberKey, MoneyCents, ResultEngine, Settlement, compute_balances};

/// Everything that went into one member's balance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub member: MemberKey,
    /// Total of the expenses this member fronted.
    pub total_paid: MoneyCents,
    /// Total of this member's shares across all expenses.
    pub total_share: MoneyCents,
    pub settlements_paid: MoneyCents,
    pub settlements_received: MoneyCents,
    /// Same value the balance aggregator reports.
    pub net: MoneyCents,
}

/// Total settled from `from` to `to`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairTotal {
    pub from: MemberKey,
    pub to: MemberKey,
    pub total: MoneyCents,
}

/// Dashboard totals of the acting member, over expenses only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalTotals {
    pub total_paid: MoneyCents,
    pub total_owed: MoneyCents,
    pub net: MoneyCents,
}

/// One summary per group member, ordered by key.
///
/// Goes through [`compute_balances`] first so the same validation applies.
pub fn member_summaries(
    group: &Group,
    expenses: &[Expense],
    settlements: &[Settlement],
) -> ResultEngine<Vec<MemberSummary>> {
    let balances = compute_balances(group, expenses, settlements)?;

    let mut summaries: BTreeMap<&str, MemberSummary> = group
        .members
        .iter()
        .map(|m| {
            let summary = MemberSummary {
                member: m.key.clone(),
                net: balances.get(&m.key),
                ..MemberSummary::default()
            };
            (m.key.as_str(), summary)
        })
        .collect();

    // Every key below was validated by `compute_balances`.
    for expense in expenses {
        if let Some(summary) = summaries.get_mut(expense.paid_by.as_str()) {
            summary.total_paid += expense.amount;
        }
        for (member, share) in &expense.shares {
            if let Some(summary) = summaries.get_mut(member.as_str()) {
                summary.total_share += *share;
            }
        }
    }
    for settlement in settlements {
        if let Some(summary) = summaries.get_mut(settlement.payer.as_str()) {
            summary.settlements_paid += settlement.amount;
        }
        if let Some(summary) = summaries.get_mut(settlement.payee.as_str()) {
            summary.settlements_received += settlement.amount;
        }
    }

    Ok(summaries.into_values().collect())
}

/// Settled totals per ordered pair, ordered by payer then payee.
#[must_use]
pub fn settlement_totals(settlements: &[Settlement]) -> Vec<PairTotal> {
    let mut totals: BTreeMap<(&str, &str), MoneyCents> = BTreeMap::new();
    for settlement in settlements {
        *totals
            .entry((settlement.payer.as_str(), settlement.payee.as_str()))
            .or_default() += settlement.amount;
    }
    totals
        .into_iter()
        .map(|((from, to), total)| PairTotal {
            from: from.to_string(),
            to: to.to_string(),
            total,
        })
        .collect()
}

/// What `member` fronted, what their shares add up to, and the difference.
#[must_use]
pub fn personal_totals(member: &str, expenses: &[Expense]) -> PersonalTotals {
    let mut totals = PersonalTotals::default();
    for expense in expenses {
        if expense.paid_by == member {
            totals.total_paid += expense.amount;
        }
        if let Some(share) = expense.shares.get(member) {
            totals.total_owed += *share;
        }
    }
    totals.net = totals.total_paid - totals.total_owed;
    totals
}
