//! Balance aggregation.
//!
//! Folds a group's expenses and settlements into one signed net amount per
//! member. The fold is plain addition, so the input order does not matter
//! and balances can be recomputed from any snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{EngineError, Expense, Group, MemberKey, MoneyCents, ResultEngine, Settlement};

/// Net position per member: positive is owed money, negative owes money.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceMap(BTreeMap<MemberKey, MoneyCents>);

impl BalanceMap {
    #[must_use]
    pub fn new(balances: BTreeMap<MemberKey, MoneyCents>) -> Self {
        Self(balances)
    }

    /// Balance of `member`, zero when unknown.
    #[must_use]
    pub fn get(&self, member: &str) -> MoneyCents {
        self.0.get(member).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MemberKey, &MoneyCents)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all balances, `None` on overflow. Zero for any consistent
    /// history.
    #[must_use]
    pub fn total(&self) -> Option<MoneyCents> {
        self.0
            .values()
            .try_fold(MoneyCents::ZERO, |acc, b| acc.checked_add(*b))
    }

    /// `true` when every balance is within epsilon of zero.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.0.values().all(|b| b.within_epsilon(MoneyCents::ZERO))
    }

    /// Members with a balance outside epsilon of zero.
    #[must_use]
    pub fn unsettled_count(&self) -> usize {
        self.0
            .values()
            .filter(|b| !b.within_epsilon(MoneyCents::ZERO))
            .count()
    }

    fn credit(&mut self, member: &str, amount: MoneyCents, group: &Group) -> ResultEngine<()> {
        self.adjust(member, group, |balance| balance.checked_add(amount))
    }

    fn debit(&mut self, member: &str, amount: MoneyCents, group: &Group) -> ResultEngine<()> {
        self.adjust(member, group, |balance| balance.checked_sub(amount))
    }

    fn adjust(
        &mut self,
        member: &str,
        group: &Group,
        op: impl FnOnce(MoneyCents) -> Option<MoneyCents>,
    ) -> ResultEngine<()> {
        let balance = self.0.get_mut(member).ok_or_else(|| {
            EngineError::KeyNotFound(format!("member {member} in group {}", group.id))
        })?;
        *balance = op(*balance).ok_or_else(|| {
            EngineError::internal(format!(
                "balance of {member} in group {} overflows",
                group.id
            ))
        })?;
        Ok(())
    }
}

impl FromIterator<(MemberKey, MoneyCents)> for BalanceMap {
    fn from_iter<I: IntoIterator<Item = (MemberKey, MoneyCents)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for BalanceMap {
    type Item = (MemberKey, MoneyCents);
    type IntoIter = std::collections::btree_map::IntoIter<MemberKey, MoneyCents>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Computes the balance of every member of `group`.
///
/// - Payer of an expense is credited the full amount; every share is
///   debited from its member.
/// - Payer of a settlement is credited, the payee debited.
///
/// Records of another group or referencing non-members are rejected. An
/// expense whose shares do not add up to its amount, a balance that leaves
/// the `i64` range, or a final total that is not zero, is an
/// [`EngineError::InternalConsistency`].
pub fn compute_balances(
    group: &Group,
    expenses: &[Expense],
    settlements: &[Settlement],
) -> ResultEngine<BalanceMap> {
    let mut balances: BalanceMap = group
        .members
        .iter()
        .map(|m| (m.key.clone(), MoneyCents::ZERO))
        .collect();

    for expense in expenses {
        if expense.group_id != group.id {
            return Err(EngineError::KeyNotFound(format!(
                "expense {} in group {}",
                expense.id, group.id
            )));
        }
        match expense.shares_total() {
            Some(total) if total.within_epsilon(expense.amount) => {}
            Some(total) => {
                return Err(EngineError::internal(format!(
                    "expense {} shares sum to {total}, expected {}",
                    expense.id, expense.amount
                )));
            }
            None => {
                return Err(EngineError::internal(format!(
                    "expense {} shares overflow",
                    expense.id
                )));
            }
        }

        balances.credit(&expense.paid_by, expense.amount, group)?;
        for (member, share) in &expense.shares {
            balances.debit(member, *share, group)?;
        }
    }

    for settlement in settlements {
        if settlement.group_id != group.id {
            return Err(EngineError::KeyNotFound(format!(
                "settlement {} in group {}",
                settlement.id, group.id
            )));
        }
        balances.credit(&settlement.payer, settlement.amount, group)?;
        balances.debit(&settlement.payee, settlement.amount, group)?;
    }

    match balances.total() {
        Some(total) if total.within_epsilon(MoneyCents::ZERO) => {}
        Some(total) => {
            return Err(EngineError::internal(format!(
                "balances of group {} sum to {total}",
                group.id
            )));
        }
        None => {
            return Err(EngineError::internal(format!(
                "balances of group {} overflow",
                group.id
            )));
        }
    }

    Ok(balances)
}
