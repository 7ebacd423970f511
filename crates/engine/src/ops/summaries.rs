use sea_orm::TransactionTrait;
use uuid::Uuid;

use crate::{
    MemberSummary, PairTotal, PersonalTotals, ResultEngine, members::normalize_member_key,
    summary,
};

use super::{Engine, with_tx};

impl Engine {
    /// Per-member totals of the group. `net` equals the member's balance.
    pub async fn member_summaries(&self, group_id: Uuid) -> ResultEngine<Vec<MemberSummary>> {
        with_tx!(self, |db_tx| {
            let group = self.require_group(&db_tx, group_id).await?;
            let expenses = self.load_expenses(&db_tx, group_id).await?;
            let settlements = self.load_settlements(&db_tx, group_id).await?;
            summary::member_summaries(&group, &expenses, &settlements)
        })
    }

    /// Settled totals per payer and payee.
    pub async fn settlement_totals(&self, group_id: Uuid) -> ResultEngine<Vec<PairTotal>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            let settlements = self.load_settlements(&db_tx, group_id).await?;
            Ok(summary::settlement_totals(&settlements))
        })
    }

    /// What `member_key` fronted and owes across every group they belong to.
    pub async fn personal_totals(&self, member_key: &str) -> ResultEngine<PersonalTotals> {
        let member_key = normalize_member_key(member_key)?;
        let groups = self.groups_for_member(&member_key).await?;
        with_tx!(self, |db_tx| {
            let mut expenses = Vec::new();
            for group in &groups {
                expenses.extend(self.load_expenses(&db_tx, group.id).await?);
            }
            Ok(summary::personal_totals(&member_key, &expenses))
        })
    }
}
