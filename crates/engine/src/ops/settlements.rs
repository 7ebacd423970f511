use chrono::Utc;
use sea_orm::{TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    BalanceMap, ResultEngine, Settlement, Transfer, compute_balances, ledger, settlements,
};

use super::{Engine, with_tx};

impl Engine {
    /// Current net balance of every member of the group.
    pub async fn group_balances(&self, group_id: Uuid) -> ResultEngine<BalanceMap> {
        with_tx!(self, |db_tx| self.balances_in(&db_tx, group_id).await)
    }

    /// Transfers that would zero every balance of the group right now.
    ///
    /// An empty list means the group is already balanced.
    pub async fn propose_settlements(&self, group_id: Uuid) -> ResultEngine<Vec<Transfer>> {
        let balances = self.group_balances(group_id).await?;
        crate::propose_settlements(&balances)
    }

    /// Record a confirmed proposal as settlements.
    ///
    /// The proposal is recomputed under the group lock and the batch is
    /// rejected with `StaleState` unless it still matches. Either every
    /// settlement of the batch is stored or none is.
    pub async fn commit_settlements(
        &self,
        group_id: Uuid,
        confirmed: &[Transfer],
    ) -> ResultEngine<Vec<Settlement>> {
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let balances = self.balances_in(&db_tx, group_id).await?;
            let records = ledger::settle(group_id, &balances, confirmed, Utc::now())?;

            for record in &records {
                settlements::ActiveModel::from(record)
                    .insert(&db_tx)
                    .await?;
            }

            tracing::info!(
                group = %group_id,
                transfers = records.len(),
                "settlement batch committed"
            );
            Ok(records)
        })
    }

    /// Every settlement of the group in creation order.
    pub async fn list_settlements(&self, group_id: Uuid) -> ResultEngine<Vec<Settlement>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.load_settlements(&db_tx, group_id).await
        })
    }

    async fn balances_in(
        &self,
        db: &sea_orm::DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<BalanceMap> {
        let group = self.require_group(db, group_id).await?;
        let expenses = self.load_expenses(db, group_id).await?;
        let settlements = self.load_settlements(db, group_id).await?;
        compute_balances(&group, &expenses, &settlements)
    }
}
