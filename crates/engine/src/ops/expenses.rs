use chrono::Utc;
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Expense, NewExpense, ResultEngine, expense_shares, expenses, members::normalize_member_key,
};

use super::{Engine, with_tx};

impl Engine {
    /// Record a new expense in `group_id`.
    ///
    /// The split is resolved against the current membership and the shares
    /// are stored with the expense.
    pub async fn new_expense(&self, group_id: Uuid, input: NewExpense) -> ResultEngine<Expense> {
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let group = self.require_group(&db_tx, group_id).await?;
            let expense = Expense::resolve(&group, input, Utc::now())?;

            expenses::ActiveModel::try_from(&expense)?
                .insert(&db_tx)
                .await?;
            for share in expense_shares::active_models(&expense) {
                share.insert(&db_tx).await?;
            }

            tracing::info!(
                group = %group_id,
                expense = %expense.id,
                amount = %expense.amount,
                paid_by = %expense.paid_by,
                "expense recorded"
            );
            Ok(expense)
        })
    }

    /// Replace every field of an expense. Shares are resolved again.
    pub async fn replace_expense(
        &self,
        group_id: Uuid,
        expense_id: Uuid,
        input: NewExpense,
    ) -> ResultEngine<Expense> {
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let group = self.require_group(&db_tx, group_id).await?;
            let current = self.require_expense(&db_tx, group_id, expense_id).await?;
            let replacement = current.replaced_by(&group, input, Utc::now())?;

            expenses::ActiveModel::try_from(&replacement)?
                .update(&db_tx)
                .await?;
            expense_shares::Entity::delete_many()
                .filter(expense_shares::Column::ExpenseId.eq(expense_id.to_string()))
                .exec(&db_tx)
                .await?;
            for share in expense_shares::active_models(&replacement) {
                share.insert(&db_tx).await?;
            }

            tracing::info!(
                group = %group_id,
                expense = %expense_id,
                amount = %replacement.amount,
                "expense replaced"
            );
            Ok(replacement)
        })
    }

    /// Delete an expense and its shares. Settlements are left untouched.
    pub async fn delete_expense(&self, group_id: Uuid, expense_id: Uuid) -> ResultEngine<()> {
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            let expense = self.require_expense(&db_tx, group_id, expense_id).await?;

            // FK enforcement is off by default on SQLite, so no cascade here.
            expense_shares::Entity::delete_many()
                .filter(expense_shares::Column::ExpenseId.eq(expense_id.to_string()))
                .exec(&db_tx)
                .await?;
            expenses::Entity::delete_by_id(expense_id.to_string())
                .exec(&db_tx)
                .await?;

            tracing::info!(
                group = %group_id,
                expense = %expense_id,
                amount = %expense.amount,
                "expense deleted"
            );
            Ok(())
        })
    }

    /// Return one expense with its resolved shares.
    pub async fn expense(&self, group_id: Uuid, expense_id: Uuid) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.require_expense(&db_tx, group_id, expense_id).await
        })
    }

    /// Every expense of the group ordered by date.
    pub async fn list_expenses(&self, group_id: Uuid) -> ResultEngine<Vec<Expense>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.load_expenses(&db_tx, group_id).await
        })
    }

    /// Every expense `member_key` paid for, across all groups, ordered by
    /// date.
    pub async fn expenses_paid_by(&self, member_key: &str) -> ResultEngine<Vec<Expense>> {
        let member_key = normalize_member_key(member_key)?;
        with_tx!(self, |db_tx| {
            let models = expenses::Entity::find()
                .filter(expenses::Column::PaidBy.eq(member_key.clone()))
                .order_by_asc(expenses::Column::OccurredAt)
                .order_by_asc(expenses::Column::CreatedAt)
                .order_by_asc(expenses::Column::Id)
                .all(&db_tx)
                .await?;
            self.with_shares(&db_tx, models).await
        })
    }
}
