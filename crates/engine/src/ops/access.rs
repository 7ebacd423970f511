use std::collections::HashMap;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Expense, Group, ResultEngine, Settlement, expense_shares, expenses,
    group_members, groups, settlements,
};

use super::Engine;

impl Engine {
    /// Loads a group with its members or fails with `KeyNotFound`.
    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Group> {
        let model = groups::Entity::find_by_id(group_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("group {group_id}")))?;
        let members = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(model.id.clone()))
            .all(db)
            .await?;
        Group::try_from((model, members))
    }

    /// Loads one expense of `group_id` with its shares.
    pub(super) async fn require_expense(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        expense_id: Uuid,
    ) -> ResultEngine<Expense> {
        let model = expenses::Entity::find_by_id(expense_id.to_string())
            .filter(expenses::Column::GroupId.eq(group_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("expense {expense_id}")))?;
        let shares = expense_shares::Entity::find()
            .filter(expense_shares::Column::ExpenseId.eq(model.id.clone()))
            .all(db)
            .await?;
        Expense::try_from((model, shares))
    }

    /// Every expense of the group, oldest first.
    pub(super) async fn load_expenses(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Vec<Expense>> {
        let models = expenses::Entity::find()
            .filter(expenses::Column::GroupId.eq(group_id.to_string()))
            .order_by_asc(expenses::Column::OccurredAt)
            .order_by_asc(expenses::Column::CreatedAt)
            .order_by_asc(expenses::Column::Id)
            .all(db)
            .await?;
        self.with_shares(db, models).await
    }

    /// Attaches the stored shares to each expense model, keeping the order.
    pub(super) async fn with_shares(
        &self,
        db: &DatabaseTransaction,
        models: Vec<expenses::Model>,
    ) -> ResultEngine<Vec<Expense>> {
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
        let mut shares_by_expense: HashMap<String, Vec<expense_shares::Model>> = HashMap::new();
        for share in expense_shares::Entity::find()
            .filter(expense_shares::Column::ExpenseId.is_in(ids))
            .all(db)
            .await?
        {
            shares_by_expense
                .entry(share.expense_id.clone())
                .or_default()
                .push(share);
        }

        models
            .into_iter()
            .map(|model| {
                let shares = shares_by_expense.remove(&model.id).unwrap_or_default();
                Expense::try_from((model, shares))
            })
            .collect()
    }

    /// Every settlement of the group in creation order.
    pub(super) async fn load_settlements(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Vec<Settlement>> {
        settlements::Entity::find()
            .filter(settlements::Column::GroupId.eq(group_id.to_string()))
            .order_by_asc(settlements::Column::CreatedAt)
            .order_by_asc(settlements::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Settlement::try_from)
            .collect()
    }
}
