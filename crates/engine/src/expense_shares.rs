//! Resolved expense shares.
//!
//! One row per participant of an expense; amounts are integer cents and sum
//! to the expense amount.

use sea_orm::{ActiveValue, entity::prelude::*};

use crate::Expense;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_shares")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub expense_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub member_key: String,
    pub amount_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// One active model per resolved share of `expense`.
pub(crate) fn active_models(expense: &Expense) -> Vec<ActiveModel> {
    let expense_id = expense.id.to_string();
    expense
        .shares
        .iter()
        .map(|(member_key, amount)| ActiveModel {
            expense_id: ActiveValue::Set(expense_id.clone()),
            member_key: ActiveValue::Set(member_key.clone()),
            amount_minor: ActiveValue::Set(amount.cents()),
        })
        .collect()
}
