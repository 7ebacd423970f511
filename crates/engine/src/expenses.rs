//! Expenses.
//!
//! An [`Expense`] is created once with its shares already resolved and is
//! only ever replaced as a whole or deleted. Its shares always sum to its
//! amount.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Group, MemberKey, MoneyCents, ResultEngine, Shares, SplitSpec, SplitType,
    expense_shares, resolve_split,
    util::{normalize_optional_text, parse_uuid},
};

pub const DEFAULT_CATEGORY: &str = "general";

/// Caller input for creating or replacing an expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub amount: MoneyCents,
    pub description: Option<String>,
    pub category: Option<String>,
    pub paid_by: MemberKey,
    pub split_type: SplitType,
    pub split_spec: SplitSpec,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub group_id: Uuid,
    pub amount: MoneyCents,
    pub description: Option<String>,
    pub category: String,
    pub paid_by: MemberKey,
    pub split_type: SplitType,
    pub split_spec: SplitSpec,
    pub shares: Shares,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    /// Validates `input` against `group` and resolves its shares.
    pub fn resolve(group: &Group, input: NewExpense, now: DateTime<Utc>) -> ResultEngine<Self> {
        group.require_member(&input.paid_by)?;
        let shares = resolve_split(
            input.amount,
            input.split_type,
            &input.split_spec,
            &group.member_keys(),
        )?;
        let category = normalize_optional_text(input.category.as_deref())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        Ok(Self {
            id: Uuid::new_v4(),
            group_id: group.id,
            amount: input.amount,
            description: normalize_optional_text(input.description.as_deref()),
            category,
            paid_by: input.paid_by,
            split_type: input.split_type,
            split_spec: input.split_spec,
            shares,
            occurred_at: input.occurred_at.unwrap_or(now),
            created_at: now,
            updated_at: now,
        })
    }

    /// Full replacement: everything is re-resolved, identity and creation
    /// time are kept.
    pub fn replaced_by(
        &self,
        group: &Group,
        input: NewExpense,
        now: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let mut replacement = Self::resolve(group, input, now)?;
        replacement.id = self.id;
        replacement.created_at = self.created_at;
        Ok(replacement)
    }

    /// Sum of the resolved shares, `None` on overflow.
    #[must_use]
    pub fn shares_total(&self) -> Option<MoneyCents> {
        self.shares
            .values()
            .try_fold(MoneyCents::ZERO, |acc, share| acc.checked_add(*share))
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub category: String,
    pub paid_by: String,
    pub split_type: String,
    pub split_spec: String,
    pub occurred_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::expense_shares::Entity")]
    Shares,
}

impl Related<super::expense_shares::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shares.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&Expense> for ActiveModel {
    type Error = EngineError;

    fn try_from(expense: &Expense) -> ResultEngine<Self> {
        let split_spec = serde_json::to_string(&expense.split_spec)
            .map_err(|err| EngineError::InvalidSplit(format!("unencodable split: {err}")))?;
        Ok(Self {
            id: ActiveValue::Set(expense.id.to_string()),
            group_id: ActiveValue::Set(expense.group_id.to_string()),
            amount_minor: ActiveValue::Set(expense.amount.cents()),
            description: ActiveValue::Set(expense.description.clone()),
            category: ActiveValue::Set(expense.category.clone()),
            paid_by: ActiveValue::Set(expense.paid_by.clone()),
            split_type: ActiveValue::Set(expense.split_type.as_str().to_string()),
            split_spec: ActiveValue::Set(split_spec),
            occurred_at: ActiveValue::Set(expense.occurred_at),
            created_at: ActiveValue::Set(expense.created_at),
            updated_at: ActiveValue::Set(expense.updated_at),
        })
    }
}

impl TryFrom<(Model, Vec<expense_shares::Model>)> for Expense {
    type Error = EngineError;

    fn try_from((model, share_models): (Model, Vec<expense_shares::Model>)) -> ResultEngine<Self> {
        let split_spec: SplitSpec = serde_json::from_str(&model.split_spec).map_err(|err| {
            EngineError::internal(format!("expense {} has unreadable split: {err}", model.id))
        })?;
        let split_type = SplitType::try_from(model.split_type.as_str()).map_err(|_| {
            EngineError::internal(format!(
                "expense {} has unknown split type {}",
                model.id, model.split_type
            ))
        })?;
        let shares = share_models
            .into_iter()
            .map(|s| (s.member_key, MoneyCents::new(s.amount_minor)))
            .collect();

        Ok(Self {
            id: parse_uuid(&model.id, "expense")?,
            group_id: parse_uuid(&model.group_id, "group")?,
            amount: MoneyCents::new(model.amount_minor),
            description: model.description,
            category: model.category,
            paid_by: model.paid_by,
            split_type,
            split_spec,
            shares,
            occurred_at: model.occurred_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
