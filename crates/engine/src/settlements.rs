//! Settlements: recorded payments between two members of a group.
//!
//! Append-only: once committed a settlement is never updated or deleted.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, MemberKey, MoneyCents, ResultEngine, Transfer, money::ensure_positive,
    util::parse_uuid,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub group_id: Uuid,
    pub payer: MemberKey,
    pub payee: MemberKey,
    pub amount: MoneyCents,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Settlement {
    /// Records `transfer` as a settlement with a fresh id.
    pub fn new(group_id: Uuid, transfer: &Transfer, now: DateTime<Utc>) -> ResultEngine<Self> {
        if transfer.payer == transfer.payee {
            return Err(EngineError::InvalidSettlement(format!(
                "payer and payee must differ, got {} twice",
                transfer.payer
            )));
        }
        ensure_positive(transfer.amount, "settlement amount")?;
        Ok(Self {
            id: Uuid::new_v4(),
            group_id,
            payer: transfer.payer.clone(),
            payee: transfer.payee.clone(),
            amount: transfer.amount,
            occurred_at: now,
            created_at: now,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub payer: String,
    pub payee: String,
    pub amount_minor: i64,
    pub occurred_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Settlement> for ActiveModel {
    fn from(settlement: &Settlement) -> Self {
        Self {
            id: ActiveValue::Set(settlement.id.to_string()),
            group_id: ActiveValue::Set(settlement.group_id.to_string()),
            payer: ActiveValue::Set(settlement.payer.clone()),
            payee: ActiveValue::Set(settlement.payee.clone()),
            amount_minor: ActiveValue::Set(settlement.amount.cents()),
            occurred_at: ActiveValue::Set(settlement.occurred_at),
            created_at: ActiveValue::Set(settlement.created_at),
        }
    }
}

impl TryFrom<Model> for Settlement {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "settlement")?,
            group_id: parse_uuid(&model.group_id, "group")?,
            payer: model.payer,
            payee: model.payee,
            amount: MoneyCents::new(model.amount_minor),
            occurred_at: model.occurred_at,
            created_at: model.created_at,
        })
    }
}
