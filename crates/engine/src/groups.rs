//! Groups: the set of members that share expenses.
//!
//! Membership is owned by the group; the engine only needs it to know whose
//! balance to report and to reject participants that do not belong.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Member, MemberKey, ResultEngine, group_members, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: MemberKey,
    pub created_at: DateTime<Utc>,
    pub members: Vec<Member>,
}

impl Group {
    /// Builds a group with `creator` as its only member and no description.
    pub fn new(name: &str, creator: Member, created_at: DateTime<Utc>) -> ResultEngine<Self> {
        let creator = creator.normalized()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidInput(
                "group name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            created_by: creator.key.clone(),
            created_at,
            members: vec![creator],
        })
    }

    #[must_use]
    pub fn member_keys(&self) -> BTreeSet<MemberKey> {
        self.members.iter().map(|m| m.key.clone()).collect()
    }

    #[must_use]
    pub fn is_member(&self, key: &str) -> bool {
        self.members.iter().any(|m| m.key == key)
    }

    pub(crate) fn require_member(&self, key: &str) -> ResultEngine<()> {
        if !self.is_member(key) {
            return Err(EngineError::KeyNotFound(format!(
                "member {key} in group {}",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::group_members::Entity")]
    Members,
}

impl Related<super::group_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Group> for ActiveModel {
    fn from(group: &Group) -> Self {
        Self {
            id: ActiveValue::Set(group.id.to_string()),
            name: ActiveValue::Set(group.name.clone()),
            description: ActiveValue::Set(group.description.clone()),
            created_by: ActiveValue::Set(group.created_by.clone()),
            created_at: ActiveValue::Set(group.created_at),
        }
    }
}

impl TryFrom<(Model, Vec<group_members::Model>)> for Group {
    type Error = EngineError;

    fn try_from((model, member_models): (Model, Vec<group_members::Model>)) -> ResultEngine<Self> {
        let mut members = member_models
            .into_iter()
            .map(|m| Member {
                key: m.member_key,
                display_name: m.display_name,
            })
            .collect::<Vec<_>>();
        members.sort();
        Ok(Self {
            id: parse_uuid(&model.id, "group")?,
            name: model.name,
            description: model.description,
            created_by: model.created_by,
            created_at: model.created_at,
            members,
        })
    }
}
