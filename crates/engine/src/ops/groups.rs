use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr};
use uuid::Uuid;

use crate::{
    EngineError, Group, Member, ResultEngine, group_members, groups, members::normalize_member_key,
    util::normalize_optional_text,
};

use super::{Engine, with_tx};

impl Engine {
    /// Create a group owned by `creator`, who is always a member.
    ///
    /// Additional `members` are added in the same transaction. Group names
    /// are unique per creator, ignoring case.
    pub async fn new_group(
        &self,
        name: &str,
        description: Option<&str>,
        creator: Member,
        members: Vec<Member>,
    ) -> ResultEngine<Group> {
        let mut group = Group::new(name, creator, Utc::now())?;
        group.description = normalize_optional_text(description);
        for member in members {
            let member = member.normalized()?;
            if !group.is_member(&member.key) {
                group.members.push(member);
            }
        }
        group.members.sort();

        let group_model: groups::ActiveModel = (&group).into();
        with_tx!(self, |db_tx| {
            let exists = groups::Entity::find()
                .filter(groups::Column::CreatedBy.eq(group.created_by.clone()))
                .filter(Expr::cust("LOWER(name)").eq(group.name.to_lowercase()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(group.name));
            }

            group_model.insert(&db_tx).await?;
            let group_id = group.id.to_string();
            for member in &group.members {
                group_members::ActiveModel::for_member(&group_id, member)
                    .insert(&db_tx)
                    .await?;
            }
            tracing::info!(group = %group.id, members = group.members.len(), "group created");
            Ok(group)
        })
    }

    /// Add members to a group. Known keys only get their display name updated.
    pub async fn add_members(&self, group_id: Uuid, members: Vec<Member>) -> ResultEngine<Group> {
        let members = members
            .into_iter()
            .map(Member::normalized)
            .collect::<ResultEngine<Vec<_>>>()?;
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let group = self.require_group(&db_tx, group_id).await?;
            let group_key = group_id.to_string();
            for member in &members {
                let existing = group_members::Entity::find_by_id((
                    group_key.clone(),
                    member.key.clone(),
                ))
                .one(&db_tx)
                .await?;
                match existing {
                    Some(model) => {
                        let mut active: group_members::ActiveModel = model.into();
                        active.display_name = ActiveValue::Set(member.display_name.clone());
                        active.update(&db_tx).await?;
                    }
                    None => {
                        group_members::ActiveModel::for_member(&group_key, member)
                            .insert(&db_tx)
                            .await?;
                    }
                }
            }
            tracing::info!(group = %group.id, added = members.len(), "group members updated");
            self.require_group(&db_tx, group_id).await
        })
    }

    /// Remove `member_key` from a group.
    ///
    /// Only members without any history can leave: the creator, anyone who
    /// paid or shares an expense, and anyone named in a settlement are
    /// rejected. A member without history always has a zero balance.
    pub async fn remove_member(&self, group_id: Uuid, member_key: &str) -> ResultEngine<Group> {
        let member_key = normalize_member_key(member_key)?;
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let group = self.require_group(&db_tx, group_id).await?;
            group.require_member(&member_key)?;
            if group.created_by == member_key {
                return Err(EngineError::InvalidInput(format!(
                    "{member_key} created group {group_id} and cannot leave it"
                )));
            }

            let expenses = self.load_expenses(&db_tx, group_id).await?;
            if expenses
                .iter()
                .any(|e| e.paid_by == member_key || e.shares.contains_key(&member_key))
            {
                return Err(EngineError::InvalidInput(format!(
                    "{member_key} takes part in expenses of group {group_id}"
                )));
            }
            let settlements = self.load_settlements(&db_tx, group_id).await?;
            if settlements
                .iter()
                .any(|s| s.payer == member_key || s.payee == member_key)
            {
                return Err(EngineError::InvalidInput(format!(
                    "{member_key} takes part in settlements of group {group_id}"
                )));
            }

            group_members::Entity::delete_by_id((group_id.to_string(), member_key.clone()))
                .exec(&db_tx)
                .await?;
            tracing::info!(group = %group_id, member = %member_key, "group member removed");
            self.require_group(&db_tx, group_id).await
        })
    }

    /// Return a group with its members.
    pub async fn group(&self, group_id: Uuid) -> ResultEngine<Group> {
        with_tx!(self, |db_tx| self.require_group(&db_tx, group_id).await)
    }

    /// Every group `member_key` belongs to, ordered by creation time.
    pub async fn groups_for_member(&self, member_key: &str) -> ResultEngine<Vec<Group>> {
        let member_key = normalize_member_key(member_key)?;
        with_tx!(self, |db_tx| {
            let group_ids: Vec<String> = group_members::Entity::find()
                .filter(group_members::Column::MemberKey.eq(member_key.clone()))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|m| m.group_id)
                .collect();
            let models = groups::Entity::find()
                .filter(groups::Column::Id.is_in(group_ids))
                .order_by_asc(groups::Column::CreatedAt)
                .order_by_asc(groups::Column::Id)
                .all(&db_tx)
                .await?;

            let mut out = Vec::with_capacity(models.len());
            for model in models {
                let members = group_members::Entity::find()
                    .filter(group_members::Column::GroupId.eq(model.id.clone()))
                    .all(&db_tx)
                    .await?;
                out.push(Group::try_from((model, members))?);
            }
            Ok(out)
        })
    }
}
