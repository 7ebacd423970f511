use std::collections::{BTreeMap, BTreeSet};

use chrono::{TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{
    Engine, EngineError, Group, Member, MoneyCents, NewExpense, SplitSpec, SplitType, Transfer,
};
use migration::MigratorTrait;

const A: &str = "a@example.com";
const B: &str = "b@example.com";
const C: &str = "c@example.com";

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn trip(engine: &Engine) -> Group {
    engine
        .new_group(
            "Trip",
            Some(" Beach week "),
            Member::new(A, "Alice").unwrap(),
            vec![Member::new(B, "Bob").unwrap(), Member::new(C, "").unwrap()],
        )
        .await
        .unwrap()
}

fn equal_expense(cents: i64, paid_by: &str) -> NewExpense {
    NewExpense {
        amount: MoneyCents::new(cents),
        description: Some("dinner".to_string()),
        category: None,
        paid_by: paid_by.to_string(),
        split_type: SplitType::Equal,
        split_spec: SplitSpec::AllMembers,
        occurred_at: None,
    }
}

fn transfer(payer: &str, payee: &str, cents: i64) -> Transfer {
    Transfer {
        payer: payer.to_string(),
        payee: payee.to_string(),
        amount: MoneyCents::new(cents),
    }
}

async fn count_rows(db: &DatabaseConnection, table: &str) -> usize {
    let statement = Statement::from_string(
        db.get_database_backend(),
        format!("SELECT * FROM {table}"),
    );
    db.query_all(statement).await.unwrap().len()
}

async fn settlement_rows(db: &DatabaseConnection) -> usize {
    count_rows(db, "settlements").await
}

#[tokio::test]
async fn new_group_includes_creator_and_members() {
    let (engine, _db) = engine_with_db().await;
    let group = trip(&engine).await;

    let loaded = engine.group(group.id).await.unwrap();
    assert_eq!(loaded.name, "Trip");
    assert_eq!(loaded.description.as_deref(), Some("Beach week"));
    assert_eq!(loaded.members, group.members);
    assert_eq!(
        loaded.member_keys(),
        BTreeSet::from([A.to_string(), B.to_string(), C.to_string()])
    );
    assert_eq!(loaded.created_by, A);

    let for_c = engine.groups_for_member(C).await.unwrap();
    assert_eq!(for_c.len(), 1);
    assert_eq!(for_c[0].id, group.id);
    assert!(engine.groups_for_member("nobody@example.com").await.unwrap().is_empty());
}

#[tokio::test]
async fn add_members_is_idempotent_and_refreshes_names() {
    let (engine, _db) = engine_with_db().await;
    let group = trip(&engine).await;

    let updated = engine
        .add_members(
            group.id,
            vec![
                Member::new(B, "Robert").unwrap(),
                Member::new("d@example.com", "Dana").unwrap(),
            ],
        )
        .await
        .unwrap();

    assert_eq!(updated.members.len(), 4);
    let bob = updated.members.iter().find(|m| m.key == B).unwrap();
    assert_eq!(bob.display_name, "Robert");
}

#[tokio::test]
async fn unknown_group_is_not_found() {
    let (engine, _db) = engine_with_db().await;
    let missing = Uuid::new_v4();

    assert!(matches!(
        engine.group(missing).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine.group_balances(missing).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine.new_expense(missing, equal_expense(9000, A)).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine.commit_settlements(missing, &[]).await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn end_to_end_commit_zeroes_balances() {
    let (engine, db) = engine_with_db().await;
    let group = trip(&engine).await;

    engine
        .new_expense(group.id, equal_expense(9000, A))
        .await
        .unwrap();

    let balances = engine.group_balances(group.id).await.unwrap();
    assert_eq!(balances.get(A), MoneyCents::new(6000));
    assert_eq!(balances.get(B), MoneyCents::new(-3000));
    assert_eq!(balances.get(C), MoneyCents::new(-3000));

    let proposal = engine.propose_settlements(group.id).await.unwrap();
    assert_eq!(proposal, vec![transfer(B, A, 3000), transfer(C, A, 3000)]);

    let records = engine
        .commit_settlements(group.id, &proposal)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.group_id == group.id));
    assert_eq!(settlement_rows(&db).await, 2);

    let after = engine.group_balances(group.id).await.unwrap();
    assert!(after.is_settled());
    assert!(engine.propose_settlements(group.id).await.unwrap().is_empty());
    assert_eq!(engine.list_settlements(group.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn committing_a_reordered_proposal_is_accepted() {
    let (engine, _db) = engine_with_db().await;
    let group = trip(&engine).await;
    engine
        .new_expense(group.id, equal_expense(9000, A))
        .await
        .unwrap();

    let mut proposal = engine.propose_settlements(group.id).await.unwrap();
    proposal.reverse();
    engine
        .commit_settlements(group.id, &proposal)
        .await
        .unwrap();
    assert!(engine.group_balances(group.id).await.unwrap().is_settled());
}

#[tokio::test]
async fn stale_proposal_is_rejected_without_writes() {
    let (engine, db) = engine_with_db().await;
    let group = trip(&engine).await;
    engine
        .new_expense(group.id, equal_expense(9000, A))
        .await
        .unwrap();

    let proposal = engine.propose_settlements(group.id).await.unwrap();
    engine
        .new_expense(group.id, equal_expense(3000, B))
        .await
        .unwrap();

    let err = engine
        .commit_settlements(group.id, &proposal)
        .await
        .unwrap_err();
    assert!(err.is_stale());
    assert_eq!(settlement_rows(&db).await, 0);

    let fresh = engine.propose_settlements(group.id).await.unwrap();
    engine.commit_settlements(group.id, &fresh).await.unwrap();
    assert!(engine.group_balances(group.id).await.unwrap().is_settled());
}

#[tokio::test]
async fn invalid_transfer_in_batch_stores_nothing() {
    let (engine, db) = engine_with_db().await;
    let group = trip(&engine).await;
    engine
        .new_expense(group.id, equal_expense(9000, A))
        .await
        .unwrap();

    let err = engine
        .commit_settlements(group.id, &[transfer(B, A, 3000), transfer(C, C, 3000)])
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(settlement_rows(&db).await, 0);
}

#[tokio::test]
async fn empty_batch_on_balanced_group_is_a_no_op() {
    let (engine, db) = engine_with_db().await;
    let group = trip(&engine).await;

    let records = engine.commit_settlements(group.id, &[]).await.unwrap();
    assert!(records.is_empty());
    assert_eq!(settlement_rows(&db).await, 0);
}

#[tokio::test]
async fn replace_and_delete_expense() {
    let (engine, db) = engine_with_db().await;
    let group = trip(&engine).await;
    let expense = engine
        .new_expense(group.id, equal_expense(9000, A))
        .await
        .unwrap();

    let replacement = engine
        .replace_expense(
            group.id,
            expense.id,
            NewExpense {
                amount: MoneyCents::new(5000),
                description: None,
                category: Some("groceries".to_string()),
                paid_by: B.to_string(),
                split_type: SplitType::Unequal,
                split_spec: SplitSpec::Explicit(BTreeMap::from([
                    (A.to_string(), 2000),
                    (C.to_string(), 3000),
                ])),
                occurred_at: Some(Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap()),
            },
        )
        .await
        .unwrap();
    assert_eq!(replacement.id, expense.id);

    let stored = engine.expense(group.id, expense.id).await.unwrap();
    assert_eq!(stored.created_at, replacement.created_at);
    assert!(stored.updated_at >= stored.created_at);
    assert_eq!(stored.category, "groceries");
    assert_eq!(stored.shares.len(), 2);
    assert_eq!(stored.shares_total(), Some(MoneyCents::new(5000)));

    let balances = engine.group_balances(group.id).await.unwrap();
    assert_eq!(balances.get(A), MoneyCents::new(-2000));
    assert_eq!(balances.get(B), MoneyCents::new(5000));
    assert_eq!(balances.get(C), MoneyCents::new(-3000));

    engine.delete_expense(group.id, expense.id).await.unwrap();
    assert!(engine.list_expenses(group.id).await.unwrap().is_empty());
    assert_eq!(count_rows(&db, "expense_shares").await, 0);
    assert!(matches!(
        engine.delete_expense(group.id, expense.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn invalid_splits_are_rejected_and_not_stored() {
    let (engine, _db) = engine_with_db().await;
    let group = trip(&engine).await;

    let mismatch = NewExpense {
        split_type: SplitType::Unequal,
        split_spec: SplitSpec::Explicit(BTreeMap::from([
            (A.to_string(), 4500),
            (B.to_string(), 4499),
        ])),
        ..equal_expense(9000, A)
    };
    let err = engine.new_expense(group.id, mismatch).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidSplit(_)));

    let outsider = NewExpense {
        split_spec: SplitSpec::EqualSubset(BTreeSet::from(["z@example.com".to_string()])),
        ..equal_expense(9000, A)
    };
    assert!(engine.new_expense(group.id, outsider).await.unwrap_err().is_validation());

    let zero = equal_expense(0, A);
    assert!(matches!(
        engine.new_expense(group.id, zero).await,
        Err(EngineError::InvalidAmount(_))
    ));

    assert!(matches!(
        engine.new_expense(group.id, equal_expense(9000, "z@example.com")).await,
        Err(EngineError::KeyNotFound(_))
    ));

    assert!(engine.list_expenses(group.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn percentage_split_reconciles_rounding() {
    let (engine, _db) = engine_with_db().await;
    let group = trip(&engine).await;

    let expense = engine
        .new_expense(
            group.id,
            NewExpense {
                split_type: SplitType::Percentage,
                split_spec: SplitSpec::Explicit(BTreeMap::from([
                    (A.to_string(), 3333),
                    (B.to_string(), 3333),
                    (C.to_string(), 3334),
                ])),
                ..equal_expense(9000, A)
            },
        )
        .await
        .unwrap();
    assert_eq!(expense.shares_total(), Some(MoneyCents::new(9000)));
}

#[tokio::test]
async fn summaries_and_personal_totals() {
    let (engine, _db) = engine_with_db().await;
    let group = trip(&engine).await;
    engine
        .new_expense(group.id, equal_expense(9000, A))
        .await
        .unwrap();
    engine
        .commit_settlements(group.id, &[transfer(B, A, 3000), transfer(C, A, 3000)])
        .await
        .unwrap();

    let summaries = engine.member_summaries(group.id).await.unwrap();
    let alice = summaries.iter().find(|s| s.member == A).unwrap();
    assert_eq!(alice.total_paid, MoneyCents::new(9000));
    assert_eq!(alice.total_share, MoneyCents::new(3000));
    assert_eq!(alice.settlements_received, MoneyCents::new(6000));
    assert!(alice.net.is_zero());

    let totals = engine.settlement_totals(group.id).await.unwrap();
    assert_eq!(totals.len(), 2);
    assert_eq!(totals[0].from, B);
    assert_eq!(totals[0].total, MoneyCents::new(3000));

    let other = engine
        .new_group(
            "Flat",
            None,
            Member::new(A, "").unwrap(),
            vec![Member::new(B, "").unwrap()],
        )
        .await
        .unwrap();
    engine
        .new_expense(other.id, equal_expense(2000, B))
        .await
        .unwrap();

    let mine = engine.personal_totals(A).await.unwrap();
    assert_eq!(mine.total_paid, MoneyCents::new(9000));
    assert_eq!(mine.total_owed, MoneyCents::new(4000));
    assert_eq!(mine.net, MoneyCents::new(5000));
}

#[tokio::test]
async fn concurrent_expense_and_commit_never_leave_a_stale_batch() {
    let (engine, db) = engine_with_db().await;
    let group = trip(&engine).await;
    engine
        .new_expense(group.id, equal_expense(9000, A))
        .await
        .unwrap();
    let proposal = engine.propose_settlements(group.id).await.unwrap();

    let (expense, commit) = tokio::join!(
        engine.new_expense(group.id, equal_expense(3000, B)),
        engine.commit_settlements(group.id, &proposal),
    );
    expense.unwrap();

    let balances = engine.group_balances(group.id).await.unwrap();
    match commit {
        Ok(records) => {
            // The commit ran first: only the later expense is outstanding.
            assert_eq!(records.len(), 2);
            assert_eq!(balances.get(B), MoneyCents::new(2000));
            assert_eq!(balances.get(A), MoneyCents::new(-1000));
        }
        Err(err) => {
            assert!(err.is_stale());
            assert_eq!(settlement_rows(&db).await, 0);
        }
    }
    assert_eq!(balances.total(), Some(MoneyCents::ZERO));
}

#[tokio::test]
async fn group_names_are_unique_per_creator() {
    let (engine, _db) = engine_with_db().await;
    trip(&engine).await;

    let err = engine
        .new_group("  trip ", None, Member::new(A, "").unwrap(), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    // Another creator may reuse the name.
    engine
        .new_group("Trip", None, Member::new(B, "").unwrap(), Vec::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn hand_built_member_keys_are_stored_trimmed() {
    let (engine, _db) = engine_with_db().await;
    let padded = |key: &str| Member {
        key: format!("  {key} "),
        display_name: String::new(),
    };
    let group = engine
        .new_group("Trip", None, padded(A), vec![padded(B)])
        .await
        .unwrap();
    assert_eq!(group.created_by, A);

    let group = engine.add_members(group.id, vec![padded(C)]).await.unwrap();
    assert_eq!(
        group.member_keys(),
        BTreeSet::from([A.to_string(), B.to_string(), C.to_string()])
    );
    let loaded = engine.group(group.id).await.unwrap();
    assert_eq!(loaded.members, group.members);
    assert_eq!(engine.groups_for_member(C).await.unwrap().len(), 1);
}

#[tokio::test]
async fn only_members_without_history_can_be_removed() {
    let (engine, db) = engine_with_db().await;
    let group = trip(&engine).await;
    let shared = NewExpense {
        split_spec: SplitSpec::EqualSubset(BTreeSet::from([A.to_string(), B.to_string()])),
        ..equal_expense(2000, A)
    };
    engine.new_expense(group.id, shared).await.unwrap();

    let err = engine.remove_member(group.id, A).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    let err = engine.remove_member(group.id, B).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    let err = engine
        .remove_member(group.id, "nobody@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    assert_eq!(count_rows(&db, "group_members").await, 3);

    let group = engine.remove_member(group.id, &format!(" {C} ")).await.unwrap();
    assert_eq!(
        group.member_keys(),
        BTreeSet::from([A.to_string(), B.to_string()])
    );
    assert_eq!(count_rows(&db, "group_members").await, 2);
    assert!(engine.groups_for_member(C).await.unwrap().is_empty());

    let balances = engine.group_balances(group.id).await.unwrap();
    assert_eq!(balances.len(), 2);
    assert_eq!(balances.get(B), MoneyCents::new(-1000));
}

#[tokio::test]
async fn settled_members_still_cannot_be_removed() {
    let (engine, _db) = engine_with_db().await;
    let group = trip(&engine).await;
    engine
        .new_expense(group.id, equal_expense(9000, A))
        .await
        .unwrap();
    let proposal = engine.propose_settlements(group.id).await.unwrap();
    engine.commit_settlements(group.id, &proposal).await.unwrap();
    assert!(engine.group_balances(group.id).await.unwrap().is_settled());

    let err = engine.remove_member(group.id, C).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn expenses_paid_by_spans_groups() {
    let (engine, _db) = engine_with_db().await;
    let trip = trip(&engine).await;
    let flat = engine
        .new_group(
            "Flat",
            None,
            Member::new(B, "").unwrap(),
            vec![Member::new(A, "").unwrap()],
        )
        .await
        .unwrap();

    let later = NewExpense {
        occurred_at: Some(Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).unwrap()),
        ..equal_expense(4000, A)
    };
    let earlier = NewExpense {
        occurred_at: Some(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()),
        ..equal_expense(1000, A)
    };
    engine.new_expense(trip.id, later).await.unwrap();
    engine.new_expense(flat.id, earlier).await.unwrap();
    engine
        .new_expense(trip.id, equal_expense(3000, B))
        .await
        .unwrap();

    let paid = engine.expenses_paid_by(A).await.unwrap();
    assert_eq!(paid.len(), 2);
    assert_eq!(paid[0].group_id, flat.id);
    assert_eq!(paid[0].amount, MoneyCents::new(1000));
    assert_eq!(paid[1].group_id, trip.id);
    assert_eq!(paid[1].shares.len(), 3);
    assert!(paid.iter().all(|e| e.paid_by == A));

    assert!(engine.expenses_paid_by(C).await.unwrap().is_empty());
}
