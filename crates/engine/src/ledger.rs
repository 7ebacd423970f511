//! Settlement ledger checks.
//!
//! A confirmed proposal is only turned into settlements if it still matches
//! what the simplifier proposes for the current balances. The comparison is
//! order-insensitive. Persisting the records atomically is up to the caller
//! (see `Engine::commit_settlements`).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    BalanceMap, EngineError, ResultEngine, Settlement, Transfer, propose_settlements,
};

/// Fails with [`EngineError::StaleState`] unless `confirmed` and `current`
/// hold the same transfers, in any order.
pub fn verify_proposal(current: &[Transfer], confirmed: &[Transfer]) -> ResultEngine<()> {
    let mut expected = current.to_vec();
    let mut received = confirmed.to_vec();
    expected.sort();
    received.sort();

    let matches = expected.len() == received.len()
        && expected.iter().zip(&received).all(|(e, r)| {
            e.payer == r.payer && e.payee == r.payee && e.amount.within_epsilon(r.amount)
        });
    if !matches {
        tracing::warn!(
            expected = expected.len(),
            received = received.len(),
            "confirmed settlement proposal is stale"
        );
        return Err(EngineError::StaleState(format!(
            "balances changed since the proposal was computed ({} transfers now expected, {} confirmed)",
            expected.len(),
            received.len()
        )));
    }
    Ok(())
}

/// Builds the settlement records for `confirmed` after checking it against
/// a fresh proposal for `balances`.
///
/// Nothing is returned unless every transfer is valid and the whole batch
/// matches.
pub fn settle(
    group_id: Uuid,
    balances: &BalanceMap,
    confirmed: &[Transfer],
    now: DateTime<Utc>,
) -> ResultEngine<Vec<Settlement>> {
    let records = confirmed
        .iter()
        .map(|transfer| Settlement::new(group_id, transfer, now))
        .collect::<ResultEngine<Vec<_>>>()?;

    let current = propose_settlements(balances)?;
    verify_proposal(&current, confirmed)?;
    Ok(records)
}
