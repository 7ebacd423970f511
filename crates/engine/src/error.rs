//! The module contains the errors the engine can return.
//!
//! They fall in four families:
//!
//! - validation: [`InvalidInput`], [`InvalidAmount`], [`InvalidSplit`],
//!   [`InvalidSettlement`].
//!   The caller sent malformed numbers; nothing was applied.
//! - not found: [`KeyNotFound`] for unknown groups, members, expenses.
//! - [`StaleState`]: a confirmed settlement proposal no longer matches the
//!   balances recomputed at commit time. Recalculate and confirm again.
//! - [`InternalConsistency`]: stored shares or balances break the zero-sum
//!   invariant. This is a bug upstream and halts the settlement flow.
//!
//!  [`InvalidInput`]: EngineError::InvalidInput
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidSplit`]: EngineError::InvalidSplit
//!  [`InvalidSettlement`]: EngineError::InvalidSettlement
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`StaleState`]: EngineError::StaleState
//!  [`InternalConsistency`]: EngineError::InternalConsistency
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
    #[error("Invalid settlement: {0}")]
    InvalidSettlement(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Stale settlement proposal: {0}")]
    StaleState(String),
    #[error("Internal consistency violation: {0}")]
    InternalConsistency(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// `true` for errors caused by malformed caller input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::InvalidAmount(_)
                | Self::InvalidSplit(_)
                | Self::InvalidSettlement(_)
        )
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleState(_))
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalConsistency(_))
    }

    /// Builds an [`EngineError::InternalConsistency`] and logs it at error
    /// level.
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!("internal consistency violation: {message}");
        Self::InternalConsistency(message)
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidSplit(a), Self::InvalidSplit(b)) => a == b,
            (Self::InvalidSettlement(a), Self::InvalidSettlement(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::StaleState(a), Self::StaleState(b)) => a == b,
            (Self::InternalConsistency(a), Self::InternalConsistency(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
