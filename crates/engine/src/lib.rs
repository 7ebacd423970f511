//! Settlement engine for shared-expense groups.
//!
//! The pure half turns a group's expense and settlement history into
//! balances ([`compute_balances`]) and a small set of transfers that zero
//! them ([`propose_settlements`]). [`Engine`] runs the same computations
//! against a sea-orm database and commits confirmed transfers atomically.

pub use balances::{BalanceMap, compute_balances};
pub use error::EngineError;
pub use expenses::{DEFAULT_CATEGORY, Expense, NewExpense};
pub use groups::Group;
pub use ledger::{settle, verify_proposal};
pub use members::{Member, MemberKey};
pub use money::{MoneyCents, Percent};
pub use ops::{Engine, EngineBuilder};
pub use settlements::Settlement;
pub use simplify::{Transfer, propose_settlements};
pub use split::{Shares, SplitSpec, SplitType, resolve_split};
pub use summary::{MemberSummary, PairTotal, PersonalTotals};

mod balances;
mod error;
mod expense_shares;
mod expenses;
mod group_members;
mod groups;
mod ledger;
mod members;
mod money;
mod ops;
mod settlements;
mod simplify;
mod split;
mod summary;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
