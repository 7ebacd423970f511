use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{Member, MoneyCents, SplitType};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "divvy")]
#[command(about = "Track shared expenses and settle group debts")]
pub struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    /// Overrides the database configured in the settings file.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and inspect groups.
    Group(GroupArgs),
    /// Record, change and list expenses.
    Expense(ExpenseArgs),
    /// Net balance of every member of a group.
    Balances(GroupRef),
    /// Transfers that would settle every balance of a group.
    Propose(ProposeArgs),
    /// Record a confirmed proposal as settlements.
    Settle(SettleArgs),
    /// Per-member totals and settled amounts of a group.
    Summary(GroupRef),
    /// What a member fronted and owes across all their groups.
    Me(MeArgs),
}

#[derive(Args, Debug)]
pub struct GroupRef {
    #[arg(long)]
    pub group: Uuid,
}

#[derive(Args, Debug)]
pub struct GroupArgs {
    #[command(subcommand)]
    pub command: GroupCommand,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    Create(GroupCreateArgs),
    AddMember(GroupAddMemberArgs),
    /// Remove a member that has no expenses or settlements in the group.
    RemoveMember(GroupRemoveMemberArgs),
    Show(GroupRef),
}

#[derive(Args, Debug)]
pub struct GroupCreateArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub description: Option<String>,
    /// Creator as `key` or `key=Display Name`.
    #[arg(long, value_parser = parse_member)]
    pub creator: Member,
    /// Additional member as `key` or `key=Display Name`. Repeatable.
    #[arg(long = "member", value_parser = parse_member)]
    pub members: Vec<Member>,
}

#[derive(Args, Debug)]
pub struct GroupAddMemberArgs {
    #[arg(long)]
    pub group: Uuid,
    /// Member as `key` or `key=Display Name`. Repeatable.
    #[arg(long = "member", value_parser = parse_member, required = true)]
    pub members: Vec<Member>,
}

#[derive(Args, Debug)]
pub struct GroupRemoveMemberArgs {
    #[arg(long)]
    pub group: Uuid,
    #[arg(long)]
    pub member: String,
}

#[derive(Args, Debug)]
pub struct ExpenseArgs {
    #[command(subcommand)]
    pub command: ExpenseCommand,
}

#[derive(Subcommand, Debug)]
pub enum ExpenseCommand {
    Add(ExpenseAddArgs),
    Replace(ExpenseReplaceArgs),
    Delete(ExpenseRef),
    List(GroupRef),
    /// Every expense a member paid for, across all their groups.
    PaidBy(MeArgs),
}

#[derive(Args, Debug)]
pub struct ExpenseRef {
    #[arg(long)]
    pub group: Uuid,
    #[arg(long)]
    pub expense: Uuid,
}

#[derive(Args, Debug)]
pub struct ExpenseAddArgs {
    #[arg(long)]
    pub group: Uuid,
    #[command(flatten)]
    pub expense: ExpenseInput,
}

#[derive(Args, Debug)]
pub struct ExpenseReplaceArgs {
    #[arg(long)]
    pub group: Uuid,
    #[arg(long)]
    pub expense: Uuid,
    #[command(flatten)]
    pub input: ExpenseInput,
}

#[derive(Args, Debug)]
pub struct ExpenseInput {
    /// Amount with at most two decimals, e.g. `90` or `12.34`.
    #[arg(long)]
    pub amount: MoneyCents,
    #[arg(long)]
    pub paid_by: String,
    #[arg(long, value_enum, default_value_t = SplitArg::Equal)]
    pub split: SplitArg,
    /// Restrict an equal split to these members. Repeatable.
    #[arg(long = "participant", conflicts_with = "shares")]
    pub participants: Vec<String>,
    /// `key=value` share: an amount for unequal splits, a percentage for
    /// percentage splits. Repeatable.
    #[arg(long = "share", value_parser = parse_share)]
    pub shares: Vec<(String, String)>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    /// Date of the expense (`YYYY-MM-DD`). Defaults to now.
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SplitArg {
    Equal,
    Unequal,
    Percentage,
}

impl From<SplitArg> for SplitType {
    fn from(value: SplitArg) -> Self {
        match value {
            SplitArg::Equal => Self::Equal,
            SplitArg::Unequal => Self::Unequal,
            SplitArg::Percentage => Self::Percentage,
        }
    }
}

#[derive(Args, Debug)]
pub struct ProposeArgs {
    #[arg(long)]
    pub group: Uuid,
    /// Print the proposal as JSON, ready for `settle --proposal`.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SettleArgs {
    #[arg(long)]
    pub group: Uuid,
    /// JSON file written by `propose --json`. Without it the current
    /// proposal is committed as is.
    #[arg(long)]
    pub proposal: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MeArgs {
    #[arg(long)]
    pub member: String,
}

fn parse_member(raw: &str) -> Result<Member, String> {
    let (key, display_name) = raw.split_once('=').unwrap_or((raw, ""));
    Member::new(key, display_name).map_err(|err| err.to_string())
}

fn parse_share(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got {raw}")),
    }
}
