use std::{
    collections::{BTreeMap, BTreeSet},
    error::Error,
};

use clap::Parser;
use cli::{Cli, Command, ExpenseCommand, ExpenseInput, GroupCommand};
use engine::{Engine, NewExpense, Percent, SplitSpec, SplitType, Transfer};
use migration::{Migrator, MigratorTrait};

mod cli;
mod output;
mod settings;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "divvy={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    let db = connect_db(&url).await?;
    let engine = Engine::builder().database(db).build().await?;

    run(&engine, cli.command).await
}

async fn connect_db(database_url: &str) -> AppResult<sea_orm::DatabaseConnection> {
    tracing::debug!("connecting to {database_url}");
    let database = sea_orm::Database::connect(database_url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

async fn run(engine: &Engine, command: Command) -> AppResult<()> {
    match command {
        Command::Group(args) => match args.command {
            GroupCommand::Create(args) => {
                let group = engine
                    .new_group(
                        &args.name,
                        args.description.as_deref(),
                        args.creator,
                        args.members,
                    )
                    .await?;
                println!("created group: {} ({})", group.name, group.id);
            }
            GroupCommand::AddMember(args) => {
                let group = engine.add_members(args.group, args.members).await?;
                output::print_group(&group);
            }
            GroupCommand::RemoveMember(args) => {
                let group = engine.remove_member(args.group, &args.member).await?;
                output::print_group(&group);
            }
            GroupCommand::Show(args) => {
                let group = engine.group(args.group).await?;
                output::print_group(&group);
            }
        },
        Command::Expense(args) => match args.command {
            ExpenseCommand::Add(args) => {
                let expense = engine
                    .new_expense(args.group, new_expense(args.expense)?)
                    .await?;
                println!("recorded expense {}", expense.id);
                output::print_expense(&expense);
            }
            ExpenseCommand::Replace(args) => {
                let expense = engine
                    .replace_expense(args.group, args.expense, new_expense(args.input)?)
                    .await?;
                println!("replaced expense {}", expense.id);
                output::print_expense(&expense);
            }
            ExpenseCommand::Delete(args) => {
                engine.delete_expense(args.group, args.expense).await?;
                println!("deleted expense {}", args.expense);
            }
            ExpenseCommand::List(args) => {
                for expense in engine.list_expenses(args.group).await? {
                    output::print_expense(&expense);
                }
            }
            ExpenseCommand::PaidBy(args) => {
                for expense in engine.expenses_paid_by(&args.member).await? {
                    output::print_expense(&expense);
                }
            }
        },
        Command::Balances(args) => {
            let balances = engine.group_balances(args.group).await?;
            output::print_balances(&balances);
        }
        Command::Propose(args) => {
            let proposal = engine.propose_settlements(args.group).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&proposal)?);
            } else {
                output::print_transfers(&proposal);
            }
        }
        Command::Settle(args) => {
            let confirmed = match args.proposal {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)?;
                    serde_json::from_str::<Vec<Transfer>>(&raw)?
                }
                None => engine.propose_settlements(args.group).await?,
            };
            let records = engine.commit_settlements(args.group, &confirmed).await?;
            if records.is_empty() {
                println!("already balanced");
            }
            for record in &records {
                println!("{} -> {}: {}", record.payer, record.payee, record.amount);
            }
        }
        Command::Summary(args) => {
            let summaries = engine.member_summaries(args.group).await?;
            let totals = engine.settlement_totals(args.group).await?;
            output::print_summaries(&summaries, &totals);
        }
        Command::Me(args) => {
            let totals = engine.personal_totals(&args.member).await?;
            println!("paid:  {}", totals.total_paid);
            println!("owed:  {}", totals.total_owed);
            println!("net:   {}", totals.net);
        }
    }

    Ok(())
}

/// Turns command-line expense flags into engine input.
fn new_expense(input: ExpenseInput) -> AppResult<NewExpense> {
    let split_type = SplitType::from(input.split);
    let split_spec = if !input.shares.is_empty() {
        let mut values = BTreeMap::new();
        for (key, raw) in input.shares {
            let value = match split_type {
                SplitType::Percentage => raw.parse::<Percent>()?.hundredths(),
                SplitType::Equal | SplitType::Unequal => raw.parse::<engine::MoneyCents>()?.cents(),
            };
            values.insert(key, value);
        }
        SplitSpec::Explicit(values)
    } else if !input.participants.is_empty() {
        let members: BTreeSet<_> = input
            .participants
            .into_iter()
            .map(|key| key.trim().to_string())
            .collect();
        SplitSpec::EqualSubset(members)
    } else {
        SplitSpec::AllMembers
    };

    Ok(NewExpense {
        amount: input.amount,
        description: input.description,
        category: input.category,
        paid_by: input.paid_by,
        split_type,
        split_spec,
        occurred_at: input
            .date
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|datetime| datetime.and_utc()),
    })
}
