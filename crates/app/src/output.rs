//! Plain-text rendering of engine results.

use engine::{BalanceMap, Expense, Group, MemberSummary, PairTotal, Transfer};

pub fn print_group(group: &Group) {
    println!("{} ({})", group.name, group.id);
    if let Some(description) = &group.description {
        println!("{description}");
    }
    println!("created by {} on {}", group.created_by, group.created_at.date_naive());
    for member in &group.members {
        if member.display_name == member.key {
            println!("  {}", member.key);
        } else {
            println!("  {} <{}>", member.display_name, member.key);
        }
    }
}

pub fn print_expense(expense: &Expense) {
    println!(
        "{} {} {:>10} paid by {} [{}, {}]{}",
        expense.occurred_at.date_naive(),
        expense.id,
        expense.amount,
        expense.paid_by,
        expense.category,
        expense.split_type.as_str(),
        expense
            .description
            .as_deref()
            .map(|d| format!(" {d}"))
            .unwrap_or_default(),
    );
    for (member, share) in &expense.shares {
        println!("    {member:<30} {share:>10}");
    }
}

pub fn print_balances(balances: &BalanceMap) {
    for (member, balance) in balances.iter() {
        println!("{member:<30} {balance:>10}");
    }
}

pub fn print_transfers(transfers: &[Transfer]) {
    if transfers.is_empty() {
        println!("already balanced");
        return;
    }
    for transfer in transfers {
        println!("{} -> {}: {}", transfer.payer, transfer.payee, transfer.amount);
    }
}

pub fn print_summaries(summaries: &[MemberSummary], totals: &[PairTotal]) {
    println!(
        "{:<30} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "member", "paid", "share", "sent", "received", "net"
    );
    for s in summaries {
        println!(
            "{:<30} {:>10} {:>10} {:>10} {:>10} {:>10}",
            s.member, s.total_paid, s.total_share, s.settlements_paid, s.settlements_received, s.net
        );
    }
    if !totals.is_empty() {
        println!();
        println!("settled so far:");
        for total in totals {
            println!("  {} -> {}: {}", total.from, total.to, total.total);
        }
    }
}
