use anyhow::Result;
use chrono::{DateTime, Utc};

use super::util::{
    flag_value, format_amount, has_flag, parse_amount, positionals, shellexpand, truncate,
};
use crate::calendar;
use crate::clock::{Clock, FixedClock, SystemClock};
use crate::db::Database;
use crate::engine::{CleanupOption, RecurrenceEngine, SyncReport};
use crate::models::{Reminder, Transaction, TransactionKind, TransactionType};
use crate::settings::Settings;

const MAX_INSTALLMENTS: u32 = 1200;

pub(crate) fn as_cli(args: &[String], db: &Database, settings: &Settings) -> Result<()> {
    let Some(command) = args.get(1) else {
        return cli_summary(&[], db);
    };
    let rest = &args[2..];
    match command.as_str() {
        "add" | "a" => cli_add(rest, db, settings),
        "sync" => cli_sync(rest, db, settings),
        "list" | "ls" => cli_list(rest, db),
        "delete" | "rm" => cli_delete(rest, db),
        "remind" => cli_remind(rest, db),
        "summary" | "s" => cli_summary(rest, db),
        "export" => cli_export(rest, db),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("monthwise {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("Monthwise — local ledger with recurring and installment transactions");
    println!();
    println!("Usage: monthwise [command]");
    println!();
    println!("Commands:");
    println!("  (none)                              Summary of the current month");
    println!("  add <title> <amount> <YYYY-MM-DD>   Add a transaction");
    println!("    --category <name>                 Category (default: General)");
    println!("    --income                          Record as income (default: expense)");
    println!("    --recurring                       Repeat every month");
    println!("    --installments <n>                Split into n monthly installments");
    println!("  sync                                Materialize recurring rows for the window");
    println!("    --month <YYYY-MM>                 Reference month (default: current)");
    println!("    --all                             Also prune past rows outside the window");
    println!("  list [YYYY-MM]                      List a month's transactions");
    println!("  delete <id>                         Delete a transaction");
    println!("    --series <future|all>             End the series here, or delete all of it");
    println!("  remind <id> <YYYY-MM-DD>            Schedule a reminder for a transaction");
    println!("  summary [YYYY-MM]                   Print monthly income and expenses");
    println!("  export [path]                       Export transactions to CSV");
    println!("    --month <YYYY-MM>                 Month to export (default: current)");
    println!("  --help, -h                          Show this help");
    println!("  --version, -V                       Show version");
}

fn cli_add(args: &[String], db: &Database, settings: &Settings) -> Result<()> {
    let pos = positionals(args, &["--category", "--installments"]);
    let [title, amount, date] = pos[..] else {
        anyhow::bail!(
            "Usage: monthwise add <title> <amount> <YYYY-MM-DD> [--category <name>] [--income] [--recurring | --installments <n>]"
        );
    };

    let amount = parse_amount(amount)?;
    if amount.is_zero() {
        anyhow::bail!("Amount must not be zero");
    }
    let date = calendar::parse_day(date)
        .ok_or_else(|| anyhow::anyhow!("Invalid date '{date}', expected YYYY-MM-DD"))?;
    let txn_type = if has_flag(args, "--income") {
        TransactionType::Income
    } else {
        TransactionType::Expense
    };
    let category = flag_value(args, "--category").unwrap_or("General");

    let kind = match (has_flag(args, "--recurring"), flag_value(args, "--installments")) {
        (true, Some(_)) => anyhow::bail!("--recurring and --installments are mutually exclusive"),
        (true, None) => TransactionKind::RecurringTemplate,
        (false, Some(n)) => {
            let count: u32 = n
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid installment count '{n}'"))?;
            if !(1..=MAX_INSTALLMENTS).contains(&count) {
                anyhow::bail!("Installment count must be between 1 and {MAX_INSTALLMENTS}");
            }
            TransactionKind::InstallmentTemplate { count }
        }
        (false, None) => TransactionKind::Simple,
    };

    let txn = Transaction::new(
        title.to_string(),
        category.to_string(),
        amount,
        txn_type,
        kind,
        date,
    );
    let id = db.insert_transaction(&txn)?;
    println!("Added #{id}: {title} {}", format_amount(txn.signed_amount()));

    if kind.is_template() {
        let report = run_sync(db, settings, None, CleanupOption::FutureOnly);
        print_sync_report(&report);
    }
    Ok(())
}

fn cli_sync(args: &[String], db: &Database, settings: &Settings) -> Result<()> {
    let reference = match flag_value(args, "--month") {
        Some(m) => Some(parse_month_arg(m)?),
        None => None,
    };
    let option = if has_flag(args, "--all") {
        CleanupOption::All
    } else {
        CleanupOption::FutureOnly
    };
    let report = run_sync(db, settings, reference, option);
    print_sync_report(&report);
    Ok(())
}

fn run_sync(
    db: &Database,
    settings: &Settings,
    reference: Option<DateTime<Utc>>,
    option: CleanupOption,
) -> SyncReport {
    let clock: Box<dyn Clock> = match reference {
        Some(date) => Box::new(FixedClock(date)),
        None => Box::new(SystemClock),
    };
    RecurrenceEngine::new(db, db, &*clock).sync(settings.window(), None, option)
}

fn print_sync_report(report: &SyncReport) {
    let failed = report.generated.failed + report.cleaned.failed;
    println!(
        "Generated {} instance(s), removed {}",
        report.generated.inserted, report.cleaned.deleted
    );
    if failed > 0 {
        eprintln!("Warning: {failed} row(s) could not be written; run sync again");
    }
    tracing::debug!(
        "sync: {} already present, {} before series start, {} after series end, {} skipped without id",
        report.generated.already_present,
        report.generated.before_start,
        report.generated.after_end,
        report.cleaned.skipped
    );
}

fn cli_list(args: &[String], db: &Database) -> Result<()> {
    let month = month_or_current(args.first().map(String::as_str))?;
    let txns = db.get_transactions(Some(month))?;
    let label = calendar::month_label(month);
    if txns.is_empty() {
        println!("No transactions for {label}");
        return Ok(());
    }

    println!(
        "{:<6} {:<10} {:<24} {:<14} {:>12}  Kind",
        "ID", "Date", "Title", "Category", "Amount"
    );
    println!("{}", "─".repeat(80));
    for txn in &txns {
        let date = txn
            .date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!(
            "{:<6} {:<10} {:<24} {:<14} {:>12}  {}",
            txn.id.unwrap_or(0),
            date,
            truncate(&txn.title, 24),
            truncate(&txn.category, 14),
            format_amount(txn.signed_amount()),
            txn.kind,
        );
    }
    Ok(())
}

fn cli_delete(args: &[String], db: &Database) -> Result<()> {
    let pos = positionals(args, &["--series"]);
    let Some(id) = pos.first() else {
        anyhow::bail!("Usage: monthwise delete <id> [--series <future|all>]");
    };
    let id: i64 = id
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid transaction id '{id}'"))?;
    let txn = db
        .get_transaction_by_id(id)?
        .ok_or_else(|| anyhow::anyhow!("Transaction #{id} not found"))?;

    let Some(series) = flag_value(args, "--series") else {
        if let Some(parent) = txn.parent_transaction_id() {
            anyhow::bail!(
                "#{id} belongs to series #{parent}; use --series future or --series all"
            );
        }
        db.delete_transaction_cascade(id)?;
        println!("Deleted #{id}");
        return Ok(());
    };

    let option = CleanupOption::parse(series)
        .ok_or_else(|| anyhow::anyhow!("Invalid --series '{series}', expected future or all"))?;
    let parent = match txn.parent_transaction_id() {
        Some(parent) => parent,
        None if txn.kind.is_template() => id,
        None => anyhow::bail!("#{id} is not part of a series"),
    };
    let selected = txn
        .date()
        .ok_or_else(|| anyhow::anyhow!("Transaction #{id} has an invalid date"))?;

    let report =
        RecurrenceEngine::new(db, db, &SystemClock).cleanup_from_date(parent, selected, option);
    println!("Deleted {} row(s) from series #{parent}", report.deleted);
    if report.failed > 0 {
        anyhow::bail!("{} row(s) could not be deleted", report.failed);
    }
    Ok(())
}

fn cli_remind(args: &[String], db: &Database) -> Result<()> {
    let pos = positionals(args, &[]);
    let [id, date] = pos[..] else {
        anyhow::bail!("Usage: monthwise remind <id> <YYYY-MM-DD>");
    };
    let id: i64 = id
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid transaction id '{id}'"))?;
    if db.get_transaction_by_id(id)?.is_none() {
        anyhow::bail!("Transaction #{id} not found");
    }
    let at = calendar::parse_day(date)
        .ok_or_else(|| anyhow::anyhow!("Invalid date '{date}', expected YYYY-MM-DD"))?;
    db.insert_reminder(&Reminder::new(id, at.timestamp()))?;
    let pending = db.get_reminders(id)?;
    println!("Reminder set for #{id} on {date} ({} pending)", pending.len());
    for reminder in &pending {
        let when = calendar::from_timestamp(reminder.remind_at)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!("  reminder {} on {when}", reminder.id.unwrap_or(0));
    }
    Ok(())
}

fn cli_summary(args: &[String], db: &Database) -> Result<()> {
    let month = month_or_current(args.first().map(String::as_str))?;
    let (income, expenses) = db.get_monthly_totals(month)?;
    let net = income + expenses;
    let txn_count = db.get_transaction_count()?;

    println!("Monthwise — {}", calendar::month_label(month));
    println!("{}", "─".repeat(40));
    println!("  Income:     {}", format_amount(income));
    println!("  Expenses:   {}", format_amount(expenses.abs()));
    println!("  Net:        {}", format_amount(net));
    println!("  Total Txns: {txn_count}");
    Ok(())
}

fn cli_export(args: &[String], db: &Database) -> Result<()> {
    let month = month_or_current(flag_value(args, "--month"))?;
    let label = calendar::month_label(month);

    // Output path is the first non-flag argument
    let output_path = positionals(args, &["--month"])
        .first()
        .map(|a| shellexpand(a))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            format!("{home}/monthwise-export-{label}.csv")
        });

    let count = db.export_to_csv(&output_path, Some(month))?;
    if count == 0 {
        println!("No transactions for {label}");
    } else {
        println!("Exported {count} transactions to {output_path}");
    }
    Ok(())
}

fn parse_month_arg(label: &str) -> Result<DateTime<Utc>> {
    calendar::parse_month(label)
        .ok_or_else(|| anyhow::anyhow!("Invalid month '{label}', expected YYYY-MM"))
}

/// Anchor of the given `YYYY-MM`, or of the current month.
fn month_or_current(label: Option<&str>) -> Result<i64> {
    let date = match label {
        Some(label) => parse_month_arg(label)?,
        None => SystemClock.now(),
    };
    Ok(calendar::month_anchor(&date))
}
