#![allow(clippy::unwrap_used)]

use std::cell::RefCell;

use chrono::{Datelike, TimeZone};
use rust_decimal_macros::dec;

use super::*;
use crate::clock::FixedClock;
use crate::db::Database;
use crate::models::TransactionType;
use crate::store::StoreError;

fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn anchor(y: i32, m: u32) -> i64 {
    calendar::month_anchor(&utc(y, m, 1))
}

fn stored(db: &Database, kind: TransactionKind, date: DateTime<Utc>) -> Transaction {
    let mut txn = Transaction::new(
        "Rent".into(),
        "Housing".into(),
        dec!(1200),
        TransactionType::Expense,
        kind,
        date,
    );
    txn.id = Some(db.insert_transaction(&txn).unwrap());
    txn
}

fn recurring(db: &Database, origin: DateTime<Utc>) -> Transaction {
    stored(db, TransactionKind::RecurringTemplate, origin)
}

/// (year, month, day) of every instance of `parent`, oldest first.
fn instance_days(db: &Database, parent: &Transaction) -> Vec<(i32, u32, u32)> {
    db.fetch_instances(parent.id.unwrap())
        .unwrap()
        .iter()
        .map(|t| {
            let d = t.date().unwrap();
            (d.year(), d.month(), d.day())
        })
        .collect()
}

fn instance_anchors(db: &Database, parent: &Transaction) -> Vec<i64> {
    db.fetch_instances(parent.id.unwrap())
        .unwrap()
        .iter()
        .map(|t| t.budget_month_date)
        .collect()
}

#[derive(Default)]
struct RecordingReminders {
    cancelled: RefCell<Vec<i64>>,
}

impl ReminderScheduler for RecordingReminders {
    fn cancel(&self, transaction_id: i64) -> Result<(), StoreError> {
        self.cancelled.borrow_mut().push(transaction_id);
        Ok(())
    }
}

/// Delegates to a real database but fails chosen inserts and deletes.
struct FlakyStore<'a> {
    inner: &'a Database,
    fail_insert_months: Vec<i64>,
    fail_delete_ids: Vec<i64>,
}

impl TransactionStore for FlakyStore<'_> {
    fn fetch_recurring_templates(&self) -> Result<Vec<Transaction>, StoreError> {
        self.inner.fetch_recurring_templates()
    }

    fn fetch_installment_templates(&self) -> Result<Vec<Transaction>, StoreError> {
        self.inner.fetch_installment_templates()
    }

    fn fetch_instances(&self, template_id: i64) -> Result<Vec<Transaction>, StoreError> {
        self.inner.fetch_instances(template_id)
    }

    fn fetch_all_instances(&self) -> Result<Vec<Transaction>, StoreError> {
        self.inner.fetch_all_instances()
    }

    fn insert(&self, txn: &Transaction) -> Result<i64, StoreError> {
        if self.fail_insert_months.contains(&txn.budget_month_date) {
            return Err(StoreError::NotFound(-1));
        }
        self.inner.insert(txn)
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        if self.fail_delete_ids.contains(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.inner.delete(id)
    }

    fn end_series(&self, template_id: i64, end_anchor: i64) -> Result<(), StoreError> {
        self.inner.end_series(template_id, end_anchor)
    }
}

// ── generate_instances ────────────────────────────────────────

#[test]
fn test_generate_leap_year_scenario_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2024, 1, 31));

    let first = engine.generate_instances(&rent, 0..=3, Some(utc(2024, 1, 15)), None);
    assert_eq!(first.inserted, 4);
    assert_eq!(first.failed, 0);
    assert_eq!(
        instance_days(&db, &rent),
        vec![(2024, 1, 31), (2024, 2, 29), (2024, 3, 31), (2024, 4, 30)]
    );

    let second = engine.generate_instances(&rent, 0..=3, Some(utc(2024, 1, 15)), None);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.already_present, 4);
    assert_eq!(db.fetch_instances(rent.id.unwrap()).unwrap().len(), 4);
}

#[test]
fn test_generate_clamps_non_leap_february() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2023, 1, 1));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2023, 1, 31));

    engine.generate_instances(&rent, 1..=3, None, None);
    assert_eq!(
        instance_days(&db, &rent),
        vec![(2023, 2, 28), (2023, 3, 31), (2023, 4, 30)]
    );
}

#[test]
fn test_generate_copies_template_fields() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 5, 1));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let mut salary = Transaction::new(
        "Salary".into(),
        "Income".into(),
        dec!(3000),
        TransactionType::Income,
        TransactionKind::RecurringTemplate,
        utc(2024, 5, 25),
    );
    salary.id = Some(db.insert_transaction(&salary).unwrap());

    engine.generate_instances(&salary, 1..=1, None, None);
    let rows = db.fetch_instances(salary.id.unwrap()).unwrap();
    assert_eq!(rows.len(), 1);
    let inst = &rows[0];
    assert_eq!(inst.title, "Salary");
    assert_eq!(inst.category, "Income");
    assert_eq!(inst.amount, dec!(3000));
    assert_eq!(inst.txn_type, TransactionType::Income);
    assert_eq!(
        inst.kind,
        TransactionKind::RecurringInstance {
            parent_id: salary.id.unwrap()
        }
    );
    assert_eq!(inst.budget_month_date, anchor(2024, 6));
    assert_eq!(inst.budget_month_date, calendar::anchor_of_timestamp(inst.date_timestamp));
}

#[test]
fn test_generate_skips_months_before_start() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2024, 1, 10));

    let report = engine.generate_instances(&rent, -3..=3, None, None);
    assert_eq!(report.inserted, 4);
    assert_eq!(report.before_start, 3);
    assert_eq!(
        instance_anchors(&db, &rent),
        vec![anchor(2024, 1), anchor(2024, 2), anchor(2024, 3), anchor(2024, 4)]
    );
}

#[test]
fn test_generate_honours_effective_start_override() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2024, 1, 10));

    let report = engine.generate_instances(&rent, 0..=3, None, Some(utc(2024, 3, 20)));
    assert_eq!(report.inserted, 2);
    assert_eq!(report.before_start, 2);
    assert_eq!(instance_days(&db, &rent), vec![(2024, 3, 10), (2024, 4, 10)]);
}

#[test]
fn test_generate_ignores_non_templates() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);

    let simple = stored(&db, TransactionKind::Simple, utc(2024, 1, 1));
    assert_eq!(
        engine.generate_instances(&simple, 0..=3, None, None),
        GenerationReport::default()
    );

    let mut unsaved = recurring(&db, utc(2024, 1, 1));
    unsaved.id = None;
    assert_eq!(
        engine.generate_instances(&unsaved, 0..=3, None, None),
        GenerationReport::default()
    );
    assert!(db.fetch_all_instances().unwrap().is_empty());
}

#[test]
fn test_generate_continues_after_failed_insert() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 15));
    let rent = recurring(&db, utc(2024, 1, 5));
    let flaky = FlakyStore {
        inner: &db,
        fail_insert_months: vec![anchor(2024, 2)],
        fail_delete_ids: vec![],
    };

    let report = RecurrenceEngine::new(&flaky, &reminders, &clock)
        .generate_instances(&rent, 0..=3, None, None);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.failed, 1);

    // A later pass against a healthy store fills the gap only.
    let report = RecurrenceEngine::new(&db, &reminders, &clock)
        .generate_instances(&rent, 0..=3, None, None);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.already_present, 3);
    assert_eq!(instance_anchors(&db, &rent).len(), 4);
}

#[test]
fn test_moving_window_never_duplicates() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2023, 12, 31));

    for month in 1..=6 {
        let reference = utc(2024, month, 15);
        engine.generate_instances(&rent, -2..=2, Some(reference), None);
        engine.cleanup_instances_outside_range(-2..=2, Some(reference), CleanupOption::FutureOnly);
    }

    let anchors = instance_anchors(&db, &rent);
    let mut unique = anchors.clone();
    unique.dedup();
    assert_eq!(anchors, unique);
    assert!(anchors.contains(&anchor(2024, 8)));
}

// ── cleanup_instances_outside_range ───────────────────────────

/// Template in March, instances in May, June and July.
fn three_month_series(db: &Database, engine: &RecurrenceEngine<'_>) -> Transaction {
    let rent = recurring(db, utc(2024, 3, 10));
    engine.generate_instances(&rent, -1..=1, Some(utc(2024, 6, 15)), None);
    assert_eq!(
        instance_anchors(db, &rent),
        vec![anchor(2024, 5), anchor(2024, 6), anchor(2024, 7)]
    );
    rent
}

#[test]
fn test_future_only_cleanup_keeps_past() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 6, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = three_month_series(&db, &engine);

    let report = engine.cleanup_instances_outside_range(0..=0, None, CleanupOption::FutureOnly);
    assert_eq!(report.deleted, 1);
    assert_eq!(
        instance_anchors(&db, &rent),
        vec![anchor(2024, 5), anchor(2024, 6)]
    );
}

#[test]
fn test_all_cleanup_removes_everything_outside() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 6, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = three_month_series(&db, &engine);

    let report = engine.cleanup_instances_outside_range(0..=0, None, CleanupOption::All);
    assert_eq!(report.deleted, 2);
    assert_eq!(instance_anchors(&db, &rent), vec![anchor(2024, 6)]);
    assert_eq!(reminders.cancelled.borrow().len(), 2);
}

#[test]
fn test_cleanup_removes_instances_at_or_before_template_month() {
    for option in [CleanupOption::All, CleanupOption::FutureOnly] {
        let db = Database::open_in_memory().unwrap();
        let reminders = RecordingReminders::default();
        let clock = FixedClock(utc(2024, 4, 15));
        let engine = RecurrenceEngine::new(&db, &reminders, &clock);
        let rent = recurring(&db, utc(2024, 4, 10));

        // February via an earlier start, April in the template's own month.
        engine.generate_instances(&rent, -2..=1, None, Some(utc(2024, 2, 1)));
        assert_eq!(instance_anchors(&db, &rent).len(), 4);

        // Everything is inside this window.
        let report = engine.cleanup_instances_outside_range(-6..=6, None, option);
        assert_eq!(report.deleted, 3, "{option:?}");
        assert_eq!(instance_anchors(&db, &rent), vec![anchor(2024, 5)], "{option:?}");
    }
}

#[test]
fn test_cleanup_leaves_non_generated_rows_alone() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2030, 1, 1));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);

    let simple = stored(&db, TransactionKind::Simple, utc(2024, 1, 1));
    let plan = stored(&db, TransactionKind::InstallmentTemplate { count: 3 }, utc(2024, 1, 1));
    engine.generate_installments(&plan);
    let rent = recurring(&db, utc(2024, 1, 1));

    let report = engine.cleanup_instances_outside_range(0..=0, None, CleanupOption::All);
    assert_eq!(report, CleanupReport::default());
    assert!(db.get_transaction_by_id(simple.id.unwrap()).unwrap().is_some());
    assert!(db.get_transaction_by_id(rent.id.unwrap()).unwrap().is_some());
    assert_eq!(db.fetch_instances(plan.id.unwrap()).unwrap().len(), 3);
}

#[test]
fn test_cleanup_continues_after_failed_delete() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 6, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = three_month_series(&db, &engine);
    let rows = db.fetch_instances(rent.id.unwrap()).unwrap();
    let may = rows[0].id.unwrap();

    let flaky = FlakyStore {
        inner: &db,
        fail_insert_months: vec![],
        fail_delete_ids: vec![may],
    };
    let report = RecurrenceEngine::new(&flaky, &reminders, &clock).cleanup_instances_outside_range(
        0..=0,
        None,
        CleanupOption::All,
    );
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(
        instance_anchors(&db, &rent),
        vec![anchor(2024, 5), anchor(2024, 6)]
    );
    // Failed deletes don't cancel reminders
    assert!(!reminders.cancelled.borrow().contains(&may));
}

// ── cleanup_from_date ─────────────────────────────────────────

#[test]
fn test_cleanup_from_date_future_only_keeps_template() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2024, 1, 5));
    engine.generate_instances(&rent, 1..=4, None, None);
    let rows = db.fetch_instances(rent.id.unwrap()).unwrap();
    let doomed: Vec<i64> = rows[2..].iter().map(|t| t.id.unwrap()).collect();

    let report = engine.cleanup_from_date(
        rent.id.unwrap(),
        utc(2024, 4, 28),
        CleanupOption::FutureOnly,
    );
    assert_eq!(report.deleted, 2);
    assert_eq!(
        instance_anchors(&db, &rent),
        vec![anchor(2024, 2), anchor(2024, 3)]
    );
    assert!(db.get_transaction_by_id(rent.id.unwrap()).unwrap().is_some());
    assert_eq!(*reminders.cancelled.borrow(), doomed);
}

#[test]
fn test_cleanup_from_date_all_removes_series() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2024, 1, 5));
    let other = recurring(&db, utc(2024, 1, 9));
    engine.generate_instances(&rent, 1..=3, None, None);
    engine.generate_instances(&other, 1..=3, None, None);

    let report = engine.cleanup_from_date(rent.id.unwrap(), utc(2024, 3, 1), CleanupOption::All);
    assert_eq!(report.deleted, 4);
    assert!(db.get_transaction_by_id(rent.id.unwrap()).unwrap().is_none());
    assert!(instance_anchors(&db, &rent).is_empty());
    assert_eq!(instance_anchors(&db, &other).len(), 3);
    assert!(reminders.cancelled.borrow().contains(&rent.id.unwrap()));
    assert_eq!(reminders.cancelled.borrow().len(), 4);
}

#[test]
fn test_cleanup_from_date_cancels_stored_reminders() {
    let db = Database::open_in_memory().unwrap();
    let clock = FixedClock(utc(2024, 1, 15));
    let engine = RecurrenceEngine::new(&db, &db, &clock);
    let rent = recurring(&db, utc(2024, 1, 5));
    engine.generate_instances(&rent, 1..=2, None, None);
    let march = db.fetch_instances(rent.id.unwrap()).unwrap()[1].id.unwrap();
    db.insert_reminder(&crate::models::Reminder::new(march, utc(2024, 3, 4).timestamp()))
        .unwrap();

    engine.cleanup_from_date(rent.id.unwrap(), utc(2024, 3, 1), CleanupOption::FutureOnly);
    assert!(db.get_reminders(march).unwrap().is_empty());
    assert_eq!(instance_anchors(&db, &rent), vec![anchor(2024, 2)]);
}

#[test]
fn test_future_only_cleanup_survives_later_syncs() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 3, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2024, 1, 5));
    engine.sync(-1..=2, None, CleanupOption::FutureOnly);
    assert_eq!(
        instance_anchors(&db, &rent),
        vec![anchor(2024, 2), anchor(2024, 3), anchor(2024, 4), anchor(2024, 5)]
    );

    let report = engine.cleanup_from_date(rent.id.unwrap(), utc(2024, 4, 1), CleanupOption::FutureOnly);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.failed, 0);
    let saved = db.get_transaction_by_id(rent.id.unwrap()).unwrap().unwrap();
    assert_eq!(saved.series_end, Some(anchor(2024, 4)));

    let again = engine.sync(-1..=2, None, CleanupOption::FutureOnly);
    assert_eq!(again.generated.inserted, 0);
    assert_eq!(again.generated.after_end, 2);
    assert_eq!(
        instance_anchors(&db, &rent),
        vec![anchor(2024, 2), anchor(2024, 3)]
    );

    // A later cut moves the end back; an earlier-reaching one never extends it.
    engine.cleanup_from_date(rent.id.unwrap(), utc(2024, 3, 1), CleanupOption::FutureOnly);
    engine.cleanup_from_date(rent.id.unwrap(), utc(2024, 6, 1), CleanupOption::FutureOnly);
    let saved = db.get_transaction_by_id(rent.id.unwrap()).unwrap().unwrap();
    assert_eq!(saved.series_end, Some(anchor(2024, 3)));
    engine.sync(-1..=2, None, CleanupOption::FutureOnly);
    assert_eq!(instance_anchors(&db, &rent), vec![anchor(2024, 2)]);
}

#[test]
fn test_future_only_cleanup_shrinks_installment_plan() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 1));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let plan = stored(&db, TransactionKind::InstallmentTemplate { count: 4 }, utc(2024, 1, 10));
    engine.generate_installments(&plan);

    let report = engine.cleanup_from_date(plan.id.unwrap(), utc(2024, 3, 10), CleanupOption::FutureOnly);
    assert_eq!(report.deleted, 2);
    let shrunk = db.get_transaction_by_id(plan.id.unwrap()).unwrap().unwrap();
    assert_eq!(shrunk.kind, TransactionKind::InstallmentTemplate { count: 2 });

    let again = engine.sync(0..=0, None, CleanupOption::FutureOnly);
    assert_eq!(again.generated.inserted, 0);
    assert_eq!(instance_anchors(&db, &plan), vec![anchor(2024, 1), anchor(2024, 2)]);
}

#[test]
fn test_future_only_cleanup_of_missing_series_is_counted() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 1));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let report = engine.cleanup_from_date(404, utc(2024, 1, 1), CleanupOption::FutureOnly);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.failed, 1);
}

// ── generate_installments ─────────────────────────────────────

#[test]
fn test_generated_rows_are_stamped_by_the_clock() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2024, 1, 5));
    let plan = stored(&db, TransactionKind::InstallmentTemplate { count: 2 }, utc(2024, 1, 5));

    engine.generate_instances(&rent, 1..=2, None, None);
    engine.generate_installments(&plan);
    let stamps: Vec<String> = db
        .fetch_instances(rent.id.unwrap())
        .unwrap()
        .into_iter()
        .chain(db.fetch_instances(plan.id.unwrap()).unwrap())
        .map(|t| t.created_at)
        .collect();
    assert_eq!(stamps.len(), 4);
    assert!(stamps.iter().all(|s| *s == clock.0.to_rfc3339()));
}

#[test]
fn test_installments_numbered_and_clamped() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 1));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let plan = stored(&db, TransactionKind::InstallmentTemplate { count: 4 }, utc(2024, 1, 31));

    let report = engine.generate_installments(&plan);
    assert_eq!(report.inserted, 4);
    assert_eq!(
        instance_days(&db, &plan),
        vec![(2024, 1, 31), (2024, 2, 29), (2024, 3, 31), (2024, 4, 30)]
    );
    let numbers: Vec<u32> = db
        .fetch_instances(plan.id.unwrap())
        .unwrap()
        .iter()
        .filter_map(|t| t.kind.installment_number())
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    let again = engine.generate_installments(&plan);
    assert_eq!(again.inserted, 0);
    assert_eq!(again.already_present, 4);
}

#[test]
fn test_installments_ignore_recurring_templates() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 1));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2024, 1, 1));
    assert_eq!(engine.generate_installments(&rent), GenerationReport::default());
}

// ── sync ──────────────────────────────────────────────────────

#[test]
fn test_sync_skips_template_month_and_is_stable() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2024, 1, 31));
    let plan = stored(&db, TransactionKind::InstallmentTemplate { count: 2 }, utc(2024, 1, 10));

    let first = engine.sync(-1..=2, None, CleanupOption::FutureOnly);
    assert_eq!(first.generated.inserted, 4);
    assert_eq!(first.cleaned.deleted, 0);
    assert_eq!(instance_days(&db, &rent), vec![(2024, 2, 29), (2024, 3, 31)]);
    assert_eq!(instance_anchors(&db, &plan).len(), 2);

    let second = engine.sync(-1..=2, None, CleanupOption::FutureOnly);
    assert_eq!(second.generated.inserted, 0);
    assert_eq!(second.cleaned.deleted, 0);
}

#[test]
fn test_sync_follows_the_window() {
    let db = Database::open_in_memory().unwrap();
    let reminders = RecordingReminders::default();
    let clock = FixedClock(utc(2024, 1, 15));
    let engine = RecurrenceEngine::new(&db, &reminders, &clock);
    let rent = recurring(&db, utc(2024, 1, 5));

    engine.sync(0..=3, None, CleanupOption::All);
    assert_eq!(
        instance_anchors(&db, &rent),
        vec![anchor(2024, 2), anchor(2024, 3), anchor(2024, 4)]
    );

    // Move forward: past rows outside the window survive FutureOnly.
    let report = engine.sync(0..=1, Some(utc(2024, 6, 1)), CleanupOption::FutureOnly);
    assert_eq!(report.generated.inserted, 2);
    assert_eq!(report.cleaned.deleted, 0);
    assert_eq!(instance_anchors(&db, &rent).len(), 5);

    // Move back: June and July are now in the future and outside.
    let report = engine.sync(0..=1, Some(utc(2024, 3, 1)), CleanupOption::FutureOnly);
    assert_eq!(report.cleaned.deleted, 2);
    assert_eq!(
        instance_anchors(&db, &rent),
        vec![anchor(2024, 2), anchor(2024, 3), anchor(2024, 4)]
    );

    let report = engine.sync(0..=0, Some(utc(2024, 3, 1)), CleanupOption::All);
    assert_eq!(report.cleaned.deleted, 2);
    assert_eq!(instance_anchors(&db, &rent), vec![anchor(2024, 3)]);
}

// ── CleanupOption ─────────────────────────────────────────────

#[test]
fn test_cleanup_option_parse() {
    assert_eq!(CleanupOption::parse("all"), Some(CleanupOption::All));
    assert_eq!(CleanupOption::parse("ALL"), Some(CleanupOption::All));
    assert_eq!(CleanupOption::parse("future"), Some(CleanupOption::FutureOnly));
    assert_eq!(CleanupOption::parse("future-only"), Some(CleanupOption::FutureOnly));
    assert_eq!(CleanupOption::parse("some"), None);
}
