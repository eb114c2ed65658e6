//! Materializes recurring and installment templates into concrete monthly
//! rows, and prunes the rows that no longer belong to the visible window.
//!
//! Every operation is best-effort: store failures are logged and counted in
//! the returned report, and the loop moves on to the next month or row.
//! Callers must not run two passes against the same store at once.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};

use crate::calendar;
use crate::clock::Clock;
use crate::models::{Transaction, TransactionKind};
use crate::store::{ReminderScheduler, TransactionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CleanupOption {
    All,
    FutureOnly,
}

impl CleanupOption {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all" => Some(Self::All),
            "future" | "future-only" | "futureonly" => Some(Self::FutureOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GenerationReport {
    pub(crate) inserted: usize,
    /// Months that already had a row for the template.
    pub(crate) already_present: usize,
    /// Months before the effective start.
    pub(crate) before_start: usize,
    /// Months at or after the template's series end.
    pub(crate) after_end: usize,
    pub(crate) failed: usize,
}

impl GenerationReport {
    fn absorb(&mut self, other: GenerationReport) {
        self.inserted += other.inserted;
        self.already_present += other.already_present;
        self.before_start += other.before_start;
        self.after_end += other.after_end;
        self.failed += other.failed;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CleanupReport {
    pub(crate) deleted: usize,
    pub(crate) failed: usize,
    /// Rows that should have gone but carry no id.
    pub(crate) skipped: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SyncReport {
    pub(crate) generated: GenerationReport,
    pub(crate) cleaned: CleanupReport,
}

pub(crate) struct RecurrenceEngine<'a> {
    store: &'a dyn TransactionStore,
    reminders: &'a dyn ReminderScheduler,
    clock: &'a dyn Clock,
}

impl<'a> RecurrenceEngine<'a> {
    pub(crate) fn new(
        store: &'a dyn TransactionStore,
        reminders: &'a dyn ReminderScheduler,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            store,
            reminders,
            clock,
        }
    }

    /// Create the missing instances of `template` for every month offset in
    /// `month_range`, counted from `reference` (now, if `None`).
    ///
    /// Months before `effective_start` (the template's own date, if `None`)
    /// are never materialized, nor are months at or after the template's
    /// `series_end`. Running this twice inserts nothing new.
    pub(crate) fn generate_instances(
        &self,
        template: &Transaction,
        month_range: RangeInclusive<i32>,
        reference: Option<DateTime<Utc>>,
        effective_start: Option<DateTime<Utc>>,
    ) -> GenerationReport {
        let mut report = GenerationReport::default();
        let (Some(template_id), TransactionKind::RecurringTemplate) = (template.id, template.kind)
        else {
            tracing::debug!("'{}' is not a stored recurring template", template.title);
            return report;
        };
        let Some(origin) = template.date() else {
            tracing::warn!("template #{template_id} has an unusable date");
            return report;
        };
        let Some(mut existing) = self.existing_anchors(template_id) else {
            return report;
        };

        let reference = reference.unwrap_or_else(|| self.clock.now());
        let start_anchor = calendar::month_anchor(&effective_start.unwrap_or(origin));

        for offset in month_range {
            let Some(target) = calendar::add_months(&reference, offset) else {
                tracing::debug!("month offset {offset} is out of range");
                continue;
            };
            let target_anchor = calendar::month_anchor(&target);
            if existing.contains(&target_anchor) {
                report.already_present += 1;
                continue;
            }
            if target_anchor < start_anchor {
                report.before_start += 1;
                continue;
            }
            if template.series_end.is_some_and(|end| target_anchor >= end) {
                report.after_end += 1;
                continue;
            }
            let Some(date) = calendar::occurrence_in_month(&origin, &target) else {
                continue;
            };
            let kind = TransactionKind::RecurringInstance {
                parent_id: template_id,
            };
            self.insert_instance(template, kind, date, &mut existing, &mut report);
        }

        if report.inserted > 0 {
            tracing::info!(
                "generated {} instance(s) of template #{template_id}",
                report.inserted
            );
        }
        report
    }

    /// Create every missing installment of an installment plan: one row per
    /// month, starting in the plan's own month, numbered from 1.
    pub(crate) fn generate_installments(&self, template: &Transaction) -> GenerationReport {
        let mut report = GenerationReport::default();
        let (Some(template_id), TransactionKind::InstallmentTemplate { count }) =
            (template.id, template.kind)
        else {
            tracing::debug!("'{}' is not a stored installment plan", template.title);
            return report;
        };
        let Some(origin) = template.date() else {
            tracing::warn!("installment plan #{template_id} has an unusable date");
            return report;
        };
        let Some(mut existing) = self.existing_anchors(template_id) else {
            return report;
        };

        for n in 0..count {
            let Some(target) = i32::try_from(n)
                .ok()
                .and_then(|offset| calendar::add_months(&origin, offset))
            else {
                break;
            };
            if existing.contains(&calendar::month_anchor(&target)) {
                report.already_present += 1;
                continue;
            }
            let Some(date) = calendar::occurrence_in_month(&origin, &target) else {
                continue;
            };
            let kind = TransactionKind::InstallmentInstance {
                parent_id: template_id,
                number: n + 1,
            };
            self.insert_instance(template, kind, date, &mut existing, &mut report);
        }
        report
    }

    /// Delete recurring instances that fell out of the window around
    /// `reference`, plus any instance sitting at or before its template's own
    /// month. `FutureOnly` keeps out-of-window rows that are not in the future.
    pub(crate) fn cleanup_instances_outside_range(
        &self,
        month_range: RangeInclusive<i32>,
        reference: Option<DateTime<Utc>>,
        option: CleanupOption,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        let reference = reference.unwrap_or_else(|| self.clock.now());
        let reference_anchor = calendar::month_anchor(&reference);
        let valid: HashSet<i64> = month_range
            .filter_map(|offset| calendar::add_months(&reference, offset))
            .map(|date| calendar::month_anchor(&date))
            .collect();

        let instances = match self.store.fetch_all_instances() {
            Ok(instances) => instances,
            Err(err) => {
                tracing::error!("failed to load recurring instances: {err}");
                return report;
            }
        };
        let template_anchors: HashMap<i64, i64> = match self.store.fetch_recurring_templates() {
            Ok(templates) => templates
                .iter()
                .filter_map(|t| t.id.map(|id| (id, t.budget_month_date)))
                .collect(),
            Err(err) => {
                tracing::warn!("failed to load templates, applying window rule only: {err}");
                HashMap::new()
            }
        };

        for instance in &instances {
            // Rows without a parent were not generated here.
            let Some(parent_id) = instance.parent_transaction_id() else {
                continue;
            };
            let anchor = calendar::anchor_of_timestamp(instance.budget_month_date);
            let outside = !valid.contains(&anchor);
            let before_start = template_anchors
                .get(&parent_id)
                .is_some_and(|&start| anchor <= start);
            let doomed = before_start
                || match option {
                    CleanupOption::All => outside,
                    CleanupOption::FutureOnly => outside && anchor > reference_anchor,
                };
            if !doomed {
                continue;
            }
            let Some(id) = instance.id else {
                report.skipped += 1;
                continue;
            };
            self.delete_row(id, &mut report);
        }

        if report.deleted > 0 {
            tracing::info!("removed {} instance(s) outside the window", report.deleted);
        }
        report
    }

    /// Delete the occurrences of a series. `All` removes every instance and
    /// then the template; `FutureOnly` removes instances from the month of
    /// `selected_date` onward and keeps the template, ending the series there
    /// so later passes do not bring them back.
    pub(crate) fn cleanup_from_date(
        &self,
        parent_id: i64,
        selected_date: DateTime<Utc>,
        option: CleanupOption,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        let instances = match self.store.fetch_instances(parent_id) {
            Ok(instances) => instances,
            Err(err) => {
                tracing::error!("failed to load instances of #{parent_id}: {err}");
                return report;
            }
        };
        let selected_anchor = calendar::month_anchor(&selected_date);

        for instance in &instances {
            let anchor = calendar::anchor_of_timestamp(instance.budget_month_date);
            if option == CleanupOption::FutureOnly && anchor < selected_anchor {
                continue;
            }
            let Some(id) = instance.id else {
                report.skipped += 1;
                continue;
            };
            self.delete_row(id, &mut report);
        }

        match option {
            CleanupOption::All => self.delete_row(parent_id, &mut report),
            CleanupOption::FutureOnly => {
                if let Err(err) = self.store.end_series(parent_id, selected_anchor) {
                    tracing::error!("failed to end series #{parent_id}: {err}");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// One reconciliation pass over the whole store.
    ///
    /// Recurring templates are generated from the month after their own
    /// month, since the template row is that month's occurrence. Installment
    /// plans are completed, then the window is cleaned up.
    pub(crate) fn sync(
        &self,
        month_range: RangeInclusive<i32>,
        reference: Option<DateTime<Utc>>,
        option: CleanupOption,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        let reference = reference.unwrap_or_else(|| self.clock.now());

        match self.store.fetch_recurring_templates() {
            Ok(templates) => {
                for template in &templates {
                    let Some(start) = template
                        .date()
                        .and_then(|origin| calendar::add_months(&origin, 1))
                    else {
                        continue;
                    };
                    report.generated.absorb(self.generate_instances(
                        template,
                        month_range.clone(),
                        Some(reference),
                        Some(start),
                    ));
                }
            }
            Err(err) => tracing::error!("failed to load recurring templates: {err}"),
        }

        match self.store.fetch_installment_templates() {
            Ok(plans) => {
                for plan in &plans {
                    report.generated.absorb(self.generate_installments(plan));
                }
            }
            Err(err) => tracing::error!("failed to load installment plans: {err}"),
        }

        report.cleaned = self.cleanup_instances_outside_range(month_range, Some(reference), option);
        report
    }

    fn existing_anchors(&self, template_id: i64) -> Option<HashSet<i64>> {
        match self.store.fetch_instances(template_id) {
            Ok(instances) => Some(
                instances
                    .iter()
                    .map(|t| calendar::anchor_of_timestamp(t.budget_month_date))
                    .collect(),
            ),
            Err(err) => {
                tracing::error!("failed to load instances of #{template_id}: {err}");
                None
            }
        }
    }

    fn insert_instance(
        &self,
        template: &Transaction,
        kind: TransactionKind,
        date: DateTime<Utc>,
        existing: &mut HashSet<i64>,
        report: &mut GenerationReport,
    ) {
        let instance = template.instance_of(kind, date, self.clock.now());
        // Clamping may land the row in a month other than the one requested.
        if existing.contains(&instance.budget_month_date) {
            report.already_present += 1;
            return;
        }
        match self.store.insert(&instance) {
            Ok(id) => {
                tracing::debug!(
                    "inserted #{id} for {} ({})",
                    calendar::month_label(instance.budget_month_date),
                    template.title
                );
                existing.insert(instance.budget_month_date);
                report.inserted += 1;
            }
            Err(err) => {
                tracing::error!(
                    "failed to insert {} instance of '{}': {err}",
                    calendar::month_label(instance.budget_month_date),
                    template.title
                );
                report.failed += 1;
            }
        }
    }

    fn delete_row(&self, id: i64, report: &mut CleanupReport) {
        match self.store.delete(id) {
            Ok(()) => {
                report.deleted += 1;
                if let Err(err) = self.reminders.cancel(id) {
                    tracing::warn!("failed to cancel reminders for #{id}: {err}");
                }
            }
            Err(err) => {
                tracing::error!("failed to delete #{id}: {err}");
                report.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests;
