use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::calendar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "income" => Self::Income,
            _ => Self::Expense,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a row is, decided once when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Simple,
    RecurringTemplate,
    RecurringInstance { parent_id: i64 },
    /// `count` is the number of monthly installments in the plan.
    InstallmentTemplate { count: u32 },
    /// `number` is 1-based.
    InstallmentInstance { parent_id: i64, number: u32 },
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::RecurringTemplate => "recurring_template",
            Self::RecurringInstance { .. } => "recurring_instance",
            Self::InstallmentTemplate { .. } => "installment_template",
            Self::InstallmentInstance { .. } => "installment_instance",
        }
    }

    /// Rebuild a kind from its stored columns. Rows whose columns don't fit
    /// their tag come back as `Simple`, which the engine never touches.
    pub fn from_parts(
        tag: &str,
        parent_id: Option<i64>,
        installment_count: Option<u32>,
        installment_number: Option<u32>,
    ) -> Self {
        match (tag, parent_id, installment_count, installment_number) {
            ("recurring_template", None, _, _) => Self::RecurringTemplate,
            ("recurring_instance", Some(parent_id), _, _) => Self::RecurringInstance { parent_id },
            ("installment_template", None, Some(count), _) => Self::InstallmentTemplate { count },
            ("installment_instance", Some(parent_id), _, Some(number)) => {
                Self::InstallmentInstance { parent_id, number }
            }
            _ => Self::Simple,
        }
    }

    pub fn parent_id(&self) -> Option<i64> {
        match self {
            Self::RecurringInstance { parent_id } | Self::InstallmentInstance { parent_id, .. } => {
                Some(*parent_id)
            }
            _ => None,
        }
    }

    pub fn installment_count(&self) -> Option<u32> {
        match self {
            Self::InstallmentTemplate { count } => Some(*count),
            _ => None,
        }
    }

    pub fn installment_number(&self) -> Option<u32> {
        match self {
            Self::InstallmentInstance { number, .. } => Some(*number),
            _ => None,
        }
    }

    pub fn is_template(&self) -> bool {
        matches!(
            self,
            Self::RecurringTemplate | Self::InstallmentTemplate { .. }
        )
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "-"),
            Self::RecurringTemplate => write!(f, "recurring"),
            Self::RecurringInstance { parent_id } => write!(f, "recurs #{parent_id}"),
            Self::InstallmentTemplate { count } => write!(f, "{count} installments"),
            Self::InstallmentInstance { parent_id, number } => {
                write!(f, "installment {number} of #{parent_id}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: Option<i64>,
    pub title: String,
    pub category: String,
    /// Always positive; direction comes from `txn_type`.
    pub amount: Decimal,
    pub txn_type: TransactionType,
    pub kind: TransactionKind,
    /// Epoch seconds.
    pub date_timestamp: i64,
    /// Month anchor of `date_timestamp`.
    pub budget_month_date: i64,
    /// Recurring templates only: the series stops before this month anchor.
    pub series_end: Option<i64>,
    pub created_at: String,
}

impl Transaction {
    pub fn new(
        title: String,
        category: String,
        amount: Decimal,
        txn_type: TransactionType,
        kind: TransactionKind,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            title,
            category,
            amount: amount.abs(),
            txn_type,
            kind,
            date_timestamp: date.timestamp(),
            budget_month_date: calendar::month_anchor(&date),
            series_end: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// A row generated from this template, dated `date` and stamped `created_at`.
    pub fn instance_of(
        &self,
        kind: TransactionKind,
        date: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut instance = Self::new(
            self.title.clone(),
            self.category.clone(),
            self.amount,
            self.txn_type,
            kind,
            date,
        );
        instance.created_at = created_at.to_rfc3339();
        instance
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        calendar::from_timestamp(self.date_timestamp)
    }

    pub fn is_income(&self) -> bool {
        self.txn_type == TransactionType::Income
    }

    pub fn is_expense(&self) -> bool {
        self.txn_type == TransactionType::Expense
    }

    /// Amount with sign: positive for income, negative for expenses.
    pub fn signed_amount(&self) -> Decimal {
        match self.txn_type {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }

    pub fn parent_transaction_id(&self) -> Option<i64> {
        self.kind.parent_id()
    }
}
