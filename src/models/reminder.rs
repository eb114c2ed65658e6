#[derive(Debug, Clone)]
pub struct Reminder {
    pub id: Option<i64>,
    pub transaction_id: i64,
    /// Epoch seconds.
    pub remind_at: i64,
}

impl Reminder {
    pub fn new(transaction_id: i64, remind_at: i64) -> Self {
        Self {
            id: None,
            transaction_id,
            remind_at,
        }
    }
}
