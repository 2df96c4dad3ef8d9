/// Days ahead of today covered by the default sync window
pub const DEFAULT_WINDOW_FUTURE_DAYS: i64 = 30;

/// Days before today covered by the default sync window
pub const DEFAULT_WINDOW_PAST_DAYS: i64 = 0;

/// Upper bound on instances generated per recurring master
pub const MAX_RECURRENCE_INSTANCES: u16 = 365;
