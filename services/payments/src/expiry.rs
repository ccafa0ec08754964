//! Subscription expiry arithmetic

use chrono::{DateTime, Months, Utc};

/// Expiry after one more paid year
///
/// Renewals stack on the previous expiry when there is one, otherwise on
/// `now`. A Feb 29 base lands on Feb 28. `None` means the result is not a
/// representable date.
pub fn next_expiry(
    latest_expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    latest_expiry
        .unwrap_or(now)
        .checked_add_months(Months::new(12))
}
