//! One-time passcode generation and expiry

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Minutes a passcode stays valid after it is issued
pub const OTP_VALIDITY_MINUTES: i64 = 10;

/// Six-digit code drawn uniformly from 100000..=999999
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// An OTP aged exactly the validity window is still accepted
pub fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - created_at > Duration::minutes(OTP_VALIDITY_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..1000 {
            let code = generate_code();
            let value: u32 = code.parse().unwrap();
            assert_eq!(code.len(), 6);
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn fresh_code_is_valid() {
        let issued = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        assert!(!is_expired(issued, issued + Duration::minutes(9)));
    }

    #[test]
    fn exactly_ten_minutes_is_still_valid() {
        let issued = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        assert!(!is_expired(issued, issued + Duration::milliseconds(600_000)));
    }

    #[test]
    fn one_millisecond_past_the_window_is_expired() {
        let issued = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        assert!(is_expired(issued, issued + Duration::milliseconds(600_001)));
    }
}
