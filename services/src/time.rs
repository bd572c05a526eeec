//! Wall-clock helpers shared by timing, logging and file naming.

/// Current UNIX timestamp in seconds with sub-second precision.
pub fn cur_timestamp() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// Compact timestamp for file names, e.g. `20250912T102030123`.
pub fn file_stamp() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%S%3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_move_forward() {
        let a = cur_timestamp();
        let b = cur_timestamp();
        assert!(b >= a);
        assert!(a > 1_600_000_000.0);
    }

    #[test]
    fn file_stamp_has_no_separators() {
        let s = file_stamp();
        assert!(!s.contains(':'));
        assert!(!s.contains(' '));
    }
}
