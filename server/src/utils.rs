use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Current UNIX time in milliseconds, used to stamp live feed events
pub fn get_timestamp() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    millis.min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_monotonic_enough() {
        let first = get_timestamp();
        std::thread::sleep(Duration::from_millis(2));
        let second = get_timestamp();

        assert!(first > 0);
        assert!(second > first);
    }
}
