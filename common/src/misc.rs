use std::time::Duration;

pub fn human_duration(duration: Duration) -> String {
    let ms = duration.as_secs_f32() * 1000.0;
    if ms < 1000.0 {
        format!("{ms:.1}ms")
    } else if ms < 60_000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        let minutes = ms / 60_000.0;
        let seconds = (minutes - minutes.floor()) * 60.0;
        format!("{:.0}m {:.2}s", minutes.floor(), seconds)
    }
}

/// Formats a rate such as rays per second with a metric suffix.
pub fn human_rate(count: u64, duration: Duration) -> String {
    let rate = count as f64 / duration.as_secs_f64().max(f64::EPSILON);
    if rate >= 1e6 {
        format!("{:.2}M/s", rate / 1e6)
    } else if rate >= 1e3 {
        format!("{:.2}k/s", rate / 1e3)
    } else {
        format!("{rate:.0}/s")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{human_duration, human_rate};

    #[test]
    fn durations() {
        assert_eq!(human_duration(Duration::from_millis(12)), "12.0ms");
        assert_eq!(human_duration(Duration::from_millis(2500)), "2.50s");
        assert_eq!(human_duration(Duration::from_secs(90)), "1m 30.00s");
    }

    #[test]
    fn rates() {
        assert_eq!(human_rate(500, Duration::from_secs(1)), "500/s");
        assert_eq!(human_rate(2_000_000, Duration::from_secs(1)), "2.00M/s");
    }
}
