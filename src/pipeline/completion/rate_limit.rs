use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

/// `... Please try again in 23m3.714s. Visit ...` → captures `23m3.714s`.
static TRY_AGAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)try again in\s+((?:\d+(?:\.\d+)?(?:ms|h|m|s))+)").expect("valid regex")
});

/// One `<number><unit>` component. `ms` must precede `m`.
static COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)(ms|h|m|s)").expect("valid regex"));

/// Parse the server-suggested wait out of a rate-limit message.
///
/// Accepts any combination of hours, minutes, seconds and milliseconds
/// (`1m20s`, `45s`, `2m`, `410ms`, `23m3.714445312s`). Returns `None` when the
/// message carries no wait phrase.
pub fn parse_wait_duration(message: &str) -> Option<Duration> {
    let phrase = TRY_AGAIN.captures(message)?.get(1)?.as_str();

    let mut total_ms = 0.0_f64;
    for cap in COMPONENT.captures_iter(phrase) {
        let value: f64 = cap[1].parse().ok()?;
        total_ms += match &cap[2] {
            "h" => value * 3_600_000.0,
            "m" => value * 60_000.0,
            "s" => value * 1000.0,
            "ms" => value,
            _ => return None,
        };
    }

    Some(Duration::from_millis(total_ms.round() as u64))
}
