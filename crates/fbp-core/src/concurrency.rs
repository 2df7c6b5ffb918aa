//! Primitives for spotting near-simultaneous events.
//!
//! Upstream collectors record the same physical interaction through more
//! than one listener, with trigger times a few milliseconds apart. This
//! module only supplies the comparison primitives; it never drops events
//! itself.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

/// Trigger times closer than this count as the same instant.
pub const EVENT_DEDUP_EPSILON_MS: i64 = 100;

/// Command ids produced by auto-repeating caret navigation.
///
/// These fire in rapid bursts and carry no analytical signal on their
/// own, so consumers may treat them as noise.
pub const NOISE_COMMAND_IDS: &[&str] = &[
    "TextControl.Up",
    "TextControl.Down",
    "TextControl.Left",
    "TextControl.Right",
    "TextControl.Backspace",
    "TextControl.Enter",
    "TextControl.Delete",
    "TextControl.Up.Selection",
    "TextControl.Down.Selection",
    "TextControl.Left.Selection",
    "TextControl.Right.Selection",
    "TextControl.Backspace.Selection",
    "TextControl.Enter.Selection",
    "TextControl.Delete.Selection",
];

/// Whether a command id is auto-repeating caret-navigation noise.
#[must_use]
pub fn is_noise_command(command_id: &str) -> bool {
    NOISE_COMMAND_IDS.contains(&command_id)
}

/// Compares trigger times with a tolerance band.
///
/// Not a total order: `Equal` is not transitive across a chain of
/// timestamps each within epsilon of the next. Callers must not use it
/// for sorting, only for pairwise concurrency checks.
#[derive(Debug, Clone, Copy)]
pub struct TriggerTimeComparer {
    epsilon: Duration,
}

impl Default for TriggerTimeComparer {
    fn default() -> Self {
        Self {
            epsilon: Duration::milliseconds(EVENT_DEDUP_EPSILON_MS),
        }
    }
}

impl TriggerTimeComparer {
    #[must_use]
    pub fn new(epsilon: Duration) -> Self {
        Self { epsilon }
    }

    /// `Equal` iff the two times are within epsilon of each other.
    #[must_use]
    pub fn cmp(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> Ordering {
        if (a - b).abs() <= self.epsilon {
            Ordering::Equal
        } else {
            a.cmp(&b)
        }
    }

    /// Whether the two times fall within the tolerance band.
    #[must_use]
    pub fn are_concurrent(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.cmp(a, b) == Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 4, 21, 9, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    #[test]
    fn times_within_epsilon_compare_equal() {
        let cmp = TriggerTimeComparer::default();
        assert_eq!(cmp.cmp(at_ms(0), at_ms(100)), Ordering::Equal);
        assert_eq!(cmp.cmp(at_ms(100), at_ms(0)), Ordering::Equal);
        assert!(cmp.are_concurrent(at_ms(0), at_ms(42)));
    }

    #[test]
    fn times_past_epsilon_order_normally() {
        let cmp = TriggerTimeComparer::default();
        assert_eq!(cmp.cmp(at_ms(0), at_ms(101)), Ordering::Less);
        assert_eq!(cmp.cmp(at_ms(101), at_ms(0)), Ordering::Greater);
        assert!(!cmp.are_concurrent(at_ms(0), at_ms(101)));
    }

    #[test]
    fn custom_epsilon_is_honored() {
        let cmp = TriggerTimeComparer::new(Duration::milliseconds(10));
        assert!(cmp.are_concurrent(at_ms(0), at_ms(10)));
        assert!(!cmp.are_concurrent(at_ms(0), at_ms(11)));
    }

    #[test]
    fn noise_commands_include_selection_variants() {
        assert!(is_noise_command("TextControl.Left"));
        assert!(is_noise_command("TextControl.Left.Selection"));
        assert!(!is_noise_command("Edit.FormatDocument"));
    }
}
