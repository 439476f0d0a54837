//! Time window slicing

use chrono::{NaiveDateTime, TimeDelta};

use crate::utils::time::micros;

/// Half-open window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    /// Seconds covered by the window, rounded up so a non-empty window is never 0
    pub fn seconds(&self) -> u64 {
        u64::try_from(micros(self.end - self.start)).map_or(0, |us| us.div_ceil(1_000_000))
    }
}

/// Consecutive windows of `period` covering `[start, end)`.
///
/// The window count is the ceiling of the span over the period and the last
/// window is clamped to `end`. An empty or inverted range yields nothing.
#[derive(Debug, Clone)]
pub struct Periods {
    next: NaiveDateTime,
    end: NaiveDateTime,
    step: TimeDelta,
}

impl Iterator for Periods {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.next >= self.end {
            return None;
        }
        let start = self.next;
        let end = start
            .checked_add_signed(self.step)
            .map_or(self.end, |candidate| candidate.min(self.end));
        self.next = end;
        Some(Window { start, end })
    }
}

/// Split `[start, end)` into windows of `period_secs` seconds
pub fn iter_period(start: NaiveDateTime, end: NaiveDateTime, period_secs: u64) -> Periods {
    let step = i64::try_from(period_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .filter(|step| *step > TimeDelta::zero())
        // a period too large to represent covers the whole range in one window
        .unwrap_or(TimeDelta::MAX);
    Periods {
        next: start,
        end,
        step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::parse_timestamp;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_truncated_final_window() {
        let windows: Vec<_> =
            iter_period(ts("2015-01-01T00:00:00"), ts("2015-01-01T00:09:00"), 300).collect();
        assert_eq!(
            windows,
            vec![
                Window {
                    start: ts("2015-01-01T00:00:00"),
                    end: ts("2015-01-01T00:05:00"),
                },
                Window {
                    start: ts("2015-01-01T00:05:00"),
                    end: ts("2015-01-01T00:09:00"),
                },
            ]
        );
        assert_eq!(windows[0].seconds(), 300);
        assert_eq!(windows[1].seconds(), 240);
    }

    #[test]
    fn test_exact_multiple() {
        let windows: Vec<_> =
            iter_period(ts("2015-01-01T00:00:00"), ts("2015-01-01T00:10:00"), 300).collect();
        assert_eq!(windows.len(), 2);
        assert!(windows.iter().all(|w| w.seconds() == 300));
    }

    #[test]
    fn test_windows_are_back_to_back() {
        let windows: Vec<_> =
            iter_period(ts("2015-01-01T00:00:00"), ts("2015-01-01T01:00:01"), 600).collect();
        assert_eq!(windows.len(), 7);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(windows.last().unwrap().seconds(), 1);
    }

    #[test]
    fn test_partial_seconds_round_up() {
        let start = ts("2015-01-01T00:03:00");
        let end = start + TimeDelta::microseconds(1);
        let windows: Vec<_> = iter_period(start, end, 300).collect();
        assert_eq!(windows, vec![Window { start, end }]);
        assert_eq!(windows[0].seconds(), 1);

        let window = Window {
            start,
            end: start + TimeDelta::milliseconds(240_500),
        };
        assert_eq!(window.seconds(), 241);
    }

    #[test]
    fn test_empty_range() {
        let t = ts("2015-01-01T00:00:00");
        assert_eq!(iter_period(t, t, 300).count(), 0);
        assert_eq!(iter_period(ts("2015-01-02T00:00:00"), t, 300).count(), 0);
    }

    #[test]
    fn test_huge_period_is_one_window() {
        let windows: Vec<_> =
            iter_period(ts("2015-01-01T00:00:00"), ts("2015-01-02T00:00:00"), u64::MAX).collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].seconds(), 86_400);
    }
}
