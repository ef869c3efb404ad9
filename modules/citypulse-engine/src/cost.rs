//! Per-provider daily spend guard. Costs are tracked in hundredths of a
//! cent so fractional per-call prices stay integral; counters reset when
//! the UTC calendar day rolls over, detected on read.

use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct DayCounter {
    day: NaiveDate,
    spent: u64,
    calls: u32,
    skipped: u32,
}

pub struct CostOptimizer {
    provider: &'static str,
    /// Daily cap in hundredths of a cent. 0 = unlimited.
    daily_cap: u64,
    cost_per_call: u64,
    inner: Mutex<DayCounter>,
}

impl CostOptimizer {
    pub fn new(provider: &'static str, daily_cap: u64, cost_per_call: u64) -> Self {
        Self {
            provider,
            daily_cap,
            cost_per_call,
            inner: Mutex::new(DayCounter {
                day: NaiveDate::MIN,
                spent: 0,
                calls: 0,
                skipped: 0,
            }),
        }
    }

    /// Record one call's projected cost. Returns false (and records a skip)
    /// when the projection would cross the cap.
    pub fn try_spend(&self, now: DateTime<Utc>) -> bool {
        let mut counter = self.inner.lock().expect("cost lock");
        let today = now.date_naive();
        if counter.day != today {
            *counter = DayCounter {
                day: today,
                spent: 0,
                calls: 0,
                skipped: 0,
            };
        }
        if self.daily_cap > 0 && counter.spent + self.cost_per_call > self.daily_cap {
            counter.skipped += 1;
            warn!(
                provider = self.provider,
                spent = counter.spent,
                cap = self.daily_cap,
                "daily budget exhausted, skipping call"
            );
            return false;
        }
        counter.spent += self.cost_per_call;
        counter.calls += 1;
        true
    }

    pub fn report(&self, now: DateTime<Utc>) -> CostReport {
        let mut counter = self.inner.lock().expect("cost lock");
        let today = now.date_naive();
        if counter.day != today {
            *counter = DayCounter {
                day: today,
                spent: 0,
                calls: 0,
                skipped: 0,
            };
        }
        CostReport {
            provider: self.provider,
            date: counter.day,
            calls: counter.calls,
            skipped: counter.skipped,
            spent_cents: counter.spent as f64 / 100.0,
            cap_cents: self.daily_cap as f64 / 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CostReport {
    pub provider: &'static str,
    pub date: NaiveDate,
    pub calls: u32,
    pub skipped: u32,
    pub spent_cents: f64,
    pub cap_cents: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noon() -> DateTime<Utc> {
        "2025-01-15T12:00:00Z".parse().expect("test instant")
    }

    #[test]
    fn unlimited_when_cap_is_zero() {
        let cost = CostOptimizer::new("places", 0, 170);
        for _ in 0..10_000 {
            assert!(cost.try_spend(noon()));
        }
    }

    #[test]
    fn caps_at_projected_spend() {
        // $10/day at $0.017/call = 588 calls.
        let cost = CostOptimizer::new("places", 100_000, 170);
        let mut allowed = 0;
        for _ in 0..1_000 {
            if cost.try_spend(noon()) {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 588);

        let report = cost.report(noon());
        assert_eq!(report.calls, 588);
        assert_eq!(report.skipped, 412);
        assert!((report.spent_cents - 999.6).abs() < 1e-9);
    }

    #[test]
    fn counters_reset_at_day_rollover() {
        let cost = CostOptimizer::new("events", 100, 100);
        assert!(cost.try_spend(noon()));
        assert!(!cost.try_spend(noon()));

        let tomorrow = noon() + chrono::Duration::days(1);
        assert!(cost.try_spend(tomorrow));
        let report = cost.report(tomorrow);
        assert_eq!(report.calls, 1);
        assert_eq!(report.skipped, 0);
    }
}
