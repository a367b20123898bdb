use super::{CalendarBreakdown, CalendarError, TimeUnit};
use chrono::{Datelike, Days, Months, NaiveDate};

const HOURS_PER_DAY: u64 = 24;
const DAYS_PER_WEEK: u64 = 7;
const MONTHS_PER_YEAR: u64 = 12;

/// Shifts `date` by exactly `n` whole units.
///
/// Hour, day and week are pure duration additions. Month and year clamp the
/// day-of-month to the length of the resulting month (Jan 31 + 1 month is
/// Feb 28/29).
pub fn add_unit(date: NaiveDate, n: u64, unit: TimeUnit) -> Result<NaiveDate, CalendarError> {
    let out_of_range = || CalendarError::OutOfRange {
        date,
        amount: n,
        unit,
    };

    match unit {
        TimeUnit::Hour => date.checked_add_days(Days::new(n / HOURS_PER_DAY)),
        TimeUnit::Day => date.checked_add_days(Days::new(n)),
        TimeUnit::Week => n
            .checked_mul(DAYS_PER_WEEK)
            .and_then(|days| date.checked_add_days(Days::new(days))),
        TimeUnit::Month => u32::try_from(n)
            .ok()
            .and_then(|months| date.checked_add_months(Months::new(months))),
        TimeUnit::Year => n
            .checked_mul(MONTHS_PER_YEAR)
            .and_then(|months| u32::try_from(months).ok())
            .and_then(|months| date.checked_add_months(Months::new(months))),
    }
    .ok_or_else(out_of_range)
}

/// Applies years, then months, then days, in that fixed order.
pub fn add_calendar(
    date: NaiveDate,
    years: u32,
    months: u32,
    days: u32,
) -> Result<NaiveDate, CalendarError> {
    let shifted = add_unit(date, u64::from(years), TimeUnit::Year)?;
    let shifted = add_unit(shifted, u64::from(months), TimeUnit::Month)?;
    add_unit(shifted, u64::from(days), TimeUnit::Day)
}

/// Counts whole units between `anchor` and `now`.
///
/// Returns 0 when `now` is not after `anchor`. For month/year the result is
/// the largest `n` with `add_unit(anchor, n, unit) <= now`.
pub fn elapsed_units(anchor: NaiveDate, now: NaiveDate, unit: TimeUnit) -> u64 {
    if now <= anchor {
        return 0;
    }
    let days = u64::try_from((now - anchor).num_days()).unwrap_or(0);

    match unit {
        TimeUnit::Hour => days.saturating_mul(HOURS_PER_DAY),
        TimeUnit::Day => days,
        TimeUnit::Week => days / DAYS_PER_WEEK,
        TimeUnit::Month => {
            let estimate = i64::from(now.year() - anchor.year()) * 12
                + i64::from(now.month()) - i64::from(anchor.month());
            settle_estimate(anchor, now, u64::try_from(estimate).unwrap_or(0), unit)
        }
        TimeUnit::Year => {
            let estimate = i64::from(now.year() - anchor.year());
            settle_estimate(anchor, now, u64::try_from(estimate).unwrap_or(0), unit)
        }
    }
}

/// Greedy largest-unit-first breakdown of the distance from `anchor` to
/// `target`.
///
/// A `target` at or before `anchor` decomposes to the zero breakdown.
pub fn decompose_calendar(
    anchor: NaiveDate,
    target: NaiveDate,
) -> Result<CalendarBreakdown, CalendarError> {
    if target <= anchor {
        return Ok(CalendarBreakdown::default());
    }

    let years = elapsed_units(anchor, target, TimeUnit::Year);
    let after_years = add_unit(anchor, years, TimeUnit::Year)?;
    let months = elapsed_units(after_years, target, TimeUnit::Month);
    let after_months = add_unit(after_years, months, TimeUnit::Month)?;
    let days = elapsed_units(after_months, target, TimeUnit::Day);

    Ok(CalendarBreakdown {
        years: saturate_u32(years),
        months: saturate_u32(months),
        days: saturate_u32(days),
    })
}

// The calendar estimate overshoots by at most one when the anchor's
// day-of-month has not been reached yet in the final month.
fn settle_estimate(anchor: NaiveDate, now: NaiveDate, estimate: u64, unit: TimeUnit) -> u64 {
    let overshoots = add_unit(anchor, estimate, unit).map_or(true, |date| date > now);
    if overshoots {
        estimate.saturating_sub(1)
    } else {
        estimate
    }
}

fn saturate_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{add_calendar, add_unit, decompose_calendar, elapsed_units};
    use crate::calendar::{CalendarBreakdown, CalendarError, TimeUnit};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn add_month_clamps_to_leap_february() {
        assert_eq!(
            add_unit(date(2020, 1, 31), 1, TimeUnit::Month).unwrap(),
            date(2020, 2, 29)
        );
        assert_eq!(
            add_unit(date(2021, 1, 31), 1, TimeUnit::Month).unwrap(),
            date(2021, 2, 28)
        );
    }

    #[test]
    fn add_year_from_leap_day_clamps() {
        assert_eq!(
            add_unit(date(2020, 2, 29), 1, TimeUnit::Year).unwrap(),
            date(2021, 2, 28)
        );
        assert_eq!(
            add_unit(date(2020, 2, 29), 4, TimeUnit::Year).unwrap(),
            date(2024, 2, 29)
        );
    }

    #[test]
    fn hours_collapse_to_whole_days() {
        assert_eq!(
            add_unit(date(2020, 1, 1), 23, TimeUnit::Hour).unwrap(),
            date(2020, 1, 1)
        );
        assert_eq!(
            add_unit(date(2020, 1, 1), 48, TimeUnit::Hour).unwrap(),
            date(2020, 1, 3)
        );
        assert_eq!(
            add_unit(date(2020, 1, 1), 2, TimeUnit::Week).unwrap(),
            date(2020, 1, 15)
        );
    }

    #[test]
    fn add_unit_reports_out_of_range() {
        let err = add_unit(date(2020, 1, 1), u64::MAX, TimeUnit::Day).unwrap_err();
        assert!(matches!(
            err,
            CalendarError::OutOfRange {
                unit: TimeUnit::Day,
                ..
            }
        ));
        assert!(add_unit(date(2020, 1, 1), u64::MAX, TimeUnit::Year).is_err());
    }

    #[test]
    fn add_calendar_applies_years_then_months_then_days() {
        // Leap day + 1 year clamps to Feb 28 before months are applied.
        assert_eq!(
            add_calendar(date(2020, 2, 29), 1, 1, 1).unwrap(),
            date(2021, 3, 29)
        );
        assert_eq!(
            add_calendar(date(2020, 1, 31), 0, 1, 1).unwrap(),
            date(2020, 3, 1)
        );
    }

    #[test]
    fn elapsed_units_counts_whole_units() {
        let anchor = date(2020, 1, 31);
        assert_eq!(elapsed_units(anchor, date(2020, 2, 28), TimeUnit::Month), 0);
        assert_eq!(elapsed_units(anchor, date(2020, 2, 29), TimeUnit::Month), 1);
        assert_eq!(elapsed_units(anchor, date(2021, 1, 30), TimeUnit::Year), 0);
        assert_eq!(elapsed_units(anchor, date(2021, 1, 31), TimeUnit::Year), 1);
        assert_eq!(elapsed_units(anchor, date(2020, 2, 1), TimeUnit::Hour), 24);
        assert_eq!(elapsed_units(anchor, date(2020, 2, 14), TimeUnit::Week), 2);
    }

    #[test]
    fn elapsed_units_is_zero_for_non_positive_spans() {
        let anchor = date(2020, 6, 1);
        for unit in TimeUnit::ALL {
            assert_eq!(elapsed_units(anchor, anchor, unit), 0);
            assert_eq!(elapsed_units(anchor, date(2019, 1, 1), unit), 0);
        }
    }

    #[test]
    fn decompose_inverts_add_calendar_for_canonical_tuples() {
        let anchor = date(2019, 8, 17);
        for years in 0..4 {
            for months in 0..12 {
                for days in [0, 1, 9, 27] {
                    let target = add_calendar(anchor, years, months, days).unwrap();
                    let breakdown = decompose_calendar(anchor, target).unwrap();
                    assert_eq!(breakdown, CalendarBreakdown::new(years, months, days));
                }
            }
        }
    }

    #[test]
    fn decompose_round_trips_target_even_for_non_canonical_input() {
        let anchor = date(2020, 1, 31);
        let target = add_calendar(anchor, 0, 0, 400).unwrap();
        let breakdown = decompose_calendar(anchor, target).unwrap();
        assert_eq!(
            add_calendar(anchor, breakdown.years, breakdown.months, breakdown.days).unwrap(),
            target
        );
        assert_eq!(breakdown.years, 1);
    }

    #[test]
    fn decompose_of_past_target_is_zero() {
        let breakdown = decompose_calendar(date(2020, 1, 1), date(2019, 1, 1)).unwrap();
        assert!(breakdown.is_zero());
    }
}
