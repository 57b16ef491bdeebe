//! CF time decoding for model calendars.
//!
//! Model output uses CF time coordinates: numeric offsets plus a `units`
//! attribute (`days since 0001-01-01 00:00:00`) and a `calendar` attribute.
//! Only dates are needed here (year and month drive the climatology), so
//! decoding stops at day resolution.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::model::ClimatologyError;

const SECONDS_PER_DAY: f64 = 86_400.0;

const CUM_DAYS_NOLEAP: [u32; 13] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];
const CUM_DAYS_LEAP: [u32; 13] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335, 366];

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

/// CF calendars.
///
/// `standard` and `gregorian` are decoded as proleptic Gregorian; model
/// output evaluated by PMP starts well after 1582.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calendar {
    Gregorian,
    NoLeap,
    AllLeap,
    Day360,
}

impl FromStr for Calendar {
    type Err = ClimatologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" | "proleptic_gregorian" | "" => Ok(Calendar::Gregorian),
            "noleap" | "365_day" => Ok(Calendar::NoLeap),
            "all_leap" | "366_day" => Ok(Calendar::AllLeap),
            "360_day" => Ok(Calendar::Day360),
            other => Err(ClimatologyError::UnsupportedCalendar(other.to_string())),
        }
    }
}

/// A calendar date, valid in the calendar it was decoded with (so
/// `0001-02-30` is a legal `360_day` date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        CalendarDate { year, month, day }
    }

    /// `YYYYMM`, as used in the climatology time-range string.
    pub fn year_month(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl Calendar {
    /// Days elapsed from `0001-01-01` to `date`.
    fn day_number(&self, date: CalendarDate) -> Result<i64, ClimatologyError> {
        let y = i64::from(date.year) - 1;
        let (m, d) = (date.month as usize, i64::from(date.day));
        if !(1..=12).contains(&m) {
            return Err(ClimatologyError::UnsupportedUnits(format!("month {} in {}", m, date)));
        }
        match self {
            Calendar::Gregorian => NaiveDate::from_ymd_opt(date.year, date.month, date.day)
                .map(|nd| i64::from(nd.num_days_from_ce()) - 1)
                .ok_or_else(|| ClimatologyError::UnsupportedUnits(format!("invalid date {}", date))),
            Calendar::NoLeap => Ok(y * 365 + i64::from(CUM_DAYS_NOLEAP[m - 1]) + d - 1),
            Calendar::AllLeap => Ok(y * 366 + i64::from(CUM_DAYS_LEAP[m - 1]) + d - 1),
            Calendar::Day360 => Ok(y * 360 + (m as i64 - 1) * 30 + d - 1),
        }
    }

    /// Inverse of `day_number`.
    fn date_from_day_number(&self, n: i64) -> Result<CalendarDate, ClimatologyError> {
        let from_table = |n: i64, year_len: i64, table: &[u32; 13]| {
            let year = n.div_euclid(year_len) + 1;
            let doy = n.rem_euclid(year_len) as u32;
            let month = (1..=12).find(|&m| doy < table[m]).unwrap_or(12);
            CalendarDate::new(year as i32, month as u32, doy - table[month - 1] + 1)
        };
        match self {
            Calendar::Gregorian => {
                let days = i32::try_from(n + 1)
                    .map_err(|_| ClimatologyError::UnsupportedUnits(format!("day {} out of range", n)))?;
                NaiveDate::from_num_days_from_ce_opt(days)
                    .map(|nd| CalendarDate::new(nd.year(), nd.month(), nd.day()))
                    .ok_or_else(|| ClimatologyError::UnsupportedUnits(format!("day {} out of range", n)))
            }
            Calendar::NoLeap => Ok(from_table(n, 365, &CUM_DAYS_NOLEAP)),
            Calendar::AllLeap => Ok(from_table(n, 366, &CUM_DAYS_LEAP)),
            Calendar::Day360 => {
                let year = n.div_euclid(360) + 1;
                let doy = n.rem_euclid(360);
                Ok(CalendarDate::new(year as i32, (doy / 30 + 1) as u32, (doy % 30 + 1) as u32))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Parsed CF time units: an offset scale and a reference instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    pub seconds_per_unit: f64,
    pub epoch: CalendarDate,
    /// Time of day of the reference instant, in seconds.
    pub epoch_seconds: f64,
}

impl FromStr for TimeUnits {
    type Err = ClimatologyError;

    fn from_str(units: &str) -> Result<Self, Self::Err> {
        let bad = || ClimatologyError::UnsupportedUnits(units.to_string());

        let (scale, reference) = units.split_once(" since ").ok_or_else(bad)?;
        let seconds_per_unit = match scale.trim().to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => SECONDS_PER_DAY,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3_600.0,
            "minutes" | "minute" | "mins" | "min" => 60.0,
            "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
            _ => return Err(bad()),
        };

        let reference = reference.trim();
        let (date_part, time_part) = match reference.split_once(['T', ' ']) {
            Some((d, t)) => (d, Some(t.trim())),
            None => (reference, None),
        };

        let mut fields = date_part.splitn(3, '-');
        let mut next = || -> Result<i64, ClimatologyError> {
            fields.next().and_then(|f| f.parse().ok()).ok_or_else(bad)
        };
        let epoch = CalendarDate::new(next()? as i32, next()? as u32, next()? as u32);

        let epoch_seconds = match time_part {
            Some(t) if !t.is_empty() => {
                let clock = t.split([' ', 'Z', '+']).next().unwrap_or_default();
                clock
                    .split(':')
                    .zip([3_600.0, 60.0, 1.0])
                    .map(|(part, scale)| part.parse::<f64>().map(|v| v * scale))
                    .sum::<Result<f64, _>>()
                    .map_err(|_| bad())?
            }
            _ => 0.0,
        };

        Ok(TimeUnits {
            seconds_per_unit,
            epoch,
            epoch_seconds,
        })
    }
}

/// Decodes numeric time offsets into calendar dates.
pub fn decode_times(
    values: &[f64],
    units: &str,
    calendar: &str,
) -> Result<Vec<CalendarDate>, ClimatologyError> {
    let units: TimeUnits = units.parse()?;
    let calendar: Calendar = calendar.parse()?;
    let epoch_day = calendar.day_number(units.epoch)?;

    values
        .iter()
        .map(|&offset| {
            let seconds = offset * units.seconds_per_unit + units.epoch_seconds;
            let days = (seconds / SECONDS_PER_DAY).floor() as i64;
            calendar.date_from_day_number(epoch_day + days)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units_with_time_of_day() {
        let u: TimeUnits = "days since 1850-01-01 00:00:00".parse().unwrap();
        assert_eq!(u.seconds_per_unit, 86_400.0);
        assert_eq!(u.epoch, CalendarDate::new(1850, 1, 1));
        assert_eq!(u.epoch_seconds, 0.0);

        let u: TimeUnits = "hours since 1979-1-1T12:00:00Z".parse().unwrap();
        assert_eq!(u.seconds_per_unit, 3_600.0);
        assert_eq!(u.epoch, CalendarDate::new(1979, 1, 1));
        assert_eq!(u.epoch_seconds, 43_200.0);
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        assert!("fortnights since 1850-01-01".parse::<TimeUnits>().is_err());
        assert!("days after 1850-01-01".parse::<TimeUnits>().is_err());
        assert!("unknown".parse::<Calendar>().is_err());
    }

    #[test]
    fn test_noleap_mid_month_offsets() {
        // GFDL monthly means are stamped mid-month in a noleap calendar.
        let dates = decode_times(&[15.5, 45.0, 364.5, 365.0 + 15.5], "days since 0001-01-01 00:00:00", "noleap")
            .unwrap();
        assert_eq!(dates[0], CalendarDate::new(1, 1, 16));
        assert_eq!(dates[1], CalendarDate::new(1, 2, 15));
        assert_eq!(dates[2], CalendarDate::new(1, 12, 31));
        assert_eq!(dates[3], CalendarDate::new(2, 1, 16));
    }

    #[test]
    fn test_gregorian_leap_years() {
        let dates = decode_times(&[59.0, 60.0], "days since 2000-01-01", "standard").unwrap();
        assert_eq!(dates[0], CalendarDate::new(2000, 2, 29));
        assert_eq!(dates[1], CalendarDate::new(2000, 3, 1));
    }

    #[test]
    fn test_360_day_calendar() {
        let dates = decode_times(&[59.0, 360.0], "days since 1980-01-01", "360_day").unwrap();
        assert_eq!(dates[0], CalendarDate::new(1980, 2, 30));
        assert_eq!(dates[1], CalendarDate::new(1981, 1, 1));
    }

    #[test]
    fn test_year_month_is_zero_padded() {
        assert_eq!(CalendarDate::new(1, 3, 16).year_month(), "000103");
        assert_eq!(CalendarDate::new(1980, 12, 16).year_month(), "198012");
    }
}
