use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::{Error, Result};

/// 5-field cron expression: "min hour dom month dow", evaluated in UTC.
///
/// Per field: `*`, `N`, `A-B`, `*/S`, `A-B/S` and comma lists of those. Day of week
/// accepts 0-7 with both 0 and 7 meaning Sunday. When both day fields are
/// restricted a time matches if either one does, as in classic cron.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minute: FieldSet,
    hour: FieldSet,
    day_of_month: FieldSet,
    month: FieldSet,
    day_of_week: FieldSet,
}

/// Allowed values as a bitmask; every field's range fits in 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet {
    bits: u64,
    wildcard: bool,
}

impl FieldSet {
    fn contains(&self, v: u32) -> bool {
        v < 64 && self.bits & (1u64 << v) != 0
    }
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(Error::InvalidInput(format!(
                "cron expression '{expr}' must have 5 fields: min hour dom month dow"
            )));
        };

        let mut day_of_week = parse_field(dow, 0, 7)?;
        if day_of_week.contains(7) {
            day_of_week.bits = (day_of_week.bits & !(1u64 << 7)) | 1;
        }

        Ok(Self {
            source: fields.join(" "),
            minute: parse_field(minute, 0, 59)?,
            hour: parse_field(hour, 0, 23)?,
            day_of_month: parse_field(dom, 1, 31)?,
            month: parse_field(month, 1, 12)?,
            day_of_week,
        })
    }

    pub fn matches(&self, t: DateTime<Utc>) -> bool {
        if !(self.minute.contains(t.minute())
            && self.hour.contains(t.hour())
            && self.month.contains(t.month()))
        {
            return false;
        }
        let dom = self.day_of_month.contains(t.day());
        let dow = self
            .day_of_week
            .contains(t.weekday().num_days_from_sunday());
        match (self.day_of_month.wildcard, self.day_of_week.wildcard) {
            (true, true) => true,
            (false, true) => dom,
            (true, false) => dow,
            (false, false) => dom || dow,
        }
    }

    /// First matching minute boundary strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let truncated = after
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .ok_or_else(|| Error::InvalidInput(format!("cannot truncate {after} to a minute")))?;
        let mut t = truncated + Duration::minutes(1);

        // Four years covers every satisfiable schedule, Feb 29 included.
        let horizon = t + Duration::days(4 * 366);
        while t <= horizon {
            if !self.month.contains(t.month()) {
                t = start_of_next_month(t)?;
                continue;
            }
            if self.matches(t) {
                return Ok(t);
            }
            t += Duration::minutes(1);
        }
        Err(Error::InvalidInput(format!(
            "cron expression '{}' never fires",
            self.source
        )))
    }

    /// How long to sleep from `now` until the next firing.
    pub fn until_next(&self, now: DateTime<Utc>) -> Result<std::time::Duration> {
        let next = self.next_after(now)?;
        Ok((next - now).to_std().unwrap_or_default())
    }
}

impl FromStr for CronExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn start_of_next_month(t: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    chrono::NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .ok_or_else(|| Error::InvalidInput(format!("no month after {t}")))
}

fn parse_field(token: &str, min: u32, max: u32) -> Result<FieldSet> {
    let mut set = FieldSet {
        bits: 0,
        wildcard: token == "*",
    };
    for part in token.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s
                    .parse()
                    .map_err(|_| Error::InvalidInput(format!("invalid cron step '{part}'")))?;
                if step == 0 {
                    return Err(Error::InvalidInput(format!("cron step must be > 0 in '{part}'")));
                }
                (r, step)
            }
            None => (part, 1),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, min, max)?, parse_value(b, min, max)?)
        } else {
            let v = parse_value(range, min, max)?;
            // `N/S` means N through the field maximum.
            if step > 1 {
                (v, max)
            } else {
                (v, v)
            }
        };
        if start > end {
            return Err(Error::InvalidInput(format!("cron range '{range}' is reversed")));
        }

        let mut v = start;
        while v <= end {
            set.bits |= 1u64 << v;
            v += step;
        }
    }
    Ok(set)
}

fn parse_value(s: &str, min: u32, max: u32) -> Result<u32> {
    let v: u32 = s
        .parse()
        .map_err(|_| Error::InvalidInput(format!("invalid cron value '{s}'")))?;
    if v < min || v > max {
        return Err(Error::InvalidInput(format!(
            "cron value {v} out of range {min}..={max}"
        )));
    }
    Ok(v)
}
