use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

// -------------------------------------------------------------------------------------------------
// DateParseError
// -------------------------------------------------------------------------------------------------
#[derive(Debug, thiserror::Error)]
#[error("invalid datetime {input:?}: expected YYYY-MM-DD [HH[:MM[:SS]]]")]
pub struct DateParseError {
    input: String,
}

/// Parse a datetime in `YYYY-MM-DD [HH[:MM[:SS]]]` format, interpreted as UTC.
///
/// Omitted time components default to zero.
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    let err = || DateParseError { input: input.to_string() };

    let mut parts = input.trim().splitn(2, ' ');
    let date = parts.next().ok_or_else(err)?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| err())?;

    let time = match parts.next().map(str::trim) {
        None | Some("") => NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(err)?,
        Some(time) => {
            let fields = time
                .split(':')
                .map(|f| f.parse::<u32>().map_err(|_| err()))
                .collect::<Result<Vec<u32>, _>>()?;
            match fields.as_slice() {
                [h] => NaiveTime::from_hms_opt(*h, 0, 0),
                [h, m] => NaiveTime::from_hms_opt(*h, *m, 0),
                [h, m, s] => NaiveTime::from_hms_opt(*h, *m, *s),
                _ => None,
            }
            .ok_or_else(err)?
        }
    };

    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

// -------------------------------------------------------------------------------------------------
// DateBounds
// -------------------------------------------------------------------------------------------------
/// An optional window of committer dates.
///
/// Both bounds are exclusive: a commit is inside the window if it was committed strictly after
/// `after` and strictly before `before`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DateBounds {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl DateBounds {
    pub fn new(after: Option<DateTime<Utc>>, before: Option<DateTime<Utc>>) -> Self {
        DateBounds { after, before }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: &DateTime<FixedOffset>) -> bool {
        self.after.map_or(true, |after| *date > after)
            && self.before.map_or(true, |before| *date < before)
    }

    pub fn is_unbounded(&self) -> bool {
        self.after.is_none() && self.before.is_none()
    }
}

impl std::fmt::Display for DateBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.after, self.before) {
            (None, None) => write!(f, "all dates"),
            (Some(a), None) => write!(f, "after {a}"),
            (None, Some(b)) => write!(f, "before {b}"),
            (Some(a), Some(b)) => write!(f, "after {a} and before {b}"),
        }
    }
}
