use std::fmt;

use chrono::{DateTime, Local, TimeZone};

pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Second-resolution local time, e.g. `20241217093005`. Sorts as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunTimestamp(String);

impl RunTimestamp {
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn from_datetime<Tz: TimeZone>(at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(at.format(RUN_TIMESTAMP_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait Clock {
    fn now(&self) -> RunTimestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> RunTimestamp {
        RunTimestamp::now()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDateTime, TimeZone, Utc};

    use super::{RunTimestamp, RUN_TIMESTAMP_FORMAT};

    #[test]
    fn formats_to_fourteen_sortable_digits() -> anyhow::Result<()> {
        let earlier = Utc.with_ymd_and_hms(2024, 12, 17, 9, 30, 5).single();
        let later = Utc.with_ymd_and_hms(2024, 12, 17, 9, 30, 6).single();
        let (Some(earlier), Some(later)) = (earlier, later) else {
            anyhow::bail!("invalid test dates");
        };

        let first = RunTimestamp::from_datetime(&earlier);
        let second = RunTimestamp::from_datetime(&later);
        assert_eq!(first.as_str(), "20241217093005");
        assert_eq!(second.to_string(), "20241217093006");
        assert!(first < second);
        Ok(())
    }

    #[test]
    fn now_round_trips_through_the_format() -> anyhow::Result<()> {
        let stamp = RunTimestamp::now();
        NaiveDateTime::parse_from_str(stamp.as_str(), RUN_TIMESTAMP_FORMAT)?;
        Ok(())
    }
}
