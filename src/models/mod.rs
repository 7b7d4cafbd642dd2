//! Domain model module declarations.

pub mod shift;
pub mod state;
pub mod task;

/// Serde adapter for time-of-day values written as `HH:MM` or `HH:MM:SS`.
pub(crate) mod time_of_day {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const SHORT: &str = "%H:%M";
    const LONG: &str = "%H:%M:%S";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&time.format(LONG))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| {
            de::Error::custom(format!("invalid time of day `{raw}`, expected HH:MM"))
        })
    }

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let trimmed = raw.trim();
        NaiveTime::parse_from_str(trimmed, SHORT)
            .or_else(|_| NaiveTime::parse_from_str(trimmed, LONG))
            .ok()
    }
}
