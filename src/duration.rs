//! Duration parsing for config values like `"30s"`, `"5m"` or a bare `30`.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer, Serializer};

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Parse a duration string.
///
/// Accepts a number followed by `d`, `h`, `m` or `s`, or a bare number of
/// seconds. Case-insensitive; surrounding whitespace is ignored.
///
/// ```
/// use coinbook::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
/// assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_ascii_lowercase();
    if s.is_empty() {
        anyhow::bail!("Duration is empty");
    }

    let split_at = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(split_at);

    let num: u64 = num
        .parse()
        .with_context(|| format!("Invalid number in duration {s:?}"))?;

    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => SECS_PER_MINUTE,
        "h" => SECS_PER_HOUR,
        "d" => SECS_PER_DAY,
        other => anyhow::bail!("Unknown duration unit {other:?} (expected d, h, m or s)"),
    };

    let secs = num
        .checked_mul(multiplier)
        .context("Duration is too large")?;

    Ok(Duration::from_secs(secs))
}

/// Render a duration using the largest unit that divides it evenly.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= SECS_PER_DAY && secs % SECS_PER_DAY == 0 {
        format!("{}d", secs / SECS_PER_DAY)
    } else if secs >= SECS_PER_HOUR && secs % SECS_PER_HOUR == 0 {
        format!("{}h", secs / SECS_PER_HOUR)
    } else if secs >= SECS_PER_MINUTE && secs % SECS_PER_MINUTE == 0 {
        format!("{}m", secs / SECS_PER_MINUTE)
    } else {
        format!("{secs}s")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn into_duration(self) -> Result<Duration> {
        match self {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
            RawDuration::Text(text) => parse_duration(&text),
        }
    }
}

/// Serde deserializer accepting either an integer number of seconds or a
/// duration string.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    RawDuration::deserialize(deserializer)?
        .into_duration()
        .map_err(de::Error::custom)
}

/// Optional variant of [`deserialize_duration`].
pub fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawDuration>::deserialize(deserializer)?
        .map(RawDuration::into_duration)
        .transpose()
        .map_err(de::Error::custom)
}

/// Serialize a duration as its [`format_duration`] string.
pub fn serialize_duration<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*d))
}

pub fn serialize_duration_opt<S>(d: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match d {
        Some(d) => serializer.serialize_some(&format_duration(*d)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units_and_bare_seconds() {
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(2 * 86400));
    }

    #[test]
    fn parse_is_case_and_whitespace_insensitive() {
        assert_eq!(parse_duration("  5M ").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1H").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("5w").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("1.5h").is_err());
    }

    #[test]
    fn rejects_overflow() {
        assert!(parse_duration(&format!("{}d", u64::MAX)).is_err());
    }

    #[test]
    fn format_picks_largest_even_unit() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_secs(86400)), "1d");
    }

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "deserialize_duration")]
        ttl: Duration,
        #[serde(default, deserialize_with = "deserialize_duration_opt")]
        timeout: Option<Duration>,
    }

    #[test]
    fn deserializes_integer_or_string() {
        let h: Holder = toml::from_str("ttl = 30").unwrap();
        assert_eq!(h.ttl, Duration::from_secs(30));
        assert_eq!(h.timeout, None);

        let h: Holder = toml::from_str("ttl = \"2m\"\ntimeout = \"10s\"").unwrap();
        assert_eq!(h.ttl, Duration::from_secs(120));
        assert_eq!(h.timeout, Some(Duration::from_secs(10)));
    }
}
