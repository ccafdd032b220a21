use std::fmt;

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Local wall-clock format shared by every persisted file.
pub const STAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

// Current local time truncated to whole seconds, the resolution the files keep.
pub fn now_stamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn format_stamp(ts: &NaiveDateTime) -> String {
    ts.format(STAMP_FMT).to_string()
}

pub fn parse_stamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), STAMP_FMT).ok()
}

// "2024-03-01T10:00:00Z" -> "2024-03-01"
pub fn date_part(created_at: &str) -> &str {
    created_at.split('T').next().unwrap_or(created_at)
}

/// A stamp read back from a hand-editable table. Text that does not parse is
/// kept verbatim and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stamp {
    At(NaiveDateTime),
    Raw(String),
}

impl From<NaiveDateTime> for Stamp {
    fn from(ts: NaiveDateTime) -> Self {
        Stamp::At(ts)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stamp::At(ts) => write!(f, "{}", ts.format(STAMP_FMT)),
            Stamp::Raw(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for Stamp {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Stamp {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(match parse_stamp(&raw) {
            Some(ts) => Stamp::At(ts),
            None => Stamp::Raw(raw),
        })
    }
}

/// serde adapter for `NaiveDateTime` fields stored as `%Y-%m-%d %H:%M:%S`.
pub mod stamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_stamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_stamp(&raw).ok_or_else(|| D::Error::custom(format!("bad timestamp: {raw}")))
    }
}

/// Same as [`stamp`] for optional fields; `null` round-trips as `None`.
pub mod stamp_opt {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_some(&super::format_stamp(ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw {
            None => Ok(None),
            Some(s) => super::parse_stamp(&s)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("bad timestamp: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_part_strips_time_component() {
        assert_eq!(date_part("2024-03-01T10:00:00Z"), "2024-03-01");
        assert_eq!(date_part("2024-03-01"), "2024-03-01");
    }

    #[test]
    fn stamp_parses_what_it_formats() {
        let ts = parse_stamp("2024-05-06 07:08:09").unwrap();
        assert_eq!(format_stamp(&ts), "2024-05-06 07:08:09");
        assert!(parse_stamp("2024-05-06T07:08:09Z").is_none());
    }

    #[test]
    fn unparsable_stamp_is_kept_verbatim() {
        let s: Stamp = serde_json::from_str("\"sometime last week\"").unwrap();
        assert_eq!(s, Stamp::Raw("sometime last week".into()));
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"sometime last week\"");

        let s: Stamp = serde_json::from_str("\"2024-05-06 07:08:09\"").unwrap();
        assert_eq!(s, Stamp::At(parse_stamp("2024-05-06 07:08:09").unwrap()));
        assert_eq!(s.to_string(), "2024-05-06 07:08:09");
    }
}
