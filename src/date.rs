use chrono::{DateTime, TimeZone, Utc};
use serde::{self, Deserialize, Deserializer};

fn from_millis<E: serde::de::Error>(t: i64) -> Result<DateTime<Utc>, E> {
    Utc.timestamp_millis_opt(t)
        .single()
        .ok_or_else(|| E::custom(format!("timestamp out of range: {}", t)))
}

// The signature of a deserialize_with function must follow the pattern:
//
//    fn deserialize<'de, D>(D) -> Result<T, D::Error>
//    where
//        D: Deserializer<'de>
//
// although it may also be generic over the output types T.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    // NOTE:
    // elasticsearch cat api return creation_date as String not integer, we need
    // to convert to i64, then to a DateTime
    let t = s.parse::<i64>().map_err(serde::de::Error::custom)?;
    from_millis(t)
}

/// `*_in_millis` fields of the `_snapshot` api. A running snapshot reports
/// `end_time_in_millis` as 0 or leaves it out.
pub mod optional_millis {
    use super::*;

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<i64>::deserialize(deserializer)? {
            None | Some(0) => Ok(None),
            Some(t) => from_millis(t).map(Some),
        }
    }
}
