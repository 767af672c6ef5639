//! Player snapshot model as served by the federation member API.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One player as returned by the upstream `player` endpoints.
///
/// The JSON shape matches the upstream payload so cached rows can be replayed
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: i32,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    #[serde(default)]
    pub sex: i32,
    #[serde(rename = "fideid", default, skip_serializing_if = "Option::is_none")]
    pub fide_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elo: Option<EloRating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lask: Option<LaskRating>,
}

/// FIDE ratings across the three time controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EloRating {
    #[serde(default)]
    pub rating: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, with = "flexible_date", skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rapid_rating: Option<i32>,
    #[serde(rename = "rapidk", default, skip_serializing_if = "Option::is_none")]
    pub rapid_k: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blitz_rating: Option<i32>,
    #[serde(rename = "blitzK", default, skip_serializing_if = "Option::is_none")]
    pub blitz_k: Option<i32>,
}

/// Swedish national (LASK) rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaskRating {
    #[serde(default)]
    pub rating: i32,
    #[serde(default, with = "flexible_date", skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// Scalar columns stored next to the JSON payload for auxiliary lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenormalizedFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub club: Option<String>,
    pub club_id: Option<i32>,
    pub fide_id: Option<i32>,
    pub elo_standard: Option<i32>,
    pub elo_rapid: Option<i32>,
    pub elo_blitz: Option<i32>,
    pub lask_rating: Option<i32>,
}

impl PlayerInfo {
    /// FIDE id, if the upstream reported a real one.
    pub fn fide_id(&self) -> Option<i32> {
        self.fide_id.filter(|id| *id > 0)
    }

    pub fn denormalized(&self) -> DenormalizedFields {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        DenormalizedFields {
            first_name: non_empty(self.first_name.as_str()),
            last_name: non_empty(self.last_name.as_str()),
            club: self.club.as_deref().and_then(non_empty),
            club_id: self.club_id,
            fide_id: self.fide_id(),
            elo_standard: self.elo.as_ref().map(|e| e.rating),
            elo_rapid: self.elo.as_ref().and_then(|e| e.rapid_rating),
            elo_blitz: self.elo.as_ref().and_then(|e| e.blitz_rating),
            lask_rating: self.lask.as_ref().map(|l| l.rating),
        }
    }
}

/// Parse the date formats the upstream emits: RFC 3339, a naive
/// `YYYY-MM-DDTHH:MM:SS` (read as UTC) or a bare `YYYY-MM-DD`.
pub fn parse_upstream_date(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.and_utc())
        })
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
        })
}

mod flexible_date {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse_upstream_date(s).map(Some).map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upstream_body() -> serde_json::Value {
        json!({
            "id": 12345,
            "firstName": "Magnus",
            "lastName": "Carlsen",
            "birthdate": "1990",
            "sex": 1,
            "fideid": 1503014,
            "country": "NOR",
            "club": "Stockholms SS",
            "clubId": 101,
            "elo": {
                "rating": 2830,
                "title": "GM",
                "date": "2024-06-01",
                "k": 10,
                "rapidRating": 2800,
                "rapidk": 10,
                "blitzRating": 2850,
                "blitzK": 10
            },
            "lask": { "rating": 2450, "date": "2024-06-01T10:00:00" }
        })
    }

    #[test]
    fn test_parses_upstream_payload() {
        let player: PlayerInfo = serde_json::from_value(upstream_body()).unwrap();
        assert_eq!(player.id, 12345);
        assert_eq!(player.fide_id, Some(1503014));
        let elo = player.elo.as_ref().unwrap();
        assert_eq!(elo.rapid_k, Some(10));
        assert_eq!(elo.date.unwrap().to_rfc3339(), "2024-06-01T00:00:00+00:00");
        assert_eq!(
            player.lask.as_ref().unwrap().date.unwrap().to_rfc3339(),
            "2024-06-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_serialization_keeps_upstream_field_names() {
        let player: PlayerInfo = serde_json::from_value(upstream_body()).unwrap();
        let value = serde_json::to_value(&player).unwrap();
        assert_eq!(value["fideid"], 1503014);
        assert_eq!(value["clubId"], 101);
        assert_eq!(value["elo"]["rapidk"], 10);
        assert_eq!(value["elo"]["blitzK"], 10);
        assert_eq!(value["elo"]["date"], "2024-06-01T00:00:00Z");
    }

    #[test]
    fn test_empty_and_missing_dates_are_none() {
        let player: PlayerInfo = serde_json::from_value(json!({
            "id": 7,
            "firstName": "A",
            "lastName": "B",
            "lask": { "rating": 1500, "date": "" },
            "elo": { "rating": 1600, "date": null }
        }))
        .unwrap();
        assert_eq!(player.lask.unwrap().date, None);
        assert_eq!(player.elo.unwrap().date, None);
    }

    #[test]
    fn test_unparseable_date_is_rejected() {
        let result: Result<PlayerInfo, _> = serde_json::from_value(json!({
            "id": 7,
            "lask": { "rating": 1500, "date": "June 2024" }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_upstream_date_accepts_offsets() {
        let dt = parse_upstream_date("2025-01-22T10:00:00+01:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-22T09:00:00+00:00");
    }

    #[test]
    fn test_denormalized_fields() {
        let player: PlayerInfo = serde_json::from_value(upstream_body()).unwrap();
        let fields = player.denormalized();
        assert_eq!(fields.first_name.as_deref(), Some("Magnus"));
        assert_eq!(fields.fide_id, Some(1503014));
        assert_eq!(fields.elo_standard, Some(2830));
        assert_eq!(fields.elo_rapid, Some(2800));
        assert_eq!(fields.elo_blitz, Some(2850));
        assert_eq!(fields.lask_rating, Some(2450));
    }

    #[test]
    fn test_zero_fide_id_is_not_denormalized() {
        let player: PlayerInfo =
            serde_json::from_value(json!({ "id": 1, "fideid": 0, "club": "" })).unwrap();
        let fields = player.denormalized();
        assert_eq!(fields.fide_id, None);
        assert_eq!(fields.club, None);
        assert_eq!(fields.first_name, None);
    }
}
