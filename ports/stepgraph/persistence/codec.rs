/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! JSON encoding shared with the browser's local storage.
//!
//! Dates do not survive a plain JSON round trip, so they are written as
//! `{"__type": "Date", "value": "<ISO-8601>"}` and revived on load.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

const TYPE_KEY: &str = "__type";
const VALUE_KEY: &str = "value";
const DATE_TAG: &str = "Date";

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn format_iso(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_iso(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|d| d.with_timezone(&Utc))
}

/// The tagged JSON form of a date
pub fn tag_date(date: &DateTime<Utc>) -> Value {
    let mut object = serde_json::Map::new();
    object.insert(TYPE_KEY.to_string(), Value::String(DATE_TAG.to_string()));
    object.insert(VALUE_KEY.to_string(), Value::String(format_iso(date)));
    Value::Object(object)
}

/// Read a tagged date, if `value` is one
pub fn read_tagged_date(value: &Value) -> Option<DateTime<Utc>> {
    let object = value.as_object()?;
    if object.get(TYPE_KEY)?.as_str()? != DATE_TAG {
        return None;
    }
    parse_iso(object.get(VALUE_KEY)?.as_str()?).ok()
}

/// Tag the timestamp strings held under any of the object keys in
/// `date_fields`, at any depth. Every other string is left untouched, as are
/// date-field values that do not parse as ISO-8601.
pub fn tag_dates(value: &mut Value, date_fields: &[&str]) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(|item| tag_dates(item, date_fields)),
        Value::Object(object) => {
            for (key, field) in object.iter_mut() {
                let date = match field {
                    Value::String(raw) if date_fields.contains(&key.as_str()) => parse_iso(raw).ok(),
                    _ => None,
                };
                match date {
                    Some(date) => *field = tag_date(&date),
                    None => tag_dates(field, date_fields),
                }
            }
        },
        _ => {},
    }
}

/// Replace every tagged date inside `value` with its plain ISO string.
///
/// Used when handing stored JSON to consumers that expect ordinary strings.
pub fn revive_dates(value: &mut Value) {
    if let Some(date) = read_tagged_date(value) {
        *value = Value::String(format_iso(&date));
        return;
    }
    match value {
        Value::Array(items) => items.iter_mut().for_each(revive_dates),
        Value::Object(object) => object.values_mut().for_each(revive_dates),
        _ => {},
    }
}

/// `#[serde(with = "tagged_date")]` for `DateTime<Utc>` fields.
///
/// Deserialization also accepts a bare ISO string, which older entries used.
pub mod tagged_date {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct TaggedDate {
        #[serde(rename = "__type")]
        kind: String,
        value: String,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DateRepr {
        Tagged(TaggedDate),
        Plain(String),
    }

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        TaggedDate {
            kind: super::DATE_TAG.to_string(),
            value: super::format_iso(date),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = match DateRepr::deserialize(deserializer)? {
            DateRepr::Tagged(tagged) if tagged.kind == super::DATE_TAG => tagged.value,
            DateRepr::Tagged(tagged) => {
                return Err(D::Error::custom(format!(
                    "expected a Date, found tagged `{}`",
                    tagged.kind
                )));
            },
            DateRepr::Plain(raw) => raw,
        };
        super::parse_iso(&raw).map_err(D::Error::custom)
    }

    /// Same encoding for `Option<DateTime<Utc>>`; `None` is `null`.
    /// Pair with `#[serde(default)]`.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super")] DateTime<Utc>);

        pub fn serialize<S: Serializer>(
            date: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(date)| date))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "tagged_date")]
        at: DateTime<Utc>,
        #[serde(default, with = "tagged_date::option")]
        solved_at: Option<DateTime<Utc>>,
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_tag_date_shape() {
        assert_eq!(
            tag_date(&noon()),
            json!({ "__type": "Date", "value": "2024-03-14T12:00:00.000Z" })
        );
    }

    #[test]
    fn test_read_tagged_date() {
        assert_eq!(read_tagged_date(&tag_date(&noon())), Some(noon()));
        assert_eq!(read_tagged_date(&json!({ "__type": "Map", "value": "x" })), None);
        assert_eq!(read_tagged_date(&json!("2024-03-14T12:00:00.000Z")), None);
        assert_eq!(read_tagged_date(&json!({ "__type": "Date", "value": "soon" })), None);
    }

    #[test]
    fn test_serde_field_encoding() {
        let stamped = Stamped {
            at: noon(),
            solved_at: None,
        };
        let value = serde_json::to_value(&stamped).unwrap();
        assert_eq!(value["at"], tag_date(&noon()));
        assert_eq!(value["solved_at"], Value::Null);

        let back: Stamped = serde_json::from_value(value).unwrap();
        assert_eq!(back, stamped);
    }

    #[test]
    fn test_option_some_roundtrip() {
        let stamped = Stamped {
            at: noon(),
            solved_at: Some(noon()),
        };
        let text = serde_json::to_string(&stamped).unwrap();
        let back: Stamped = serde_json::from_str(&text).unwrap();
        assert_eq!(back.solved_at, Some(noon()));
    }

    #[test]
    fn test_plain_iso_string_accepted() {
        let back: Stamped =
            serde_json::from_value(json!({ "at": "2024-03-14T12:00:00Z" })).unwrap();
        assert_eq!(back.at, noon());
        assert_eq!(back.solved_at, None);
    }

    #[test]
    fn test_wrong_tag_rejected() {
        let result: Result<Stamped, _> =
            serde_json::from_value(json!({ "at": { "__type": "Set", "value": "[]" } }));
        assert!(result.is_err());
    }

    #[test]
    fn test_tag_dates_only_named_fields() {
        let original = json!({
            "label": "2024-03-14T12:00:00+05:00",
            "savedAt": tag_date(&noon()),
            "steps": [{ "createdAt": tag_date(&noon()), "note": "2024-03-14T12:00:00Z" }]
        });
        let mut value = original.clone();
        revive_dates(&mut value);
        assert_eq!(value["savedAt"], json!("2024-03-14T12:00:00.000Z"));

        tag_dates(&mut value, &["savedAt", "createdAt"]);
        assert_eq!(value, original);

        let mut untouched = json!({ "note": "2024-03-14T12:00:00Z", "savedAt": "soon" });
        let before = untouched.clone();
        tag_dates(&mut untouched, &["savedAt"]);
        assert_eq!(untouched, before);
    }

    #[test]
    fn test_revive_dates_nested() {
        let mut value = json!({
            "title": "Quadratics",
            "history": [
                { "savedAt": tag_date(&noon()), "label": "first" },
                { "savedAt": null }
            ]
        });
        revive_dates(&mut value);
        assert_eq!(value["history"][0]["savedAt"], json!("2024-03-14T12:00:00.000Z"));
        assert_eq!(value["history"][1]["savedAt"], Value::Null);
        assert_eq!(value["title"], json!("Quadratics"));
    }
}
