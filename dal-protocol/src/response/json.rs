//! JSON responses.
//!
//! The root object maps tag names to lists of record objects. A
//! `RecordMeta` list names the tags holding result records, and an `Error`
//! list carries server-reported errors.

use super::deliver;
use crate::envelope::ResponseEnvelope;
use crate::error::ProtocolError;
use crate::json::{self, Value};
use crate::record::{Record, RecordVisitor, RowData};
use crate::tags;
use indexmap::IndexMap;

/// JSON response parsed into an ordered object tree.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    envelope: ResponseEnvelope,
    root: IndexMap<String, Value>,
}

fn join_pairs(map: &IndexMap<String, Value>) -> String {
    map.iter()
        .map(|(k, v)| match v.to_field_string() {
            Some(s) => format!("{}={}", k, s),
            None => format!("{}=<{}>", k, v.kind()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl JsonResponse {
    pub fn new(envelope: ResponseEnvelope) -> Result<Self, ProtocolError> {
        if envelope.looks_like_doctype() {
            return Err(ProtocolError::Doctype);
        }
        let root = match json::parse(&envelope.body)? {
            Value::Object(map) => map,
            other => {
                return Err(ProtocolError::Malformed(format!(
                    "JSON root is {}, expected object",
                    other.kind()
                )))
            }
        };
        Ok(Self { envelope, root })
    }

    pub fn envelope(&self) -> &ResponseEnvelope {
        &self.envelope
    }

    pub fn root(&self) -> &IndexMap<String, Value> {
        &self.root
    }

    /// Message built from the first item of the `Error` list. A null
    /// `Error` counts as no error.
    pub fn error_message(&self) -> Option<String> {
        let error = self.root.get(tags::ERROR).filter(|e| !e.is_null())?;
        let message = match error {
            Value::Array(items) => match items.first() {
                None => "Unknown error: missing element".to_string(),
                Some(Value::Null) => "Unknown error: 'null'".to_string(),
                Some(Value::Object(map)) => join_pairs(map),
                Some(other) => other
                    .to_field_string()
                    .unwrap_or_else(|| format!("Unknown error: {}", other.kind())),
            },
            Value::Object(map) => join_pairs(map),
            other => other
                .to_field_string()
                .unwrap_or_else(|| format!("Unknown error: {}", other.kind())),
        };
        if message.is_empty() {
            return Some("Unknown error: empty element".to_string());
        }
        Some(message)
    }

    fn check_error(&self) -> Result<(), ProtocolError> {
        match self.error_message() {
            Some(msg) => Err(ProtocolError::ServerReported(msg)),
            None => Ok(()),
        }
    }

    fn to_record(&self, tag: &str, item: &Value) -> Record {
        let mut record = Record::new(self.envelope.url.clone(), tag);
        let Some(map) = item.as_object() else {
            record.warn(format!("'{}' item is {}, expected object", tag, item.kind()));
            return record;
        };

        for (key, value) in map {
            if let Some(s) = value.to_field_string() {
                record.fields.insert(key.clone(), s);
                continue;
            }
            let Some(items) = value.as_array() else {
                record.warn(format!("'{}/{}' is an object, expected list", tag, key));
                continue;
            };
            for child in items {
                let Some(child_map) = child.as_object() else {
                    record.warn(format!("'{}/{}' item is {}", tag, key, child.kind()));
                    continue;
                };
                if child_map.is_empty() {
                    continue;
                }
                let mut row = RowData::new();
                for (ck, cv) in child_map {
                    match cv.to_field_string() {
                        Some(s) => {
                            row.insert(ck.clone(), s);
                        }
                        None => record.warn(format!("'{}/{}/{}' is {}", tag, key, ck, cv.kind())),
                    }
                }
                record.add_nested(key.clone(), row);
            }
        }
        record
    }

    /// Record for the first item under `tag`; empty if none.
    pub fn first_record(&self, tag: &str) -> Result<Record, ProtocolError> {
        self.check_error()?;
        let first = match self.root.get(tag) {
            Some(Value::Array(items)) => items.first(),
            Some(obj @ Value::Object(_)) => Some(obj),
            _ => None,
        };
        Ok(match first {
            Some(item) => self.to_record(tag, item),
            None => Record::new(self.envelope.url.clone(), tag),
        })
    }

    /// Tag names declared in the `RecordMeta` list. An entry without a
    /// `TagName` makes the response malformed.
    pub fn record_meta_tags(&self) -> Result<Vec<String>, ProtocolError> {
        let items = match self.root.get(tags::RECORD_META) {
            None => return Ok(Vec::new()),
            Some(Value::Array(items)) => items.as_slice(),
            Some(other) => std::slice::from_ref(other),
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.get(tags::ATTR_TAG_NAME)
                    .and_then(Value::to_field_string)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        ProtocolError::Malformed(format!(
                            "{} item {} has no {} in response from {}",
                            tags::RECORD_META,
                            i,
                            tags::ATTR_TAG_NAME,
                            self.envelope.url
                        ))
                    })
            })
            .collect()
    }

    pub fn visit_records(
        &self,
        visitor: &mut dyn RecordVisitor,
        wanted: &[&str],
        include_empty: bool,
    ) -> Result<bool, ProtocolError> {
        self.check_error()?;

        let declared = self.record_meta_tags()?;
        let from_meta = !declared.is_empty();
        let tag_names: Vec<&str> = if declared.is_empty() {
            if wanted.is_empty() {
                return Err(ProtocolError::Malformed(format!(
                    "no {} tag names in response from {}",
                    tags::RECORD_META,
                    self.envelope.url
                )));
            }
            wanted.to_vec()
        } else {
            declared
                .iter()
                .map(String::as_str)
                .filter(|t| wanted.is_empty() || wanted.contains(t))
                .collect()
        };

        for tag in tag_names {
            let items = match self.root.get(tag) {
                Some(Value::Array(items)) => items.as_slice(),
                Some(other) => std::slice::from_ref(other),
                None if from_meta => {
                    return Err(ProtocolError::Malformed(format!(
                        "{} '{}' declared but missing in response from {}",
                        tags::RECORD_META,
                        tag,
                        self.envelope.url
                    )));
                }
                None => continue,
            };
            for item in items {
                let record = self.to_record(tag, item);
                if deliver(visitor, tag, &record, include_empty).is_break() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordCollector;

    const GENUS_JSON: &str = r#"{
        "RecordMeta": [{"TagName": "Genus"}],
        "Genus": [
            {"GenusId": "1", "GenusName": "Zea", "Note": null,
             "Alias": [{"AliasName": "maize"}, {}, {"AliasName": "corn"}]},
            {"GenusId": "2", "GenusName": "Oryza"}
        ],
        "Pagination": [{"Page": "1", "NumOfPages": "4"}]
    }"#;

    fn response(body: &str) -> JsonResponse {
        JsonResponse::new(ResponseEnvelope::ok("http://dal/list/genus", "application/json", body))
            .unwrap()
    }

    #[test]
    fn test_root_must_be_object() {
        let env = ResponseEnvelope::ok("u", "application/json", "[1,2]");
        assert!(matches!(JsonResponse::new(env), Err(ProtocolError::Malformed(_))));

        let env = ResponseEnvelope::ok("u", "application/json", "{\"a\":");
        assert!(matches!(JsonResponse::new(env), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_error_messages() {
        let r = response(r#"{"Error":[{"Message":"denied","Code":"7"}]}"#);
        assert_eq!(r.error_message().as_deref(), Some("Message=denied, Code=7"));
        assert!(matches!(
            r.first_record("Genus"),
            Err(ProtocolError::ServerReported(_))
        ));

        let r = response(r#"{"Error":[]}"#);
        assert_eq!(
            r.error_message().as_deref(),
            Some("Unknown error: missing element")
        );

        let r = response(r#"{"Error":[null]}"#);
        assert_eq!(r.error_message().as_deref(), Some("Unknown error: 'null'"));

        for body in [r#"{"Error":[""]}"#, r#"{"Error":[{}]}"#, r#"{"Error":""}"#] {
            assert_eq!(
                response(body).error_message().as_deref(),
                Some("Unknown error: empty element"),
                "{body}"
            );
        }

        let r = response(r#"{"Error":null,"RecordMeta":[{"TagName":"A"}],"A":[{"x":"1"}]}"#);
        assert_eq!(r.error_message(), None);
        assert_eq!(r.first_record("A").unwrap().get("x"), Some("1"));

        assert_eq!(response(GENUS_JSON).error_message(), None);
    }

    #[test]
    fn test_first_record_fields_and_nested() {
        let r = response(GENUS_JSON);
        let rec = r.first_record("Genus").unwrap();
        assert_eq!(rec.get("GenusName"), Some("Zea"));
        assert_eq!(rec.get("Note"), Some(""));
        assert_eq!(
            rec.fields.keys().collect::<Vec<_>>(),
            vec!["GenusId", "GenusName", "Note"]
        );
        let aliases = rec.nested_rows("Alias");
        assert_eq!(aliases.len(), 2);
        assert_eq!(aliases[1]["AliasName"], "corn");
        assert!(rec.warnings.is_empty());

        assert!(r.first_record("Trial").unwrap().is_empty());
    }

    #[test]
    fn test_odd_shapes_become_warnings() {
        let r = response(r#"{"T":[{"a":"1","b":{"x":"y"},"c":[1,{"d":["e"]}]}]}"#);
        let rec = r.first_record("T").unwrap();
        assert_eq!(rec.get("a"), Some("1"));
        assert_eq!(rec.warnings.len(), 3);
        assert_eq!(rec.nested_rows("c").len(), 1);
        assert!(rec.nested_rows("c")[0].is_empty());
    }

    #[test]
    fn test_visit_declared_tags_only() {
        let r = response(GENUS_JSON);
        let mut collector = RecordCollector::new();
        assert!(r.visit_records(&mut collector, &[], true).unwrap());
        assert_eq!(collector.records("Genus").len(), 2);
        assert!(collector.records("Pagination").is_empty());
    }

    #[test]
    fn test_visit_filters_by_wanted() {
        let r = response(r#"{"RecordMeta":[{"TagName":"A"},{"TagName":"B"}],"A":[{"x":"1"}],"B":[{"y":"2"}]}"#);
        let mut collector = RecordCollector::new();
        assert!(r.visit_records(&mut collector, &["B"], true).unwrap());
        assert_eq!(collector.tags().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn test_declared_tag_missing_is_malformed() {
        let r = response(r#"{"RecordMeta":[{"TagName":"Genus"}],"Pagination":[{"Page":"1"}]}"#);
        let mut collector = RecordCollector::new();
        let err = r.visit_records(&mut collector, &[], true).unwrap_err();
        match err {
            ProtocolError::Malformed(msg) => assert!(msg.contains("'Genus'")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(collector.is_empty());

        let r = response(r#"{"RecordMeta":[{"TagName":"Genus"}],"Genus":[]}"#);
        assert!(r.visit_records(&mut collector, &[], true).unwrap());
        assert!(collector.is_empty());
    }

    #[test]
    fn test_record_meta_without_tag_name_is_malformed() {
        let r = response(r#"{"RecordMeta":[{"TagName":"A"},{"Other":"x"}],"A":[{"x":"1"}]}"#);
        let mut collector = RecordCollector::new();
        assert!(matches!(
            r.visit_records(&mut collector, &[], true),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            r.record_meta_tags(),
            Err(ProtocolError::Malformed(msg)) if msg.contains("item 1")
        ));
    }

    #[test]
    fn test_visit_without_record_meta() {
        let r = response(r#"{"Genus":[{"GenusId":"1"}]}"#);
        let mut collector = RecordCollector::new();
        assert!(matches!(
            r.visit_records(&mut collector, &[], true),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(r.visit_records(&mut collector, &["Genus"], true).unwrap());
        assert_eq!(collector.len(), 1);
    }
}
