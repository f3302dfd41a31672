use crate::utils::error::{Result, StatsError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field every record is keyed by.
pub const ID_FIELD: &str = "tableId";

pub const EXPORTED_AT_FIELD: &str = "exportedAt";

/// A single game (or game log) as scraped. Only `tableId` is interpreted;
/// every other field is carried through untouched, in its original key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// Identifier of the record. Integers are accepted and rendered in decimal;
    /// blank strings count as missing.
    pub fn table_id(&self) -> Option<String> {
        match self.data.get(ID_FIELD)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self::new(data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Games,
    Logs,
}

impl RecordKind {
    pub fn records_key(self) -> &'static str {
        match self {
            Self::Games => "games",
            Self::Logs => "logs",
        }
    }

    pub fn count_key(self) -> &'static str {
        match self {
            Self::Games => "totalGames",
            Self::Logs => "totalLogs",
        }
    }

    /// File name of the accumulated collection inside the data directory.
    pub fn collection_file(self) -> &'static str {
        match self {
            Self::Games => "detailed_games.json",
            Self::Logs => "detailed_game_logs.json",
        }
    }

    /// File name of the pending batch inside the scraper directory.
    pub fn batch_file(self) -> &'static str {
        match self {
            Self::Games => "new_games.json",
            Self::Logs => "new_logs.json",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.records_key())
    }
}

/// Accumulated, deduplicated set of records persisted across runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub kind: RecordKind,
    pub records: Vec<Record>,
    /// Top-level fields other than the record list, in file order.
    /// `exportedAt` and the count live here too.
    pub header: Map<String, Value>,
}

impl Collection {
    pub fn empty(kind: RecordKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
            header: Map::new(),
        }
    }

    pub fn with_records(kind: RecordKind, records: Vec<Record>) -> Self {
        let mut collection = Self::empty(kind);
        collection.records = records;
        collection.header.insert(
            kind.count_key().to_string(),
            Value::from(collection.records.len()),
        );
        collection
    }

    pub fn from_value(kind: RecordKind, value: Value, source_name: &str) -> Result<Self> {
        let Value::Object(document) = value else {
            return Err(StatsError::malformed(
                source_name,
                "expected a JSON object at the top level",
            ));
        };

        let (header, list) = split_records(kind, document);
        let records = match list {
            Some(list) => parse_records(kind, list, source_name)?,
            None => {
                return Err(StatsError::malformed(
                    source_name,
                    format!("missing '{}' array", kind.records_key()),
                ))
            }
        };

        Ok(Self {
            kind,
            records,
            header,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut document = self.header.clone();
        document.insert(
            kind_records_key(self.kind),
            Value::Array(
                self.records
                    .iter()
                    .map(|r| Value::Object(r.data.clone()))
                    .collect(),
            ),
        );
        Value::Object(document)
    }

    pub fn exported_at(&self) -> Option<&str> {
        self.header.get(EXPORTED_AT_FIELD).and_then(Value::as_str)
    }

    pub fn total(&self) -> Option<u64> {
        self.header.get(self.kind.count_key()).and_then(Value::as_u64)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Refreshes `exportedAt` and the record count, keeping their position in the header.
    pub fn touch(&mut self, exported_at: String) {
        self.header
            .insert(EXPORTED_AT_FIELD.to_string(), Value::String(exported_at));
        self.header.insert(
            self.kind.count_key().to_string(),
            Value::from(self.records.len()),
        );
    }
}

/// Newly produced, not yet merged records. Metadata in the batch file is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub kind: RecordKind,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(kind: RecordKind, records: Vec<Record>) -> Self {
        Self { kind, records }
    }

    pub fn empty(kind: RecordKind) -> Self {
        Self::new(kind, Vec::new())
    }

    /// A missing record list reads as an empty batch.
    pub fn from_value(kind: RecordKind, value: Value, source_name: &str) -> Result<Self> {
        let Value::Object(document) = value else {
            return Err(StatsError::malformed(
                source_name,
                "expected a JSON object at the top level",
            ));
        };

        let records = match split_records(kind, document).1 {
            Some(list) => parse_records(kind, list, source_name)?,
            None => Vec::new(),
        };

        Ok(Self::new(kind, records))
    }

    /// Document written back after a merge consumed the batch.
    pub fn reset_document(kind: RecordKind) -> Value {
        let mut document = Map::new();
        document.insert(kind_records_key(kind), Value::Array(Vec::new()));
        Value::Object(document)
    }

    /// Document a producer writes for the merge step to pick up.
    pub fn to_document(&self, exported_at: String) -> Value {
        let mut document = Map::new();
        document.insert(EXPORTED_AT_FIELD.to_string(), Value::String(exported_at));
        document.insert(
            self.kind.count_key().to_string(),
            Value::from(self.records.len()),
        );
        document.insert(
            kind_records_key(self.kind),
            Value::Array(
                self.records
                    .iter()
                    .map(|r| Value::Object(r.data.clone()))
                    .collect(),
            ),
        );
        Value::Object(document)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn kind_records_key(kind: RecordKind) -> String {
    kind.records_key().to_string()
}

/// Pulls the record list out of a document without disturbing the order of the other keys.
fn split_records(kind: RecordKind, document: Map<String, Value>) -> (Map<String, Value>, Option<Value>) {
    let mut header = Map::new();
    let mut list = None;
    for (key, value) in document {
        if key == kind.records_key() {
            list = Some(value);
        } else {
            header.insert(key, value);
        }
    }
    (header, list)
}

fn parse_records(kind: RecordKind, list: Value, source_name: &str) -> Result<Vec<Record>> {
    let Value::Array(items) = list else {
        return Err(StatsError::malformed(
            source_name,
            format!("'{}' must be an array", kind.records_key()),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(data) => Ok(Record::new(data)),
            other => Err(StatsError::malformed(
                source_name,
                format!(
                    "{} entry #{} is not an object (found {})",
                    kind,
                    index,
                    json_type_name(&other)
                ),
            )),
        })
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(data) => Record::new(data),
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_table_id_accepts_strings_and_integers() {
        assert_eq!(
            record(json!({"tableId": "123"})).table_id().as_deref(),
            Some("123")
        );
        assert_eq!(
            record(json!({"tableId": 456})).table_id().as_deref(),
            Some("456")
        );
        assert_eq!(record(json!({"tableId": "  "})).table_id(), None);
        assert_eq!(record(json!({"tableId": 1.5})).table_id(), None);
        assert_eq!(record(json!({"id": "123"})).table_id(), None);
    }

    #[test]
    fn test_collection_keeps_header_order_and_extra_fields() {
        let value = json!({
            "exportedAt": "2025-01-01T00:00:00Z",
            "playerId": "95147106",
            "totalGames": 1,
            "games": [{"tableId": "1", "players": ["a", "b"]}]
        });

        let collection = Collection::from_value(RecordKind::Games, value, "test").unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.exported_at(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(collection.total(), Some(1));

        let out = collection.to_value();
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["exportedAt", "playerId", "totalGames", "games"]);
    }

    #[test]
    fn test_collection_requires_record_array() {
        let missing = Collection::from_value(RecordKind::Logs, json!({"games": []}), "logs.json");
        assert!(matches!(missing, Err(StatsError::MalformedInput { .. })));

        let not_array =
            Collection::from_value(RecordKind::Games, json!({"games": {"a": 1}}), "games.json");
        assert!(matches!(not_array, Err(StatsError::MalformedInput { .. })));

        let not_object = Collection::from_value(RecordKind::Games, json!([]), "games.json");
        assert!(matches!(not_object, Err(StatsError::MalformedInput { .. })));
    }

    #[test]
    fn test_batch_without_record_key_is_empty() {
        let batch =
            Batch::from_value(RecordKind::Games, json!({"lastUpdated": "x"}), "new").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_batch_rejects_non_object_entries() {
        let err = Batch::from_value(RecordKind::Logs, json!({"logs": [{"tableId": "1"}, 7]}), "new")
            .unwrap_err();
        assert!(err.to_string().contains("#1"));
    }

    #[test]
    fn test_touch_refreshes_metadata_in_place() {
        let value = json!({"exportedAt": "old", "totalLogs": 0, "logs": []});
        let mut collection = Collection::from_value(RecordKind::Logs, value, "test").unwrap();
        collection.records.push(record(json!({"tableId": "9"})));
        collection.touch("new".to_string());

        assert_eq!(collection.exported_at(), Some("new"));
        assert_eq!(collection.total(), Some(1));
        let keys: Vec<&String> = collection.header.keys().collect();
        assert_eq!(keys, vec!["exportedAt", "totalLogs"]);
    }

    #[test]
    fn test_reset_document_shape() {
        assert_eq!(Batch::reset_document(RecordKind::Games), json!({"games": []}));
        assert_eq!(Batch::reset_document(RecordKind::Logs), json!({"logs": []}));
    }
}
