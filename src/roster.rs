use std::collections::HashMap;

use crate::error::RollPressError;

// Canonical field names as they appear in the upload's header row. Callers
// mapping other spellings normalize to these before building records.
pub const FIELD_SERIAL: &str = "NO.";
pub const FIELD_ROLL_NUMBER: &str = "ROLNO";
pub const FIELD_CANDIDATE_NAME: &str = "STUDENT NAME/FATHER'S NAME";
pub const FIELD_CENTER_CODE: &str = "CENTER CODE";
pub const FIELD_CENTER_NAME: &str = "CENTER NAME";
pub const FIELD_DISTRICT_NAME: &str = "DISTRICT NAME";
pub const FIELD_EXAM_DATE: &str = "EXAM DATE";
pub const FIELD_CENTER_TYPE: &str = "TYPE";

/// One cell of the decoded roster. Spreadsheet decoders hand over either
/// text or a number; everything else arrives as `Empty`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Empty,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn number(value: f64) -> Self {
        FieldValue::Number(value)
    }

    /// The string that renders into a cell. Absent and empty values both
    /// render blank; numbers drop a spurious trailing `.0` so that a sheet
    /// column typed as numeric prints `12`, not `12.0`.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(value) => format_number(*value),
            FieldValue::Empty => String::new(),
        }
    }

    /// Canonical grouping key, or `None` when the value carries nothing
    /// usable (empty, or text that trims to nothing). Text is trimmed but
    /// otherwise kept verbatim, so `"007"` and `"7"` stay distinct keys.
    pub fn group_key(&self) -> Option<String> {
        match self {
            FieldValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            FieldValue::Number(value) => Some(format_number(*value)),
            FieldValue::Empty => None,
        }
    }
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// One roster row: canonical field name to value. Absent fields are valid
/// and render as empty strings everywhere.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: HashMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        let mut record = Record::new();
        for (name, value) in pairs {
            record.insert(name, value);
        }
        record
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn display(&self, name: &str) -> String {
        self.get(name).map(FieldValue::display).unwrap_or_default()
    }

    pub fn group_key(&self, name: &str) -> Option<String> {
        self.get(name).and_then(FieldValue::group_key)
    }
}

/// Header metadata for one center, captured from the group's first record.
/// Later records never overwrite it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupMeta {
    pub center_name: String,
    pub district_name: String,
    pub exam_date: String,
    pub center_type: String,
}

impl GroupMeta {
    fn from_record(record: &Record) -> Self {
        Self {
            center_name: record.display(FIELD_CENTER_NAME),
            district_name: record.display(FIELD_DISTRICT_NAME),
            exam_date: record.display(FIELD_EXAM_DATE),
            center_type: record.display(FIELD_CENTER_TYPE).trim().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    pub key: String,
    pub meta: GroupMeta,
    pub records: Vec<Record>,
}

/// Partitions records by the given field. Group order is first appearance
/// of each key; rows keep their input order within a group. Records whose
/// key is absent gather under the empty string; rejecting those up front is
/// [`require_group_field`]'s job, not the grouper's.
pub fn group_records(records: Vec<Record>, key_field: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in records {
        let key = record.group_key(key_field).unwrap_or_default();
        match index.get(&key) {
            Some(&at) => groups[at].records.push(record),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(Group {
                    key,
                    meta: GroupMeta::from_record(&record),
                    records: vec![record],
                });
            }
        }
    }
    groups
}

/// Strict pre-grouping check: every record must carry a usable value for
/// the grouping field. Reports the first offending row index.
pub fn require_group_field(records: &[Record], key_field: &str) -> Result<(), RollPressError> {
    for (index, record) in records.iter().enumerate() {
        if record.group_key(key_field).is_none() {
            return Err(RollPressError::MissingGroupField {
                index,
                field: key_field.to_string(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    fn of(record: &Record, field: &str) -> Self {
        let key = record.group_key(field).unwrap_or_default();
        match key.parse::<f64>() {
            Ok(value) => SortKey::Number(value),
            Err(_) => SortKey::Text(key),
        }
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Number(_), SortKey::Text(_)) => std::cmp::Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => std::cmp::Ordering::Greater,
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
        }
    }
}

/// Stable pre-grouping sort on a key field. Keys that parse as numbers
/// order numerically and come before non-numeric keys, which order
/// lexicographically; ties keep input order.
pub fn sort_by_numeric_field(records: &mut [Record], field: &str) {
    records.sort_by_cached_key(|record| SortKey::of(record, field));
}
