use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Separator joining nested field names into one flat column name
const KEY_SEPARATOR: char = '.';

/// A single listing as an ordered mapping of field name to JSON value
///
/// The listings service returns loosely typed objects whose shape varies
/// between listings, so no fixed schema is imposed. Nested objects are
/// flattened into dotted column names (`Property.Address.AddressText`);
/// arrays and scalars are kept as they came.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingRecord(Map<String, Value>);

impl ListingRecord {
    /// Wraps an already-flat field map
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Flattens a raw API result into a record
    ///
    /// Returns `None` if the value is not a JSON object.
    pub fn flatten(raw: Value) -> Option<Self> {
        match raw {
            Value::Object(object) => {
                let mut fields = Map::new();
                flatten_into(&mut fields, None, object);
                Some(Self(fields))
            }
            _ => None,
        }
    }

    /// The listing identifier, rendered as a string
    pub fn id(&self) -> Option<String> {
        self.0.get("Id").and_then(value_as_key)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn flatten_into(out: &mut Map<String, Value>, prefix: Option<&str>, object: Map<String, Value>) {
    for (key, value) in object {
        let column = match prefix {
            Some(prefix) => format!("{prefix}{KEY_SEPARATOR}{key}"),
            None => key,
        };

        match value {
            Value::Object(nested) if !nested.is_empty() => {
                flatten_into(out, Some(&column), nested);
            }
            other => {
                out.insert(column, other);
            }
        }
    }
}

/// Renders a scalar identifier as a string key
fn value_as_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
