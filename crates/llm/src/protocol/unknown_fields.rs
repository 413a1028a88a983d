use std::collections::HashMap;

/// Captures JSON object fields not modeled by the surrounding struct.
///
/// Flattened into envelope structs via `#[serde(flatten)]` so round-tripping
/// through this type never silently drops data the caller sent, and so the
/// reasoning/custom-field extraction in C5 has something to scan.
#[derive(Default, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UnknownFields(HashMap<String, serde_json::Value>);

impl UnknownFields {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
