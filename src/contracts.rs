//! Plate to contract ownership.
//!
//! The directory is built once from the contract service payload and then
//! treated as read-only; a refetch replaces it wholesale.

use std::collections::HashMap;

use serde_json::Value;

use crate::constants::UNASSIGNED_CONTRACT;
use crate::error::{AlertError, Result};

/// One `{ plate, contract }` pair as delivered by the directory service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractEntry {
    pub plate: Option<String>,
    pub contract: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractDirectory {
    by_plate: HashMap<String, String>,
}

impl ContractDirectory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from raw entries. Entries missing either side are discarded;
    /// plates are trimmed and uppercased. Later duplicates win.
    pub fn from_entries(entries: impl IntoIterator<Item = ContractEntry>) -> Self {
        let by_plate = entries
            .into_iter()
            .filter_map(|entry| {
                let plate = entry.plate?.trim().to_uppercase();
                let contract = entry.contract?;
                if plate.is_empty() || contract.is_empty() {
                    None
                } else {
                    Some((plate, contract))
                }
            })
            .collect();
        Self { by_plate }
    }

    pub fn len(&self) -> usize {
        self.by_plate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_plate.is_empty()
    }

    pub fn resolve(&self, plate: &str) -> &str {
        resolve(plate, self)
    }
}

/// Contract for an already-normalized plate, or the unassigned marker.
pub fn resolve<'a>(plate: &str, directory: &'a ContractDirectory) -> &'a str {
    directory
        .by_plate
        .get(plate)
        .map(String::as_str)
        .unwrap_or(UNASSIGNED_CONTRACT)
}

/// Decode the service payload `{ "data": [ { "Placa": .., "Contrato": .. } ] }`.
pub fn parse_directory_payload(bytes: &[u8]) -> Result<ContractDirectory> {
    let payload: Value = serde_json::from_slice(bytes)
        .map_err(|e| AlertError::DirectoryFetch(format!("malformed payload: {e}")))?;
    let items = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AlertError::DirectoryFetch("payload does not contain a 'data' array of contracts".to_string())
        })?;

    let text = |item: &Value, key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);
    Ok(ContractDirectory::from_entries(items.iter().map(|item| ContractEntry {
        plate: text(item, "Placa"),
        contract: text(item, "Contrato"),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(plate: Option<&str>, contract: Option<&str>) -> ContractEntry {
        ContractEntry {
            plate: plate.map(str::to_string),
            contract: contract.map(str::to_string),
        }
    }

    #[test]
    fn test_keys_are_normalized_and_incomplete_entries_dropped() {
        let directory = ContractDirectory::from_entries(vec![
            entry(Some(" abc123 "), Some("Contrato Norte")),
            entry(None, Some("Huérfano")),
            entry(Some("XYZ987"), None),
            entry(Some("DEF456"), Some("")),
        ]);
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.resolve("ABC123"), "Contrato Norte");
    }

    #[test]
    fn test_unknown_plate_is_unassigned() {
        let directory = ContractDirectory::empty();
        assert_eq!(resolve("ABC123", &directory), UNASSIGNED_CONTRACT);
    }

    #[test]
    fn test_resolver_does_not_normalize() {
        let directory = ContractDirectory::from_entries(vec![entry(Some("ABC123"), Some("Sur"))]);
        assert_eq!(directory.resolve("abc123"), UNASSIGNED_CONTRACT);
    }

    #[test]
    fn test_parse_payload() {
        let body = br#"{"data":[{"Placa":"abc123","Contrato":"Norte","Extra":1},{"Placa":7,"Contrato":"X"}]}"#;
        let directory = parse_directory_payload(body).unwrap();
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.resolve("ABC123"), "Norte");
    }

    #[test]
    fn test_payload_without_data_array_is_an_error() {
        assert!(matches!(
            parse_directory_payload(br#"{"data":{}}"#),
            Err(AlertError::DirectoryFetch(_))
        ));
        assert!(matches!(
            parse_directory_payload(b"<html>"),
            Err(AlertError::DirectoryFetch(_))
        ));
    }
}
