//! On-disk format of the store file.
//!
//! The file is a single JSON object tagged with a schema version. The
//! version is read first and anything other than [`CURRENT_VERSION`] is
//! rejected before the rest of the document is interpreted.

use crate::error::{PkiError, Result};
use crate::model::Entity;
use crate::storage::state::{Registries, StoreState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written by this build.
pub const CURRENT_VERSION: &str = "3";

#[derive(Deserialize)]
struct VersionProbe {
    version: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StoreFileV3 {
    #[serde(default)]
    registries: Registries,
    #[serde(default)]
    entities: BTreeMap<String, Entity>,
}

#[derive(Serialize)]
struct StoreFileV3Ref<'a> {
    version: &'a str,
    registries: &'a Registries,
    entities: &'a BTreeMap<String, Entity>,
}

/// Parse and validate store file contents.
pub fn decode(text: &str) -> Result<StoreState> {
    let probe: VersionProbe = serde_json::from_str(text)?;
    let version = probe.version.ok_or_else(|| {
        PkiError::InvalidStoreError("Store file has no version field".to_string())
    })?;

    if version.as_str() != Some(CURRENT_VERSION) {
        let found = match version {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };
        return Err(PkiError::UnsupportedVersionError {
            found,
            supported: CURRENT_VERSION.to_string(),
        });
    }

    let file: StoreFileV3 = serde_json::from_str(text)?;
    let state = StoreState {
        registries: file.registries,
        entities: file.entities,
    };
    state.validate()?;
    Ok(state)
}

/// Serialize a state as pretty JSON at [`CURRENT_VERSION`].
pub fn encode(state: &StoreState) -> Result<String> {
    let file = StoreFileV3Ref {
        version: CURRENT_VERSION,
        registries: &state.registries,
        entities: &state.entities,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    fn sample_state() -> StoreState {
        let mut state = StoreState::default();
        state
            .register(EntityKind::RootCa, Entity::root_ca("root", 384))
            .unwrap();
        state
            .register(EntityKind::Server, Entity::leaf("svc", "root", 256))
            .unwrap();
        state
    }

    #[test]
    fn test_encode_decode() {
        let state = sample_state();
        let text = encode(&state).unwrap();
        assert!(text.contains("\"version\": \"3\""));

        let decoded = decode(&text).unwrap();
        assert_eq!(decoded.registries, state.registries);
        assert_eq!(
            decoded.entities.keys().collect::<Vec<_>>(),
            vec!["root", "svc"]
        );
    }

    #[test]
    fn test_decode_empty_document() {
        let state = decode(r#"{"version": "3"}"#).unwrap();
        assert!(state.entities.is_empty());
        assert!(state.registries.root_cas.is_empty());
    }

    #[test]
    fn test_decode_old_version() {
        let result = decode(r#"{"version": "2", "entities": {"x": 1}}"#);
        match result {
            Err(PkiError::UnsupportedVersionError { found, supported }) => {
                assert_eq!(found, "2");
                assert_eq!(supported, "3");
            }
            _ => panic!("Expected UnsupportedVersionError"),
        }
    }

    #[test]
    fn test_decode_non_string_version() {
        for (text, expected) in [
            (r#"{"version": 2}"#, "2"),
            (r#"{"version": 3}"#, "3"),
            (r#"{"version": ["3"]}"#, r#"["3"]"#),
        ] {
            match decode(text) {
                Err(PkiError::UnsupportedVersionError { found, .. }) => assert_eq!(found, expected),
                _ => panic!("Expected UnsupportedVersionError for {}", text),
            }
        }
    }

    #[test]
    fn test_decode_missing_version() {
        match decode(r#"{"entities": {}}"#) {
            Err(PkiError::InvalidStoreError(_)) => {}
            _ => panic!("Expected InvalidStoreError"),
        }
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode("not json"), Err(PkiError::JsonError(_))));
    }

    #[test]
    fn test_decode_orphaned_registry() {
        let text = r#"{"version": "3", "registries": {"root_cas": ["ghost"], "intermediate_cas": [], "servers": [], "clients": [], "emails": []}}"#;
        assert!(matches!(decode(text), Err(PkiError::InvalidStoreError(_))));
    }
}
