use serde::{Deserialize, Deserializer, Serializer};
use std::path::PathBuf;

/// Serializes an EUI64 as 16 lowercase hex characters
pub fn serialize_eui<S>(eui: &[u8; 8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&hex::encode(eui))
}

/// Deserializes an EUI64 from 16 hex characters
pub fn deserialize_eui<'de, D>(deserializer: D) -> Result<[u8; 8], D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let mut eui = [0u8; 8];
    hex::decode_to_slice(s.trim(), &mut eui).map_err(serde::de::Error::custom)?;
    Ok(eui)
}

/// Deserializes an optional path, treating an empty string as unset
pub fn deserialize_opt_path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()).map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize, Deserialize)]
    struct Test {
        #[serde(serialize_with = "serialize_eui")]
        #[serde(deserialize_with = "deserialize_eui")]
        eui: [u8; 8],
        #[serde(default, deserialize_with = "deserialize_opt_path")]
        path: Option<PathBuf>,
    }

    #[test]
    fn test_eui_serialization() {
        let original = Test {
            eui: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08],
            path: None,
        };

        let serialized = serde_json::to_string(&original).unwrap();
        assert!(serialized.contains("\"0102030405060708\""));

        let deserialized: Test = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.eui, original.eui);
    }

    #[test]
    fn test_eui_rejects_bad_length() {
        let result: Result<Test, _> = serde_json::from_str(r#"{"eui":"0102"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_path_is_none() {
        let parsed: Test =
            serde_json::from_str(r#"{"eui":"0102030405060708","path":""}"#).unwrap();
        assert!(parsed.path.is_none());

        let parsed: Test =
            serde_json::from_str(r#"{"eui":"0102030405060708","path":"ledger.db"}"#).unwrap();
        assert_eq!(parsed.path, Some(PathBuf::from("ledger.db")));
    }
}
