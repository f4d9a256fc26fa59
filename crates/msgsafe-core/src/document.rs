//! Versioned backup document (schema version 1) and its JSON codec.
//!
//! The document is the plaintext payload of an encrypted backup blob:
//! `info` (always present), then optional `user`, `contacts`, `groups` and
//! `settings` sections. Optional fields are omitted on encode so that an
//! empty document serializes to exactly
//! `{"info":{"version":1,"device":"<tag>"}}`, matching payloads written by
//! older clients.
//!
//! Decoding reports *where* a payload is broken: syntax errors carry the
//! line/column, structural errors carry the section name, and a schema
//! version other than [`SCHEMA_VERSION`] is always a hard
//! [`SafeError::VersionMismatch`] no matter what else is valid.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SafeError, SafeResult};

/// The single supported backup schema version.
pub const SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupInfo {
    pub version: u64,
    pub device: String,
}

/// A linked external address (phone number or email).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserLink {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackupUser {
    /// Base64-encoded identity secret key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privatekey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Base64-encoded profile picture.
    #[serde(rename = "profilePic", skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    /// Release policy: `["*"]` = everyone, `[null]` = nobody, otherwise a
    /// list of identities.
    #[serde(rename = "profilePicRelease", skip_serializing_if = "Option::is_none")]
    pub profile_pic_release: Option<Vec<Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<UserLink>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackupContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Base64 public key; only included when the contact's verification is
    /// low (the directory re-supplies it otherwise — deliberate data
    /// minimization).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publickey: Option<String>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<i64>,
    #[serde(rename = "workVerified", skip_serializing_if = "Option::is_none")]
    pub work_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(rename = "readReceipts", skip_serializing_if = "Option::is_none")]
    pub read_receipts: Option<i64>,
    #[serde(rename = "typingIndicators", skip_serializing_if = "Option::is_none")]
    pub typing_indicators: Option<i64>,
    #[serde(rename = "lastUpdate", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackupGroup {
    /// Group ID as lowercase hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groupname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(rename = "lastUpdate", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackupSettings {
    #[serde(rename = "syncContacts")]
    pub sync_contacts: bool,
    #[serde(rename = "blockUnknown", skip_serializing_if = "Option::is_none")]
    pub block_unknown: Option<bool>,
    #[serde(rename = "readReceipts", skip_serializing_if = "Option::is_none")]
    pub read_receipts: Option<bool>,
    #[serde(rename = "sendTyping", skip_serializing_if = "Option::is_none")]
    pub send_typing: Option<bool>,
    #[serde(rename = "blockedContacts", skip_serializing_if = "Option::is_none")]
    pub blocked_contacts: Option<Vec<String>>,
    #[serde(rename = "syncExcludedIds", skip_serializing_if = "Option::is_none")]
    pub sync_excluded_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupDocument {
    pub info: BackupInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<BackupUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<BackupContact>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<BackupGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<BackupSettings>,
}

impl BackupDocument {
    /// Empty document tagged with the running platform.
    pub fn new() -> Self {
        Self::with_device(std::env::consts::OS)
    }

    pub fn with_device(device: &str) -> Self {
        BackupDocument {
            info: BackupInfo {
                version: SCHEMA_VERSION,
                device: device.to_string(),
            },
            user: None,
            contacts: None,
            groups: None,
            settings: None,
        }
    }

    pub fn to_bytes(&self) -> SafeResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SafeError::Decode {
            path: "document".into(),
            detail: e.to_string(),
        })
    }

    /// Decode a document, localizing failures.
    ///
    /// The version gate runs before any section is deserialized, so a
    /// payload with `info.version != 1` fails with `VersionMismatch` even
    /// if the rest of it is garbage.
    pub fn from_bytes(bytes: &[u8]) -> SafeResult<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| SafeError::Decode {
            path: format!("{}:{}", e.line(), e.column()),
            detail: e.to_string(),
        })?;

        let version = value
            .get("info")
            .and_then(|info| info.get("version"))
            .ok_or_else(|| SafeError::Decode {
                path: "info.version".into(),
                detail: "missing field".into(),
            })?
            .as_u64()
            .ok_or_else(|| SafeError::Decode {
                path: "info.version".into(),
                detail: "not an unsigned integer".into(),
            })?;
        if version != SCHEMA_VERSION {
            return Err(SafeError::VersionMismatch(version));
        }

        Ok(BackupDocument {
            info: section(&value, "info")?.ok_or_else(|| SafeError::Decode {
                path: "info".into(),
                detail: "missing section".into(),
            })?,
            user: section(&value, "user")?,
            contacts: section(&value, "contacts")?,
            groups: section(&value, "groups")?,
            settings: section(&value, "settings")?,
        })
    }
}

impl Default for BackupDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserialize one top-level section, attributing failures to its name.
fn section<T: DeserializeOwned>(value: &Value, name: &str) -> SafeResult<Option<T>> {
    match value.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| SafeError::Decode {
                path: name.to_string(),
                detail: e.to_string(),
            }),
    }
}

/// Server policy probe response (`GET {server}/config`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerPolicy {
    #[serde(rename = "maxBackupBytes")]
    pub max_backup_bytes: u64,
    #[serde(rename = "retentionDays")]
    pub retention_days: u32,
}

impl ServerPolicy {
    pub fn from_bytes(bytes: &[u8]) -> SafeResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| SafeError::Decode {
            path: "server config".into(),
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_serializes_minimally() {
        let doc = BackupDocument::with_device("ios");
        let json = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert_eq!(json, r#"{"info":{"version":1,"device":"ios"}}"#);
    }

    #[test]
    fn user_roundtrip() {
        let mut doc = BackupDocument::with_device("test");
        doc.user = Some(BackupUser {
            privatekey: Some("key123".into()),
            nickname: Some("nicki".into()),
            profile_pic: Some("pic source".into()),
            profile_pic_release: Some(vec![Some("ECHOECHO".into()), Some("TEST1234".into())]),
            links: Some(vec![UserLink {
                kind: "email".into(),
                value: Some("a@a.a".into()),
            }]),
        });

        let bytes = doc.to_bytes().unwrap();
        let json = String::from_utf8(bytes.clone()).unwrap();
        assert!(json.contains(r#""privatekey":"key123""#));
        assert!(json.contains(r#""profilePicRelease":["ECHOECHO","TEST1234"]"#));
        assert!(json.contains(r#""type":"email""#));

        let back = BackupDocument::from_bytes(&bytes).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn decode_tolerates_unknown_fields() {
        let json = br#"{"info":{"version":1,"device":"ios"},"user":{"links":[{"type":"email","name":"private","value":"a@a.a"}],"nickname":"nicki","privatekey":"key123"}}"#;
        let doc = BackupDocument::from_bytes(json).unwrap();
        assert_eq!(doc.user.as_ref().unwrap().nickname.as_deref(), Some("nicki"));
        assert_eq!(
            doc.user.unwrap().links.unwrap()[0].value.as_deref(),
            Some("a@a.a")
        );
    }

    #[test]
    fn version_gate_is_unconditional() {
        // Everything else about this payload is broken, but the version
        // mismatch must win.
        let json = br#"{"info":{"version":2,"device":"ios"},"contacts":"not-a-list"}"#;
        match BackupDocument::from_bytes(json) {
            Err(SafeError::VersionMismatch(2)) => {}
            other => panic!("expected VersionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn missing_version_reports_path() {
        let json = br#"{"info":{"device":"ios"}}"#;
        match BackupDocument::from_bytes(json) {
            Err(SafeError::Decode { path, .. }) => assert_eq!(path, "info.version"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_json_reports_location() {
        match BackupDocument::from_bytes(b"{\"info\":") {
            Err(SafeError::Decode { path, .. }) => {
                assert!(path.contains(':'), "expected line:column, got {path}")
            }
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn bad_section_names_itself() {
        let json = br#"{"info":{"version":1,"device":"ios"},"groups":{"id":"zzz"}}"#;
        match BackupDocument::from_bytes(json) {
            Err(SafeError::Decode { path, .. }) => assert_eq!(path, "groups"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn server_policy_parses() {
        let policy = ServerPolicy::from_bytes(br#"{"maxBackupBytes":524288,"retentionDays":180}"#)
            .unwrap();
        assert_eq!(policy.max_backup_bytes, 524_288);
        assert_eq!(policy.retention_days, 180);
    }
}
