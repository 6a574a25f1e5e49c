//! Version-gated fields and the results of versioned writes.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validate::nullable;

/// A field value stamped with the server's version counter. `value` may be
/// null when the field was cleared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
#[ts(export)]
pub struct Versioned<T> {
    #[ts(type = "number")]
    pub version: u64,
    #[serde(deserialize_with = "nullable")]
    pub value: Option<T>,
}

impl<T> Versioned<T> {
    pub fn new(version: u64, value: Option<T>) -> Self {
        Self { version, value }
    }
}

/// Last-writer-wins merge. Applies `incoming` only when its version is
/// strictly greater than `current_version`; returns whether it applied.
pub fn merge_versioned<T>(
    current_version: &mut u64,
    current_value: &mut Option<T>,
    incoming: Versioned<T>,
) -> bool {
    if incoming.version <= *current_version {
        return false;
    }
    *current_version = incoming.version;
    *current_value = incoming.value;
    true
}

/// Server reply to a versioned write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(
    tag = "result",
    rename_all = "kebab-case",
    bound(deserialize = "T: Deserialize<'de>")
)]
#[ts(export)]
#[ts(tag = "result", rename_all = "kebab-case")]
pub enum VersionedUpdateResult<T> {
    Success {
        #[ts(type = "number")]
        version: u64,
        #[serde(deserialize_with = "nullable")]
        value: Option<T>,
    },
    VersionMismatch {
        #[ts(type = "number")]
        version: u64,
        #[serde(deserialize_with = "nullable")]
        value: Option<T>,
    },
    Error,
}

impl<T> VersionedUpdateResult<T> {
    /// The authoritative value carried by the reply, if any.
    pub fn into_versioned(self) -> Option<Versioned<T>> {
        match self {
            Self::Success { version, value } | Self::VersionMismatch { version, value } => {
                Some(Versioned { version, value })
            }
            Self::Error => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::parse;
    use serde_json::json;

    #[test]
    fn merge_requires_strictly_greater_version() {
        let mut version = 3;
        let mut value = Some("a".to_string());

        assert!(!merge_versioned(&mut version, &mut value, Versioned::new(3, Some("b".into()))));
        assert!(!merge_versioned(&mut version, &mut value, Versioned::new(2, Some("c".into()))));
        assert_eq!(value.as_deref(), Some("a"));

        assert!(merge_versioned(&mut version, &mut value, Versioned::new(4, None)));
        assert_eq!(version, 4);
        assert_eq!(value, None);
    }

    #[test]
    fn replaying_the_same_update_is_idempotent() {
        let mut version = 0;
        let mut value = None;
        let update = Versioned::new(1, Some(10_u64));
        assert!(merge_versioned(&mut version, &mut value, update.clone()));
        assert!(!merge_versioned(&mut version, &mut value, update));
        assert_eq!((version, value), (1, Some(10)));
    }

    #[test]
    fn versioned_value_must_be_present() {
        let err = parse::<Versioned<String>>(&json!({"version": 1})).unwrap_err();
        assert_eq!(err.path.as_str(), "value");
        let ok: Versioned<String> = parse(&json!({"version": 1, "value": null})).unwrap();
        assert_eq!(ok.value, None);
    }

    #[test]
    fn update_result_tags() {
        let r: VersionedUpdateResult<String> =
            parse(&json!({"result": "version-mismatch", "version": 7, "value": "x"})).unwrap();
        assert_eq!(
            r.clone().into_versioned(),
            Some(Versioned::new(7, Some("x".to_string())))
        );
        assert_eq!(serde_json::to_value(&r).unwrap()["result"], "version-mismatch");

        let e: VersionedUpdateResult<String> = parse(&json!({"result": "error"})).unwrap();
        assert_eq!(e.into_versioned(), None);

        let err = parse::<VersionedUpdateResult<String>>(&json!({"result": "ok"})).unwrap_err();
        assert!(err.message.contains("unknown variant `ok`"));
        assert!(parse::<VersionedUpdateResult<String>>(&json!({"result": "success", "version": 1})).is_err());
    }
}
