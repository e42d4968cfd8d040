use serde::{Deserialize, Serialize};

use crate::uri::{Identifier, ResourceUri};

// Only the object keys are read, everything else S3 sends is ignored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<UploadRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    #[serde(default)]
    pub s3: UploadEntity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadEntity {
    #[serde(default)]
    pub object: UploadObject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadObject {
    #[serde(default)]
    pub key: String,
}

impl UploadNotification {
    pub fn from_uris(uris: &[ResourceUri]) -> Self {
        let records = uris
            .iter()
            .map(|uri| UploadRecord {
                s3: UploadEntity {
                    object: UploadObject {
                        key: uri.as_uri_string(),
                    },
                },
            })
            .collect();
        Self { records }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.s3.object.key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_keys_from_a_storage_notification() {
        let payload = r#"{
            "Records": [
                {
                    "eventVersion": "2.1",
                    "eventSource": "aws:s3",
                    "eventName": "ObjectCreated:Put",
                    "s3": {
                        "bucket": { "name": "uploads" },
                        "object": { "key": "photos/a.jpg", "size": 1024 }
                    }
                },
                { "s3": { "object": { "key": "b.txt" } } }
            ]
        }"#;

        let notification: UploadNotification = serde_json::from_str(payload).unwrap();
        assert_eq!(notification.keys().collect::<Vec<_>>(), ["photos/a.jpg", "b.txt"]);
    }

    #[test]
    fn one_record_per_uri() {
        let uris = vec![
            ResourceUri::parse("a.jpg").unwrap(),
            ResourceUri::parse("dir/b.png").unwrap(),
        ];
        let json = serde_json::to_value(UploadNotification::from_uris(&uris)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Records": [
                    { "s3": { "object": { "key": "a.jpg" } } },
                    { "s3": { "object": { "key": "dir/b.png" } } }
                ]
            })
        );
    }
}
