use serde::{Deserialize, Serialize};

/// Query parameters sent with every chunk of a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadParams {
    pub filename: String,
    pub size: u64,
    pub mimetype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    pub total_part: usize,
    /// Remote file-record id, empty until the first chunk succeeded
    pub id: String,
    /// Remote logical file id, empty until the first chunk succeeded
    pub file_id: String,
    /// Index of the part carried by this request
    pub part: usize,
}

impl ChunkUploadParams {
    /// Parameters for the first chunk of a file without a remote identity
    pub fn new(
        filename: impl Into<String>,
        size: u64,
        mimetype: impl Into<String>,
        total_part: usize,
    ) -> Self {
        Self {
            filename: filename.into(),
            size,
            mimetype: mimetype.into(),
            folder_id: None,
            total_part,
            id: String::new(),
            file_id: String::new(),
            part: 0,
        }
    }

    /// Whether the request creates the remote file record
    pub fn is_first_contact(&self) -> bool {
        self.id.is_empty()
    }
}

/// File record returned by the upload endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    /// Either a string or a numeric id depending on the storage backend
    #[serde(rename = "fileId", default)]
    pub file_id: Option<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub progress: Option<f64>,
}

impl UploadedFile {
    /// Remote record id, ignoring empty values
    pub fn record_id(&self) -> Option<String> {
        self.id.clone().filter(|id| !id.is_empty())
    }

    /// Remote file id rendered as a string
    pub fn file_id(&self) -> Option<String> {
        match self.file_id.as_ref()? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_serialize_camel_case() {
        let mut params = ChunkUploadParams::new("a.bin", 10, "application/octet-stream", 2);
        params.folder_id = Some("f1".into());
        params.part = 1;
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["totalPart"], 2);
        assert_eq!(json["folderId"], "f1");
        assert_eq!(json["fileId"], "");
        assert_eq!(json["part"], 1);
        assert!(params.is_first_contact());
    }

    #[test]
    fn folder_id_omitted_when_unset() {
        let params = ChunkUploadParams::new("a.bin", 10, "text/plain", 1);
        let json = serde_json::to_value(&params).unwrap();
        assert!(json.get("folderId").is_none());
    }

    #[test]
    fn uploaded_file_accepts_numeric_file_id() {
        let file: UploadedFile =
            serde_json::from_str(r#"{"_id":"rec-1","fileId":42,"name":"a.bin"}"#).unwrap();
        assert_eq!(file.record_id().as_deref(), Some("rec-1"));
        assert_eq!(file.file_id().as_deref(), Some("42"));
    }

    #[test]
    fn uploaded_file_missing_ids() {
        let file: UploadedFile = serde_json::from_str(r#"{"_id":"","fileId":""}"#).unwrap();
        assert!(file.record_id().is_none());
        assert!(file.file_id().is_none());

        let file: UploadedFile = serde_json::from_str("{}").unwrap();
        assert!(file.record_id().is_none());
        assert!(file.file_id().is_none());
    }
}
