use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::model::SLOT_COUNT;

/// Text fields forwarded verbatim, as `(inbound name, outbound name)`.
pub const FORWARDED_FIELDS: [(&str, &str); 8] = [
    ("orderNumber", "orderNumber"),
    ("creatorName", "creatorName"),
    ("quantityOrdered", "quantityOrdered"),
    ("submittedUrl", "submittedUrl"),
    ("orderConfirmationLink", "orderConfirmationLink"),
    ("message", "message"),
    ("submittedQr", "submittedQrUrl"),
    ("confirmationQr", "confirmationQrUrl"),
];

/// A file part as received.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Bytes,
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Flattened multipart submission: first value per text field, files by image slot (1-based).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundSubmission {
    fields: HashMap<String, String>,
    files: BTreeMap<usize, UploadedFile>,
}

/// `image1`..`image5` → 1..5.
pub fn image_index(part_name: &str) -> Option<usize> {
    part_name
        .strip_prefix("image")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| (1..=SLOT_COUNT).contains(n))
}

impl InboundSubmission {
    /// Keep the first value when a field repeats.
    pub fn insert_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(name.into()).or_insert_with(|| value.into());
    }

    /// Store a file part if its name is an image slot; returns whether it was kept.
    /// An unselected file input arrives with no file name and no content and is dropped.
    pub fn insert_file(&mut self, part_name: &str, file_name: impl Into<String>, bytes: Bytes) -> bool {
        let file_name = file_name.into();
        if file_name.is_empty() || bytes.is_empty() {
            return false;
        }
        match image_index(part_name) {
            Some(index) if !self.files.contains_key(&index) => {
                self.files.insert(
                    index,
                    UploadedFile {
                        name: file_name,
                        bytes,
                    },
                );
                true
            }
            _ => false,
        }
    }

    /// Missing fields read as the empty string.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn file(&self, index: usize) -> Option<&UploadedFile> {
        self.files.get(&index)
    }

    pub fn files(&self) -> impl Iterator<Item = (usize, &UploadedFile)> {
        self.files.iter().map(|(i, f)| (*i, f))
    }

    pub fn total_file_bytes(&self) -> usize {
        self.files.values().map(|f| f.bytes.len()).sum()
    }
}
