use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Number of image slots on every form.
pub const SLOT_COUNT: usize = 5;

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";

/// Text fields of the order and resubmission forms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    OrderNumber,
    CreatorName,
    QuantityOrdered,
    SubmittedUrl,
    OrderConfirmationLink,
    Message,
    OrderId,
}

impl Field {
    /// Wire name used in multipart forms and query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::OrderNumber => "orderNumber",
            Field::CreatorName => "creatorName",
            Field::QuantityOrdered => "quantityOrdered",
            Field::SubmittedUrl => "submittedUrl",
            Field::OrderConfirmationLink => "orderConfirmationLink",
            Field::Message => "message",
            Field::OrderId => "orderId",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::OrderNumber => "Order Number",
            Field::CreatorName => "Creator Name",
            Field::QuantityOrdered => "Quantity Ordered",
            Field::SubmittedUrl => "Submitted URL",
            Field::OrderConfirmationLink => "Order Confirmation Link",
            Field::Message => "Message",
            Field::OrderId => "Order ID",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attached file. The byte size is the length of `bytes`.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl ImageAsset {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Read a file from disk, declaring its MIME type from the extension.
    pub async fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self::new(file_name, content_type_for(path), bytes))
    }
}

/// MIME type a browser would declare for a file with this extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => MIME_JPEG,
        Some(ext) if ext == "png" => MIME_PNG,
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

pub type ImageSlots = [Option<ImageAsset>; SLOT_COUNT];

/// The main order form before transmission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSubmission {
    pub order_number: String,
    pub creator_name: String,
    pub quantity_ordered: String,
    pub submitted_url: String,
    pub order_confirmation_link: String,
    pub message: String,
    pub images: ImageSlots,
}

impl OrderSubmission {
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::OrderNumber => &self.order_number,
            Field::CreatorName => &self.creator_name,
            Field::QuantityOrdered => &self.quantity_ordered,
            Field::SubmittedUrl => &self.submitted_url,
            Field::OrderConfirmationLink => &self.order_confirmation_link,
            Field::Message => &self.message,
            Field::OrderId => "",
        }
    }

    /// Returns a copy with one text field replaced. `OrderId` does not exist on this form.
    pub fn with_field(mut self, field: Field, value: impl Into<String>) -> Self {
        let value = value.into();
        match field {
            Field::OrderNumber => self.order_number = value,
            Field::CreatorName => self.creator_name = value,
            Field::QuantityOrdered => self.quantity_ordered = value,
            Field::SubmittedUrl => self.submitted_url = value,
            Field::OrderConfirmationLink => self.order_confirmation_link = value,
            Field::Message => self.message = value,
            Field::OrderId => {}
        }
        self
    }

    pub fn with_image(mut self, slot: usize, image: Option<ImageAsset>) -> Self {
        if let Some(entry) = self.images.get_mut(slot) {
            *entry = image;
        }
        self
    }
}

/// Resubmission of images for an existing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResubmissionSubmission {
    pub order_id: String,
    pub images: ImageSlots,
}

/// Field name → message, plus one optional message per image slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    fields: BTreeMap<Field, String>,
    images: [Option<String>; SLOT_COUNT],
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.images.iter().all(Option::is_none)
    }

    pub fn field(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn image(&self, slot: usize) -> Option<&str> {
        self.images.get(slot).and_then(|m| m.as_deref())
    }

    pub fn set_field(&mut self, field: Field, message: impl Into<String>) {
        self.fields.insert(field, message.into());
    }

    pub fn clear_field(&mut self, field: Field) {
        self.fields.remove(&field);
    }

    pub fn set_image(&mut self, slot: usize, message: Option<String>) {
        if let Some(entry) = self.images.get_mut(slot) {
            *entry = message;
        }
    }

    pub fn clear_images(&mut self) {
        self.images = Default::default();
    }

    /// Flatten into display entries: text fields first, then `Image n` per failing slot.
    pub fn entries(&self) -> Vec<ErrorEntry> {
        let fields = self.fields.iter().map(|(field, message)| ErrorEntry {
            label: field.label().to_string(),
            message: message.clone(),
        });
        let images = self.images.iter().enumerate().filter_map(|(i, msg)| {
            msg.as_ref().map(|message| ErrorEntry {
                label: slot_label(i),
                message: message.clone(),
            })
        });
        fields.chain(images).collect()
    }
}

/// Human label for a zero-based slot index.
pub fn slot_label(slot: usize) -> String {
    format!("Image {}", slot + 1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub label: String,
    pub message: String,
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.message)
    }
}
