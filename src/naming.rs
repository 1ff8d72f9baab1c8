use crate::model::{ImageAsset, MIME_PNG};

const PLACEHOLDER_ORDER: &str = "ORDER";

/// Order number with a leading `#` and all whitespace removed; `ORDER` when nothing is left.
pub fn clean_order_number(order_number: &str) -> String {
    let trimmed = order_number.trim();
    let cleaned: String = trimmed
        .strip_prefix('#')
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        PLACEHOLDER_ORDER.to_string()
    } else {
        cleaned
    }
}

/// Lower-cased suffix after the last `.`, or an extension inferred from the declared type.
pub fn upload_extension(asset: &ImageAsset) -> String {
    match asset.file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ if asset.content_type == MIME_PNG => "png".to_string(),
        _ => "jpg".to_string(),
    }
}

/// Rename an image to `ORDER{order}_Image{index}.{ext}`, keeping its bytes and MIME type.
pub fn rename_for_upload(order_number: &str, image_index: usize, asset: &ImageAsset) -> ImageAsset {
    let file_name = format!(
        "ORDER{}_Image{}.{}",
        clean_order_number(order_number),
        image_index,
        upload_extension(asset)
    );
    ImageAsset {
        file_name,
        content_type: asset.content_type.clone(),
        bytes: asset.bytes.clone(),
    }
}
