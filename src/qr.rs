use reqwest::Url;

pub const QR_API_BASE: &str = "https://api.qrserver.com/v1/create-qr-code/";
pub const DEFAULT_QR_SIZE: &str = "200x200";

/// URL of a QR image encoding `link`, e.g. `{base}?size=200x200&data=https%3A%2F%2F...`.
///
/// Falls back to the public qrserver endpoint when `base` is not a valid URL.
pub fn qr_image_url(base: &str, link: &str, size: &str) -> String {
    let mut url = Url::parse(base).unwrap_or_else(|_| default_base());
    url.query_pairs_mut()
        .clear()
        .append_pair("size", size)
        .append_pair("data", link);
    url.to_string()
}

fn default_base() -> Url {
    Url::parse(QR_API_BASE).expect("valid default QR URL")
}
