//! Whole-form validation for the order and resubmission forms.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::image_check::{validate_image, ImageConstraints};
use crate::model::{Field, ImageSlots, OrderSubmission, ResubmissionSubmission, ValidationReport};

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://.+\..+").expect("valid URL regex"));

pub const IMAGE_REQUIRED: &str = "Image is required";
pub const INVALID_QUANTITY: &str = "Enter a valid quantity (min 1)";
pub const INVALID_URL: &str = "Enter a valid URL";

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Loose `http(s)://host.tld...` check.
pub fn looks_like_url(value: &str) -> bool {
    URL_RE.is_match(value)
}

/// Base-10 integer of at least 1, surrounding whitespace ignored. No upper bound.
pub fn is_valid_quantity(value: &str) -> bool {
    let digits = value.trim();
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && digits.bytes().any(|b| b != b'0')
}

fn required(report: &mut ValidationReport, field: Field, value: &str, message: &str) -> bool {
    if is_blank(value) {
        report.set_field(field, message);
        false
    } else {
        true
    }
}

/// Per-slot image messages: `Image is required` for empty slots, else the rejection reason.
pub fn validate_slots(report: &mut ValidationReport, images: &ImageSlots, constraints: &ImageConstraints) {
    for (slot, image) in images.iter().enumerate() {
        let message = match image {
            None => Some(IMAGE_REQUIRED.to_string()),
            Some(asset) => validate_image(asset, constraints).err().map(|e| e.to_string()),
        };
        report.set_image(slot, message);
    }
}

/// Validate every field of an order form. An empty report means ready to send.
pub fn validate_form(submission: &OrderSubmission, constraints: &ImageConstraints) -> ValidationReport {
    let mut report = ValidationReport::default();

    required(&mut report, Field::OrderNumber, &submission.order_number, "Order number is required");
    required(&mut report, Field::CreatorName, &submission.creator_name, "Creator name is required");

    if required(&mut report, Field::QuantityOrdered, &submission.quantity_ordered, "Quantity is required")
        && !is_valid_quantity(&submission.quantity_ordered)
    {
        report.set_field(Field::QuantityOrdered, INVALID_QUANTITY);
    }

    for (field, value, missing) in [
        (Field::SubmittedUrl, &submission.submitted_url, "Submitted URL is required"),
        (
            Field::OrderConfirmationLink,
            &submission.order_confirmation_link,
            "Order confirmation link is required",
        ),
    ] {
        if required(&mut report, field, value, missing) && !looks_like_url(value) {
            report.set_field(field, INVALID_URL);
        }
    }

    validate_slots(&mut report, &submission.images, constraints);
    report
}

/// Validate a resubmission: order id plus the same five image rules.
pub fn validate_resubmission(
    submission: &ResubmissionSubmission,
    constraints: &ImageConstraints,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    required(&mut report, Field::OrderId, &submission.order_id, "Order ID is required");
    validate_slots(&mut report, &submission.images, constraints);
    report
}
