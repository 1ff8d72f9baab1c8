//! Form state machine for the order and resubmission forms.
//!
//! Every transition consumes the form and returns the next value, so the
//! whole flow (`Editing → Validating → Invalid | Submitting → Succeeded |
//! Failed`) can be driven without a UI. `OrderForm::submit` takes the form by
//! value: while a submission is in flight there is no form left to submit
//! again.
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::SubmitFailure;
use crate::image_check::{validate_image, ImageConstraints};
use crate::model::{
    slot_label, ErrorEntry, Field, ImageAsset, ImageSlots, OrderSubmission, ResubmissionSubmission,
    ValidationReport, SLOT_COUNT,
};
use crate::naming::rename_for_upload;
use crate::prefill::Prefill;
use crate::qr::{qr_image_url, DEFAULT_QR_SIZE, QR_API_BASE};
use crate::transport::{OrderTransport, RelayRequest};
use crate::validation::{validate_form, validate_resubmission};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Editing,
    Validating,
    Invalid,
    Submitting,
    Succeeded,
    Failed,
}

/// What the user is currently being shown on top of the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// An attached file was refused and its slot cleared.
    UploadError(ErrorEntry),
    /// Whole-form validation failed; every entry is listed.
    ValidationErrors(Vec<ErrorEntry>),
    SubmitError(String),
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSettings {
    pub constraints: ImageConstraints,
    pub qr_base: String,
    pub qr_size: String,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            constraints: ImageConstraints::default(),
            qr_base: QR_API_BASE.to_string(),
            qr_size: DEFAULT_QR_SIZE.to_string(),
        }
    }
}

impl From<&Config> for FormSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            constraints: cfg.image_constraints(),
            qr_base: cfg.qr.base_url.clone(),
            qr_size: cfg.qr.size.clone(),
        }
    }
}

/// Validate a file for `slot` and place it, or clear the slot and describe the refusal.
fn attach_to_slot(
    images: &mut ImageSlots,
    report: &mut ValidationReport,
    slot: usize,
    asset: ImageAsset,
    constraints: &ImageConstraints,
) -> Option<Notice> {
    if slot >= SLOT_COUNT {
        warn!(slot, "ignoring attach to unknown image slot");
        return None;
    }
    match validate_image(&asset, constraints) {
        Ok(dims) => {
            info!(slot, file = %asset.file_name, width = dims.width, height = dims.height, "image accepted");
            images[slot] = Some(asset);
            report.clear_images();
            None
        }
        Err(reason) => {
            info!(slot, file = %asset.file_name, %reason, "image rejected");
            images[slot] = None;
            report.set_image(slot, Some(reason.to_string()));
            Some(Notice::UploadError(ErrorEntry {
                label: slot_label(slot),
                message: reason.to_string(),
            }))
        }
    }
}

/// Renamed copies of the filled slots, numbered in slot order.
fn renamed_images(order_number: &str, images: &ImageSlots) -> Vec<ImageAsset> {
    images
        .iter()
        .flatten()
        .enumerate()
        .map(|(i, asset)| rename_for_upload(order_number, i + 1, asset))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderForm {
    submission: OrderSubmission,
    edited: BTreeSet<Field>,
    report: ValidationReport,
    phase: Phase,
    notice: Option<Notice>,
    settings: FormSettings,
}

impl OrderForm {
    pub fn new(settings: FormSettings) -> Self {
        Self {
            submission: OrderSubmission::default(),
            edited: BTreeSet::new(),
            report: ValidationReport::default(),
            phase: Phase::Editing,
            notice: None,
            settings,
        }
    }

    pub fn submission(&self) -> &OrderSubmission {
        &self.submission
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// The submit control is disabled while this is true.
    pub fn is_submitting(&self) -> bool {
        self.phase == Phase::Submitting
    }

    /// Overlay query-string values; fields the user already edited keep their values.
    pub fn with_prefill(mut self, prefill: &Prefill) -> Self {
        self.submission = prefill.apply(self.submission, &self.edited);
        self
    }

    /// User edit of a text field. Clears that field's error and any open notice.
    pub fn edit(mut self, field: Field, value: impl Into<String>) -> Self {
        self.submission = self.submission.with_field(field, value);
        self.edited.insert(field);
        self.report.clear_field(field);
        self.to_editing()
    }

    /// Attach a file to a zero-based slot, checking it immediately.
    pub fn attach_image(mut self, slot: usize, asset: ImageAsset) -> Self {
        self = self.to_editing();
        self.notice = attach_to_slot(
            &mut self.submission.images,
            &mut self.report,
            slot,
            asset,
            &self.settings.constraints,
        );
        self
    }

    pub fn clear_image(mut self, slot: usize) -> Self {
        self.submission = self.submission.with_image(slot, None);
        self.report.clear_images();
        self.to_editing()
    }

    /// Dismiss whatever notice is shown and return to editing.
    pub fn acknowledge(self) -> Self {
        self.to_editing()
    }

    fn to_editing(mut self) -> Self {
        self.phase = Phase::Editing;
        self.notice = None;
        self
    }

    /// Run whole-form validation. On success the form enters `Submitting` together with
    /// the request to send; otherwise it comes back `Invalid` with every error listed.
    pub fn prepare_submit(mut self) -> Result<(Self, RelayRequest), Self> {
        self.phase = Phase::Validating;
        self.notice = None;
        self.report = validate_form(&self.submission, &self.settings.constraints);
        if !self.report.is_empty() {
            let entries = self.report.entries();
            info!(errors = entries.len(), "order form invalid");
            self.phase = Phase::Invalid;
            self.notice = Some(Notice::ValidationErrors(entries));
            return Err(self);
        }

        let sub = &self.submission;
        let request = RelayRequest {
            order_number: sub.order_number.clone(),
            creator_name: sub.creator_name.clone(),
            quantity_ordered: sub.quantity_ordered.clone(),
            submitted_url: sub.submitted_url.clone(),
            order_confirmation_link: sub.order_confirmation_link.clone(),
            message: sub.message.clone(),
            submitted_qr: qr_image_url(&self.settings.qr_base, &sub.submitted_url, &self.settings.qr_size),
            confirmation_qr: qr_image_url(
                &self.settings.qr_base,
                &sub.order_confirmation_link,
                &self.settings.qr_size,
            ),
            images: renamed_images(&sub.order_number, &sub.images),
        };
        self.phase = Phase::Submitting;
        Ok((self, request))
    }

    /// Apply the transmission outcome. Success resets the form; failure keeps every value.
    pub fn complete_submit(mut self, outcome: Result<(), SubmitFailure>) -> Self {
        match outcome {
            Ok(()) => {
                info!("order submitted");
                self.submission = OrderSubmission::default();
                self.edited.clear();
                self.report = ValidationReport::default();
                self.phase = Phase::Succeeded;
                self.notice = Some(Notice::Submitted);
            }
            Err(failure) => {
                warn!(%failure, "order submission failed");
                self.phase = Phase::Failed;
                self.notice = Some(Notice::SubmitError(failure.to_string()));
            }
        }
        self
    }

    /// Validate, transmit once, and interpret the relay's reply.
    #[instrument(skip_all, fields(order = %self.submission.order_number))]
    pub async fn submit<T>(self, transport: &T) -> Self
    where
        T: OrderTransport + ?Sized,
    {
        let (form, request) = match self.prepare_submit() {
            Ok(ready) => ready,
            Err(invalid) => return invalid,
        };
        let outcome = match transport.send(&request).await {
            Ok(response) => response.interpret(),
            Err(failure) => Err(failure),
        };
        form.complete_submit(outcome)
    }
}

/// Images prepared for a resubmission, already renamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedResubmission {
    pub order_id: String,
    pub images: Vec<ImageAsset>,
}

/// The resubmission form: an order id and five replacement images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResubmissionForm {
    submission: ResubmissionSubmission,
    report: ValidationReport,
    notice: Option<Notice>,
    constraints: ImageConstraints,
}

impl ResubmissionForm {
    pub fn new(constraints: ImageConstraints) -> Self {
        Self {
            submission: ResubmissionSubmission::default(),
            report: ValidationReport::default(),
            notice: None,
            constraints,
        }
    }

    pub fn submission(&self) -> &ResubmissionSubmission {
        &self.submission
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn set_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.submission.order_id = order_id.into();
        self.report.clear_field(Field::OrderId);
        self.notice = None;
        self
    }

    pub fn attach_image(mut self, slot: usize, asset: ImageAsset) -> Self {
        self.notice = attach_to_slot(
            &mut self.submission.images,
            &mut self.report,
            slot,
            asset,
            &self.constraints,
        );
        self
    }

    pub fn acknowledge(mut self) -> Self {
        self.notice = None;
        self
    }

    /// Validate and rename. There is no relay endpoint for resubmissions yet, so the
    /// prepared images are handed back to the caller.
    pub fn prepare(mut self) -> Result<PreparedResubmission, Self> {
        self.report = validate_resubmission(&self.submission, &self.constraints);
        if !self.report.is_empty() {
            self.notice = Some(Notice::ValidationErrors(self.report.entries()));
            return Err(self);
        }
        let prepared = PreparedResubmission {
            order_id: self.submission.order_id.trim().to_string(),
            images: renamed_images(&self.submission.order_id, &self.submission.images),
        };
        info!(order = %prepared.order_id, images = prepared.images.len(), "resubmission prepared");
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_check::fixtures::{jpeg, png};
    use crate::model::{MIME_JPEG, MIME_PNG};

    fn card(name: &str) -> ImageAsset {
        ImageAsset::new(name, MIME_PNG, png(900, 750))
    }

    fn filled_form() -> OrderForm {
        let form = OrderForm::new(FormSettings::default())
            .edit(Field::OrderNumber, "#1005")
            .edit(Field::CreatorName, "Sam Lee")
            .edit(Field::QuantityOrdered, "3")
            .edit(Field::SubmittedUrl, "https://me.example.com")
            .edit(Field::OrderConfirmationLink, "https://shop.example.com/o/1005");
        (0..SLOT_COUNT).fold(form, |f, slot| f.attach_image(slot, card(&format!("photo{}.PNG", slot))))
    }

    #[test]
    fn rejected_attach_clears_slot_and_raises_notice() {
        let form = OrderForm::new(FormSettings::default())
            .attach_image(2, card("ok.png"))
            .attach_image(2, ImageAsset::new("tiny.jpg", MIME_JPEG, jpeg(100, 100)));
        assert!(form.submission().images[2].is_none());
        assert_eq!(form.phase(), Phase::Editing);
        assert_eq!(
            form.report().image(2),
            Some("Min 750×900 px (2.5\"×3\" @ 300 DPI)")
        );
        match form.notice() {
            Some(Notice::UploadError(entry)) => assert_eq!(entry.label, "Image 3"),
            other => panic!("unexpected notice {:?}", other),
        }

        let form = form.acknowledge();
        assert!(form.notice().is_none());
        // the slot message stays until the slot changes again
        assert!(form.report().image(2).is_some());
    }

    #[test]
    fn attach_only_touches_its_own_slot() {
        let form = OrderForm::new(FormSettings::default())
            .edit(Field::CreatorName, "Kept")
            .attach_image(0, card("a.png"))
            .attach_image(1, ImageAsset::new("b.gif", "image/gif", vec![1]));
        assert!(form.submission().images[0].is_some());
        assert_eq!(form.submission().creator_name, "Kept");
        assert_eq!(form.report().image(1), Some("JPG or PNG only"));
        assert_eq!(form.report().image(0), None);
    }

    #[test]
    fn invalid_submit_lists_every_error() {
        let form = OrderForm::new(FormSettings::default())
            .edit(Field::QuantityOrdered, "0");
        let form = form.prepare_submit().unwrap_err();
        assert_eq!(form.phase(), Phase::Invalid);
        match form.notice() {
            Some(Notice::ValidationErrors(entries)) => {
                assert!(entries
                    .iter()
                    .any(|e| e.label == "Quantity Ordered" && e.message.contains("min 1")));
                assert_eq!(entries.iter().filter(|e| e.label.starts_with("Image")).count(), 5);
            }
            other => panic!("unexpected notice {:?}", other),
        }
        assert_eq!(form.acknowledge().phase(), Phase::Editing);
    }

    #[test]
    fn ready_form_builds_renamed_request_with_qr_links() {
        let (form, request) = filled_form().prepare_submit().unwrap();
        assert!(form.is_submitting());
        assert_eq!(request.order_number, "#1005");
        let names: Vec<&str> = request.images.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "ORDER1005_Image1.png",
                "ORDER1005_Image2.png",
                "ORDER1005_Image3.png",
                "ORDER1005_Image4.png",
                "ORDER1005_Image5.png"
            ]
        );
        assert_eq!(
            request.submitted_qr,
            "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=https%3A%2F%2Fme.example.com"
        );
        assert!(request.confirmation_qr.ends_with("data=https%3A%2F%2Fshop.example.com%2Fo%2F1005"));
    }

    #[test]
    fn success_resets_and_failure_preserves() {
        let (form, _) = filled_form().prepare_submit().unwrap();
        let failed = form.clone().complete_submit(Err(SubmitFailure::Upstream("duplicate".into())));
        assert_eq!(failed.phase(), Phase::Failed);
        assert_eq!(failed.notice(), Some(&Notice::SubmitError("duplicate".into())));
        assert_eq!(failed.submission().order_number, "#1005");
        assert!(failed.submission().images.iter().all(Option::is_some));
        assert_eq!(failed.acknowledge().phase(), Phase::Editing);

        let done = form.complete_submit(Ok(()));
        assert_eq!(done.phase(), Phase::Succeeded);
        assert_eq!(done.submission(), &OrderSubmission::default());
        assert!(done.report().is_empty());
    }

    #[test]
    fn prefill_never_overrides_user_edits() {
        let prefill = Prefill::from_query([("orderId", "#9"), ("creatorName", "From Link")]);
        let form = OrderForm::new(FormSettings::default())
            .edit(Field::CreatorName, "Typed")
            .with_prefill(&prefill);
        assert_eq!(form.submission().order_number, "#9");
        assert_eq!(form.submission().creator_name, "Typed");
    }

    #[test]
    fn editing_clears_only_that_field_error() {
        let form = OrderForm::new(FormSettings::default()).prepare_submit().unwrap_err();
        let form = form.edit(Field::OrderNumber, "1");
        assert_eq!(form.report().field(Field::OrderNumber), None);
        assert!(form.report().field(Field::CreatorName).is_some());
        assert_eq!(form.phase(), Phase::Editing);
    }

    #[test]
    fn resubmission_prepares_renamed_images() {
        let form = ResubmissionForm::new(ImageConstraints::default());
        let form = form.prepare().unwrap_err();
        assert_eq!(form.report().field(Field::OrderId), Some("Order ID is required"));

        let form = (0..SLOT_COUNT)
            .fold(form.set_order_id(" #77 "), |f, slot| f.attach_image(slot, card("scan.jpg")));
        let prepared = form.prepare().unwrap();
        assert_eq!(prepared.order_id, "#77");
        assert_eq!(prepared.images[4].file_name, "ORDER77_Image5.jpg");
    }
}
