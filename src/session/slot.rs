use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::media::EncodedImage;
use crate::transform::client::TransformError;
use crate::transform::prompt::{build_prompt, Mode, ModeParameter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Idle,
    Loading,
    Success,
    Error,
}

impl SlotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotState {
    Idle,
    Loading,
    Success(EncodedImage),
    Error(String),
}

/// Identity of one issued request: the activation epoch of the owning
/// pipeline, the slot index, and the slot generation at issue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SlotTicket {
    pub epoch: u64,
    pub index: usize,
    pub generation: u64,
    pub request_id: Uuid,
}

/// One outbound generation request, bound to the slot it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    pub ticket: SlotTicket,
    pub image: EncodedImage,
    pub prompt: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("slot {index} cannot {operation} while {status}")]
    InvalidTransition {
        index: usize,
        operation: &'static str,
        status: SlotStatus,
    },
    #[error("slot {index} does not exist")]
    NoSuchSlot { index: usize },
    #[error("slot {index} has no source image")]
    MissingSource { index: usize },
    #[error("slot {index} already holds a source image; reset it first")]
    SourceAlreadySet { index: usize },
    #[error("a {} parameter does not fit a {} slot", .got.as_str(), .expected.as_str())]
    ParameterMismatch { expected: Mode, got: Mode },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSnapshot {
    pub index: usize,
    pub status: SlotStatus,
    pub parameter: ModeParameter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image: Option<EncodedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<EncodedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    epoch: u64,
    index: usize,
    parameter: ModeParameter,
    source: Option<EncodedImage>,
    state: SlotState,
    generation: u64,
}

impl Slot {
    pub fn new(epoch: u64, index: usize, parameter: ModeParameter) -> Self {
        Self {
            epoch,
            index,
            parameter,
            source: None,
            state: SlotState::Idle,
            generation: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn status(&self) -> SlotStatus {
        match self.state {
            SlotState::Idle => SlotStatus::Idle,
            SlotState::Loading => SlotStatus::Loading,
            SlotState::Success(_) => SlotStatus::Success,
            SlotState::Error(_) => SlotStatus::Error,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SlotState::Loading)
    }

    pub fn parameter(&self) -> &ModeParameter {
        &self.parameter
    }

    pub fn source_image(&self) -> Option<&EncodedImage> {
        self.source.as_ref()
    }

    pub fn result(&self) -> Option<&EncodedImage> {
        match &self.state {
            SlotState::Success(image) => Some(image),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            SlotState::Error(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the parameter. Never allowed while a request is in flight; the
    /// owning pipeline may narrow this further.
    pub fn set_parameter(&mut self, parameter: ModeParameter) -> Result<(), SlotError> {
        if parameter.mode() != self.parameter.mode() {
            return Err(SlotError::ParameterMismatch {
                expected: self.parameter.mode(),
                got: parameter.mode(),
            });
        }
        if self.is_loading() {
            return Err(self.invalid("change parameter"));
        }
        self.parameter = parameter;
        Ok(())
    }

    /// Stores a source image without issuing a request.
    pub fn attach(&mut self, image: EncodedImage) -> Result<(), SlotError> {
        if !matches!(self.state, SlotState::Idle) {
            return Err(self.invalid("attach an image"));
        }
        if self.source.is_some() {
            return Err(SlotError::SourceAlreadySet { index: self.index });
        }
        if image.is_empty() {
            return Err(SlotError::MissingSource { index: self.index });
        }
        self.source = Some(image);
        Ok(())
    }

    pub fn begin(&mut self, image: EncodedImage) -> Result<TransformRequest, SlotError> {
        self.attach(image)?;
        self.enter_loading()
    }

    /// Starts a request from an Idle slot whose image was attached earlier.
    pub fn begin_attached(&mut self) -> Result<TransformRequest, SlotError> {
        if !matches!(self.state, SlotState::Idle) {
            return Err(self.invalid("begin"));
        }
        self.enter_loading()
    }

    /// Re-enters Loading with the stored source image and a prompt rendered
    /// from the current parameter.
    pub fn retry(&mut self) -> Result<TransformRequest, SlotError> {
        if !matches!(self.state, SlotState::Success(_) | SlotState::Error(_)) {
            return Err(self.invalid("retry"));
        }
        self.enter_loading()
    }

    /// Applies a successful response. Returns false when `ticket` no longer
    /// identifies this slot's current Loading period.
    pub fn complete(&mut self, ticket: &SlotTicket, image: EncodedImage) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        self.state = SlotState::Success(image);
        true
    }

    pub fn fail(&mut self, ticket: &SlotTicket, message: impl Into<String>) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        self.state = SlotState::Error(message.into());
        true
    }

    pub fn settle(
        &mut self,
        ticket: &SlotTicket,
        outcome: Result<EncodedImage, TransformError>,
    ) -> bool {
        match outcome {
            Ok(image) => self.complete(ticket, image),
            Err(error) => self.fail(ticket, error.user_message()),
        }
    }

    /// Back to Idle, dropping source, result and error. The parameter is kept.
    pub fn reset(&mut self) {
        if self.is_loading() {
            self.generation += 1;
        }
        self.source = None;
        self.state = SlotState::Idle;
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            index: self.index,
            status: self.status(),
            parameter: self.parameter.clone(),
            source_image: self.source.clone(),
            result: self.result().cloned(),
            error: self.error_message().map(str::to_string),
        }
    }

    fn enter_loading(&mut self) -> Result<TransformRequest, SlotError> {
        let image = match &self.source {
            Some(image) if !image.is_empty() => image.clone(),
            _ => return Err(SlotError::MissingSource { index: self.index }),
        };
        self.generation += 1;
        self.state = SlotState::Loading;
        Ok(TransformRequest {
            ticket: SlotTicket {
                epoch: self.epoch,
                index: self.index,
                generation: self.generation,
                request_id: Uuid::new_v4(),
            },
            image,
            prompt: build_prompt(&self.parameter),
        })
    }

    fn accepts(&self, ticket: &SlotTicket) -> bool {
        self.is_loading()
            && ticket.epoch == self.epoch
            && ticket.index == self.index
            && ticket.generation == self.generation
    }

    fn invalid(&self, operation: &'static str) -> SlotError {
        SlotError::InvalidTransition {
            index: self.index,
            operation,
            status: self.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(payload: &str) -> EncodedImage {
        EncodedImage::from_data_url(&format!("data:image/png;base64,{payload}"))
            .expect("test image should parse")
    }

    fn result_image() -> EncodedImage {
        EncodedImage::from_data_url("data:image/jpeg;base64,UkVTVUxU").expect("result image")
    }

    fn age_slot() -> Slot {
        Slot::new(1, 0, ModeParameter::Age(60))
    }

    #[test]
    fn begin_moves_idle_to_loading_and_renders_prompt() {
        let mut slot = age_slot();
        let request = slot.begin(image("QUJD")).expect("begin from idle");

        assert_eq!(slot.status(), SlotStatus::Loading);
        assert_eq!(request.image, image("QUJD"));
        assert!(request.prompt.contains("60"));
        assert_eq!(request.ticket.generation, slot.generation());
        assert_eq!(request.ticket.epoch, 1);
    }

    #[test]
    fn begin_while_loading_is_an_invalid_transition() {
        let mut slot = age_slot();
        slot.begin(image("QUJD")).expect("first begin");

        let err = slot.begin(image("REVG")).expect_err("second begin must fail");
        assert_eq!(
            err,
            SlotError::InvalidTransition {
                index: 0,
                operation: "attach an image",
                status: SlotStatus::Loading,
            }
        );
        let err = slot.retry().expect_err("retry while loading must fail");
        assert!(matches!(err, SlotError::InvalidTransition { operation: "retry", .. }));
    }

    #[test]
    fn begin_attached_without_image_is_rejected() {
        let mut slot = Slot::new(1, 1, ModeParameter::Country(String::from("Japan")));
        let err = slot.begin_attached().expect_err("no image attached");
        assert_eq!(err, SlotError::MissingSource { index: 1 });
        assert_eq!(slot.status(), SlotStatus::Idle);
    }

    #[test]
    fn complete_and_fail_only_apply_to_current_ticket() {
        let mut slot = age_slot();
        let request = slot.begin(image("QUJD")).expect("begin");

        let mut other = request.ticket;
        other.generation += 1;
        assert!(!slot.complete(&other, result_image()));
        assert_eq!(slot.status(), SlotStatus::Loading);

        assert!(slot.complete(&request.ticket, result_image()));
        assert_eq!(slot.status(), SlotStatus::Success);
        assert_eq!(slot.result(), Some(&result_image()));
        assert_eq!(slot.error_message(), None);

        assert!(!slot.fail(&request.ticket, "late"));
        assert_eq!(slot.status(), SlotStatus::Success);
    }

    #[test]
    fn failure_keeps_source_and_retry_reuses_it() {
        let mut slot = age_slot();
        let first = slot.begin(image("QUJD")).expect("begin");
        assert!(slot.settle(&first.ticket, Err(TransformError::NoResult)));
        assert_eq!(slot.status(), SlotStatus::Error);
        assert_eq!(slot.error_message(), Some("No image generated."));
        assert_eq!(slot.source_image(), Some(&image("QUJD")));
        assert_eq!(slot.result(), None);

        let second = slot.retry().expect("retry from error");
        assert_eq!(second.image, first.image);
        assert_ne!(second.ticket.generation, first.ticket.generation);
        assert_ne!(second.ticket.request_id, first.ticket.request_id);
        assert_eq!(slot.error_message(), None);
    }

    #[test]
    fn retry_from_idle_is_rejected() {
        let mut slot = age_slot();
        let err = slot.retry().expect_err("idle retry must fail");
        assert!(matches!(
            err,
            SlotError::InvalidTransition {
                status: SlotStatus::Idle,
                ..
            }
        ));
    }

    #[test]
    fn reset_during_loading_makes_response_stale() {
        let mut slot = age_slot();
        let request = slot.begin(image("QUJD")).expect("begin");
        slot.reset();

        assert!(!slot.complete(&request.ticket, result_image()));
        assert_eq!(slot.status(), SlotStatus::Idle);
        assert_eq!(slot.source_image(), None);
        assert_eq!(slot.result(), None);
    }

    #[test]
    fn late_failure_after_reset_is_discarded() {
        let mut slot = age_slot();
        let request = slot.begin(image("QUJD")).expect("begin");
        slot.reset();

        let refused = TransformError::ProviderRefused(String::from("blocked"));
        assert!(!slot.settle(&request.ticket, Err(refused)));
        assert_eq!(slot.status(), SlotStatus::Idle);
        assert_eq!(slot.error_message(), None);
        assert_eq!(slot.source_image(), None);
    }

    #[test]
    fn reset_of_idle_slot_is_idempotent() {
        let mut slot = age_slot();
        let before = slot.clone();
        slot.reset();
        assert_eq!(slot, before);
        slot.reset();
        assert_eq!(slot, before);
    }

    #[test]
    fn reset_keeps_parameter() {
        let mut slot = Slot::new(3, 0, ModeParameter::Country(String::from("Peru")));
        slot.attach(image("QUJD")).expect("attach");
        slot.reset();
        assert_eq!(slot.parameter(), &ModeParameter::Country(String::from("Peru")));
        assert_eq!(slot.source_image(), None);
    }

    #[test]
    fn attach_twice_requires_reset() {
        let mut slot = Slot::new(1, 0, ModeParameter::Reverse);
        slot.attach(image("QUJD")).expect("attach");
        let err = slot.attach(image("REVG")).expect_err("second attach");
        assert_eq!(err, SlotError::SourceAlreadySet { index: 0 });
    }

    #[test]
    fn parameter_changes_are_blocked_while_loading_and_by_mode() {
        let mut slot = Slot::new(1, 0, ModeParameter::Country(String::from("Chile")));
        let err = slot
            .set_parameter(ModeParameter::Age(30))
            .expect_err("mode mismatch");
        assert!(matches!(err, SlotError::ParameterMismatch { .. }));
        assert_eq!(err.to_string(), "a age parameter does not fit a country slot");

        slot.attach(image("QUJD")).expect("attach");
        slot.begin_attached().expect("begin");
        let err = slot
            .set_parameter(ModeParameter::Country(String::from("Kenya")))
            .expect_err("loading blocks edits");
        assert!(matches!(err, SlotError::InvalidTransition { .. }));
    }

    #[test]
    fn snapshot_reflects_exclusive_outcome() {
        let mut slot = age_slot();
        let request = slot.begin(image("QUJD")).expect("begin");
        slot.fail(&request.ticket, "boom");

        let snap = slot.snapshot();
        assert_eq!(snap.status, SlotStatus::Error);
        assert_eq!(snap.error.as_deref(), Some("boom"));
        assert!(snap.result.is_none());
        assert!(snap.source_image.is_some());
    }
}
