use crate::media::EncodedImage;
use crate::session::slot::{Slot, SlotError, SlotStatus, SlotTicket, TransformRequest};
use crate::transform::client::TransformError;
use crate::transform::prompt::{Mode, ModeParameter};

/// Drives the single slot of the Reverse, Age and Style modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleModePipeline {
    slot: Slot,
}

impl SingleModePipeline {
    pub(crate) fn new(epoch: u64, parameter: ModeParameter) -> Self {
        Self {
            slot: Slot::new(epoch, 0, parameter),
        }
    }

    pub fn mode(&self) -> Mode {
        self.slot.parameter().mode()
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_loading()
    }

    /// Parameter edits are only taken before an image is submitted; the value is
    /// frozen for the attempt once the slot leaves Idle.
    pub fn set_parameter(&mut self, parameter: ModeParameter) -> Result<(), SlotError> {
        if self.slot.status() != SlotStatus::Idle {
            return Err(SlotError::InvalidTransition {
                index: self.slot.index(),
                operation: "change parameter",
                status: self.slot.status(),
            });
        }
        self.slot.set_parameter(parameter)
    }

    pub fn submit(&mut self, image: EncodedImage) -> Result<TransformRequest, SlotError> {
        self.slot.begin(image)
    }

    /// Re-issues with the stored source image; the prompt is rendered from the
    /// parameter as it is now, not as it was on the previous attempt.
    pub fn retry_submit(&mut self) -> Result<TransformRequest, SlotError> {
        self.slot.retry()
    }

    pub fn reset_submit(&mut self) {
        self.slot.reset();
    }

    pub(crate) fn settle(
        &mut self,
        ticket: &SlotTicket,
        outcome: Result<EncodedImage, TransformError>,
    ) -> bool {
        self.slot.settle(ticket, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(payload: &str) -> EncodedImage {
        EncodedImage::from_data_url(&format!("data:image/jpeg;base64,{payload}"))
            .expect("test image should parse")
    }

    #[test]
    fn submit_renders_prompt_from_current_parameter() {
        let mut pipeline = SingleModePipeline::new(1, ModeParameter::Age(60));
        pipeline
            .set_parameter(ModeParameter::Age(25))
            .expect("idle edit");

        let request = pipeline.submit(image("QUJD")).expect("submit");
        assert!(request.prompt.contains("at age 25."));
        assert!(pipeline.is_busy());
    }

    #[test]
    fn parameter_is_frozen_after_submission() {
        let mut pipeline =
            SingleModePipeline::new(1, ModeParameter::Style(String::from("red hair")));
        let request = pipeline.submit(image("QUJD")).expect("submit");
        pipeline.settle(&request.ticket, Err(TransformError::NoResult));

        let err = pipeline
            .set_parameter(ModeParameter::Style(String::from("blue hair")))
            .expect_err("error state freezes parameter");
        assert!(matches!(
            err,
            SlotError::InvalidTransition {
                status: SlotStatus::Error,
                ..
            }
        ));
    }

    #[test]
    fn retry_reuses_source_byte_for_byte() {
        let mut pipeline = SingleModePipeline::new(1, ModeParameter::Reverse);
        let first = pipeline.submit(image("U09VUkNF")).expect("submit");
        pipeline.settle(
            &first.ticket,
            Err(TransformError::TransportFailure(String::from("quota"))),
        );
        assert_eq!(pipeline.slot().error_message(), Some("quota"));

        let second = pipeline.retry_submit().expect("retry");
        assert_eq!(
            second.image.as_data_url(),
            first.image.as_data_url()
        );
        assert_eq!(second.prompt, first.prompt);
    }

    #[test]
    fn submit_after_reset_carries_no_residue() {
        let mut pipeline = SingleModePipeline::new(1, ModeParameter::Reverse);
        let first = pipeline.submit(image("RklSU1Q=")).expect("first submit");
        pipeline.reset_submit();

        let second = pipeline.submit(image("U0VDT05E")).expect("second submit");
        assert_eq!(second.image, image("U0VDT05E"));
        assert!(!pipeline.settle(&first.ticket, Ok(image("T0xE"))));
        assert_eq!(pipeline.slot().status(), SlotStatus::Loading);
        assert!(pipeline.settle(&second.ticket, Ok(image("TkVX"))));
        assert_eq!(pipeline.slot().result(), Some(&image("TkVX")));
    }

    #[test]
    fn wrong_mode_parameter_is_rejected() {
        let mut pipeline = SingleModePipeline::new(1, ModeParameter::Age(60));
        let err = pipeline
            .set_parameter(ModeParameter::Style(String::new()))
            .expect_err("style does not fit age pipeline");
        assert!(matches!(err, SlotError::ParameterMismatch { .. }));
    }
}
