use crate::media::EncodedImage;
use crate::session::slot::{Slot, SlotError, SlotStatus, SlotTicket, TransformRequest};
use crate::transform::client::TransformError;
use crate::transform::prompt::{ModeParameter, DEFAULT_COUNTRIES};

pub const DUAL_SLOT_COUNT: usize = 2;

/// Two fully independent country slots. Nothing here is shared between the
/// slots; every operation is scoped to one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualSlotOrchestrator {
    slots: [Slot; DUAL_SLOT_COUNT],
}

impl DualSlotOrchestrator {
    pub(crate) fn new(epoch: u64) -> Self {
        Self {
            slots: [
                Slot::new(epoch, 0, country(DEFAULT_COUNTRIES[0])),
                Slot::new(epoch, 1, country(DEFAULT_COUNTRIES[1])),
            ],
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Result<&Slot, SlotError> {
        self.slots.get(index).ok_or(SlotError::NoSuchSlot { index })
    }

    pub fn is_busy(&self) -> bool {
        self.slots.iter().any(Slot::is_loading)
    }

    /// Country selection stays editable in every state except Loading.
    pub fn set_country(&mut self, index: usize, name: &str) -> Result<(), SlotError> {
        self.slot_mut(index)?.set_parameter(country(name.trim()))
    }

    pub fn attach_image(&mut self, index: usize, image: EncodedImage) -> Result<(), SlotError> {
        self.slot_mut(index)?.attach(image)
    }

    /// Issues one request for `index` when it holds an image and is not already
    /// Loading; otherwise a no-op.
    pub fn generate_one(&mut self, index: usize) -> Result<Option<TransformRequest>, SlotError> {
        let slot = self.slot_mut(index)?;
        if slot.source_image().is_none() {
            return Ok(None);
        }
        let request = match slot.status() {
            SlotStatus::Loading => return Ok(None),
            SlotStatus::Idle => slot.begin_attached()?,
            SlotStatus::Success | SlotStatus::Error => slot.retry()?,
        };
        Ok(Some(request))
    }

    pub fn generate_all(&mut self) -> Vec<TransformRequest> {
        (0..DUAL_SLOT_COUNT)
            .filter_map(|index| self.generate_one(index).ok().flatten())
            .collect()
    }

    pub fn retry(&mut self, index: usize) -> Result<TransformRequest, SlotError> {
        self.slot_mut(index)?.retry()
    }

    pub fn reset(&mut self, index: usize) -> Result<(), SlotError> {
        self.slot_mut(index)?.reset();
        Ok(())
    }

    pub(crate) fn settle(
        &mut self,
        ticket: &SlotTicket,
        outcome: Result<EncodedImage, TransformError>,
    ) -> bool {
        match self.slots.get_mut(ticket.index) {
            Some(slot) => slot.settle(ticket, outcome),
            None => false,
        }
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Slot, SlotError> {
        self.slots
            .get_mut(index)
            .ok_or(SlotError::NoSuchSlot { index })
    }
}

fn country(name: &str) -> ModeParameter {
    ModeParameter::Country(name.to_string())
}
