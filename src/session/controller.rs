use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::media::export::ExportTarget;
use crate::media::EncodedImage;
use crate::session::dual::DualSlotOrchestrator;
use crate::session::single::SingleModePipeline;
use crate::session::slot::{Slot, SlotError, SlotSnapshot, SlotTicket};
use crate::transform::client::TransformError;
use crate::transform::prompt::{Mode, ModeParameter, DEFAULT_AGE, DEFAULT_STYLE};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("{operation} is not available in {} mode", .active.as_str())]
    WrongMode {
        active: Mode,
        operation: &'static str,
    },
    #[error("slot {index} has no result to export")]
    NothingToExport { index: usize },
    #[error(transparent)]
    Slot(#[from] SlotError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSwitch {
    Switched,
    RejectedBusy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ActivePipeline {
    Single(SingleModePipeline),
    Dual(DualSlotOrchestrator),
}

impl ActivePipeline {
    fn is_busy(&self) -> bool {
        match self {
            Self::Single(single) => single.is_busy(),
            Self::Dual(dual) => dual.is_busy(),
        }
    }

    fn slots(&self) -> &[Slot] {
        match self {
            Self::Single(single) => std::slice::from_ref(single.slot()),
            Self::Dual(dual) => dual.slots(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub busy: bool,
    pub slots: Vec<SlotSnapshot>,
}

/// Owns the selected mode and the pipeline or orchestrator serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeController {
    mode: Mode,
    epoch: u64,
    active: ActivePipeline,
    last_age: u32,
    last_style: String,
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeController {
    pub fn new() -> Self {
        let epoch = 1;
        Self {
            mode: Mode::Reverse,
            epoch,
            active: ActivePipeline::Single(SingleModePipeline::new(epoch, ModeParameter::Reverse)),
            last_age: DEFAULT_AGE,
            last_style: String::from(DEFAULT_STYLE),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_busy()
    }

    /// Rejected while any owned slot is Loading. Otherwise the current slots are
    /// torn down and fresh ones are activated under a new epoch, so responses
    /// still in flight for the old slots can no longer land.
    pub fn change_mode(&mut self, mode: Mode) -> ModeSwitch {
        if self.is_busy() {
            debug!(from = self.mode.as_str(), to = mode.as_str(), "mode change rejected while busy");
            return ModeSwitch::RejectedBusy;
        }

        if let ActivePipeline::Single(single) = &self.active {
            match single.slot().parameter() {
                ModeParameter::Age(age) => self.last_age = *age,
                ModeParameter::Style(style) => self.last_style = style.clone(),
                ModeParameter::Reverse | ModeParameter::Country(_) => {}
            }
        }

        self.epoch += 1;
        self.mode = mode;
        self.active = match mode {
            Mode::Reverse => ActivePipeline::Single(SingleModePipeline::new(
                self.epoch,
                ModeParameter::Reverse,
            )),
            Mode::Age => ActivePipeline::Single(SingleModePipeline::new(
                self.epoch,
                ModeParameter::Age(self.last_age),
            )),
            Mode::Style => ActivePipeline::Single(SingleModePipeline::new(
                self.epoch,
                ModeParameter::Style(self.last_style.clone()),
            )),
            Mode::Country => ActivePipeline::Dual(DualSlotOrchestrator::new(self.epoch)),
        };
        info!(mode = mode.as_str(), epoch = self.epoch, "mode activated");
        ModeSwitch::Switched
    }

    pub fn single_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut SingleModePipeline, SessionError> {
        match &mut self.active {
            ActivePipeline::Single(single) => Ok(single),
            ActivePipeline::Dual(_) => Err(SessionError::WrongMode {
                active: self.mode,
                operation,
            }),
        }
    }

    pub fn dual_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut DualSlotOrchestrator, SessionError> {
        match &mut self.active {
            ActivePipeline::Dual(dual) => Ok(dual),
            ActivePipeline::Single(_) => Err(SessionError::WrongMode {
                active: self.mode,
                operation,
            }),
        }
    }

    pub fn slot(&self, index: usize) -> Result<&Slot, SessionError> {
        self.active
            .slots()
            .get(index)
            .ok_or(SessionError::Slot(SlotError::NoSuchSlot { index }))
    }

    /// Routes a response to the slot its ticket names. Returns false when the
    /// response is stale and was dropped.
    pub fn settle(
        &mut self,
        ticket: &SlotTicket,
        outcome: Result<EncodedImage, TransformError>,
    ) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        match &mut self.active {
            ActivePipeline::Single(single) => single.settle(ticket, outcome),
            ActivePipeline::Dual(dual) => dual.settle(ticket, outcome),
        }
    }

    pub fn export_source(&self, index: usize) -> Result<(ExportTarget, EncodedImage), SessionError> {
        let result = self
            .slot(index)?
            .result()
            .cloned()
            .ok_or(SessionError::NothingToExport { index })?;
        let target = match self.active {
            ActivePipeline::Single(_) => ExportTarget::Single,
            ActivePipeline::Dual(_) => ExportTarget::CountrySlot(index),
        };
        Ok((target, result))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            busy: self.is_busy(),
            slots: self.active.slots().iter().map(Slot::snapshot).collect(),
        }
    }
}
