pub mod controller;
pub mod dual;
pub mod single;
pub mod slot;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::media::export::ExportTarget;
use crate::media::EncodedImage;
use crate::transform::client::{SharedTransformClient, TransformError};
use crate::transform::prompt::{Mode, ModeParameter};

pub use controller::{ModeController, ModeSwitch, SessionError, SessionSnapshot};
pub use slot::{SlotSnapshot, SlotStatus, SlotTicket, TransformRequest};

/// Where a response ended up once its call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "settlement", content = "status", rename_all = "snake_case")]
pub enum Settlement {
    Applied(SlotStatus),
    Discarded,
}

/// A request in flight. Dropping the handle does not cancel the call; the
/// response still settles against the slot.
#[derive(Debug)]
pub struct DispatchHandle {
    ticket: SlotTicket,
    task: JoinHandle<Settlement>,
}

impl DispatchHandle {
    pub fn ticket(&self) -> &SlotTicket {
        &self.ticket
    }

    pub async fn settled(self) -> Settlement {
        match self.task.await {
            Ok(settlement) => settlement,
            Err(error) => {
                warn!(request_id = %self.ticket.request_id, %error, "transform task aborted");
                Settlement::Discarded
            }
        }
    }
}

pub async fn settle_all(handles: Vec<DispatchHandle>) -> Vec<Settlement> {
    let mut settlements = Vec::with_capacity(handles.len());
    for handle in handles {
        settlements.push(handle.settled().await);
    }
    settlements
}

/// Shared front door to the mode controller. Every transition runs under a
/// short lock; transform calls run on the blocking pool with the lock released
/// and come back through the stale-response guard.
#[derive(Clone)]
pub struct TransformSession {
    controller: Arc<Mutex<ModeController>>,
    client: SharedTransformClient,
    timeout: Option<Duration>,
}

impl TransformSession {
    pub fn new(client: SharedTransformClient) -> Self {
        Self {
            controller: Arc::new(Mutex::new(ModeController::new())),
            client,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn slot_snapshot(&self, index: usize) -> Result<SlotSnapshot, SessionError> {
        Ok(self.lock().slot(index)?.snapshot())
    }

    pub fn mode(&self) -> Mode {
        self.lock().mode()
    }

    pub fn change_mode(&self, mode: Mode) -> ModeSwitch {
        self.lock().change_mode(mode)
    }

    pub fn set_single_parameter(&self, parameter: ModeParameter) -> Result<(), SessionError> {
        self.lock()
            .single_mut("change parameter")?
            .set_parameter(parameter)?;
        Ok(())
    }

    pub fn submit(&self, image: EncodedImage) -> Result<DispatchHandle, SessionError> {
        let (mode, request) = {
            let mut controller = self.lock();
            let mode = controller.mode();
            (mode, controller.single_mut("submit")?.submit(image)?)
        };
        Ok(self.dispatch(mode, request))
    }

    pub fn retry_single(&self) -> Result<DispatchHandle, SessionError> {
        let (mode, request) = {
            let mut controller = self.lock();
            let mode = controller.mode();
            (mode, controller.single_mut("retry")?.retry_submit()?)
        };
        Ok(self.dispatch(mode, request))
    }

    pub fn reset_single(&self) -> Result<(), SessionError> {
        self.lock().single_mut("reset")?.reset_submit();
        Ok(())
    }

    pub fn set_country(&self, index: usize, country: &str) -> Result<(), SessionError> {
        self.lock()
            .dual_mut("change country")?
            .set_country(index, country)?;
        Ok(())
    }

    pub fn attach_country_image(
        &self,
        index: usize,
        image: EncodedImage,
    ) -> Result<(), SessionError> {
        self.lock()
            .dual_mut("attach image")?
            .attach_image(index, image)?;
        Ok(())
    }

    /// `None` when the slot has no image yet or is already Loading.
    pub fn generate_one(&self, index: usize) -> Result<Option<DispatchHandle>, SessionError> {
        let request = self.lock().dual_mut("generate")?.generate_one(index)?;
        Ok(request.map(|request| self.dispatch(Mode::Country, request)))
    }

    pub fn generate_all(&self) -> Result<Vec<DispatchHandle>, SessionError> {
        let requests = self.lock().dual_mut("generate all")?.generate_all();
        Ok(requests
            .into_iter()
            .map(|request| self.dispatch(Mode::Country, request))
            .collect())
    }

    pub fn retry_country(&self, index: usize) -> Result<DispatchHandle, SessionError> {
        let request = self.lock().dual_mut("retry")?.retry(index)?;
        Ok(self.dispatch(Mode::Country, request))
    }

    pub fn reset_country(&self, index: usize) -> Result<(), SessionError> {
        self.lock().dual_mut("reset")?.reset(index)?;
        Ok(())
    }

    pub fn export_source(&self, index: usize) -> Result<(ExportTarget, EncodedImage), SessionError> {
        self.lock().export_source(index)
    }

    fn lock(&self) -> MutexGuard<'_, ModeController> {
        lock_controller(&self.controller)
    }

    fn dispatch(&self, mode: Mode, request: TransformRequest) -> DispatchHandle {
        let TransformRequest {
            ticket,
            image,
            prompt,
        } = request;
        info!(
            request_id = %ticket.request_id,
            index = ticket.index,
            mode = mode.as_str(),
            "transform request issued"
        );

        let controller = Arc::clone(&self.controller);
        let client = Arc::clone(&self.client);
        let timeout = self.timeout;
        let task = tokio::spawn(async move {
            let outcome = run_transform(client, image, prompt, timeout).await;
            settle_response(&controller, &ticket, outcome)
        });
        DispatchHandle { ticket, task }
    }
}

async fn run_transform(
    client: SharedTransformClient,
    image: EncodedImage,
    prompt: String,
    timeout: Option<Duration>,
) -> Result<EncodedImage, TransformError> {
    let call = tokio::task::spawn_blocking(move || client.transform(&image, &prompt));
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(joined) => joined,
            Err(_) => {
                return Err(TransformError::TransportFailure(format!(
                    "request timed out after {limit:?}"
                )))
            }
        },
        None => call.await,
    };
    joined.unwrap_or_else(|error| {
        Err(TransformError::TransportFailure(format!(
            "transform call failed: {error}"
        )))
    })
}

fn settle_response(
    controller: &Mutex<ModeController>,
    ticket: &SlotTicket,
    outcome: Result<EncodedImage, TransformError>,
) -> Settlement {
    match &outcome {
        Err(error @ TransformError::ProviderRefused(text)) => warn!(
            request_id = %ticket.request_id,
            index = ticket.index,
            code = error.code(),
            response = %text,
            "provider refused transform"
        ),
        Err(error) => info!(
            request_id = %ticket.request_id,
            index = ticket.index,
            code = error.code(),
            detail = error.detail().unwrap_or_default(),
            "transform call failed"
        ),
        Ok(_) => {}
    }

    let mut controller = lock_controller(controller);
    let applied = controller.settle(ticket, outcome);
    match controller.slot(ticket.index) {
        Ok(slot) if applied => {
            info!(
                request_id = %ticket.request_id,
                index = ticket.index,
                status = %slot.status(),
                "transform request settled"
            );
            Settlement::Applied(slot.status())
        }
        _ => {
            debug!(request_id = %ticket.request_id, index = ticket.index, "stale transform response discarded");
            Settlement::Discarded
        }
    }
}

fn lock_controller(controller: &Mutex<ModeController>) -> MutexGuard<'_, ModeController> {
    controller.lock().unwrap_or_else(PoisonError::into_inner)
}
