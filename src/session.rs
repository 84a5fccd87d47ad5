//! The editing session: current image, instruction and request status.
//!
//! [`RequestStatus`] holds exactly one of idle, loading, success or error.
//! The session issues at most one edit request at a time; a request that is
//! still outstanding blocks new ones even after the user picks another image.

use crate::error::Result;
use crate::image::{EditClient, EditedImage, UploadedImage};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

/// Instruction shown before the user types anything.
pub const DEFAULT_INSTRUCTION: &str =
    "A person looking at the Eiffel Tower in Paris, dramatic lighting.";

/// Error message when the model answers without an image.
pub const NO_IMAGE_MESSAGE: &str =
    "The AI could not generate an image from the response. Please try a different prompt.";

/// Lifecycle of the edit request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestStatus {
    /// Nothing requested, or inputs changed since the last result.
    #[default]
    Idle,
    /// A request is in flight.
    Loading,
    /// The model produced an edited image.
    Success(EditedImage),
    /// The last request failed; the message is shown to the user.
    Error(String),
}

impl RequestStatus {
    /// Short label for logs and status lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
        }
    }
}

/// Identifier of an issued edit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a generate action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    /// No image has been selected.
    #[error("Please upload an image first.")]
    NoImage,
    /// The instruction is empty.
    #[error("Please describe the edit you want.")]
    EmptyInstruction,
    /// Another request is still outstanding.
    #[error("An edit is already in progress.")]
    InFlight,
}

/// Everything needed to run one edit request outside the session.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    /// Request identifier, passed back to [`EditSession::complete`].
    pub id: RequestId,
    /// Base64 payload of the source image.
    pub image_payload: String,
    /// Media type of the source image.
    pub media_type: String,
    /// Instruction text at the time of the request.
    pub instruction: String,
}

impl PendingEdit {
    /// Runs the request against `client`.
    pub async fn run(&self, client: &dyn EditClient) -> Result<Option<EditedImage>> {
        client
            .submit_edit(&self.image_payload, &self.media_type, &self.instruction)
            .await
    }
}

/// State of one editing session.
#[derive(Debug, Clone)]
pub struct EditSession {
    image: Option<UploadedImage>,
    instruction: String,
    status: RequestStatus,
    in_flight: Option<RequestId>,
    next_id: u64,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditSession {
    /// Creates an idle session with no image and the default instruction.
    pub fn new() -> Self {
        Self {
            image: None,
            instruction: DEFAULT_INSTRUCTION.to_string(),
            status: RequestStatus::Idle,
            in_flight: None,
            next_id: 1,
        }
    }

    /// The selected image, if any.
    pub fn image(&self) -> Option<&UploadedImage> {
        self.image.as_ref()
    }

    /// The current instruction.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// The current request status.
    pub fn status(&self) -> &RequestStatus {
        &self.status
    }

    /// The edited image, when the last request succeeded.
    pub fn result(&self) -> Option<&EditedImage> {
        match &self.status {
            RequestStatus::Success(image) => Some(image),
            _ => None,
        }
    }

    /// True while the session waits for a request it will apply.
    pub fn is_loading(&self) -> bool {
        self.status == RequestStatus::Loading
    }

    /// True while any request is outstanding, including one orphaned by a new image.
    pub fn has_request_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Replaces the image and returns to idle, clearing result and error.
    pub fn select_image(&mut self, image: UploadedImage) {
        if let Some(id) = self.in_flight.filter(|_| self.is_loading()) {
            tracing::debug!(request = %id, "image replaced while request outstanding");
        }
        self.image = Some(image);
        self.status = RequestStatus::Idle;
    }

    /// Replaces the instruction text. The status is unchanged.
    pub fn set_instruction(&mut self, text: impl Into<String>) {
        self.instruction = text.into();
    }

    /// Checks whether generate is currently allowed.
    pub fn check_generate(&self) -> std::result::Result<(), Rejected> {
        if self.image.is_none() {
            return Err(Rejected::NoImage);
        }
        if self.instruction.trim().is_empty() {
            return Err(Rejected::EmptyInstruction);
        }
        if self.in_flight.is_some() {
            return Err(Rejected::InFlight);
        }
        Ok(())
    }

    /// Convenience form of [`check_generate`](Self::check_generate) for enabling a control.
    pub fn can_generate(&self) -> bool {
        self.check_generate().is_ok()
    }

    /// Starts a request: clears result and error and enters loading.
    ///
    /// On rejection nothing changes.
    pub fn begin_generate(&mut self) -> std::result::Result<PendingEdit, Rejected> {
        self.check_generate()?;
        let Some(image) = self.image.as_ref() else {
            return Err(Rejected::NoImage);
        };

        let id = RequestId(self.next_id);
        self.next_id += 1;

        let pending = PendingEdit {
            id,
            image_payload: image.encoded().to_string(),
            media_type: image.media_type().to_string(),
            instruction: self.instruction.clone(),
        };

        self.in_flight = Some(id);
        self.status = RequestStatus::Loading;
        tracing::info!(request = %id, media_type = %pending.media_type, "edit request started");
        Ok(pending)
    }

    /// Applies the outcome of request `id`.
    ///
    /// Returns false when the outcome was dropped because the request is not
    /// the one being awaited.
    pub fn complete(&mut self, id: RequestId, outcome: Result<Option<EditedImage>>) -> bool {
        if self.in_flight != Some(id) {
            tracing::debug!(request = %id, "ignoring completion of unknown request");
            return false;
        }
        self.in_flight = None;

        if !self.is_loading() {
            tracing::debug!(request = %id, "dropping result for replaced image");
            return false;
        }

        self.status = match outcome {
            Ok(Some(image)) => RequestStatus::Success(image),
            Ok(None) => RequestStatus::Error(NO_IMAGE_MESSAGE.to_string()),
            Err(e) => RequestStatus::Error(e.to_string()),
        };
        tracing::info!(request = %id, status = self.status.label(), "edit request finished");
        true
    }

    /// Runs one full request against `client` and returns the resulting status.
    pub async fn generate(
        &mut self,
        client: &dyn EditClient,
    ) -> std::result::Result<&RequestStatus, Rejected> {
        let pending = self.begin_generate()?;
        let outcome = pending.run(client).await;
        self.complete(pending.id, outcome);
        Ok(&self.status)
    }
}

/// Shared session for front ends driven by an event loop.
///
/// Inputs stay usable while a request runs on a background task.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<EditSession>>,
    client: Arc<dyn EditClient>,
}

impl SessionHandle {
    /// Wraps `session`, sending requests through `client`.
    pub fn new(session: EditSession, client: Arc<dyn EditClient>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            client,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EditSession> {
        // A panic while holding the lock cannot leave the session half-updated:
        // every transition assigns whole fields.
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` with read access to the session.
    pub fn with_session<R>(&self, f: impl FnOnce(&EditSession) -> R) -> R {
        f(&self.lock())
    }

    /// Returns a copy of the current session.
    pub fn snapshot(&self) -> EditSession {
        self.lock().clone()
    }

    /// See [`EditSession::select_image`].
    pub fn select_image(&self, image: UploadedImage) {
        self.lock().select_image(image);
    }

    /// See [`EditSession::set_instruction`].
    pub fn set_instruction(&self, text: impl Into<String>) {
        self.lock().set_instruction(text);
    }

    /// Starts a request on a background task.
    ///
    /// A trigger while another request is outstanding is rejected here, so at
    /// most one request is ever in flight.
    pub fn trigger_generate(&self) -> std::result::Result<JoinHandle<()>, Rejected> {
        let pending = self.lock().begin_generate()?;
        let session = Arc::clone(&self.session);
        let client = Arc::clone(&self.client);

        Ok(tokio::spawn(async move {
            let outcome = pending.run(client.as_ref()).await;
            session
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .complete(pending.id, outcome);
        }))
    }
}
