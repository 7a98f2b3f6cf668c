//! Ordered fallback across prediction backends.
//!
//! A [`FallbackChain`] owns its backends in priority order. Each call returns a
//! [`BackendOutcome`]; anything but `Success` moves on to the next backend, and
//! when the list is exhausted the chain's terminal function produces the answer.

use async_trait::async_trait;

use crate::chat;
use crate::detection::{DetectionResult, LeafImage};
use crate::error::BackendError;

#[derive(Debug)]
pub enum BackendOutcome<T> {
    Success(T),
    /// The backend ran but had nothing to say.
    Empty,
    Failed(BackendError),
}

impl<T> BackendOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, BackendOutcome::Success(_))
    }
}

impl<T> From<Result<Option<T>, BackendError>> for BackendOutcome<T> {
    fn from(result: Result<Option<T>, BackendError>) -> Self {
        match result {
            Ok(Some(value)) => BackendOutcome::Success(value),
            Ok(None) => BackendOutcome::Empty,
            Err(err) => BackendOutcome::Failed(err),
        }
    }
}

#[async_trait]
pub trait Backend<Req: ?Sized + Sync, Res: Send>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn invoke(&self, request: &Req) -> BackendOutcome<Res>;
}

pub struct FallbackChain<Req: ?Sized + Sync, Res: Send> {
    backends: Vec<Box<dyn Backend<Req, Res>>>,
    terminal: Box<dyn Fn(&Req) -> Res + Send + Sync>,
}

impl<Req: ?Sized + Sync, Res: Send> FallbackChain<Req, Res> {
    pub fn new<F>(terminal: F) -> Self
    where
        F: Fn(&Req) -> Res + Send + Sync + 'static,
    {
        Self {
            backends: Vec::new(),
            terminal: Box::new(terminal),
        }
    }

    /// Appends a backend with lower priority than every backend already added.
    pub fn with_backend(mut self, backend: Box<dyn Backend<Req, Res>>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub async fn dispatch(&self, request: &Req) -> Res {
        for backend in &self.backends {
            match backend.invoke(request).await {
                BackendOutcome::Success(value) => {
                    tracing::info!("{} answered", backend.name());
                    return value;
                }
                BackendOutcome::Empty => {
                    tracing::warn!("{} returned no result, falling back", backend.name());
                }
                BackendOutcome::Failed(err) => {
                    tracing::warn!("{} failed, falling back: {}", backend.name(), err);
                }
            }
        }

        tracing::info!("no backend answered, using terminal response");
        (self.terminal)(request)
    }
}

pub type DetectionChain = FallbackChain<LeafImage, DetectionResult>;
pub type ChatChain = FallbackChain<str, String>;

pub fn detection_chain() -> DetectionChain {
    FallbackChain::new(|_: &LeafImage| DetectionResult::unavailable())
}

pub fn chat_chain() -> ChatChain {
    FallbackChain::new(|query: &str| chat::rule_based_reply(query).to_string())
}
