//! Mutation orchestration.
//!
//! A mutation runs one write action under a single-flight key. On success the
//! caller's hook runs first, then every declared prefix is invalidated across
//! the registered stores. On failure the cache is left untouched.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use super::error::MutationError;
use super::events::{EventBus, EventKind};
use super::inflight::InFlight;
use super::keys::{KeyPrefix, MutationKey};
use super::registry::CacheRegistry;

const METRIC_MUTATION: &str = "palsync_mutation_total";
const METRIC_MUTATION_BUSY: &str = "palsync_mutation_busy_total";
const METRIC_MUTATION_FAILED: &str = "palsync_mutation_failed_total";

pub type SuccessHook<O> = Box<dyn FnOnce(&O) + Send>;
pub type ErrorHook = Box<dyn FnOnce(&MutationError) + Send>;

/// Hooks and invalidation targets of one mutation call.
pub struct MutationOptions<O> {
    invalidates: Vec<KeyPrefix>,
    on_success: Option<SuccessHook<O>>,
    on_error: Option<ErrorHook>,
}

impl<O> MutationOptions<O> {
    pub fn new() -> Self {
        Self {
            invalidates: Vec::new(),
            on_success: None,
            on_error: None,
        }
    }

    /// Invalidate `prefix` after a successful run.
    pub fn invalidate(mut self, prefix: impl Into<KeyPrefix>) -> Self {
        self.invalidates.push(prefix.into());
        self
    }

    pub fn on_success(mut self, hook: impl FnOnce(&O) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl FnOnce(&MutationError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    pub fn invalidates(&self) -> &[KeyPrefix] {
        &self.invalidates
    }
}

impl<O> Default for MutationOptions<O> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Loading,
    Success,
    Error(MutationError),
}

/// Per-call mutation state, observable through a watch channel.
///
/// The state lives as long as the handle; dropping it drops the state.
pub struct MutationHandle {
    key: MutationKey,
    status: watch::Sender<MutationStatus>,
}

impl MutationHandle {
    pub fn new(key: impl Into<MutationKey>) -> Self {
        let (status, _) = watch::channel(MutationStatus::Idle);
        Self {
            key: key.into(),
            status,
        }
    }

    pub fn key(&self) -> &MutationKey {
        &self.key
    }

    pub fn status(&self) -> MutationStatus {
        self.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<MutationStatus> {
        self.status.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.status.borrow(), MutationStatus::Loading)
    }

    /// Return to idle, e.g. after the caller surfaced an error.
    pub fn reset(&self) {
        self.status.send_replace(MutationStatus::Idle);
    }

    fn set(&self, status: MutationStatus) {
        self.status.send_replace(status);
    }
}

pub struct MutationOrchestrator {
    registry: Arc<CacheRegistry>,
    in_flight: InFlight<MutationKey>,
    events: Arc<EventBus>,
}

impl MutationOrchestrator {
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        let events = Arc::clone(registry.events());
        Self {
            registry,
            in_flight: InFlight::new(),
            events,
        }
    }

    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    pub fn is_in_flight(&self, key: &MutationKey) -> bool {
        self.in_flight.contains(key)
    }

    /// Run `action` under `key` with a throwaway status handle.
    pub async fn mutate<I, O, A, Fut>(
        &self,
        key: &MutationKey,
        input: I,
        action: A,
        options: MutationOptions<O>,
    ) -> Result<O, MutationError>
    where
        A: FnOnce(I) -> Fut,
        Fut: Future<Output = Result<O, MutationError>>,
    {
        let handle = MutationHandle::new(key.clone());
        self.run(&handle, input, action, options).await
    }

    /// Run `action` under the handle's key, reporting progress on its status
    /// channel.
    ///
    /// A call whose key is already in flight fails with
    /// [`MutationError::Busy`] without running the action; the first call
    /// is unaffected, including the status of a handle both calls share.
    #[instrument(skip_all, fields(mutation_key = %handle.key()))]
    pub async fn run<I, O, A, Fut>(
        &self,
        handle: &MutationHandle,
        input: I,
        action: A,
        options: MutationOptions<O>,
    ) -> Result<O, MutationError>
    where
        A: FnOnce(I) -> Fut,
        Fut: Future<Output = Result<O, MutationError>>,
    {
        let MutationOptions {
            invalidates,
            on_success,
            on_error,
        } = options;
        let key = handle.key().clone();

        let Ok(_guard) = self.in_flight.acquire(&key) else {
            counter!(METRIC_MUTATION_BUSY).increment(1);
            debug!("Mutation rejected; key already in flight");
            let error = MutationError::Busy { key: key.clone() };
            if let Some(hook) = on_error {
                hook(&error);
            }
            self.events
                .publish(EventKind::MutationRejected { key: key.clone() });
            // A shared handle keeps reporting the running call.
            if !handle.is_loading() {
                handle.set(MutationStatus::Error(error.clone()));
            }
            return Err(error);
        };

        counter!(METRIC_MUTATION).increment(1);
        handle.set(MutationStatus::Loading);
        self.events
            .publish(EventKind::MutationStarted { key: key.clone() });

        match action(input).await {
            Ok(output) => {
                if let Some(hook) = on_success {
                    hook(&output);
                }
                let marked = self.registry.invalidate_all(&invalidates);
                debug!(invalidated = marked.len(), "Mutation succeeded");
                self.events
                    .publish(EventKind::MutationSucceeded { key: key.clone() });
                handle.set(MutationStatus::Success);
                Ok(output)
            }
            Err(error) => {
                counter!(METRIC_MUTATION_FAILED).increment(1);
                warn!(error = %error, "Mutation failed");
                if let Some(hook) = on_error {
                    hook(&error);
                }
                self.events.publish(EventKind::MutationFailed {
                    key: key.clone(),
                    message: error.to_string(),
                });
                handle.set(MutationStatus::Error(error.clone()));
                Err(error)
            }
        }
    }
}

/// Progress through a fixed sequence of dependent steps.
///
/// The first failing step stops the sequence. A failure after at least one
/// completed step is reported as [`MutationError::PartialFailure`]; completed
/// steps are not undone.
#[derive(Debug)]
pub struct StepProgress {
    completed: usize,
    total: usize,
}

impl StepProgress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub async fn step<T, E, Fut>(&mut self, step: Fut) -> Result<T, MutationError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<MutationError>,
    {
        match step.await {
            Ok(value) => {
                self.completed += 1;
                Ok(value)
            }
            Err(error) => Err(self.fail(error.into())),
        }
    }

    fn fail(&self, error: MutationError) -> MutationError {
        if self.completed == 0 {
            return error;
        }
        warn!(
            completed = self.completed,
            total = self.total,
            "Multi-step mutation aborted; completed steps are kept"
        );
        MutationError::PartialFailure {
            completed: self.completed,
            total: self.total,
            source: Box::new(error),
        }
    }
}
