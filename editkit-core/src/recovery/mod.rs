//! # Engine failure recovery
//!
//! The [`RecoveryCoordinator`] decides whether a failure surfaced by an
//! adapter came from the wrapped engine, rate-limits how often it reacts,
//! and drives a fixed recovery sequence against the live adapter.
//!
//! ## Recovery sequence
//!
//! ```text
//! 1. reset-state hook
//! 2. adapter.stop_drawing()            (failure recorded, not fatal)
//! 3. +100ms  enable-mouse-events hook   (deferred)
//! 4. null reference only: probe canvas, clear-hanging-references hook
//! 5. +200ms  validate-editor-state hook (deferred)
//! ```
//!
//! Every step runs even if an earlier one failed. Deferred steps hold the
//! session's lifetime token and do nothing once the session is destroyed.
//!
//! ## Budget
//!
//! - more than `max_errors_per_window` calls in one window: refused
//!   (`RateLimited`), whatever the failure kind
//! - `max_recovery_attempts` in flight: refused (`RecoveryExhausted`);
//!   each successful recovery returns its attempt after `attempt_decay_ms`,
//!   one that ends in re-initialization after `escalation_decay_ms`

pub mod classify;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub use classify::{classify, is_null_access, FailureKind};

use crate::adapter::{lock, EditorAdapter, SessionLifetime, SharedAdapter};
use crate::config::{MissingCanvasPolicy, RecoveryConfig};
use crate::error::{AdapterError, AdapterResult, EngineFault};

/// Error type returned by recovery hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// A caller-supplied recovery hook.
pub type Hook = Arc<dyn Fn() -> Result<(), HookError> + Send + Sync>;

/// Hooks the view layer offers to the recovery sequence.
///
/// All hooks are optional; a missing hook skips its step.
#[derive(Clone, Default)]
pub struct RecoveryContext {
    reset_state: Option<Hook>,
    enable_mouse_events: Option<Hook>,
    clear_hanging_references: Option<Hook>,
    validate_editor_state: Option<Hook>,
}

impl RecoveryContext {
    /// A context without hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset view-side editing state (step 1).
    #[must_use]
    pub fn on_reset_state<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.reset_state = Some(Arc::new(hook));
        self
    }

    /// Re-enable pointer handling (step 3, deferred).
    #[must_use]
    pub fn on_enable_mouse_events<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.enable_mouse_events = Some(Arc::new(hook));
        self
    }

    /// Drop view-side references to engine objects (step 4).
    #[must_use]
    pub fn on_clear_hanging_references<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.clear_hanging_references = Some(Arc::new(hook));
        self
    }

    /// Validate overall editor state (step 5, deferred).
    #[must_use]
    pub fn on_validate_editor_state<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.validate_editor_state = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for RecoveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryContext")
            .field("reset_state", &self.reset_state.is_some())
            .field("enable_mouse_events", &self.enable_mouse_events.is_some())
            .field(
                "clear_hanging_references",
                &self.clear_hanging_references.is_some(),
            )
            .field("validate_editor_state", &self.validate_editor_state.is_some())
            .finish()
    }
}

/// One step of the recovery sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStep {
    /// Step 1.
    ResetState,
    /// Step 2.
    StopDrawing,
    /// Step 3.
    EnableMouseEvents,
    /// Step 4, clearing view references.
    ClearHangingReferences,
    /// Step 5.
    ValidateEditorState,
}

impl fmt::Display for RecoveryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResetState => "reset_state",
            Self::StopDrawing => "stop_drawing",
            Self::EnableMouseEvents => "enable_mouse_events",
            Self::ClearHangingReferences => "clear_hanging_references",
            Self::ValidateEditorState => "validate_editor_state",
        };
        f.write_str(name)
    }
}

/// Coordinator state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPhase {
    /// Waiting for failures.
    Idle,
    /// Classifying and checking the budget.
    Handling,
    /// Running the recovery sequence.
    Recovering,
    /// The last failure was refused. Left on the next failure.
    Refused,
}

/// Why a failure was not recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalReason {
    /// Too many failures in the current window.
    RateLimited,
    /// The failure did not come from the engine.
    NotEngineError,
    /// All recovery attempts are in use.
    RecoveryExhausted,
}

/// Result of handling one failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// The sequence ran to completion.
    Recovered {
        /// Classification of the failure.
        kind: FailureKind,
        /// Synchronous steps that failed and were skipped over.
        failed_steps: Vec<RecoveryStep>,
    },
    /// Handling was refused.
    Refused(RefusalReason),
    /// The canvas handle is gone; the session must be re-initialized.
    ReinitializeRequired,
}

impl RecoveryOutcome {
    /// Whether the sequence ran to completion.
    #[must_use]
    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::Recovered { .. })
    }
}

/// Snapshot of coordinator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecoveryStats {
    /// Failures counted in the current window.
    pub error_count: u32,
    /// Attempts currently in use.
    pub recovery_attempts: u32,
    /// Sequences that ran to completion.
    pub recovered: u64,
    /// Failures refused for rate limit or exhaustion.
    pub refused: u64,
    /// Failures ignored as not engine-related.
    pub ignored: u64,
    /// Sequences that ended requiring re-initialization.
    pub reinitialize_required: u64,
}

#[derive(Debug)]
struct RecoveryState {
    window_start: Option<Instant>,
    phase: RecoveryPhase,
    stats: RecoveryStats,
}

/// Classifies adapter failures and drives bounded recovery.
///
/// Cloning shares counters, so one coordinator can serve many adapters (one
/// noisy adapter then spends the budget for all of them). Construct
/// separate instances for isolated budgets.
#[derive(Clone)]
pub struct RecoveryCoordinator {
    config: Arc<RecoveryConfig>,
    state: Arc<Mutex<RecoveryState>>,
}

impl Default for RecoveryCoordinator {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}

impl fmt::Debug for RecoveryCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryCoordinator")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl RecoveryCoordinator {
    /// Create a coordinator with its own counters.
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(RecoveryState {
                window_start: None,
                phase: RecoveryPhase::Idle,
                stats: RecoveryStats::default(),
            })),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Current state machine phase.
    #[must_use]
    pub fn phase(&self) -> RecoveryPhase {
        self.lock_state().phase
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> RecoveryStats {
        self.lock_state().stats
    }

    /// Clear all counters and the rate-limit window.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        state.window_start = None;
        state.stats = RecoveryStats::default();
        state.phase = RecoveryPhase::Idle;
    }

    fn lock_state(&self) -> MutexGuard<'_, RecoveryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle a failure raised while operating `adapter`.
    ///
    /// Returns `true` if the recovery sequence ran to completion, `false` if
    /// handling was refused or the session needs re-initialization. Never
    /// panics or escalates.
    pub fn handle_error(
        &self,
        fault: &EngineFault,
        adapter: &SharedAdapter,
        context: &RecoveryContext,
    ) -> bool {
        self.handle_error_detailed(fault, adapter, context)
            .is_recovered()
    }

    /// Like [`handle_error`](Self::handle_error), returning the full outcome.
    #[tracing::instrument(name = "recover_engine_failure", skip_all)]
    pub fn handle_error_detailed(
        &self,
        fault: &EngineFault,
        adapter: &SharedAdapter,
        context: &RecoveryContext,
    ) -> RecoveryOutcome {
        let (adapter_type, signatures) = {
            let guard = lock(adapter);
            (guard.adapter_type(), guard.engine_signatures())
        };
        let kind = classify(fault, &signatures);

        if let Err(reason) = self.admit(kind) {
            if reason == RefusalReason::NotEngineError {
                tracing::debug!("Ignoring non-engine failure on {adapter_type}: {fault}");
            } else {
                tracing::warn!("Recovery refused on {adapter_type} ({reason:?}): {fault}");
            }
            return RecoveryOutcome::Refused(reason);
        }

        tracing::info!("Recovering {adapter_type} from {kind:?}: {fault}");
        let outcome = self.run_sequence(kind, adapter, context);
        self.finish(&outcome);
        outcome
    }

    /// Count the failure and reserve an attempt, or refuse.
    fn admit(&self, kind: FailureKind) -> Result<(), RefusalReason> {
        let mut state = self.lock_state();
        state.phase = RecoveryPhase::Handling;

        let now = Instant::now();
        match state.window_start {
            Some(start) if now.duration_since(start) <= self.config.window() => {}
            _ => {
                state.window_start = Some(now);
                state.stats.error_count = 0;
            }
        }
        state.stats.error_count += 1;

        let refusal = if state.stats.error_count > self.config.max_errors_per_window {
            Some(RefusalReason::RateLimited)
        } else if !kind.is_engine_related() {
            Some(RefusalReason::NotEngineError)
        } else if state.stats.recovery_attempts >= self.config.max_recovery_attempts {
            Some(RefusalReason::RecoveryExhausted)
        } else {
            None
        };

        match refusal {
            Some(RefusalReason::NotEngineError) => {
                state.stats.ignored += 1;
                state.phase = RecoveryPhase::Idle;
                Err(RefusalReason::NotEngineError)
            }
            Some(reason) => {
                state.stats.refused += 1;
                state.phase = RecoveryPhase::Refused;
                Err(reason)
            }
            None => {
                state.stats.recovery_attempts += 1;
                state.phase = RecoveryPhase::Recovering;
                Ok(())
            }
        }
    }

    fn run_sequence(
        &self,
        kind: FailureKind,
        adapter: &SharedAdapter,
        context: &RecoveryContext,
    ) -> RecoveryOutcome {
        let mut failed_steps = Vec::new();
        let lifetime = lock(adapter).lifetime();

        if let Some(hook) = &context.reset_state {
            if !run_hook(RecoveryStep::ResetState, hook) {
                failed_steps.push(RecoveryStep::ResetState);
            }
        }

        if !run_step(RecoveryStep::StopDrawing, || lock(adapter).stop_drawing()) {
            failed_steps.push(RecoveryStep::StopDrawing);
        }

        defer_hook(
            self.config.enable_events_delay(),
            RecoveryStep::EnableMouseEvents,
            context.enable_mouse_events.clone(),
            lifetime.clone(),
        );

        let mut reinitialize = false;
        if kind == FailureKind::NullReference {
            let health = lock(adapter).health();
            if !health.canvas_present {
                tracing::warn!("Canvas handle missing after null reference; re-initialization required");
                reinitialize = self.config.missing_canvas == MissingCanvasPolicy::Escalate;
            }
            if let Some(hook) = &context.clear_hanging_references {
                if !run_hook(RecoveryStep::ClearHangingReferences, hook) {
                    failed_steps.push(RecoveryStep::ClearHangingReferences);
                }
            }
        }

        defer_hook(
            self.config.validate_delay(),
            RecoveryStep::ValidateEditorState,
            context.validate_editor_state.clone(),
            lifetime,
        );

        if reinitialize {
            RecoveryOutcome::ReinitializeRequired
        } else {
            RecoveryOutcome::Recovered { kind, failed_steps }
        }
    }

    fn finish(&self, outcome: &RecoveryOutcome) {
        let mut state = self.lock_state();
        state.phase = RecoveryPhase::Idle;
        match outcome {
            RecoveryOutcome::Recovered { .. } => {
                state.stats.recovered += 1;
                drop(state);
                self.schedule_decay(self.config.attempt_decay());
            }
            RecoveryOutcome::ReinitializeRequired => {
                tracing::error!("Recovery ended without a usable canvas");
                state.stats.reinitialize_required += 1;
                drop(state);
                self.schedule_decay(self.config.escalation_decay());
            }
            RecoveryOutcome::Refused(_) => {}
        }
    }

    fn schedule_decay(&self, delay: Duration) {
        let state = Arc::clone(&self.state);
        spawn_deferred(delay, move || {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.stats.recovery_attempts = state.stats.recovery_attempts.saturating_sub(1);
            tracing::trace!(
                "Recovery attempt returned ({} in use)",
                state.stats.recovery_attempts
            );
        });
    }

    /// Run `op` against `adapter` with health checks and recovery.
    ///
    /// Returns `Ok(None)` when the adapter is unhealthy (the call is skipped)
    /// or when the engine failed and the failure went to recovery.
    ///
    /// # Errors
    ///
    /// Contract violations (`NotInitialized`, `InvalidInput`, ...) are
    /// returned unchanged.
    pub fn run_safely<T, F>(
        &self,
        adapter: &SharedAdapter,
        context: &RecoveryContext,
        op: F,
    ) -> AdapterResult<Option<T>>
    where
        F: FnOnce(&mut dyn EditorAdapter) -> AdapterResult<T>,
    {
        let result = {
            let mut guard = lock(adapter);
            let health = guard.health();
            if !health.is_healthy() {
                tracing::debug!(
                    "Skipping operation on unhealthy {} adapter: {health:?}",
                    guard.adapter_type()
                );
                return Ok(None);
            }
            op(&mut **guard)
        };

        match result {
            Ok(value) => Ok(Some(value)),
            Err(AdapterError::Engine(fault)) => {
                let recovered = self.handle_error(&fault, adapter, context);
                tracing::debug!("Intercepted engine failure (recovered: {recovered})");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Wrap `op` so every call goes through [`run_safely`](Self::run_safely).
    pub fn wrap_safely<T, F>(
        &self,
        mut op: F,
        adapter: SharedAdapter,
        context: RecoveryContext,
    ) -> impl FnMut() -> AdapterResult<Option<T>>
    where
        F: FnMut(&mut dyn EditorAdapter) -> AdapterResult<T>,
    {
        let coordinator = self.clone();
        move || coordinator.run_safely(&adapter, &context, &mut op)
    }
}

/// Run one step, logging an error or a panic as a failed step.
fn run_step<E, F>(step: RecoveryStep, f: F) -> bool
where
    E: fmt::Display,
    F: FnOnce() -> Result<(), E>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::warn!("Recovery step {step} failed: {err}");
            false
        }
        Err(payload) => {
            tracing::error!(
                "Recovery step {step} panicked: {}",
                panic_message(payload.as_ref())
            );
            false
        }
    }
}

fn run_hook(step: RecoveryStep, hook: &Hook) -> bool {
    run_step(step, &**hook)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn defer_hook(
    delay: Duration,
    step: RecoveryStep,
    hook: Option<Hook>,
    lifetime: SessionLifetime,
) {
    let Some(hook) = hook else {
        return;
    };
    spawn_deferred(delay, move || {
        if !lifetime.is_alive() {
            tracing::debug!("Session destroyed; skipping deferred {step}");
            return;
        }
        run_hook(step, &hook);
    });
}

/// Run `task` after `delay` on the current tokio runtime.
///
/// Without a runtime the task runs immediately.
fn spawn_deferred<F>(delay: Duration, task: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    } else {
        tracing::warn!("No async runtime; running deferred recovery work immediately");
        task();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::adapter::{share, RasterAdapter};
    use crate::engine::Container;
    use crate::testing::{recording_registry, EngineControl};

    fn live_adapter() -> (SharedAdapter, EngineControl) {
        let (registry, control) = recording_registry(crate::AdapterType::Raster);
        let mut adapter = RasterAdapter::new(registry);
        adapter
            .initialize(Container::new("main", 800, 600))
            .expect("init");
        (share(Box::new(adapter)), control)
    }

    fn null_fault() -> EngineFault {
        EngineFault::new("Cannot read properties of null (reading 'getContext')")
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Result<(), HookError> + Send + Sync) {
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&count);
        (count, move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_engine_failure() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, control) = live_adapter();

        let outcome =
            coordinator.handle_error_detailed(&null_fault(), &adapter, &RecoveryContext::new());
        assert_eq!(
            outcome,
            RecoveryOutcome::Recovered {
                kind: FailureKind::NullReference,
                failed_steps: vec![]
            }
        );
        assert_eq!(control.stop_drawing_count(), 1);
        assert_eq!(coordinator.phase(), RecoveryPhase::Idle);
        assert_eq!(coordinator.stats().recovery_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_engine_failure_is_ignored() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, control) = live_adapter();

        let handled = coordinator.handle_error(
            &EngineFault::new("Quota exceeded"),
            &adapter,
            &RecoveryContext::new(),
        );
        assert!(!handled);
        assert_eq!(control.stop_drawing_count(), 0);
        assert_eq!(coordinator.stats().ignored, 1);
        assert_eq!(coordinator.stats().recovery_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_run_in_order_with_delays() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, _control) = live_adapter();
        let (reset, reset_hook) = counter();
        let (mouse, mouse_hook) = counter();
        let (clear, clear_hook) = counter();
        let (validate, validate_hook) = counter();
        let context = RecoveryContext::new()
            .on_reset_state(reset_hook)
            .on_enable_mouse_events(mouse_hook)
            .on_clear_hanging_references(clear_hook)
            .on_validate_editor_state(validate_hook);

        assert!(coordinator.handle_error(&null_fault(), &adapter, &context));
        assert_eq!(reset.load(Ordering::SeqCst), 1);
        assert_eq!(clear.load(Ordering::SeqCst), 1);
        assert_eq!(mouse.load(Ordering::SeqCst), 0);
        assert_eq!(validate.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(mouse.load(Ordering::SeqCst), 1);
        assert_eq!(validate.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(validate.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_references_only_for_null_reference() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, _control) = live_adapter();
        let (clear, clear_hook) = counter();
        let context = RecoveryContext::new().on_clear_hanging_references(clear_hook);

        let fault = EngineFault::new("render loop overflowed")
            .with_stack(format!("at {}", crate::testing::RECORDING_MODULE));
        assert!(coordinator.handle_error(&fault, &adapter, &context));
        assert_eq!(clear.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_steps_do_not_abort_sequence() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, control) = live_adapter();
        control.fail_stop_drawing(EngineFault::new("stopDrawingMode of undefined"));
        let (clear, clear_hook) = counter();
        let context = RecoveryContext::new()
            .on_reset_state(|| Err("view not mounted".into()))
            .on_clear_hanging_references(clear_hook);

        let outcome = coordinator.handle_error_detailed(&null_fault(), &adapter, &context);
        assert_eq!(
            outcome,
            RecoveryOutcome::Recovered {
                kind: FailureKind::NullReference,
                failed_steps: vec![RecoveryStep::ResetState, RecoveryStep::StopDrawing]
            }
        );
        assert_eq!(clear.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_hooks_count_as_failed_steps() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, _control) = live_adapter();
        let (mouse, mouse_hook) = counter();
        let context = RecoveryContext::new()
            .on_reset_state(|| panic!("reset handler blew up"))
            .on_enable_mouse_events(mouse_hook)
            .on_clear_hanging_references(|| panic!("{}", String::from("dangling node")))
            .on_validate_editor_state(|| panic!("validator blew up"));

        let outcome = coordinator.handle_error_detailed(&null_fault(), &adapter, &context);
        assert_eq!(
            outcome,
            RecoveryOutcome::Recovered {
                kind: FailureKind::NullReference,
                failed_steps: vec![
                    RecoveryStep::ResetState,
                    RecoveryStep::ClearHangingReferences
                ]
            }
        );
        assert_eq!(coordinator.phase(), RecoveryPhase::Idle);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(mouse.load(Ordering::SeqCst), 1);
        assert!(coordinator.handle_error(&null_fault(), &adapter, &context));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_on_eleventh_error() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, _control) = live_adapter();
        let context = RecoveryContext::new();

        for _ in 0..10 {
            let outcome = coordinator.handle_error_detailed(&null_fault(), &adapter, &context);
            assert_ne!(outcome, RecoveryOutcome::Refused(RefusalReason::RateLimited));
        }
        let outcome = coordinator.handle_error_detailed(&null_fault(), &adapter, &context);
        assert_eq!(outcome, RecoveryOutcome::Refused(RefusalReason::RateLimited));

        // Non-engine failures are refused by the rate limit as well.
        let outcome = coordinator.handle_error_detailed(
            &EngineFault::new("Quota exceeded"),
            &adapter,
            &context,
        );
        assert_eq!(outcome, RecoveryOutcome::Refused(RefusalReason::RateLimited));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_window_rolls_over() {
        let coordinator = RecoveryCoordinator::new(RecoveryConfig {
            max_errors_per_window: 2,
            ..RecoveryConfig::default()
        });
        let (adapter, _control) = live_adapter();
        let context = RecoveryContext::new();

        assert!(coordinator.handle_error(&null_fault(), &adapter, &context));
        assert!(coordinator.handle_error(&null_fault(), &adapter, &context));
        assert!(!coordinator.handle_error(&null_fault(), &adapter, &context));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(coordinator.handle_error(&null_fault(), &adapter, &context));
        assert_eq!(coordinator.stats().error_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_exhaust_and_decay() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, _control) = live_adapter();
        let context = RecoveryContext::new();

        for _ in 0..3 {
            assert!(coordinator.handle_error(&null_fault(), &adapter, &context));
        }
        assert_eq!(
            coordinator.handle_error_detailed(&null_fault(), &adapter, &context),
            RecoveryOutcome::Refused(RefusalReason::RecoveryExhausted)
        );

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(coordinator.stats().recovery_attempts, 0);
        assert!(coordinator.handle_error(&null_fault(), &adapter, &context));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_canvas_escalates() {
        let coordinator = RecoveryCoordinator::default();
        let context = RecoveryContext::new();
        let (adapter, control) = live_adapter();
        let (healthy, _healthy_control) = live_adapter();
        control.drop_canvas();

        for _ in 0..3 {
            assert_eq!(
                coordinator.handle_error_detailed(&null_fault(), &adapter, &context),
                RecoveryOutcome::ReinitializeRequired
            );
        }
        assert_eq!(coordinator.stats().reinitialize_required, 3);
        assert_eq!(
            coordinator.handle_error_detailed(&null_fault(), &healthy, &context),
            RecoveryOutcome::Refused(RefusalReason::RecoveryExhausted)
        );

        // Escalated attempts outlast the normal decay but still come back.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(coordinator.stats().recovery_attempts, 3);
        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(coordinator.stats().recovery_attempts, 0);
        assert!(coordinator.handle_error(&null_fault(), &healthy, &context));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_canvas_log_only() {
        let coordinator = RecoveryCoordinator::new(RecoveryConfig {
            missing_canvas: MissingCanvasPolicy::LogOnly,
            ..RecoveryConfig::default()
        });
        let (adapter, control) = live_adapter();
        control.drop_canvas();

        assert!(coordinator.handle_error(&null_fault(), &adapter, &RecoveryContext::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_steps_skip_destroyed_session() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, _control) = live_adapter();
        let (mouse, mouse_hook) = counter();
        let (validate, validate_hook) = counter();
        let context = RecoveryContext::new()
            .on_enable_mouse_events(mouse_hook)
            .on_validate_editor_state(validate_hook);

        assert!(coordinator.handle_error(&null_fault(), &adapter, &context));
        lock(&adapter).destroy();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(mouse.load(Ordering::SeqCst), 0);
        assert_eq!(validate.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_coordinator_shares_budget() {
        let shared = RecoveryCoordinator::default();
        let other_view = shared.clone();
        let isolated = RecoveryCoordinator::default();
        let (noisy, _) = live_adapter();
        let (quiet, _) = live_adapter();
        let context = RecoveryContext::new();

        for _ in 0..3 {
            assert!(shared.handle_error(&null_fault(), &noisy, &context));
        }
        assert!(!other_view.handle_error(&null_fault(), &quiet, &context));
        assert!(isolated.handle_error(&null_fault(), &quiet, &context));
    }

    #[test]
    fn test_reset_clears_counters() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, _control) = live_adapter();
        let _ = coordinator.handle_error(
            &EngineFault::new("unrelated"),
            &adapter,
            &RecoveryContext::new(),
        );
        assert_eq!(coordinator.stats().error_count, 1);
        coordinator.reset();
        assert_eq!(coordinator.stats(), RecoveryStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_safely_passes_values_through() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, control) = live_adapter();

        let value = coordinator
            .run_safely(&adapter, &RecoveryContext::new(), |a| a.to_blob("image/png", 0.5))
            .expect("no contract error");
        assert_eq!(value.map(|b| b.bytes), Some(b"image/png:50".to_vec()));
        assert_eq!(control.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_safely_skips_unhealthy_adapter() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, control) = live_adapter();
        control.drop_canvas();

        let value = coordinator
            .run_safely(&adapter, &RecoveryContext::new(), |a| a.rotate(90.0))
            .expect("skipped, not failed");
        assert!(value.is_none());
        assert!(control.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_safely_intercepts_engine_failures() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, control) = live_adapter();
        control.fail_next(null_fault());

        let value = coordinator
            .run_safely(&adapter, &RecoveryContext::new(), |a| a.rotate(90.0))
            .expect("engine failure must not reach the caller");
        assert!(value.is_none());
        assert_eq!(coordinator.stats().recovered, 1);
        assert_eq!(control.stop_drawing_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_safely_surfaces_contract_errors() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, _control) = live_adapter();

        let err = coordinator
            .run_safely(&adapter, &RecoveryContext::new(), |a| a.rotate(45.0))
            .expect_err("invalid input surfaces");
        assert!(matches!(err, AdapterError::InvalidInput(_)));
        assert_eq!(coordinator.stats().error_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrap_safely_is_reusable() {
        let coordinator = RecoveryCoordinator::default();
        let (adapter, control) = live_adapter();
        let mut degrees = 0.0;
        let mut turn = coordinator.wrap_safely(
            move |a: &mut dyn EditorAdapter| {
                degrees += 90.0;
                a.rotate(degrees)
            },
            Arc::clone(&adapter),
            RecoveryContext::new(),
        );

        assert_eq!(turn().expect("ok"), Some(()));
        assert_eq!(turn().expect("ok"), Some(()));
        assert_eq!(control.calls().len(), 2);
    }
}
