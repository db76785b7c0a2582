//! The KeyTrust agent: registration, verification and continuous sessions.
//!
//! [`TrustAgent`] owns a capture source and an event sink and drives a fresh
//! [`SessionStateMachine`] for every verification or session. The baseline is
//! read once at the start of each cycle and written once per registration.

use crate::audit::{EventLevel, EventSink, SecurityEvent};
use crate::collector::{CaptureError, KeystrokeSource};
use crate::config::{Config, ConfigError};
use crate::core::baseline::{Baseline, BaselineError};
use crate::core::features::{FeatureExtractor, KeystrokeSample};
use crate::core::risk::{RiskAssessment, RiskEngine};
use crate::session::{
    ReverifyTimer, SessionAction, SessionControl, SessionSignal, SessionState,
    SessionStateMachine, TransitionError, Trigger,
};
use crate::store::BaselineStore;
use std::time::Duration;
use uuid::Uuid;

/// How a verification or session ended.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub final_state: SessionState,
    /// Re-verifications started during the session
    pub rechecks: u32,
    /// Score of the most recent capture, if any was scored
    pub last_assessment: Option<RiskAssessment>,
}

impl SessionOutcome {
    pub fn is_trusted(&self) -> bool {
        self.final_state == SessionState::Trusted
    }
}

/// Per-cycle context for running the state machine.
struct Cycle<'a> {
    baseline: &'a Baseline,
    phrase: &'a str,
    reverify_phrase: &'a str,
    interval: Duration,
    control: Option<&'a SessionControl>,
    timer: Option<ReverifyTimer>,
}

impl Cycle<'_> {
    fn cancel_pending(&self) -> bool {
        self.control.map(SessionControl::take_cancel).unwrap_or(false)
    }
}

/// Keystroke-dynamics authentication agent.
pub struct TrustAgent<S, E> {
    config: Config,
    extractor: FeatureExtractor,
    engine: RiskEngine,
    store: BaselineStore,
    source: S,
    sink: E,
    last_assessment: Option<RiskAssessment>,
}

impl<S: KeystrokeSource, E: EventSink> TrustAgent<S, E> {
    /// Build an agent from a configuration, validating it first.
    pub fn new(config: Config, source: S, sink: E) -> Result<Self, ConfigError> {
        config.validate()?;

        let engine = RiskEngine::new(config.risk)?;
        let extractor = FeatureExtractor::new(config.features.clone());
        let store = BaselineStore::new(config.baseline_path(), config.features.rhythm_bins);

        Ok(Self {
            config,
            extractor,
            engine,
            store,
            source,
            sink,
            last_assessment: None,
        })
    }

    pub fn store(&self) -> &BaselineStore {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Score of the most recent verification or re-verification.
    pub fn last_assessment(&self) -> Option<&RiskAssessment> {
        self.last_assessment.as_ref()
    }

    /// Capture `phrase` and store it as the baseline profile.
    ///
    /// With fewer than `min_samples` flight intervals nothing is written.
    pub fn register(&mut self, phrase: &str) -> Result<Baseline, AuthError> {
        let sample = match self.source.capture(phrase) {
            Ok(strokes) => self.extractor.extract(&strokes),
            Err(CaptureError::NoData) => KeystrokeSample::default(),
            Err(e) => return Err(e.into()),
        };

        let baseline = match Baseline::from_sample(&sample, self.config.min_samples) {
            Ok(baseline) => baseline,
            Err(e) => {
                self.emit(&SecurityEvent::new(
                    EventLevel::Warn,
                    "Registration failed - insufficient keystroke data",
                ));
                return Err(e.into());
            }
        };

        self.store.save(&baseline)?;
        self.emit(&SecurityEvent::new(
            EventLevel::Info,
            format!(
                "Baseline registered from {} flight intervals",
                sample.flight_count()
            ),
        ));
        tracing::info!(
            flight_avg = baseline.flight_avg,
            flight_std = baseline.flight_std,
            bigrams = baseline.bigram_avg.len(),
            "baseline created"
        );
        Ok(baseline)
    }

    /// Verify the user once against the stored baseline.
    pub fn verify(&mut self, phrase: &str) -> Result<SessionOutcome, AuthError> {
        let baseline = self.store.load()?;
        self.last_assessment = None;
        let mut machine = SessionStateMachine::new();
        let mut cycle = Cycle {
            baseline: &baseline,
            phrase,
            reverify_phrase: phrase,
            interval: self.config.reverify_interval,
            control: None,
            timer: None,
        };

        self.settle(&mut machine, Trigger::StartVerification, &mut cycle)?;
        Ok(self.outcome(&machine))
    }

    /// Verify the user, then keep re-verifying every `interval` until a
    /// re-check fails (LOCKED) or the session is cancelled through `control`
    /// (IDLE).
    pub fn start_session(
        &mut self,
        phrase: &str,
        reverify_phrase: &str,
        interval: Duration,
        control: &SessionControl,
    ) -> Result<SessionOutcome, AuthError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "re-verification interval must be non-zero".to_string(),
            )
            .into());
        }

        let baseline = self.store.load()?;
        self.last_assessment = None;
        let mut machine = SessionStateMachine::new();
        let mut cycle = Cycle {
            baseline: &baseline,
            phrase,
            reverify_phrase,
            interval,
            control: Some(control),
            timer: Some(ReverifyTimer::new(control.sender())),
        };

        self.settle(&mut machine, Trigger::StartVerification, &mut cycle)?;
        if machine.state() == SessionState::Trusted {
            self.settle(&mut machine, Trigger::EnterSession, &mut cycle)?;
        }

        while machine.state() == SessionState::SessionActive {
            let trigger = match control.recv() {
                Some(SessionSignal::TimerFired { generation }) => {
                    let current = cycle
                        .timer
                        .as_ref()
                        .is_some_and(|timer| timer.is_current(generation));
                    if !current {
                        tracing::debug!(generation, "ignoring stale timer firing");
                        continue;
                    }
                    Trigger::TimerFired
                }
                Some(SessionSignal::Cancel) | None => Trigger::Cancel,
            };
            self.settle(&mut machine, trigger, &mut cycle)?;
        }

        Ok(self.outcome(&machine))
    }

    /// Apply a trigger and every trigger that follows from its captures.
    fn settle(
        &mut self,
        machine: &mut SessionStateMachine,
        trigger: Trigger,
        cycle: &mut Cycle<'_>,
    ) -> Result<(), AuthError> {
        let mut pending = Some(trigger);
        while let Some(trigger) = pending.take() {
            pending = self.step(machine, trigger, cycle)?;
        }
        Ok(())
    }

    fn step(
        &mut self,
        machine: &mut SessionStateMachine,
        trigger: Trigger,
        cycle: &mut Cycle<'_>,
    ) -> Result<Option<Trigger>, AuthError> {
        let mut next = None;

        for action in machine.apply(trigger)? {
            match action {
                SessionAction::Capture => {
                    let phrase = if machine.state() == SessionState::ReVerifying {
                        cycle.reverify_phrase
                    } else {
                        cycle.phrase
                    };
                    let scored = self.capture_and_score(cycle.baseline, phrase);
                    // Ctrl+C during a blocking capture wins over its result.
                    next = Some(if cycle.cancel_pending() {
                        Trigger::Cancel
                    } else {
                        scored
                    });
                }
                SessionAction::Emit(event) => self.emit(&event),
                SessionAction::ScheduleReverify => {
                    if let Some(timer) = cycle.timer.as_mut() {
                        timer.schedule(cycle.interval);
                    }
                }
                SessionAction::CancelReverify => {
                    if let Some(timer) = cycle.timer.as_mut() {
                        timer.cancel();
                    }
                }
            }
        }

        Ok(next)
    }

    /// Capture a phrase and turn the result into a scoring trigger.
    fn capture_and_score(&mut self, baseline: &Baseline, phrase: &str) -> Trigger {
        let strokes = match self.source.capture(phrase) {
            Ok(strokes) => strokes,
            Err(e) => {
                tracing::warn!("capture failed: {e}");
                return Trigger::NoData;
            }
        };

        let sample = self.extractor.extract(&strokes);
        if sample.is_empty() {
            tracing::warn!(strokes = strokes.len(), "capture produced no flight intervals");
            return Trigger::NoData;
        }

        let assessment = self.engine.assess(baseline, &sample);
        tracing::info!(
            risk = assessment.risk_score,
            threshold = assessment.threshold,
            status = %assessment.status,
            "sample scored"
        );

        let trigger = Trigger::Scored {
            status: assessment.status,
            risk: assessment.risk_score,
            threshold: assessment.threshold,
        };
        self.last_assessment = Some(assessment);
        trigger
    }

    fn emit(&self, event: &SecurityEvent) {
        if let Err(e) = self.sink.emit(event) {
            tracing::warn!("failed to record security event: {e}");
        }
    }

    fn outcome(&self, machine: &SessionStateMachine) -> SessionOutcome {
        SessionOutcome {
            session_id: machine.id(),
            final_state: machine.state(),
            rechecks: machine.rechecks(),
            last_assessment: self.last_assessment.clone(),
        }
    }
}

/// Errors surfaced by the agent entry points.
#[derive(Debug)]
pub enum AuthError {
    Config(ConfigError),
    Capture(CaptureError),
    Baseline(BaselineError),
    Transition(TransitionError),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Config(e) => write!(f, "{e}"),
            AuthError::Capture(e) => write!(f, "{e}"),
            AuthError::Baseline(e) => write!(f, "{e}"),
            AuthError::Transition(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Config(e) => Some(e),
            AuthError::Capture(e) => Some(e),
            AuthError::Baseline(e) => Some(e),
            AuthError::Transition(e) => Some(e),
        }
    }
}

impl From<ConfigError> for AuthError {
    fn from(e: ConfigError) -> Self {
        AuthError::Config(e)
    }
}

impl From<CaptureError> for AuthError {
    fn from(e: CaptureError) -> Self {
        AuthError::Capture(e)
    }
}

impl From<BaselineError> for AuthError {
    fn from(e: BaselineError) -> Self {
        AuthError::Baseline(e)
    }
}

impl From<TransitionError> for AuthError {
    fn from(e: TransitionError) -> Self {
        AuthError::Transition(e)
    }
}
