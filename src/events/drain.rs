//! Event drain loop
//!
//! Each control-loop iteration polls `EVENT?` while the module reports
//! pending events, then hands control to periodic work. Without a wired
//! event signal the queue is polled on a fixed interval instead.

use crate::config::TimingConfig;
use crate::expresslink::{CommandEngine, EventSignal};
use crate::transport::TransportStream;
use expresslink_shared::state_machine::{
    DrainInput, DrainState, DrainStateMachine, TransitionResult,
};
use expresslink_shared::{CommandResult, Event};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Re-samples of the event signal after each drained event (debounce)
const SIGNAL_RESAMPLES: usize = 3;

/// Result of a single `EVENT?` poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Event(Event),
    /// Queue empty
    Empty,
    /// The poll itself failed (timeout, protocol violation, peer error)
    Failed(CommandResult),
    /// Non-empty payload that is not an event line
    Malformed(String),
}

/// Drains the module event queue one iteration at a time
pub struct EventDrainer {
    signal: Option<Box<dyn EventSignal>>,
    fsm: DrainStateMachine,
    poll_interval: Duration,
    next_poll: Instant,
}

impl EventDrainer {
    pub fn new(signal: Option<Box<dyn EventSignal>>, timing: &TimingConfig) -> Self {
        Self {
            signal,
            fsm: DrainStateMachine::new(timing.max_events_per_cycle),
            poll_interval: timing.event_poll_interval(),
            next_poll: Instant::now(),
        }
    }

    pub fn state(&self) -> DrainState {
        self.fsm.state()
    }

    /// Poll `EVENT?` once
    pub async fn poll_event<S: TransportStream>(
        &mut self,
        engine: &mut CommandEngine<S>,
    ) -> PollOutcome {
        let result = engine.execute("EVENT?").await;
        if !result.success {
            return PollOutcome::Failed(result);
        }
        if result.payload.is_empty() {
            return PollOutcome::Empty;
        }

        if let Some(signal) = self.signal.as_mut() {
            for _ in 0..SIGNAL_RESAMPLES {
                signal.update();
            }
        }

        match Event::parse(&result.payload) {
            Ok(event) => PollOutcome::Event(event),
            Err(_) => PollOutcome::Malformed(result.payload),
        }
    }

    /// Start an iteration; returns whether draining is needed
    pub fn begin_cycle(&mut self, now: Instant) -> bool {
        let pending = match self.signal.as_mut() {
            Some(signal) => {
                signal.update();
                signal.is_pending()
            }
            None if now >= self.next_poll => {
                self.next_poll = now + self.poll_interval;
                true
            }
            None => false,
        };

        self.transition(DrainInput::Begin { pending });
        self.fsm.should_poll()
    }

    /// Next event of the current iteration; `None` once drained
    pub async fn next_event<S: TransportStream>(
        &mut self,
        engine: &mut CommandEngine<S>,
    ) -> Option<Event> {
        while self.fsm.should_poll() {
            match self.poll_event(engine).await {
                PollOutcome::Event(event) => {
                    let more_pending = match self.signal.as_ref() {
                        Some(signal) => signal.is_pending(),
                        None => true,
                    };
                    self.transition(DrainInput::Drained { more_pending });
                    return Some(event);
                }
                PollOutcome::Empty => self.transition(DrainInput::Empty),
                PollOutcome::Failed(result) => {
                    warn!("[EVENT] Poll failed: {}", result);
                    self.transition(DrainInput::Failed);
                }
                PollOutcome::Malformed(line) => {
                    warn!("[EVENT] Malformed event line: {:?}", line);
                    self.transition(DrainInput::Failed);
                }
            }
        }
        None
    }

    /// End the iteration after periodic work
    pub fn finish_cycle(&mut self) {
        self.transition(DrainInput::WorkDone);
    }

    fn transition(&mut self, input: DrainInput) {
        match self.fsm.process(input) {
            TransitionResult::Success(_) => {}
            TransitionResult::BudgetExhausted => {
                debug!(
                    "[EVENT] Drained {} events; deferring the rest",
                    self.fsm.drained()
                );
            }
            TransitionResult::Invalid { from, input } => {
                warn!("[EVENT] Invalid drain transition {:?} from {:?}", input, from);
            }
        }
    }
}
