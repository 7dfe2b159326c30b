//! Event Drain State Machine
//!
//! One control-loop iteration moves through:
//! ```text
//! Idle --Begin{pending}--> Draining --Empty/Failed/Drained{!more}--> Settled --WorkDone--> Idle
//!      --Begin{!pending}---------------------------------------------^
//! ```

/// States of one control-loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    /// Waiting for the next iteration
    Idle,
    /// Polling `EVENT?` until the queue is empty
    Draining,
    /// Queue drained; periodic work may run
    Settled,
}

/// Inputs that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainInput {
    /// Iteration started; `pending` is the sampled event signal
    Begin { pending: bool },
    /// An event was drained; `more_pending` is the re-sampled signal
    Drained { more_pending: bool },
    /// `EVENT?` reported an empty queue
    Empty,
    /// The poll failed or returned a malformed line
    Failed,
    /// Periodic work for this iteration is complete
    WorkDone,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid
    Success(DrainState),
    /// Drain stopped because the per-iteration budget was spent
    BudgetExhausted,
    /// Transition was invalid from current state
    Invalid { from: DrainState, input: DrainInput },
}

/// Drain state machine with a per-iteration event budget
#[derive(Debug)]
pub struct DrainStateMachine {
    current_state: DrainState,
    drained: u32,
    max_per_cycle: u32,
}

impl Default for DrainStateMachine {
    fn default() -> Self {
        Self::new(crate::timing::MAX_EVENTS_PER_CYCLE)
    }
}

impl DrainStateMachine {
    /// Create a new state machine in Idle state
    pub fn new(max_per_cycle: u32) -> Self {
        Self {
            current_state: DrainState::Idle,
            drained: 0,
            max_per_cycle: max_per_cycle.max(1),
        }
    }

    /// Get current state
    pub fn state(&self) -> DrainState {
        self.current_state
    }

    /// Events drained in the current iteration
    pub fn drained(&self) -> u32 {
        self.drained
    }

    /// Whether another `EVENT?` poll should be issued
    pub fn should_poll(&self) -> bool {
        self.current_state == DrainState::Draining
    }

    /// Process an input and return the transition result
    pub fn process(&mut self, input: DrainInput) -> TransitionResult {
        use DrainInput::*;
        use DrainState::*;

        let next = match (self.current_state, input) {
            (Idle, Begin { pending: true }) => {
                self.drained = 0;
                Draining
            }
            (Idle, Begin { pending: false }) => {
                self.drained = 0;
                Settled
            }

            (Draining, Drained { more_pending }) => {
                self.drained += 1;
                if !more_pending {
                    Settled
                } else if self.drained >= self.max_per_cycle {
                    self.current_state = Settled;
                    return TransitionResult::BudgetExhausted;
                } else {
                    Draining
                }
            }
            (Draining, Empty | Failed) => Settled,

            (Settled, WorkDone) => Idle,

            (from, input) => return TransitionResult::Invalid { from, input },
        };

        self.current_state = next;
        TransitionResult::Success(next)
    }
}
