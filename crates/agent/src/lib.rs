//! The orchestration loop — the heart of Nimbus.
//!
//! One turn follows a **resolve → respond** cycle:
//!
//! 1. **Receive** a user utterance bound to a session
//! 2. **Build context** (system prompt + retained history window)
//! 3. **Ask the model** whether the turn needs tools
//! 4. **If tool calls**: execute them in order, append results, loop
//!    back to step 3 (bounded by the round budget)
//! 5. **If a terminal answer**: stream it to the client and commit the
//!    turn's messages atomically
//!
//! Failures split two ways: tool-level problems fold back into the
//! conversation for the model to react to; model-level problems end
//! the turn with an error event and commit nothing.

pub mod executor;
pub mod stream_event;
pub mod turn;

pub use executor::ToolExecutor;
pub use stream_event::ChatStreamEvent;
pub use turn::{ChatAgent, DEFAULT_SYSTEM_PROMPT};
