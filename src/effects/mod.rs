//! Imperative shell around the pure core.
//!
//! # Key Concepts
//!
//! - **Side effects**: work a transition asks for, launched off the
//!   transition path and resolving to an optional follow-up action
//! - **Await handshake**: single-use signals the UI resolves after its own
//!   animations finish
//! - **State machine**: one task owning the current state, serializing
//!   every transition
//! - **Action processor**: FIFO executor for experience actions

mod await_effect;
mod machine;
mod presentation;
mod processor;
mod side_effect;

pub use await_effect::{AwaitEffect, AwaitKind, AwaitResolver};
pub use machine::StateMachine;
pub use presentation::PresentationEffect;
pub use processor::ActionProcessor;
pub use side_effect::{EffectEnv, SideEffect};
