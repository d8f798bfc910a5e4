//! Experience Machine: lifecycle engine for guided in-app experiences
//!
//! An experience is a multi-step, multi-container presentation. This crate
//! governs its lifecycle from the moment it is started, through each step
//! being presented and rendered, to completion or abandonment. It is built
//! on a "pure core, imperative shell" split: states decide transitions
//! without side effects, and a single machine task commits them and runs
//! the effects they ask for.
//!
//! # Core Concepts
//!
//! - **Experience**: immutable containers of steps plus completion actions
//! - **State**: the closed set of lifecycle states and their `take` function
//! - **Side effects**: continuations, presentations, UI awaits, and
//!   experience actions, each resolving to an optional follow-up action
//! - **State machine**: serializes transitions from any number of callers
//! - **Action processor**: runs experience actions one at a time, in order
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use experience_machine::builder::{ExperienceBuilder, StateMachineBuilder};
//! use experience_machine::core::StateKind;
//! use experience_machine::model::{PresentingTrait, Step, StepContainer, TraitError};
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct Modal;
//!
//! #[async_trait]
//! impl PresentingTrait for Modal {
//!     async fn present(&self) -> Result<(), TraitError> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let machine = StateMachineBuilder::new().build().unwrap();
//! let mut states = machine.subscribe();
//!
//! let experience = ExperienceBuilder::new("Welcome")
//!     .container(StepContainer::new(vec![Step::new(Arc::new(Modal))]))
//!     .build();
//! machine.start_experience(experience).await.unwrap();
//!
//! while let Ok(state) = states.recv().await {
//!     if state.kind() == StateKind::RenderingStep {
//!         break;
//!     }
//! }
//! # }
//! ```

pub mod actions;
pub mod builder;
pub mod config;
pub mod core;
pub mod effects;
pub mod model;
pub mod render;

// Re-export commonly used types
pub use crate::core::{Action, ExperienceStateError, State, StateKind, StepReference};
pub use config::MachineConfig;
pub use effects::{ActionProcessor, StateMachine};
pub use model::Experience;
pub use render::{RenderContext, RenderContextDirectory};
