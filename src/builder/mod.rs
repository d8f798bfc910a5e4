//! Builder API for constructing state machines and experiences.

pub mod error;
pub mod experience;
pub mod machine;

pub use error::BuildError;
pub use experience::ExperienceBuilder;
pub use machine::StateMachineBuilder;
