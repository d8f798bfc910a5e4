//! Experience data handed to the machine by the mapping layer.

mod capability;
mod experience;

pub use capability::{ExperienceAction, MetadataSettingTrait, PresentingTrait, TraitError};
pub use experience::{
    Experience, ExperienceTrigger, Priority, Step, StepContainer, StepMetadata, TraitDescriptor,
};
