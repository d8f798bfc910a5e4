//! Experience Flow
//!
//! This example walks a two-container experience from start to completion.
//!
//! Key concepts:
//! - Building experiences and a machine
//! - Watching committed states on the broadcast stream
//! - Confirming UI handshakes through the await resolver
//! - Completion actions running on the action processor
//!
//! Run with: RUST_LOG=experience_machine=debug cargo run --example experience_flow

use async_trait::async_trait;
use experience_machine::builder::{ExperienceBuilder, StateMachineBuilder};
use experience_machine::core::{Action, State, StateKind, StepReference};
use experience_machine::model::{
    ExperienceAction, MetadataSettingTrait, PresentingTrait, Step, StepContainer, TraitError,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct Surface {
    name: &'static str,
}

#[async_trait]
impl PresentingTrait for Surface {
    async fn present(&self) -> Result<(), TraitError> {
        println!("  [ui] presenting {}", self.name);
        Ok(())
    }
}

#[derive(Debug)]
struct Placement;

impl MetadataSettingTrait for Placement {
    fn produce_metadata(&self) -> Result<HashMap<String, Value>, TraitError> {
        Ok(HashMap::from([("placement".to_string(), json!("bottom"))]))
    }
}

#[derive(Debug)]
struct Celebrate;

#[async_trait]
impl ExperienceAction for Celebrate {
    fn name(&self) -> &str {
        "celebrate"
    }

    async fn execute(&self) {
        println!("  [action] experience completed");
    }
}

fn step(surface: &Arc<Surface>) -> Step {
    Step::new(Arc::clone(surface) as Arc<dyn PresentingTrait>).with_metadata(Arc::new(Placement))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "experience_machine=info".to_string()),
        )
        .init();

    println!("=== Experience Flow Example ===\n");

    let modal = Arc::new(Surface { name: "modal" });
    let tooltip = Arc::new(Surface { name: "tooltip" });
    let experience = ExperienceBuilder::new("Welcome tour")
        .container(StepContainer::new(vec![step(&modal), step(&modal)]))
        .container(StepContainer::new(vec![step(&tooltip)]))
        .completion_action(Arc::new(Celebrate))
        .build();

    let machine = StateMachineBuilder::new().build()?;
    let mut states = machine.subscribe();

    machine.start_experience(experience).await?;

    // Advance whenever a step renders; confirm every UI handshake.
    while let Ok(state) = states.recv().await {
        println!(
            "state: {:<20} step: {:?}",
            state.name(),
            state.current_step_index()
        );
        match &state {
            State::RenderingStep(rendering) => {
                println!("  metadata: {:?}", rendering.metadata.get("placement"));
                machine
                    .handle_action(Action::StartStep(StepReference::Offset(1)))
                    .await?;
            }
            State::EndingStep(_) => {
                if let Some(resolver) = state.await_resolver() {
                    println!("  [ui] {:?} transition finished", resolver.kind());
                    resolver.resolve();
                }
            }
            _ if state.kind() == StateKind::Idling => break,
            _ => {}
        }
    }

    println!("\nPath: {:?}", machine.history().get_path());
    println!("\n=== Example Complete ===");
    Ok(())
}
