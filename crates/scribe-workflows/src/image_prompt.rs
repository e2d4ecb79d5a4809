use std::sync::Arc;

use serde_json::{json, Map, Value};

use scribe_core::error::Result;
use scribe_core::types::CompletionRequest;
use scribe_engine::{FrozenGraph, GraphDefinitionError, GraphSpec, StateUpdate, WorkflowState};

use crate::workflow::{final_value, step, str_or, Workflow, WorkflowContext};

const SCRIPT_EXCERPT_CHARS: usize = 500;
const FIELDS: [&str; 5] = ["channel_description", "prompt", "script", "tone", "audience"];

/// Thumbnail prompt for a video, as a single-node graph.
pub struct ImagePromptWorkflow {
    graph: FrozenGraph,
}

impl ImagePromptWorkflow {
    pub fn new(ctx: &WorkflowContext) -> std::result::Result<Self, GraphDefinitionError> {
        let mut spec = GraphSpec::new("image_prompt");
        spec.add_node(
            step(ctx, "craft_thumbnail_prompt", craft_thumbnail_prompt)
                .with_reads(FIELDS)
                .with_outputs(["image_prompt"]),
        )
        .set_start("craft_thumbnail_prompt")
        .set_terminal("craft_thumbnail_prompt");
        Ok(Self {
            graph: spec.freeze()?,
        })
    }
}

impl Workflow for ImagePromptWorkflow {
    fn name(&self) -> &str {
        "image_prompt"
    }

    fn description(&self) -> &str {
        "Craft an SDXL-style thumbnail prompt from a video's topic and script"
    }

    fn graph(&self) -> &FrozenGraph {
        &self.graph
    }

    fn seed(&self, fields: Map<String, Value>) -> Result<WorkflowState> {
        // Every field is optional; blanks become placeholders in the prompt
        let state = FIELDS.iter().fold(WorkflowState::new(), |state, key| {
            state.with(*key, json!(str_or(&fields, key, "")))
        });
        Ok(state)
    }

    fn output(&self, state: &WorkflowState) -> Result<Value> {
        Ok(json!({ "image_prompt": final_value(state, "image_prompt")? }))
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}

fn script_excerpt(script: &str) -> String {
    script.chars().take(SCRIPT_EXCERPT_CHARS).collect()
}

async fn craft_thumbnail_prompt(
    ctx: WorkflowContext,
    state: Arc<WorkflowState>,
) -> Result<StateUpdate> {
    let script = script_excerpt(state.str_or_empty("script"));
    let prompt = format!(
        "You are a world-class YouTube creative director who specializes in designing \
         high-conversion thumbnails that stand out on the homepage.\n\n\
         Use the following context to craft a single-paragraph SDXL prompt:\n\n\
         Channel Description:\n{}\n\nVideo Topic:\n{}\n\nScript Summary:\n{}\n\n\
         Tone: {}\nTarget Audience: {}\n\n--- RULES ---\n\
         - Describe an eye-catching YouTube thumbnail scene.\n\
         - Include emotion, character expression, text placement ideas.\n\
         - Include lighting, colors, environment, and camera angle.\n\
         - Must reflect the theme of the script.\n\
         - DO NOT mention \"prompt\" or repeat the instructions.\n\
         - Limit to 120 words.",
        or_placeholder(state.str_or_empty("channel_description"), "Not provided"),
        or_placeholder(state.str_or_empty("prompt"), "No topic provided"),
        or_placeholder(&script, "No script provided"),
        or_placeholder(state.str_or_empty("tone"), "Not provided"),
        or_placeholder(state.str_or_empty("audience"), "Not provided"),
    );
    let request = CompletionRequest::new("", prompt)
        .with_model(ctx.config.roles.generator.clone())
        .with_temperature(0.7)
        .with_max_tokens(256);
    let text = ctx.generation.complete(request).await?;
    Ok(StateUpdate::new().set_str("image_prompt", text.trim()))
}
