//! Blog production with a bounded compliance/editor revision loop.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::info;

use scribe_core::error::Result;
use scribe_core::types::{CompletionRequest, StructuredOutput};
use scribe_engine::{
    ConditionalEdge, FrozenGraph, GraphDefinitionError, GraphSpec, StateUpdate, WorkflowState,
};

use crate::workflow::{final_value, require_str, step, str_or, Workflow, WorkflowContext};

const DEFAULT_TONE: &str = "pragmatic";
const DEFAULT_AUDIENCE: &str = "business decision makers";
const DEFAULT_HERO_PROMPT: &str = "A futuristic workspace with holographic meeting displays.";
const PACKAGE_READY: &str =
    "Blog package ready: includes plan, research, draft, compliance, social assets.";

pub struct BlogWorkflow {
    graph: FrozenGraph,
    word_count: u32,
}

impl BlogWorkflow {
    pub fn new(ctx: &WorkflowContext) -> std::result::Result<Self, GraphDefinitionError> {
        let max_revisions = u64::from(ctx.config.blog.max_revisions);

        let mut spec = GraphSpec::new("blog");
        spec.add_node(
            step(ctx, "project_plan", project_plan)
                .with_reads(["topic", "tone", "audience", "word_count", "brief"])
                .with_outputs(["plan"]),
        )
        .add_node(
            step(ctx, "strategy_research", strategy_research)
                .with_reads(["topic"])
                .with_outputs(["research_notes"]),
        )
        .add_node(
            step(ctx, "draft_blog", draft_blog)
                .with_reads([
                    "topic",
                    "tone",
                    "audience",
                    "word_count",
                    "research_notes",
                    "revision_notes",
                ])
                .with_outputs(["draft"]),
        )
        .add_node(
            step(ctx, "compliance_review", compliance_review)
                .with_reads(["draft"])
                .with_outputs(["compliance_report"]),
        )
        .add_node(
            step(ctx, "editor_feedback", editor_feedback)
                .with_reads(["compliance_report", "revision_count"])
                .with_outputs(["revision_notes", "revision_count"]),
        )
        .add_node(
            step(ctx, "repurpose_assets", repurpose_assets)
                .with_reads(["draft"])
                .with_outputs(["social_assets", "hero_prompt"]),
        )
        .add_node(
            step(ctx, "finalize_package", finalize_package)
                .with_reads([
                    "plan",
                    "research_notes",
                    "draft",
                    "compliance_report",
                    "social_assets",
                    "hero_prompt",
                ])
                .with_outputs(["package"]),
        )
        .add_edge("project_plan", "strategy_research")
        .add_edge("strategy_research", "draft_blog")
        .add_edge("draft_blog", "compliance_review")
        .add_conditional_edge(
            ConditionalEdge::new(
                "compliance_review",
                move |state: &WorkflowState| route_after_compliance(state, max_revisions),
                ["editor_feedback", "repurpose_assets"],
            )
            .bounded_by("revision_count"),
        )
        .add_edge("editor_feedback", "draft_blog")
        .add_edge("repurpose_assets", "finalize_package")
        .set_start("project_plan")
        .set_terminal("finalize_package");

        Ok(Self {
            graph: spec.freeze()?,
            word_count: ctx.config.blog.word_count,
        })
    }
}

impl Workflow for BlogWorkflow {
    fn name(&self) -> &str {
        "blog"
    }

    fn description(&self) -> &str {
        "Plan, research, draft and compliance-check a blog post, then derive social assets"
    }

    fn graph(&self) -> &FrozenGraph {
        &self.graph
    }

    fn seed(&self, fields: Map<String, Value>) -> Result<WorkflowState> {
        let topic = require_str(&fields, "topic")?;
        let word_count = fields
            .get("word_count")
            .and_then(Value::as_u64)
            .filter(|n| *n > 0)
            .unwrap_or(u64::from(self.word_count));

        Ok(WorkflowState::new()
            .with("topic", json!(topic))
            .with("brief", json!(str_or(&fields, "brief", "")))
            .with("tone", json!(str_or(&fields, "tone", DEFAULT_TONE)))
            .with("audience", json!(str_or(&fields, "audience", DEFAULT_AUDIENCE)))
            .with("word_count", json!(word_count))
            .with("revision_count", json!(0)))
    }

    fn output(&self, state: &WorkflowState) -> Result<Value> {
        final_value(state, "package")
    }
}

/// Send the draft back to the editor while the compliance report asks for
/// changes and revisions remain.
fn route_after_compliance(state: &WorkflowState, max_revisions: u64) -> &'static str {
    let report = state.str_or_empty("compliance_report").to_lowercase();
    let revisions = state.get_u64("revision_count").unwrap_or(0);
    if (report.contains("revise") || report.contains("flag")) && revisions < max_revisions {
        "editor_feedback"
    } else {
        "repurpose_assets"
    }
}

fn writer(ctx: &WorkflowContext, user: String, max_tokens: u32) -> CompletionRequest {
    CompletionRequest::new("", user)
        .with_model(ctx.config.roles.generator.clone())
        .with_max_tokens(max_tokens)
        .with_temperature(0.7)
}

async fn project_plan(ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let prompt = format!(
        "You are a Project Manager. Based on the topic, create a 4-step blog production plan.\n\
         Topic: {}\nTone: {}\nAudience: {}\nWord count: {}\nBrief: {}",
        state.str_or_empty("topic"),
        state.str_or_empty("tone"),
        state.str_or_empty("audience"),
        state.get_u64("word_count").unwrap_or_default(),
        state.str_or_empty("brief"),
    );
    let plan = ctx.generation.complete(writer(&ctx, prompt, 256)).await?;
    Ok(StateUpdate::new().set_str("plan", plan))
}

async fn strategy_research(ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let prompt = format!(
        "You are a Research Strategist. List 3-4 credible findings or stats about {}.\n\
         Each should include short source-style attributions.",
        state.str_or_empty("topic")
    );
    let notes = ctx.generation.complete(writer(&ctx, prompt, 256)).await?;
    Ok(StateUpdate::new().set_str("research_notes", notes))
}

async fn draft_blog(ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let mut prompt = format!(
        "You are a Copywriter. Write a ~{}-word blog on the topic '{}'.\n\
         Tone: {}\nAudience: {}\nInclude the following research:\n{}\n\
         Format in Markdown with introduction, body (3 sections), and conclusion.",
        state.get_u64("word_count").unwrap_or_default(),
        state.str_or_empty("topic"),
        state.str_or_empty("tone"),
        state.str_or_empty("audience"),
        state.str_or_empty("research_notes"),
    );
    if let Some(notes) = state.get_str("revision_notes") {
        prompt.push_str("\n\nAddress these revision notes from the editor:\n");
        prompt.push_str(notes);
    }
    let draft = ctx.generation.complete(writer(&ctx, prompt, 512)).await?;
    Ok(StateUpdate::new().set_str("draft", draft))
}

async fn compliance_review(ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let prompt = format!(
        "You are the Compliance Reviewer (brand + legal + factual accuracy).\n\
         Review the following blog and return JSON with keys:\n\
         status (approve or revise), notes, flagged_sections.\nBlog draft:\n{}",
        state.str_or_empty("draft")
    );
    let report = ctx.generation.complete(writer(&ctx, prompt, 256)).await?;
    Ok(StateUpdate::new().set_str("compliance_report", report))
}

async fn editor_feedback(ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let prompt = format!(
        "You are an Editor. Summarize the compliance concerns and write revision notes for the writer.\n\
         Compliance report:\n{}",
        state.str_or_empty("compliance_report")
    );
    let notes = ctx.generation.complete(writer(&ctx, prompt, 256)).await?;
    let revision = state.get_u64("revision_count").unwrap_or(0) + 1;
    info!(revision, "Blog draft sent back for revision");
    Ok(StateUpdate::new()
        .set_str("revision_notes", notes)
        .set("revision_count", json!(revision)))
}

async fn repurpose_assets(ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let prompt = format!(
        "You are a Social Media Strategist. From this blog, generate a JSON object with keys:\n\
         \"tweets\": three tweets highlighting different key ideas,\n\
         \"linkedin\": one LinkedIn post summary (<= 4 paragraphs),\n\
         \"hero_prompt\": a one-sentence hero image prompt.\nBlog:\n{}",
        state.str_or_empty("draft")
    );
    let output = ctx
        .generation
        .complete_structured(writer(&ctx, prompt, 512))
        .await?;
    let (assets, hero) = social_assets(output);
    Ok(StateUpdate::new()
        .set("social_assets", assets)
        .set_str("hero_prompt", hero))
}

/// Split the asset reply into the assets themselves and the hero prompt.
fn social_assets(output: StructuredOutput) -> (Value, String) {
    match output {
        StructuredOutput::Structured(Value::Object(mut fields)) => {
            let hero = fields
                .remove("hero_prompt")
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_HERO_PROMPT.to_string());
            (Value::Object(fields), hero)
        }
        StructuredOutput::Structured(other) => (other, DEFAULT_HERO_PROMPT.to_string()),
        StructuredOutput::Raw(text) => (Value::String(text), DEFAULT_HERO_PROMPT.to_string()),
    }
}

async fn finalize_package(_ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let package = json!({
        "topic": state.get("topic"),
        "plan": state.get("plan"),
        "research_notes": state.get("research_notes"),
        "draft": state.get("draft"),
        "compliance_report": state.get("compliance_report"),
        "revision_notes": state.get("revision_notes"),
        "revision_count": state.get_u64("revision_count").unwrap_or(0),
        "social_assets": state.get("social_assets"),
        "hero_prompt": state.get("hero_prompt"),
        "response": PACKAGE_READY,
    });
    Ok(StateUpdate::new().set("package", package))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_after_compliance() {
        let flagged = WorkflowState::new()
            .with("compliance_report", json!("Status: REVISE, two claims flagged"))
            .with("revision_count", json!(0));
        assert_eq!(route_after_compliance(&flagged, 2), "editor_feedback");

        let exhausted = flagged.clone().with("revision_count", json!(2));
        assert_eq!(route_after_compliance(&exhausted, 2), "repurpose_assets");

        let clean = WorkflowState::new().with("compliance_report", json!("approve"));
        assert_eq!(route_after_compliance(&clean, 2), "repurpose_assets");
    }

    #[test]
    fn test_social_assets_split() {
        let (assets, hero) = social_assets(StructuredOutput::Structured(json!({
            "tweets": ["a", "b", "c"],
            "hero_prompt": "Sunrise over a quiet office"
        })));
        assert_eq!(assets, json!({"tweets": ["a", "b", "c"]}));
        assert_eq!(hero, "Sunrise over a quiet office");

        let (assets, hero) = social_assets(StructuredOutput::Raw("plain text".into()));
        assert_eq!(assets, json!("plain text"));
        assert_eq!(hero, DEFAULT_HERO_PROMPT);
    }
}
