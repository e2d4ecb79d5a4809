//! Article repurposing: one article fans out to four independent
//! transformations, joined into a single content package.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use scribe_core::error::Result;
use scribe_core::types::{CompletionRequest, StructuredOutput};
use scribe_engine::{FrozenGraph, GraphDefinitionError, GraphSpec, StateUpdate, WorkflowState};

use crate::workflow::{final_value, require_str, step, Workflow, WorkflowContext};

const BRANCHES: [&str; 4] = [
    "generate_summary",
    "generate_social_posts",
    "generate_faq_section",
    "generate_entities",
];

const SOCIAL_CHANNELS: [&str; 3] = ["twitter", "linkedin", "instagram"];
const ENTITY_KINDS: [&str; 3] = ["people", "organizations", "topics"];
const POST_FALLBACK: &str = "Failed to generate post.";

pub struct RepurposeWorkflow {
    graph: FrozenGraph,
}

impl RepurposeWorkflow {
    pub fn new(ctx: &WorkflowContext) -> std::result::Result<Self, GraphDefinitionError> {
        let mut spec = GraphSpec::new("repurpose");
        spec.add_node(
            step(ctx, "prepare_article", prepare_article)
                .with_reads(["article_text"])
                .with_outputs(["article"]),
        )
        .add_node(
            step(ctx, "generate_summary", generate_summary)
                .with_reads(["article"])
                .with_outputs(["summary"]),
        )
        .add_node(
            step(ctx, "generate_social_posts", generate_social_posts)
                .with_reads(["article"])
                .with_outputs(["social_posts"]),
        )
        .add_node(
            step(ctx, "generate_faq_section", generate_faq_section)
                .with_reads(["article"])
                .with_outputs(["faq_section"]),
        )
        .add_node(
            step(ctx, "generate_entities", generate_entities)
                .with_reads(["article"])
                .with_outputs(["entities"]),
        )
        .add_node(
            step(ctx, "compile_package", compile_package)
                .with_reads(["summary", "social_posts", "faq_section", "entities"])
                .with_outputs(["final_package"]),
        );
        for branch in BRANCHES {
            spec.add_edge("prepare_article", branch);
        }
        spec.add_join(BRANCHES, "compile_package")
            .set_start("prepare_article")
            .set_terminal("compile_package");

        Ok(Self {
            graph: spec.freeze()?,
        })
    }
}

impl Workflow for RepurposeWorkflow {
    fn name(&self) -> &str {
        "repurpose"
    }

    fn description(&self) -> &str {
        "Turn one article into a summary, social posts, an FAQ and extracted entities"
    }

    fn graph(&self) -> &FrozenGraph {
        &self.graph
    }

    fn seed(&self, fields: Map<String, Value>) -> Result<WorkflowState> {
        let article = require_str(&fields, "article_text")?;
        Ok(WorkflowState::new().with("article_text", Value::String(article)))
    }

    fn output(&self, state: &WorkflowState) -> Result<Value> {
        final_value(state, "final_package")
    }
}

fn fast(
    ctx: &WorkflowContext,
    user: String,
    max_tokens: u32,
    temperature: f32,
) -> CompletionRequest {
    CompletionRequest::new("", user)
        .with_model(ctx.config.roles.fast.clone())
        .with_max_tokens(max_tokens)
        .with_temperature(temperature)
}

async fn prepare_article(_ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let article = state.str_or_empty("article_text").trim().to_string();
    debug!(chars = article.len(), "Article prepared");
    Ok(StateUpdate::new().set_str("article", article))
}

async fn generate_summary(ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let prompt = format!(
        "You are a concise editor. Summarize the following article in one compelling paragraph \
         (about 100-150 words).\nThe summary should capture the main points and be suitable for a preview.\n\n\
         ARTICLE:\n{}",
        state.str_or_empty("article")
    );
    let summary = ctx.generation.complete(fast(&ctx, prompt, 512, 0.2)).await?;
    Ok(StateUpdate::new().set_str("summary", summary))
}

async fn generate_social_posts(
    ctx: WorkflowContext,
    state: Arc<WorkflowState>,
) -> Result<StateUpdate> {
    let prompt = format!(
        "You are a social media manager. Analyze the following article and generate a JSON object \
         for social media posts.\nThe JSON object must have keys: \"twitter\", \"linkedin\", and \"instagram\".\n\
         The value for each key must be a single string containing the post text.\n\n\
         1. \"twitter\": A compelling 280-character tweet with a strong hook and 2-3 relevant hashtags.\n\
         2. \"linkedin\": A professional post (~100-150 words) focusing on the key insights and ending with a question.\n\
         3. \"instagram\": An engaging caption (~50-100 words) that teases the content and includes 5 relevant hashtags.\n\n\
         ARTICLE:\n{}",
        state.str_or_empty("article")
    );
    let output = ctx
        .generation
        .complete_structured(fast(&ctx, prompt, 1024, 0.1))
        .await?;
    Ok(StateUpdate::new().set("social_posts", social_posts(&output)))
}

/// Each channel's post, accepting either a plain string or `{"text": ...}`.
fn social_posts(output: &StructuredOutput) -> Value {
    let mut posts = Map::new();
    for channel in SOCIAL_CHANNELS {
        let text = output
            .as_structured()
            .and_then(|v| v.get(channel))
            .and_then(|post| match post {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => o.get("text").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .unwrap_or_else(|| POST_FALLBACK.to_string());
        posts.insert(channel.to_string(), Value::String(text));
    }
    Value::Object(posts)
}

async fn generate_faq_section(
    ctx: WorkflowContext,
    state: Arc<WorkflowState>,
) -> Result<StateUpdate> {
    let prompt = format!(
        "You are an SEO specialist. Read the following article and generate a 'Frequently Asked \
         Questions' (FAQ) section.\nIt should contain 3-5 questions and their answers based only on the \
         article's content.\nFormat the output as simple Markdown (e.g., \"**Q: Question?**\\nA: Answer.\").\n\n\
         ARTICLE:\n{}",
        state.str_or_empty("article")
    );
    let faq = ctx.generation.complete(fast(&ctx, prompt, 1024, 0.2)).await?;
    Ok(StateUpdate::new().set_str("faq_section", faq))
}

async fn generate_entities(ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let prompt = format!(
        "You are a data analyst. Extract key entities from the following article.\n\
         Return a JSON object with three keys:\n\
         1. \"people\": A list of all person names mentioned.\n\
         2. \"organizations\": A list of all company, government, or group names.\n\
         3. \"topics\": A list of 5-10 key topics or keywords.\n\n\
         Return empty lists if none are found.\n\nARTICLE:\n{}",
        state.str_or_empty("article")
    );
    let output = ctx
        .generation
        .complete_structured(fast(&ctx, prompt, 1024, 0.1))
        .await?;
    Ok(StateUpdate::new().set("entities", entities(&output)))
}

/// The three entity lists, each defaulting to empty.
fn entities(output: &StructuredOutput) -> Value {
    let mut lists = Map::new();
    for kind in ENTITY_KINDS {
        let list = output
            .as_structured()
            .and_then(|v| v.get(kind))
            .filter(|v| v.is_array())
            .cloned()
            .unwrap_or_else(|| json!([]));
        lists.insert(kind.to_string(), list);
    }
    Value::Object(lists)
}

async fn compile_package(_ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let package = json!({
        "summary": state.get("summary"),
        "social_posts": state.get("social_posts"),
        "faq_section": state.get("faq_section"),
        "entities": state.get("entities"),
    });
    Ok(StateUpdate::new().set("final_package", package))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_social_posts_shapes() {
        let output = StructuredOutput::Structured(json!({
            "twitter": "tweet",
            "linkedin": {"text": "post"},
            "instagram": 42
        }));
        assert_eq!(
            social_posts(&output),
            json!({"twitter": "tweet", "linkedin": "post", "instagram": POST_FALLBACK})
        );

        let raw = StructuredOutput::Raw("nope".into());
        assert_eq!(social_posts(&raw)["twitter"], POST_FALLBACK);
    }

    #[test]
    fn test_entities_default_to_empty() {
        let output = StructuredOutput::Structured(json!({"people": ["Ada"], "topics": "AI"}));
        assert_eq!(
            entities(&output),
            json!({"people": ["Ada"], "organizations": [], "topics": []})
        );
    }
}
