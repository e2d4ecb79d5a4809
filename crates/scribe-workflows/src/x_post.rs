//! X post refinement: a generator, an evaluator and an optimizer model
//! iterate on one post under the refinement controller, plus a trending
//! idea generator for seeding new posts.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use scribe_core::config::{RefinementConfig, RoleModels};
use scribe_core::error::{Result, ScribeError};
use scribe_core::types::{CompletionRequest, FeedbackItem, StructuredOutput};
use scribe_engine::{
    FrozenGraph, GraphDefinitionError, GraphSpec, OptimizeRequest, RefinementController,
    RefinementOutcome, RefinementStrategy, StateUpdate, WorkflowState,
};

use crate::workflow::{final_value, step, Workflow, WorkflowContext};

const MIN_WORD_LIMIT: u32 = 120;
const MAX_WORD_LIMIT: u32 = 400;
const MAX_IDEAS: u32 = 6;

/// Request for one refined X post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XPostInput {
    pub topic: String,
    pub objective: String,
    pub audience: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_brand_voice")]
    pub brand_voice: String,
    #[serde(default)]
    pub call_to_action: Option<String>,
    #[serde(default)]
    pub product_details: Option<String>,
    /// Terms or hashtags that must appear.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Character budget for the post.
    #[serde(default = "default_word_limit")]
    pub word_limit: u32,
    /// Refinement rounds; the configured default when absent.
    #[serde(default)]
    pub max_iterations: Option<u32>,
    #[serde(default)]
    pub human_feedback: Vec<FeedbackItem>,
}

fn default_tone() -> String {
    "Bold".to_string()
}

fn default_brand_voice() -> String {
    "Witty, high-signal startup voice".to_string()
}

fn default_word_limit() -> u32 {
    280
}

impl XPostInput {
    /// Check bounds and resolve the round count against `limits`.
    pub fn validate(&mut self, limits: &RefinementConfig) -> Result<u32> {
        for (field, value) in [
            ("topic", &self.topic),
            ("objective", &self.objective),
            ("audience", &self.audience),
        ] {
            if value.trim().is_empty() {
                return Err(ScribeError::InvalidInput(format!("'{}' must not be empty", field)));
            }
        }
        if !(MIN_WORD_LIMIT..=MAX_WORD_LIMIT).contains(&self.word_limit) {
            return Err(ScribeError::InvalidInput(format!(
                "word_limit must be between {} and {}",
                MIN_WORD_LIMIT, MAX_WORD_LIMIT
            )));
        }
        let rounds = self.max_iterations.unwrap_or(limits.default_max_rounds);
        if rounds == 0 || rounds > limits.max_rounds_limit {
            return Err(ScribeError::InvalidInput(format!(
                "max_iterations must be between 1 and {}",
                limits.max_rounds_limit
            )));
        }
        if self.human_feedback.iter().any(|f| f.round == Some(0)) {
            return Err(ScribeError::InvalidInput(
                "human_feedback iteration must be at least 1".to_string(),
            ));
        }
        self.max_iterations = Some(rounds);
        Ok(rounds)
    }

    fn keyword_list(&self) -> String {
        if self.keywords.is_empty() {
            "None".to_string()
        } else {
            self.keywords.join(", ")
        }
    }
}

/// One round as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationView {
    pub iteration: u32,
    pub generator_output: String,
    pub evaluator_score: u8,
    pub evaluator_verdict: String,
    pub evaluator_notes: String,
    pub evaluator_action_items: Vec<String>,
    pub human_feedback: Vec<FeedbackItem>,
    pub optimized_post: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadEntry {
    pub source: String,
    pub iteration: u32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub topic: String,
    pub objective: String,
    pub audience: String,
    pub models: Value,
    pub total_iterations: usize,
    pub word_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XPostResponse {
    pub final_post: String,
    pub iterations: Vec<IterationView>,
    pub feedback_threads: Vec<ThreadEntry>,
    pub audit_trail: AuditTrail,
}

impl XPostResponse {
    fn from_outcome(input: &XPostInput, roles: &RoleModels, outcome: RefinementOutcome) -> Self {
        let iterations = outcome
            .iterations
            .into_iter()
            .map(|record| IterationView {
                iteration: record.round,
                generator_output: record.generated,
                evaluator_score: record.verdict.score,
                evaluator_verdict: record.verdict.label,
                evaluator_notes: record.verdict.observations,
                evaluator_action_items: record.verdict.action_items,
                human_feedback: record.feedback,
                optimized_post: record.optimized,
            })
            .collect::<Vec<_>>();
        let feedback_threads = outcome
            .feedback_thread
            .into_iter()
            .map(|entry| ThreadEntry {
                source: entry.source,
                iteration: entry.round,
                message: entry.message,
                score: entry.score,
            })
            .collect();

        Self {
            final_post: outcome.final_artifact,
            audit_trail: AuditTrail {
                topic: input.topic.clone(),
                objective: input.objective.clone(),
                audience: input.audience.clone(),
                models: json!({
                    "generator": roles.generator,
                    "evaluator": roles.evaluator,
                    "optimizer": roles.optimizer,
                }),
                total_iterations: iterations.len(),
                word_limit: input.word_limit,
            },
            iterations,
            feedback_threads,
        }
    }
}

/// Prompts and model choices for the three X post roles.
pub struct XPostStrategy {
    ctx: WorkflowContext,
}

impl XPostStrategy {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    fn roles(&self) -> &RoleModels {
        &self.ctx.config.roles
    }
}

impl RefinementStrategy for XPostStrategy {
    type Input = XPostInput;

    fn generate<'a>(
        &'a self,
        input: &'a XPostInput,
        round: u32,
        previous: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>> {
        let system = "You are a growth marketer who writes concise, viral-ready posts for X. \
                      Favor clarity over gimmicks, use plain language, and keep the energy high.";
        let mut user = format!(
            "Round: {round}\nTopic: {}\nObjective: {}\nAudience: {}\nTone: {}\nBrand Voice: {}\n\
             Call to action: {}\nProduct proof points: {}\nRequired keywords/hashtags: {}\n\
             Character budget: {}\n\n\
             Write a single X post (no thread) that balances the above requirements.\n\
             Use punchy short sentences, keep emojis minimal (max 1) unless absolutely justified, \
             and ensure the copy is <= {} characters.\n",
            input.topic,
            input.objective,
            input.audience,
            input.tone,
            input.brand_voice,
            input.call_to_action.as_deref().unwrap_or("None"),
            input.product_details.as_deref().unwrap_or("None"),
            input.keyword_list(),
            input.word_limit,
            input.word_limit,
        );
        if let Some(previous) = previous {
            user.push_str(
                "\nHere is the previous attempt. Improve on the framing while keeping \
                 any elements that clearly worked:\n",
            );
            user.push_str(previous);
            user.push('\n');
        }

        // More exploratory on the first pass
        let temperature = if round == 1 { 0.8 } else { 0.6 };
        let request = CompletionRequest::new(system, user)
            .with_model(self.roles().generator.clone())
            .with_temperature(temperature)
            .with_max_tokens(600);
        self.ctx.generation.complete(request)
    }

    fn evaluate<'a>(
        &'a self,
        input: &'a XPostInput,
        round: u32,
        artifact: &'a str,
    ) -> BoxFuture<'a, Result<StructuredOutput>> {
        let system = "You are a meticulous social editor who grades X posts. \
                      Always respond with strict JSON.";
        let user = format!(
            "Evaluate the following X post and respond using JSON with this schema:\n\
             {{\n  \"verdict\": \"APPROVED or REVISE\",\n  \"score\": integer 1-5,\n  \
             \"observations\": \"1 paragraph summary of strengths and issues\",\n  \
             \"action_items\": [\"bullet improvements\", \"...\"]\n}}\n\n\
             Context:\n- Topic: {}\n- Objective: {}\n- Audience: {}\n- Tone: {}\n\
             - Keywords that must appear: {}\n- Character budget: {}\n- Iteration: {}\n\n\
             Draft to evaluate:\n{}",
            input.topic,
            input.objective,
            input.audience,
            input.tone,
            input.keyword_list(),
            input.word_limit,
            round,
            artifact,
        );
        let request = CompletionRequest::new(system, user)
            .with_model(self.roles().evaluator.clone())
            .with_temperature(0.2)
            .with_max_tokens(500);
        self.ctx.generation.complete_structured(request)
    }

    fn optimize<'a>(
        &'a self,
        input: &'a XPostInput,
        request: OptimizeRequest<'a>,
    ) -> BoxFuture<'a, Result<String>> {
        let system = "You are a collaborative copy editor who rewrites X posts with precision. \
                      Blend automated and human reviewer feedback and return a single \
                      publication-ready post that honors the character budget.";
        let human_notes = if request.feedback.is_empty() {
            "None supplied.".to_string()
        } else {
            request
                .feedback
                .iter()
                .map(|f| format!("- {}: {}", f.author, f.message))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let user = format!(
            "Latest generator draft:\n{}\n\nPrevious best draft (if any):\n{}\n\n\
             Evaluator feedback:\n{}\n\nHuman feedback to prioritize:\n{}\n\n\
             Rewrite the post so it:\n- stays under {} characters,\n- preserves the intent \"{}\",\n\
             - keeps the tone \"{}\" and {},\n- includes these keywords if missing: {},\n\
             - clearly states the CTA: {},\n- feels crafted for {}.\n\n\
             Return ONLY the improved X post text, no markdown fences, commentary, or numbering.",
            request.latest,
            request.previous_best.unwrap_or("None"),
            request.verdict.summary(),
            human_notes,
            input.word_limit,
            input.objective,
            input.tone,
            input.brand_voice,
            input.keyword_list(),
            input.call_to_action.as_deref().unwrap_or("Implicit CTA OK"),
            input.audience,
        );
        let completion = CompletionRequest::new(system, user)
            .with_model(self.roles().optimizer.clone())
            .with_temperature(0.4)
            .with_max_tokens(600);
        self.ctx.generation.complete(completion)
    }
}

/// Validate `input` and run the refinement loop over it.
pub async fn generate_post(ctx: &WorkflowContext, mut input: XPostInput) -> Result<XPostResponse> {
    let rounds = input.validate(&ctx.config.refinement)?;
    info!(topic = %input.topic, rounds, "Generating X post");

    let controller =
        RefinementController::from_config(&ctx.config.refinement).with_events(ctx.events.clone());
    let strategy = XPostStrategy::new(ctx.clone());
    let outcome = controller
        .run(&strategy, &input, rounds, &input.human_feedback)
        .await?;
    Ok(XPostResponse::from_outcome(&input, &ctx.config.roles, outcome))
}

/// Refinement exposed as a single-node graph.
pub struct XPostWorkflow {
    graph: FrozenGraph,
    limits: RefinementConfig,
}

impl XPostWorkflow {
    pub fn new(ctx: &WorkflowContext) -> std::result::Result<Self, GraphDefinitionError> {
        let mut spec = GraphSpec::new("x_post");
        spec.add_node(
            step(ctx, "refine_post", refine_post)
                .with_reads(["request"])
                .with_outputs(["x_post"]),
        )
        .set_start("refine_post")
        .set_terminal("refine_post");
        Ok(Self {
            graph: spec.freeze()?,
            limits: ctx.config.refinement.clone(),
        })
    }
}

impl Workflow for XPostWorkflow {
    fn name(&self) -> &str {
        "x_post"
    }

    fn description(&self) -> &str {
        "Write an X post through generate, evaluate and optimize rounds"
    }

    fn graph(&self) -> &FrozenGraph {
        &self.graph
    }

    fn seed(&self, fields: Map<String, Value>) -> Result<WorkflowState> {
        let mut input: XPostInput = serde_json::from_value(Value::Object(fields))
            .map_err(|e| ScribeError::InvalidInput(e.to_string()))?;
        input.validate(&self.limits)?;
        Ok(WorkflowState::new().with("request", serde_json::to_value(&input)?))
    }

    fn output(&self, state: &WorkflowState) -> Result<Value> {
        final_value(state, "x_post")
    }
}

async fn refine_post(ctx: WorkflowContext, state: Arc<WorkflowState>) -> Result<StateUpdate> {
    let request = state.get("request").cloned().unwrap_or(Value::Null);
    let input: XPostInput = serde_json::from_value(request)?;
    let response = generate_post(&ctx, input).await?;
    Ok(StateUpdate::new().set("x_post", serde_json::to_value(response)?))
}

/// Request for trending idea cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaRequest {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_idea_count")]
    pub count: u32,
}

fn default_idea_count() -> u32 {
    4
}

impl Default for IdeaRequest {
    fn default() -> Self {
        Self {
            keywords: vec![],
            count: default_idea_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeasResponse {
    pub ideas: Vec<Value>,
}

/// Generate idea cards. Unusable model output yields one fixed fallback card.
pub async fn generate_ideas(ctx: &WorkflowContext, request: IdeaRequest) -> Result<IdeasResponse> {
    if !(1..=MAX_IDEAS).contains(&request.count) {
        return Err(ScribeError::InvalidInput(format!(
            "count must be between 1 and {}",
            MAX_IDEAS
        )));
    }

    let keywords = if request.keywords.is_empty() {
        "None".to_string()
    } else {
        request.keywords.join(", ")
    };
    let mode = if request.keywords.is_empty() {
        "Pull from general startup + AI culture topics trending today."
    } else {
        "Focus on emerging X trends using the provided keywords."
    };
    let schema = json!({
        "ideas": [{
            "id": "short-id",
            "headline": "catchy title",
            "topic": "core theme",
            "summary": "2-sentence overview",
            "suggested_objective": "goal for the post",
            "suggested_audience": "target persona",
            "tone": "tone guidance",
            "call_to_action": "CTA idea",
            "keywords": ["keyword1", "keyword2"],
            "hashtags": ["#tag"],
            "sample_tweet": "tweet copy"
        }]
    });
    let user = format!(
        "You are a trend-spotting social strategist.\n\n\
         Produce {} distinct X post ideas. {}\n\n\
         Keywords or themes to include when relevant: {}\n\n\
         Return STRICT JSON that matches this schema (no markdown, no prose):\n{}\n\n\
         Constraints:\n- Sample tweet must be under 280 characters and feel copy-ready.\n\
         - Headlines should be 6-10 words and high-signal.\n\
         - Include hashtags that would increase discoverability.\n\
         - Summaries must reference why the topic is trending right now (news hook, release, etc.).",
        request.count,
        mode,
        keywords,
        serde_json::to_string_pretty(&schema)?,
    );
    let completion = CompletionRequest::new("You craft structured responses for growth teams.", user)
        .with_model(ctx.config.roles.generator.clone())
        .with_temperature(0.65)
        .with_max_tokens(1200);

    let output = ctx.generation.complete_structured(completion).await?;
    let ideas = parse_ideas(&output);
    if ideas.is_empty() {
        warn!("Idea generation returned nothing usable, using fallback idea");
        return Ok(IdeasResponse {
            ideas: vec![fallback_idea(&request.keywords)],
        });
    }
    Ok(IdeasResponse { ideas })
}

fn parse_ideas(output: &StructuredOutput) -> Vec<Value> {
    output
        .as_structured()
        .and_then(|v| v.get("ideas"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn fallback_idea(keywords: &[String]) -> Value {
    let keywords = if keywords.is_empty() {
        json!(["AI infra", "low latency"])
    } else {
        json!(keywords)
    };
    json!({
        "id": "fallback-idea",
        "headline": "AI builders chase latency-free stacks",
        "topic": "Ultra-fast inference week",
        "summary": "Founders brag about 30ms generation demos after Groq's latest benchmarks shocked dev Twitter.",
        "suggested_objective": "Drive signups to our infra explainer or waitlist.",
        "suggested_audience": "Infra-minded AI founders and engineers",
        "tone": "Confident, technical flex",
        "call_to_action": "Drop your latency wins + read the breakdown",
        "keywords": keywords,
        "hashtags": ["#AI", "#Startups"],
        "sample_tweet": "Dev Twitter is bragging about <50ms LLM calls. We just shipped the guide on how. Drop your latency wins + snag the blueprint. ⚡️"
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> XPostInput {
        serde_json::from_value(json!({
            "topic": "Launch week",
            "objective": "Drive signups",
            "audience": "Indie hackers"
        }))
        .unwrap()
    }

    #[test]
    fn test_input_defaults() {
        let input = input();
        assert_eq!(input.tone, "Bold");
        assert_eq!(input.brand_voice, "Witty, high-signal startup voice");
        assert_eq!(input.word_limit, 280);
        assert!(input.max_iterations.is_none());
    }

    #[test]
    fn test_validate_resolves_rounds() {
        let limits = RefinementConfig::default();
        let mut input = input();
        assert_eq!(input.validate(&limits).unwrap(), 2);
        assert_eq!(input.max_iterations, Some(2));

        let mut too_many = self::input();
        too_many.max_iterations = Some(6);
        assert!(matches!(too_many.validate(&limits), Err(ScribeError::InvalidInput(_))));

        let mut short = self::input();
        short.word_limit = 100;
        assert!(short.validate(&limits).is_err());

        let mut blank = self::input();
        blank.topic = "  ".into();
        assert!(blank.validate(&limits).is_err());
    }

    #[test]
    fn test_feedback_accepts_iteration_alias() {
        let input: XPostInput = serde_json::from_value(json!({
            "topic": "t", "objective": "o", "audience": "a",
            "human_feedback": [{"message": "shorter", "iteration": 2}]
        }))
        .unwrap();
        assert_eq!(input.human_feedback[0].author, "strategist");
        assert_eq!(input.human_feedback[0].round, Some(2));
    }

    #[test]
    fn test_parse_ideas() {
        let output = StructuredOutput::Structured(json!({"ideas": [{"id": "a"}]}));
        assert_eq!(parse_ideas(&output).len(), 1);
        let output = StructuredOutput::Structured(json!({"ideas": "nope"}));
        assert!(parse_ideas(&output).is_empty());
        assert!(parse_ideas(&StructuredOutput::Raw("x".into())).is_empty());
    }

    #[test]
    fn test_fallback_idea_uses_keywords() {
        let idea = fallback_idea(&["rust".to_string()]);
        assert_eq!(idea["id"], "fallback-idea");
        assert_eq!(idea["keywords"], json!(["rust"]));
        assert_eq!(fallback_idea(&[])["keywords"], json!(["AI infra", "low latency"]));
    }
}
