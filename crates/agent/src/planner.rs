//! Free-form fallback: a selector picks exactly one capability, the planner
//! invokes it once and returns its text verbatim.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cartline_core::domain::session::Session;
use thiserror::Error;
use tracing::{info, warn};

use crate::capabilities::checkout::parse_contact;
use crate::capabilities::{Capabilities, CapabilityKind};
use crate::llm::{LlmClient, LlmError};

pub const PLANNER_FAILURE_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";
/// Hard ceiling on reasoning/action cycles per turn.
pub const MAX_PLANNER_ITERATIONS: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlannerStep {
    Act { capability: CapabilityKind, input: String },
    FinalAnswer(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("selector output could not be parsed: {0}")]
    Unparseable(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("selector has no more scripted steps")]
    Exhausted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanningRequest {
    pub utterance: String,
    pub iteration: u32,
    /// Parse error from the previous iteration, fed back to the selector.
    pub feedback: Option<String>,
}

#[async_trait]
pub trait CapabilitySelector: Send + Sync {
    async fn select(&self, request: &PlanningRequest) -> Result<PlannerStep, SelectorError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannerOutcome {
    pub text: String,
    pub capability: Option<CapabilityKind>,
    pub iterations: u32,
}

impl PlannerOutcome {
    fn failed(iterations: u32) -> Self {
        Self { text: PLANNER_FAILURE_MESSAGE.to_owned(), capability: None, iterations }
    }
}

#[derive(Clone)]
pub struct BoundedPlanner {
    selector: Arc<dyn CapabilitySelector>,
    max_iterations: u32,
}

impl BoundedPlanner {
    /// `max_iterations` is clamped to `1..=MAX_PLANNER_ITERATIONS`.
    pub fn new(selector: Arc<dyn CapabilitySelector>, max_iterations: u32) -> Self {
        Self { selector, max_iterations: max_iterations.clamp(1, MAX_PLANNER_ITERATIONS) }
    }

    pub async fn run(
        &self,
        utterance: &str,
        session: &mut Session,
        capabilities: &Capabilities,
        correlation_id: &str,
    ) -> PlannerOutcome {
        let mut feedback = None;

        for iteration in 1..=self.max_iterations {
            let request = PlanningRequest {
                utterance: utterance.to_owned(),
                iteration,
                feedback: feedback.take(),
            };

            match self.selector.select(&request).await {
                Ok(PlannerStep::Act { capability, input }) => {
                    let input = if input.trim().is_empty() { utterance.to_owned() } else { input };
                    info!(
                        event_name = "agent.planner.action_selected",
                        correlation_id,
                        session_id = %session.id,
                        capability = %capability,
                        iteration,
                        "planner selected capability"
                    );
                    let text =
                        capabilities.invoke(capability, &input, session, correlation_id).await;
                    return PlannerOutcome {
                        text,
                        capability: Some(capability),
                        iterations: iteration,
                    };
                }
                Ok(PlannerStep::FinalAnswer(text)) => {
                    return PlannerOutcome { text, capability: None, iterations: iteration };
                }
                Err(SelectorError::Unparseable(raw)) => {
                    warn!(
                        event_name = "agent.planner.unparseable_step",
                        correlation_id,
                        session_id = %session.id,
                        iteration,
                        "planner output unparseable; retrying within budget"
                    );
                    feedback = Some(raw);
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.planner.failed",
                        correlation_id,
                        session_id = %session.id,
                        iteration,
                        error = %error,
                        "planner selector failed"
                    );
                    return PlannerOutcome::failed(iteration);
                }
            }
        }

        warn!(
            event_name = "agent.planner.budget_exhausted",
            correlation_id,
            session_id = %session.id,
            max_iterations = self.max_iterations,
            "planner hit iteration cap without an answer"
        );
        PlannerOutcome::failed(self.max_iterations)
    }
}

/// Deterministic offline selector. A contact triple goes to checkout; otherwise
/// cart words, then tracking, then checkout words, else search.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordSelector;

const CART_WORDS: &[&str] = &["add", "remove", "delete", "cart", "clear", "empty", "view"];
const TRACKING_WORDS: &[&str] = &["track", "status"];
const CHECKOUT_WORDS: &[&str] = &["checkout", "check out", "buy", "purchase", "place order"];

impl KeywordSelector {
    pub fn choose(&self, utterance: &str) -> CapabilityKind {
        let text = utterance.to_lowercase();
        let contains_any = |words: &[&str]| words.iter().any(|word| text.contains(word));

        if parse_contact(utterance).is_some() {
            CapabilityKind::Checkout
        } else if contains_any(CART_WORDS) {
            CapabilityKind::Cart
        } else if contains_any(TRACKING_WORDS) {
            CapabilityKind::Tracking
        } else if contains_any(CHECKOUT_WORDS) {
            CapabilityKind::Checkout
        } else {
            CapabilityKind::Search
        }
    }
}

#[async_trait]
impl CapabilitySelector for KeywordSelector {
    async fn select(&self, request: &PlanningRequest) -> Result<PlannerStep, SelectorError> {
        Ok(PlannerStep::Act {
            capability: self.choose(&request.utterance),
            input: request.utterance.clone(),
        })
    }
}

/// Replays queued steps in order; records every request it receives.
#[derive(Default)]
pub struct ScriptedSelector {
    steps: Mutex<VecDeque<Result<PlannerStep, SelectorError>>>,
    requests: Mutex<Vec<PlanningRequest>>,
}

impl ScriptedSelector {
    pub fn new(steps: Vec<Result<PlannerStep, SelectorError>>) -> Self {
        Self { steps: Mutex::new(steps.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn act(capability: CapabilityKind, input: impl Into<String>) -> Self {
        Self::new(vec![Ok(PlannerStep::Act { capability, input: input.into() })])
    }

    pub fn requests(&self) -> Vec<PlanningRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl CapabilitySelector for ScriptedSelector {
    async fn select(&self, request: &PlanningRequest) -> Result<PlannerStep, SelectorError> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }
        let next = match self.steps.lock() {
            Ok(mut steps) => steps.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or(Err(SelectorError::Exhausted))
    }
}

/// Asks a language model to pick one action in a ReAct-style exchange.
pub struct LlmCapabilitySelector {
    llm: Arc<dyn LlmClient>,
}

impl LlmCapabilitySelector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn prompt(request: &PlanningRequest) -> String {
        let tools = CapabilityKind::ALL
            .iter()
            .map(|kind| format!("{}: {}", kind.action_name(), kind.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let names = CapabilityKind::ALL
            .iter()
            .map(|kind| kind.action_name())
            .collect::<Vec<_>>()
            .join(", ");
        let feedback = request
            .feedback
            .as_deref()
            .map(|raw| {
                format!(
                    "\nYour previous reply could not be parsed:\n{raw}\nReply again using the exact format.\n"
                )
            })
            .unwrap_or_default();

        format!(
            "You are a shopping assistant. For each user message, take EXACTLY ONE action.\n\n\
             You have access to the following tools:\n\n{tools}\n\n\
             Use this format:\n\n\
             Thought: I should use a tool to help\n\
             Action: the action to take, one of [{names}]\n\
             Action Input: the input to the action\n\n\
             If no tool applies, reply with:\nFinal Answer: your reply to the user\n{feedback}\n\
             Question: {}\nThought:",
            request.utterance
        )
    }
}

/// Reads `Action:`/`Action Input:` lines, falling back to `Final Answer:`.
pub fn parse_step(output: &str) -> Result<PlannerStep, SelectorError> {
    let mut action = None;
    let mut input = None;
    let mut final_answer = None;

    for (index, line) in output.lines().enumerate() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Action Input:") {
            input = Some(rest.trim().trim_matches('"').to_owned());
        } else if let Some(rest) = line.strip_prefix("Action:") {
            action = Some(rest.trim().to_owned());
        } else if let Some(rest) = line.strip_prefix("Final Answer:") {
            let tail: Vec<&str> = output.lines().skip(index + 1).collect();
            let mut answer = rest.trim().to_owned();
            if !tail.is_empty() {
                answer = format!("{answer}\n{}", tail.join("\n")).trim().to_owned();
            }
            final_answer = Some(answer);
            break;
        }
    }

    if let Some(action) = action {
        let capability = action
            .parse::<CapabilityKind>()
            .map_err(|error| SelectorError::Unparseable(error.to_string()))?;
        return Ok(PlannerStep::Act { capability, input: input.unwrap_or_default() });
    }
    final_answer
        .filter(|answer| !answer.is_empty())
        .map(PlannerStep::FinalAnswer)
        .ok_or_else(|| SelectorError::Unparseable(output.trim().to_owned()))
}

#[async_trait]
impl CapabilitySelector for LlmCapabilitySelector {
    async fn select(&self, request: &PlanningRequest) -> Result<PlannerStep, SelectorError> {
        let output = self.llm.complete(&Self::prompt(request)).await?;
        parse_step(&output)
    }
}
