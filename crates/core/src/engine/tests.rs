use std::sync::{Arc, Mutex};
use std::time::Duration;

use marketeer_model::{ErrorKind as ModelErrorKind, ModelMessage};
use marketeer_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::*;
use crate::role::RoleDefinition;
use crate::tool::{Registry, Tool, ToolResult, handoff_tool_name};

#[derive(Deserialize, JsonSchema)]
struct ScrapeInput {
    url: String,
}

struct FakeScrapeTool(Value);

impl Tool for FakeScrapeTool {
    type Input = ScrapeInput;

    fn name(&self) -> &str {
        "scrape_website"
    }

    fn description(&self) -> &str {
        "Scrapes a website."
    }

    fn parameter_schema(&self) -> &Value {
        &self.0
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            if input.url.starts_with("https://") {
                Ok(format!("# Welcome to {}", input.url))
            } else {
                Err(tool::Error::execution_error()
                    .with_reason(format!("invalid URL: {}", input.url)))
            }
        }
    }
}

struct FixedTool {
    name: &'static str,
    output: &'static str,
    schema: Value,
}

impl FixedTool {
    fn new(name: &'static str, output: &'static str) -> Self {
        Self {
            name,
            output,
            schema: json!({ "type": "object" }),
        }
    }
}

impl Tool for FixedTool {
    type Input = Map<String, Value>;

    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Returns a fixed answer."
    }

    fn parameter_schema(&self) -> &Value {
        &self.schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        _input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let output = self.output.to_owned();
        async move { Ok(output) }
    }
}

fn make_roles() -> RoleSet {
    let mut registry = Registry::new();
    registry
        .register(FakeScrapeTool(schema_for!(ScrapeInput).to_value()))
        .unwrap();
    registry
        .register(FixedTool::new("analyze_website_content", "analysis"))
        .unwrap();
    registry
        .register(FixedTool::new("create_campaign_idea", "campaign"))
        .unwrap();
    registry
        .register(FixedTool::new("generate_copy", "copy"))
        .unwrap();

    RoleSet::builder(registry)
        .role(
            RoleDefinition::new(RoleId::UserInterface, "UI", "Talk to user.")
                .with_tool("scrape_website")
                .with_tool(handoff_tool_name(RoleId::WebsiteScraper)),
        )
        .role(
            RoleDefinition::new(RoleId::WebsiteScraper, "Scraper", "Scrape.")
                .with_tool("scrape_website")
                .with_tool(handoff_tool_name(RoleId::Analyst)),
        )
        .role(
            RoleDefinition::new(RoleId::Analyst, "Analyst", "Analyze.")
                .with_tool("analyze_website_content")
                .with_tool(handoff_tool_name(RoleId::CampaignIdea)),
        )
        .role(
            RoleDefinition::new(RoleId::CampaignIdea, "Campaign", "Ideate.")
                .with_tool("create_campaign_idea")
                .with_tool(handoff_tool_name(RoleId::Copywriter)),
        )
        .role(
            RoleDefinition::new(RoleId::Copywriter, "Copywriter", "Write.")
                .with_tool("generate_copy"),
        )
        .build()
        .unwrap()
}

fn make_engine(model_provider: &TestModelProvider, max: usize) -> Engine {
    EngineBuilder::with_model_provider(model_provider.clone(), make_roles())
        .with_max_correction_cycles(max)
        .build()
}

fn handoff_call(id: &str, target: RoleId) -> PresetResponse {
    PresetResponse::tool_call(id, handoff_tool_name(target), json!({}))
}

fn error_kinds(run: &Run) -> Vec<ErrorKind> {
    run.conversation()
        .turns()
        .iter()
        .filter_map(|turn| match turn.content() {
            TurnContent::ToolError { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect()
}

fn handoffs(run: &Run) -> Vec<(RoleId, RoleId)> {
    run.conversation()
        .turns()
        .iter()
        .filter_map(|turn| match turn.content() {
            TurnContent::Handoff { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_full_pipeline() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(handoff_call("1", RoleId::WebsiteScraper));
    model_provider.add_response(PresetResponse::tool_call(
        "2",
        "scrape_website",
        json!({ "url": "https://example.com" }),
    ));
    model_provider.add_response(handoff_call("3", RoleId::Analyst));
    model_provider.add_response(PresetResponse::tool_call(
        "4",
        "analyze_website_content",
        json!({ "content": "# Welcome" }),
    ));
    model_provider.add_response(handoff_call("5", RoleId::CampaignIdea));
    model_provider.add_response(PresetResponse::tool_call(
        "6",
        "create_campaign_idea",
        json!({ "target_audience": "devs", "goals": "signups" }),
    ));
    model_provider.add_response(handoff_call("7", RoleId::Copywriter));
    model_provider.add_response(PresetResponse::tool_call(
        "8",
        "generate_copy",
        json!({ "brief": "campaign" }),
    ));
    model_provider.add_response(PresetResponse::text("Ship it today."));

    let events = Arc::new(Mutex::new(vec![]));
    let engine =
        EngineBuilder::with_model_provider(model_provider.clone(), make_roles())
            .on_event({
                let events = Arc::clone(&events);
                move |event| events.lock().unwrap().push(event)
            })
            .build();
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    assert_eq!(run.stage(), Stage::AwaitingUserInput);

    let outcome = run.submit("Market https://example.com").await.unwrap();
    assert_eq!(outcome, Outcome::Done("Ship it today.".to_owned()));
    assert_eq!(run.stage(), Stage::Done);
    assert_eq!(run.active_role().id(), RoleId::Copywriter);
    assert_eq!(
        handoffs(&run),
        vec![
            (RoleId::UserInterface, RoleId::WebsiteScraper),
            (RoleId::WebsiteScraper, RoleId::Analyst),
            (RoleId::Analyst, RoleId::CampaignIdea),
            (RoleId::CampaignIdea, RoleId::Copywriter),
        ]
    );
    assert!(error_kinds(&run).is_empty());

    // Every request carries the active role's prompt and only its tools.
    let requests = model_provider.requests();
    assert_eq!(requests.len(), 9);
    let instructions: Vec<_> =
        requests.iter().map(|req| req.instructions.as_str()).collect();
    assert_eq!(
        instructions,
        [
            "Talk to user.",
            "Scrape.",
            "Scrape.",
            "Analyze.",
            "Analyze.",
            "Ideate.",
            "Ideate.",
            "Write.",
            "Write.",
        ]
    );
    let copywriter_tools: Vec<_> =
        requests[8].tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(copywriter_tools, ["generate_copy"]);

    // The scrape result is visible to the scraper's next request.
    let scraped = "# Welcome to https://example.com";
    assert!(requests[2].messages.iter().any(|msg| matches!(
        msg,
        ModelMessage::Tool(result) if result.content == scraped
    )));

    let err = run.submit("again").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RunFinished);

    let events = events.lock().unwrap();
    let handoff_events = events
        .iter()
        .filter(|event| matches!(event, Event::Handoff { .. }))
        .count();
    assert_eq!(handoff_events, 4);
    assert!(events.contains(&Event::Delta {
        role: RoleId::Copywriter,
        text: "Ship it today.".to_owned(),
    }));
}

#[tokio::test]
async fn test_malformed_url() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(handoff_call("1", RoleId::WebsiteScraper));
    model_provider.add_response(PresetResponse::tool_call(
        "2",
        "scrape_website",
        json!({ "url": "not-a-url" }),
    ));

    let engine = make_engine(&model_provider, 3);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    let err = run.submit("Market not-a-url").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ToolExecutionError);
    assert_eq!(run.stage(), Stage::Failed);

    // History up to the failure is kept.
    let turns = run.conversation().turns();
    assert_eq!(turns.len(), 5);
    assert_eq!(turns[0].speaker(), &Speaker::User);
    assert_eq!(
        handoffs(&run),
        vec![(RoleId::UserInterface, RoleId::WebsiteScraper)]
    );
    assert_eq!(error_kinds(&run), vec![ErrorKind::ToolExecutionError]);

    let err = run.submit("retry").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RunFinished);
}

#[tokio::test]
async fn test_correction_bound_exceeded() {
    let mut model_provider = TestModelProvider::default();
    for id in ["1", "2", "3"] {
        model_provider.add_response(PresetResponse::tool_call(
            id,
            "generate_copy",
            json!({ "brief": "x" }),
        ));
    }
    model_provider.add_response(PresetResponse::text("never reached"));

    let engine = make_engine(&model_provider, 2);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    let err = run.submit("hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MaxCorrectionCyclesExceeded);
    assert_eq!(run.stage(), Stage::Failed);
    assert_eq!(model_provider.remaining(), 1);
    assert_eq!(error_kinds(&run), vec![ErrorKind::ToolNotPermitted; 3]);
    assert!(!run.conversation().turns().iter().any(|turn| matches!(
        turn.content(),
        TurnContent::ToolResult { .. }
    )));
}

#[tokio::test]
async fn test_correction_recovers() {
    let mut model_provider = TestModelProvider::default();
    for id in ["1", "2"] {
        model_provider.add_response(PresetResponse::tool_call(
            id,
            "generate_copy",
            json!({ "brief": "x" }),
        ));
    }
    model_provider.add_response(PresetResponse::text("Which website?"));

    let engine = make_engine(&model_provider, 2);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    let outcome = run.submit("hi").await.unwrap();
    assert_eq!(outcome, Outcome::Reply("Which website?".to_owned()));
    assert_eq!(run.stage(), Stage::AwaitingUserInput);
    assert_eq!(error_kinds(&run), vec![ErrorKind::ToolNotPermitted; 2]);

    // The rejection is fed back to the backend.
    let requests = model_provider.requests();
    let Some(ModelMessage::Tool(feedback)) = requests[1].messages.last() else {
        panic!("expected tool feedback");
    };
    assert!(feedback.content.starts_with("Error:"));
}

#[tokio::test]
async fn test_zero_corrections() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "1",
        "delete_everything",
        json!({}),
    ));

    let engine = make_engine(&model_provider, 0);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    let err = run.submit("hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ToolNotPermitted);
    assert!(err.reason().contains("no tool named"));
}

#[tokio::test]
async fn test_invalid_arguments() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "1",
        "scrape_website",
        json!({ "link": "https://example.com" }),
    ));
    model_provider.add_response(PresetResponse::tool_call(
        "2",
        "scrape_website",
        json!({ "url": "https://example.com" }),
    ));
    model_provider.add_response(PresetResponse::text("Scraped."));

    let engine = make_engine(&model_provider, 1);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    let outcome = run.submit("hi").await.unwrap();
    assert_eq!(outcome.content(), "Scraped.");
    assert!(!outcome.is_done());
    assert_eq!(error_kinds(&run), vec![ErrorKind::InvalidToolArguments]);
}

#[tokio::test]
async fn test_backend_unavailable() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::failing(
        ModelErrorKind::RateLimitExceeded,
    ));

    let engine = make_engine(&model_provider, 3);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    let err = run.submit("hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert_eq!(run.stage(), Stage::Failed);
    assert_eq!(run.conversation().len(), 1);
}

#[tokio::test]
async fn test_text_before_tool_call() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::MessageDelta("Passing you on.".to_owned()),
        PresetEvent::ToolCall(marketeer_model::ToolCallRequest {
            id: "1".to_owned(),
            name: handoff_tool_name(RoleId::WebsiteScraper),
            arguments: json!({}),
        }),
        PresetEvent::ToolCall(marketeer_model::ToolCallRequest {
            id: "2".to_owned(),
            name: "scrape_website".to_owned(),
            arguments: json!({ "url": "https://example.com" }),
        }),
    ]));
    model_provider.add_response(PresetResponse::text("Send me a URL."));

    let engine = make_engine(&model_provider, 3);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    run.submit("hi").await.unwrap();

    let turns = run.conversation().turns();
    assert_eq!(
        turns[1].content(),
        &TurnContent::Text("Passing you on.".to_owned())
    );
    assert!(matches!(
        turns[2].content(),
        TurnContent::ToolCall(req) if req.id == "1"
    ));
    // Only the first call is honored.
    assert_eq!(
        handoffs(&run),
        vec![(RoleId::UserInterface, RoleId::WebsiteScraper)]
    );
    assert_eq!(run.active_role().id(), RoleId::WebsiteScraper);
    assert_eq!(turns.len(), 5);
}

#[tokio::test]
async fn test_history_only_grows() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::text("Hello!"));
    model_provider.add_response(handoff_call("1", RoleId::WebsiteScraper));
    model_provider.add_response(PresetResponse::text("Which URL?"));
    model_provider.add_response(PresetResponse::text("Still waiting."));

    let engine = make_engine(&model_provider, 3);
    let mut run = engine.start(RoleId::UserInterface).unwrap();

    let mut previous = vec![];
    for input in ["hi", "market my site", "soon"] {
        run.submit(input).await.unwrap();
        let turns = run.conversation().turns();
        assert!(turns.len() > previous.len());
        assert_eq!(&turns[..previous.len()], previous.as_slice());
        previous = turns.to_vec();
    }
    assert_eq!(run.active_role().id(), RoleId::WebsiteScraper);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_submission() {
    let mut model_provider = TestModelProvider::default();
    model_provider.set_delay(Duration::from_secs(10));
    model_provider.add_response(PresetResponse::text("too late"));
    model_provider.add_response(PresetResponse::text("hello"));

    let engine = make_engine(&model_provider, 3);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    let result =
        tokio::time::timeout(Duration::from_secs(1), run.submit("hi")).await;
    assert!(result.is_err());
    assert_eq!(run.stage(), Stage::Dispatching);
    assert_eq!(run.conversation().len(), 1);

    let outcome = run.submit("hi again").await.unwrap();
    assert_eq!(outcome, Outcome::Reply("hello".to_owned()));
    assert_eq!(run.conversation().len(), 3);
}

#[tokio::test]
async fn test_unknown_entry_role() {
    let model_provider = TestModelProvider::default();
    let roles = RoleSet::builder(Registry::new())
        .role(RoleDefinition::new(RoleId::Copywriter, "Writer", "Write."))
        .build()
        .unwrap();
    let engine = EngineBuilder::with_model_provider(model_provider, roles)
        .build();
    let err = engine.start(RoleId::UserInterface).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    assert!(engine.start(RoleId::Copywriter).is_ok());
}

#[tokio::test]
async fn test_corrections_reset_after_valid_call() {
    let mut model_provider = TestModelProvider::default();
    for id in ["1", "3"] {
        model_provider.add_response(PresetResponse::tool_call(
            id,
            "scrape_website",
            json!({}),
        ));
        model_provider.add_response(PresetResponse::tool_call(
            format!("{id}-ok"),
            "scrape_website",
            json!({ "url": "https://example.com" }),
        ));
    }
    model_provider.add_response(handoff_call("5", RoleId::WebsiteScraper));
    model_provider.add_response(PresetResponse::tool_call(
        "6",
        "generate_copy",
        json!({ "brief": "x" }),
    ));
    model_provider.add_response(PresetResponse::text("Which page next?"));

    let engine = make_engine(&model_provider, 1);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    let outcome = run.submit("hi").await.unwrap();
    assert_eq!(outcome, Outcome::Reply("Which page next?".to_owned()));
    assert_eq!(
        error_kinds(&run),
        vec![
            ErrorKind::InvalidToolArguments,
            ErrorKind::InvalidToolArguments,
            ErrorKind::ToolNotPermitted,
        ]
    );
    assert_eq!(model_provider.remaining(), 0);
}

#[tokio::test]
async fn test_handoff_with_arguments() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "1",
        handoff_tool_name(RoleId::WebsiteScraper),
        json!({ "target": "analyst_agent" }),
    ));
    model_provider.add_response(handoff_call("2", RoleId::WebsiteScraper));
    model_provider.add_response(PresetResponse::text("Which URL?"));

    let engine = make_engine(&model_provider, 1);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    run.submit("hi").await.unwrap();
    assert_eq!(error_kinds(&run), vec![ErrorKind::InvalidToolArguments]);
    assert_eq!(
        handoffs(&run),
        vec![(RoleId::UserInterface, RoleId::WebsiteScraper)]
    );

    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "1",
        handoff_tool_name(RoleId::WebsiteScraper),
        json!("analyst"),
    ));

    let engine = make_engine(&model_provider, 0);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    let err = run.submit("hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidToolArguments);
    assert_eq!(run.active_role().id(), RoleId::UserInterface);
}

#[tokio::test]
async fn test_entry_role_scrapes_before_handoff() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "1",
        "scrape_website",
        json!({ "url": "https://example.com" }),
    ));
    model_provider.add_response(handoff_call("2", RoleId::WebsiteScraper));
    model_provider.add_response(handoff_call("3", RoleId::Analyst));
    model_provider.add_response(PresetResponse::tool_call(
        "4",
        "analyze_website_content",
        json!({ "content": "# Welcome to https://example.com" }),
    ));
    model_provider.add_response(handoff_call("5", RoleId::CampaignIdea));
    model_provider.add_response(PresetResponse::tool_call(
        "6",
        "create_campaign_idea",
        json!({ "target_audience": "devs", "goals": "signups" }),
    ));
    model_provider.add_response(handoff_call("7", RoleId::Copywriter));
    model_provider.add_response(PresetResponse::tool_call(
        "8",
        "generate_copy",
        json!({ "brief": "campaign" }),
    ));
    model_provider.add_response(PresetResponse::text("Launch copy."));

    let engine = make_engine(&model_provider, 3);
    let mut run = engine.start(RoleId::UserInterface).unwrap();
    let outcome = run.submit("https://example.com").await.unwrap();
    assert_eq!(outcome, Outcome::Done("Launch copy.".to_owned()));
    assert!(error_kinds(&run).is_empty());
    assert_eq!(handoffs(&run).len(), 4);

    // The entry role's scrape lands before its hand-off.
    let turns = run.conversation().turns();
    assert_eq!(
        turns[0].content(),
        &TurnContent::Text("https://example.com".to_owned())
    );
    assert_eq!(turns[1].speaker(), &Speaker::Role(RoleId::UserInterface));
    assert!(matches!(
        turns[2].content(),
        TurnContent::ToolResult { output, .. }
            if output == "# Welcome to https://example.com"
    ));
    assert!(matches!(
        turns[4].content(),
        TurnContent::Handoff {
            from: RoleId::UserInterface,
            to: RoleId::WebsiteScraper,
            ..
        }
    ));

    // The scraper sees the entry role's result without scraping again.
    let requests = model_provider.requests();
    assert_eq!(requests[2].instructions, "Scrape.");
    assert!(requests[2].messages.iter().any(|msg| matches!(
        msg,
        ModelMessage::Tool(result)
            if result.content == "# Welcome to https://example.com"
    )));
}
