use std::io::{self, BufRead, Write};
use std::sync::Arc;

use cartline_agent::{
    AgentRuntime, BoundedPlanner, Capabilities, CapabilitySelector, HttpLlmClient,
    KeywordSelector, LlmCapabilitySelector, LlmClient, LlmError, RuntimeSettings,
};
use cartline_core::config::{AppConfig, LoadOptions};
use cartline_core::domain::session::SessionId;
use cartline_core::errors::ApplicationError;
use cartline_core::ports::SessionStore;
use cartline_core::{InMemoryCatalog, InMemoryOrderGateway};
use cartline_db::InMemorySessionStore;
use uuid::Uuid;

use crate::commands::CommandResult;

const EXIT_WORDS: [&str; 3] = ["exit", "quit", ":q"];

pub fn run(session: Option<String>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let agent = match build_agent(&config, Arc::new(InMemorySessionStore::default())) {
        Ok(agent) => agent,
        Err(error) => return CommandResult::failure("chat", "llm_setup", error.to_string(), 4),
    };

    let session_id = session.as_deref().map(SessionId::from).unwrap_or_else(SessionId::generate);
    let stdin = io::stdin();
    let stdout = io::stdout();
    match runtime.block_on(converse(&agent, &session_id, stdin.lock(), stdout.lock())) {
        Ok(turns) => CommandResult::success("chat", format!("{turns} turn(s) in {session_id}")),
        Err(error) => CommandResult::failure("chat", "terminal_io", error.to_string(), 5),
    }
}

/// Wires the conversation engine against the demo catalog and an in-memory
/// order gateway. The configured LLM is used only when `llm.enabled` is set.
pub fn build_agent(
    config: &AppConfig,
    store: Arc<dyn SessionStore>,
) -> Result<AgentRuntime, LlmError> {
    let mut capabilities = Capabilities::new(
        Arc::new(InMemoryCatalog::demo()),
        Arc::new(InMemoryOrderGateway::default()),
    )
    .with_checkout_source(config.crm.checkout_source.clone());

    let selector: Arc<dyn CapabilitySelector> = if config.llm.enabled {
        let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::from_config(&config.llm)?);
        capabilities = capabilities.with_listing_writer(llm.clone());
        Arc::new(LlmCapabilitySelector::new(llm))
    } else {
        Arc::new(KeywordSelector)
    };

    Ok(AgentRuntime::new(
        store,
        capabilities,
        BoundedPlanner::new(selector, config.agent.planner_max_iterations),
        RuntimeSettings::from(&config.agent),
    ))
}

/// Reads utterances line by line until EOF or an exit word. Returns the
/// number of turns handled.
pub async fn converse<R: BufRead, W: Write>(
    agent: &AgentRuntime,
    session_id: &SessionId,
    mut input: R,
    mut output: W,
) -> io::Result<usize> {
    writeln!(output, "cartline chat ({session_id}); type `exit` to leave")?;
    let mut turns = 0;
    let mut line = String::new();

    loop {
        write!(output, "you> ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }
        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }
        if EXIT_WORDS.iter().any(|word| utterance.eq_ignore_ascii_case(word)) {
            break;
        }

        turns += 1;
        let correlation_id = format!("cli-{}", Uuid::new_v4());
        let text = match agent.handle_turn(session_id, utterance, &correlation_id).await {
            Ok(reply) => reply.text,
            Err(error) => ApplicationError::from(error)
                .into_interface(correlation_id)
                .user_message()
                .to_string(),
        };
        writeln!(output, "cartline> {text}")?;
    }

    Ok(turns)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use cartline_core::config::AppConfig;
    use cartline_core::domain::session::SessionId;
    use cartline_core::ports::SessionStore;
    use cartline_db::InMemorySessionStore;

    use super::{build_agent, converse};

    #[tokio::test]
    async fn transcript_of_a_short_session_updates_the_cart() {
        let store = Arc::new(InMemorySessionStore::default());
        let agent = build_agent(&AppConfig::default(), store.clone()).expect("offline agent");
        let session = SessionId::from("cli-test");
        let input = Cursor::new("black belts\n\n   \nadd 1\nexit\nadd 1\n");
        let mut output = Vec::new();

        let turns = converse(&agent, &session, input, &mut output).await.expect("converse");

        assert_eq!(turns, 2);
        let printed = String::from_utf8(output).expect("utf8");
        assert!(printed.starts_with("cartline chat (cli-test)"));
        assert_eq!(printed.matches("cartline> ").count(), 2);

        let stored = store.load(&session).await.expect("load");
        assert_eq!(stored.cart.len(), 1);
        assert_eq!(stored.cart.lines()[0].quantity, 1);
    }

    #[tokio::test]
    async fn end_of_input_ends_the_session_without_turns() {
        let agent = build_agent(&AppConfig::default(), Arc::new(InMemorySessionStore::default()))
            .expect("offline agent");
        let mut output = Vec::new();

        let turns = converse(&agent, &SessionId::from("quiet"), Cursor::new(""), &mut output)
            .await
            .expect("converse");

        assert_eq!(turns, 0);
        assert!(String::from_utf8(output).expect("utf8").ends_with("you> \n"));
    }
}
