//! Agent turn tests
//!
//! Drive whole turns against a scripted provider and an in-memory fact store:
//! - Tool loop order and what the provider sees
//! - Streamed fragments add up to the committed answer
//! - Failed or dropped turns leave the session untouched

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use wattwise_common::agent::{Agent, AgentDeps, TurnError};
use wattwise_common::fact::RawFact;
use wattwise_common::llm::{ChatRole, ProviderError, ScriptedProvider, ScriptedReply};
use wattwise_common::session::{ConversationSession, Message, Role, ToolOutcome};
use wattwise_common::store::{FactStore, StoreError};

const SEARCH: &str = "search_knowledge_graph";

#[derive(Default)]
struct MemoryStore {
    facts: HashMap<String, Vec<RawFact>>,
    failing: HashMap<String, StoreError>,
    queries: Mutex<Vec<String>>,
    closes: Mutex<usize>,
}

impl MemoryStore {
    fn with(mut self, query: &str, facts: Vec<RawFact>) -> Self {
        self.facts.insert(query.to_string(), facts);
        self
    }

    fn failing(mut self, query: &str, error: StoreError) -> Self {
        self.failing.insert(query.to_string(), error);
        self
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl FactStore for MemoryStore {
    async fn search(&self, query: &str) -> Result<Vec<RawFact>, StoreError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(error) = self.failing.get(query) {
            return Err(error.clone());
        }
        Ok(self.facts.get(query).cloned().unwrap_or_default())
    }

    async fn healthcheck(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        *self.closes.lock().unwrap() += 1;
        Ok(())
    }
}

fn raw(id: &str, statement: &str) -> RawFact {
    RawFact {
        uuid: Some(id.to_string()),
        fact: Some(statement.to_string()),
        ..Default::default()
    }
}

fn search_call(id: &str, query: &str) -> ScriptedReply {
    ScriptedReply::tool(id, SEARCH, &serde_json::json!({ "query": query }).to_string())
}

fn fridge_store() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::default()
            .with("fridge power usage", vec![raw("u1", "Fridge: 150W")])
            .with("1kWh analogies", vec![raw("u2", "1kWh = Running 10km")]),
    )
}

#[tokio::test]
async fn test_fridge_question_runs_search_then_answers() {
    let store = fridge_store();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(search_call("call_1", "fridge power usage")),
        Ok(ScriptedReply::text(&["A 150W fridge uses 0.45 kWh in 3 hours."])),
    ]));
    let agent = Agent::new(provider.clone(), "instructions");
    let deps = AgentDeps::new(store.clone());
    let mut session = ConversationSession::new();

    let reply = agent
        .run(&mut session, "How much energy does a fridge use in 3 hours?", &deps)
        .await
        .unwrap();

    assert_eq!(reply.role, Role::Agent);
    assert!(reply.content.contains("0.45 kWh"));
    assert_eq!(reply.tool_invocations.len(), 1);
    assert_eq!(reply.tool_invocations[0].query_text, "fridge power usage");
    assert_eq!(reply.tool_invocations[0].facts()[0].statement, "Fridge: 150W");
    assert_eq!(store.queries(), vec!["fridge power usage".to_string()]);

    // User and agent appended together
    assert_eq!(session.len(), 2);
    assert_eq!(session.history()[0], Message::user("How much energy does a fridge use in 3 hours?"));
    assert_eq!(session.history()[1], reply);

    // Second round carries the tool exchange
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1].messages;
    assert_eq!(second.len(), 3);
    assert_eq!(second[1].role, ChatRole::Assistant);
    assert_eq!(second[1].tool_calls[0].id, "call_1");
    assert_eq!(second[2].role, ChatRole::Tool);
    assert_eq!(second[2].tool_call_id.as_deref(), Some("call_1"));
    assert!(second[2].content.as_deref().unwrap().contains("Fridge: 150W"));
}

#[tokio::test]
async fn test_sub_queries_run_in_requested_order() {
    let store = fridge_store();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(search_call("a", "fridge power usage").with_tool_call(
            "b",
            SEARCH,
            r#"{"query": "1kWh analogies"}"#,
        )),
        Ok(search_call("c", "New York City electricity rate")),
        Ok(ScriptedReply::text(&["done"])),
    ]));
    let agent = Agent::new(provider, "instructions");
    let deps = AgentDeps::new(store.clone());
    let mut session = ConversationSession::new();

    let reply = agent.run(&mut session, "fridge 3h", &deps).await.unwrap();

    assert_eq!(
        store.queries(),
        vec![
            "fridge power usage".to_string(),
            "1kWh analogies".to_string(),
            "New York City electricity rate".to_string(),
        ]
    );
    let ids: Vec<_> = reply.tool_invocations.iter().map(|i| i.call_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    // Analogy statements arrive normalized
    assert_eq!(
        reply.tool_invocations[1].facts()[0].statement,
        "1 kWh is equivalent to 1kWh = Running 10km"
    );
    // No matches is an empty result, not an error
    assert_eq!(reply.tool_invocations[2].outcome, ToolOutcome::Facts(vec![]));
}

#[tokio::test]
async fn test_store_failure_aborts_turn_and_keeps_history() {
    let store = Arc::new(
        MemoryStore::default()
            .failing("fridge", StoreError::Unreachable("connection refused".to_string())),
    );
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(search_call("c1", "fridge")),
        Ok(ScriptedReply::text(&["recovered"])),
    ]));
    let agent = Agent::new(provider, "instructions");
    let deps = AgentDeps::new(store.clone());
    let mut session = ConversationSession::new();

    let err = agent.run(&mut session, "fridge?", &deps).await.unwrap_err();
    match err {
        TurnError::Store { query, source } => {
            assert_eq!(query, "fridge");
            assert!(matches!(source, StoreError::Unreachable(_)));
        }
        other => panic!("expected store error, got {other:?}"),
    }
    assert!(session.is_empty());
    assert!(!session.turn_in_progress());
    assert_eq!(*store.closes.lock().unwrap(), 0);

    // Session stays usable
    let reply = agent.run(&mut session, "hello", &deps).await.unwrap();
    assert_eq!(reply.content, "recovered");
    assert_eq!(session.len(), 2);
}

#[tokio::test]
async fn test_provider_failure_keeps_history() {
    let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Status {
        status: 429,
        body: "rate limited".to_string(),
    })]));
    let agent = Agent::new(provider, "instructions");
    let deps = AgentDeps::new(fridge_store());
    let mut session = ConversationSession::new();
    session.append(Message::user("earlier")).unwrap();
    session.append(Message::agent("reply", vec![])).unwrap();
    let before = session.history().to_vec();

    let err = agent.run(&mut session, "now", &deps).await.unwrap_err();
    assert!(matches!(err, TurnError::Provider(ProviderError::Status { status: 429, .. })));
    assert_eq!(session.history(), before.as_slice());
}

#[tokio::test]
async fn test_stream_fragments_concatenate_to_committed_answer() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(ScriptedReply::text(&["Let me check. "]).with_tool_call(
            "c1",
            SEARCH,
            r#"{"query": "fridge power usage"}"#,
        )),
        Ok(ScriptedReply::text(&["Your fridge ", "uses ", "0.45 kWh."])),
    ]));
    let agent = Agent::new(provider, "instructions");
    let deps = AgentDeps::new(fridge_store());
    let mut session = ConversationSession::new();

    let mut fragments = Vec::new();
    {
        let mut stream = agent.run_stream(&mut session, "fridge 3h", &deps).unwrap();
        while let Some(fragment) = stream.next().await {
            fragments.push(fragment.unwrap());
        }
        assert_eq!(stream.tool_invocations().len(), 1);
    }

    assert_eq!(
        fragments,
        vec!["Let me check. ", "Your fridge ", "uses ", "0.45 kWh."]
    );
    assert_eq!(session.len(), 2);
    assert_eq!(session.history()[1].content, fragments.concat());
    assert_eq!(session.history()[1].tool_invocations.len(), 1);
}

#[tokio::test]
async fn test_stream_error_after_partial_output_keeps_history() {
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(ScriptedReply::text(&["par"])
        .failing_with(ProviderError::Http("connection reset".to_string())))]));
    let agent = Agent::new(provider, "instructions");
    let deps = AgentDeps::new(fridge_store());
    let mut session = ConversationSession::new();

    {
        let mut stream = agent.run_stream(&mut session, "q", &deps).unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "par");
        assert!(matches!(
            stream.next().await,
            Some(Err(TurnError::Provider(ProviderError::Http(_))))
        ));
        assert!(stream.next().await.is_none());
        assert_eq!(stream.partial(), "par");
    }

    assert!(session.is_empty());
    assert!(!session.turn_in_progress());
}

#[tokio::test]
async fn test_dropping_stream_abandons_turn() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(ScriptedReply::text(&["one ", "two ", "three"])),
        Ok(ScriptedReply::text(&["fresh"])),
    ]));
    let agent = Agent::new(provider, "instructions");
    let deps = AgentDeps::new(fridge_store());
    let mut session = ConversationSession::new();

    let mut stream = agent.run_stream(&mut session, "count", &deps).unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), "one ");
    drop(stream);

    assert!(session.is_empty());
    assert!(!session.turn_in_progress());

    let reply = agent.run(&mut session, "again", &deps).await.unwrap();
    assert_eq!(reply.content, "fresh");
}

#[tokio::test]
async fn test_prior_turns_are_sent_to_provider() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(ScriptedReply::text(&["It uses 150W."])),
        Ok(ScriptedReply::text(&["That costs $0.10."])),
    ]));
    let agent = Agent::new(provider.clone(), "instructions");
    let deps = AgentDeps::new(fridge_store());
    let mut session = ConversationSession::new();

    agent.run(&mut session, "fridge power?", &deps).await.unwrap();
    agent.run(&mut session, "and the cost?", &deps).await.unwrap();

    let second = &provider.requests()[1].messages;
    let texts: Vec<_> = second.iter().map(|m| (m.role, m.content.clone().unwrap())).collect();
    assert_eq!(
        texts,
        vec![
            (ChatRole::User, "fridge power?".to_string()),
            (ChatRole::Assistant, "It uses 150W.".to_string()),
            (ChatRole::User, "and the cost?".to_string()),
        ]
    );
    assert_eq!(session.len(), 4);
}

#[tokio::test]
async fn test_turn_order_matters() {
    async fn history_after(first: &str, second: &str) -> Vec<String> {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ScriptedReply::text(&["r1"])),
            Ok(ScriptedReply::text(&["r2"])),
        ]));
        let agent = Agent::new(provider, "instructions");
        let deps = AgentDeps::new(fridge_store());
        let mut session = ConversationSession::new();
        agent.run(&mut session, first, &deps).await.unwrap();
        agent.run(&mut session, second, &deps).await.unwrap();
        session.history().iter().map(|m| m.content.clone()).collect()
    }

    let ab = history_after("A", "B").await;
    let ba = history_after("B", "A").await;
    assert_eq!(ab, vec!["A", "r1", "B", "r2"]);
    assert_ne!(ab, ba);
}

#[tokio::test]
async fn test_fragment_order_is_preserved() {
    async fn committed(fragments: &[&str]) -> String {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ScriptedReply::text(fragments))]));
        let agent = Agent::new(provider, "instructions");
        let deps = AgentDeps::new(fridge_store());
        let mut session = ConversationSession::new();
        {
            let mut stream = agent.run_stream(&mut session, "q", &deps).unwrap();
            while let Some(fragment) = stream.next().await {
                fragment.unwrap();
            }
        }
        session.history()[1].content.clone()
    }

    assert_eq!(committed(&["0.45 ", "kWh"]).await, "0.45 kWh");
    assert_ne!(committed(&["kWh", "0.45 "]).await, "0.45 kWh");
}

#[tokio::test]
async fn test_analogy_without_suffix_is_rewritten() {
    let store = Arc::new(MemoryStore::default().with("analogies", vec![raw("a1", "1kWh")]));
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(search_call("c1", "analogies")),
        Ok(ScriptedReply::text(&["ok"])),
    ]));
    let agent = Agent::new(provider, "instructions");
    let deps = AgentDeps::new(store);
    let mut session = ConversationSession::new();

    let reply = agent.run(&mut session, "analogies?", &deps).await.unwrap();
    assert_eq!(
        reply.tool_invocations[0].facts()[0].statement,
        "1 kWh is equivalent to 1kWh"
    );
}
