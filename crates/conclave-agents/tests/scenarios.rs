use std::sync::Arc;
use std::time::Duration;

use conclave_agents::test_support::{
    BrokenKnowledge, FailingGenerator, ScriptedGenerator, ScriptedKnowledge,
};
use conclave_agents::{AgentDirectory, Arbiter, DoubtInjector, KnowledgeSource, RuleBasedGenerator};
use conclave_memory::DecisionMemory;
use conclave_models::{
    config::default_roster, Agent, DecisionType, DoubtConfig, DoubtLevel, EngineConfig,
    MarketContext, MemoryConfig, Role, Signal, SignalRule, TieBreak,
};
use rust_decimal_macros::dec;

fn quiet_doubt() -> DoubtInjector {
    DoubtInjector::with_seed(
        DoubtConfig {
            wisdom_drop_probability: 0.0,
            ..Default::default()
        },
        11,
    )
}

fn analysts(names: &[&str]) -> Arc<AgentDirectory> {
    let directory = AgentDirectory::new(50);
    for name in names {
        directory
            .register(Agent::new(name, "research", Role::Analyst, SignalRule::Balanced))
            .unwrap();
    }
    Arc::new(directory)
}

fn arbiter_with(
    directory: Arc<AgentDirectory>,
    engine: EngineConfig,
    generator: Arc<dyn conclave_agents::SignalGenerator>,
) -> Arbiter {
    Arbiter::new(
        engine,
        directory,
        quiet_doubt(),
        Arc::new(DecisionMemory::in_memory(MemoryConfig::default())),
    )
    .with_generator(generator)
}

fn aapl_bullish() -> MarketContext {
    MarketContext::new("AAPL")
        .with_trend("bullish")
        .with_volatility(0.1)
}

#[tokio::test]
async fn unanimous_consensus_triggers_divine_doubt() {
    let generator = ScriptedGenerator::new()
        .with("a", Signal::Buy, 0.9)
        .with("b", Signal::Buy, 0.9)
        .with("c", Signal::Buy, 0.9);
    let arbiter = arbiter_with(
        analysts(&["a", "b", "c"]),
        EngineConfig::default(),
        Arc::new(generator),
    );

    let debate = arbiter.debate(&aapl_bullish()).await.unwrap();
    assert_eq!(debate.tallied_signal, Signal::Buy);
    assert_eq!(debate.doubt_level(), Some(DoubtLevel::DivineDoubt));
    assert_eq!(debate.consensus.winning_signal, Signal::Defer);
    assert!((debate.consensus.consensus_strength - 0.7).abs() < 1e-9);
    assert!(debate.consensus.doubt_applied);

    let decision = arbiter.decide(&aapl_bullish()).await.unwrap();
    assert_eq!(decision.signal, Signal::Defer);
    assert_eq!(decision.decision_type, DecisionType::Defer);
    // base 0.48 (balanced, 0.1 volatility), blended 0.7 x 0.48 + 0.3 x 0.7
    assert_eq!(decision.confidence, dec!(0.546));
    assert!(!decision.breakdown.veto_penalty_applied);
    assert!(decision.reasoning.contains("overridden to DEFER"));
    assert!(decision.reasoning.ends_with("deferring"));
    assert_eq!(decision.overrides, vec!["doubt:divine_doubt".to_string()]);
}

#[tokio::test]
async fn divided_vote_is_vetoed_and_marked() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with("a", Signal::Buy, 0.3)
            .with("b", Signal::Sell, 0.3)
            .with("c", Signal::Hold, 0.3)
            .with("d", Signal::Reject, 0.3),
    );
    let arbiter = arbiter_with(analysts(&["a", "b", "c", "d"]), EngineConfig::default(), generator);

    let decision = arbiter.decide(&aapl_bullish()).await.unwrap();
    assert_eq!(decision.signal, Signal::Reject);
    assert!(decision.breakdown.veto_penalty_applied);
    assert!((decision.breakdown.consensus - 0.25).abs() < 1e-12);
    assert!(
        (decision.breakdown.final_confidence - decision.breakdown.blended / 2.0).abs() < 1e-12
    );
    assert_eq!(decision.overrides, vec!["doubt:veto".to_string()]);
    assert_eq!(arbiter.vetoes().len(), 1);
}

#[tokio::test]
async fn split_vote_has_no_doubt_and_explicit_tie_break() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with("s1", Signal::Sell, 0.6)
            .with("s2", Signal::Sell, 0.6)
            .with("b1", Signal::Buy, 0.6)
            .with("b2", Signal::Buy, 0.6),
    );
    let names = ["s1", "b1", "s2", "b2"];

    let redesigned = arbiter_with(analysts(&names), EngineConfig::default(), generator.clone());
    let debate = redesigned.debate(&aapl_bullish()).await.unwrap();
    assert!((debate.consensus.consensus_strength - 0.5).abs() < 1e-12);
    assert!(debate.doubt.is_none());
    assert!(!debate.consensus.doubt_applied);
    // Equal weight and confidence: lexical order decides.
    assert_eq!(debate.consensus.winning_signal, Signal::Buy);

    let legacy = arbiter_with(
        analysts(&names),
        EngineConfig {
            tie_break: TieBreak::InsertionOrder,
            ..Default::default()
        },
        generator,
    );
    let debate = legacy.debate(&aapl_bullish()).await.unwrap();
    assert_eq!(debate.consensus.winning_signal, Signal::Sell);
}

#[tokio::test]
async fn debates_are_reused_within_ttl() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with("a", Signal::Buy, 0.9)
            .with("b", Signal::Buy, 0.9)
            .with("c", Signal::Buy, 0.9),
    );
    let arbiter = arbiter_with(
        analysts(&["a", "b", "c"]),
        EngineConfig::default(),
        generator.clone(),
    );

    let first = arbiter.decide(&aapl_bullish()).await.unwrap();
    let second = arbiter.decide(&aapl_bullish()).await.unwrap();

    assert_eq!(generator.calls(), 3);
    assert_eq!(first.session_id, second.session_id);
    assert_ne!(first.id, second.id);
    // A cache hit injects no new doubt.
    assert_eq!(arbiter.doubt_history().len(), 1);
    assert_eq!(arbiter.recent_consensus().len(), 1);
    assert_eq!(arbiter.memory().len(), 2);
}

#[tokio::test]
async fn expired_debate_is_rerun() {
    let generator = Arc::new(ScriptedGenerator::new().with("a", Signal::Buy, 0.7));
    let arbiter = arbiter_with(
        analysts(&["a"]),
        EngineConfig {
            debate_ttl_seconds: 0,
            ..Default::default()
        },
        generator.clone(),
    );

    let first = arbiter.debate(&aapl_bullish()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = arbiter.debate(&aapl_bullish()).await.unwrap();

    assert_ne!(first.consensus.session_id, second.consensus.session_id);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn concurrent_decisions_share_one_debate() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with("a", Signal::Buy, 0.8)
            .with("b", Signal::Sell, 0.3),
    );
    let arbiter = Arc::new(arbiter_with(
        analysts(&["a", "b"]),
        EngineConfig::default(),
        generator.clone(),
    ));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let arbiter = Arc::clone(&arbiter);
        handles.push(tokio::spawn(async move {
            arbiter.decide(&aapl_bullish()).await.unwrap()
        }));
    }
    let mut sessions = Vec::new();
    for handle in handles {
        sessions.push(handle.await.unwrap().session_id);
    }

    assert_eq!(generator.calls(), 2);
    assert!(sessions.iter().all(|s| *s == sessions[0]));
    assert_eq!(arbiter.memory().len(), 6);
}

#[tokio::test]
async fn failing_agent_abstains_without_aborting() {
    let scripted = Arc::new(
        ScriptedGenerator::new()
            .with("a", Signal::Buy, 0.8)
            .with("b", Signal::Buy, 0.9)
            .with("c", Signal::Sell, 0.6),
    );
    let generator = Arc::new(FailingGenerator::new(scripted, &["b"]));
    let arbiter = arbiter_with(analysts(&["a", "b", "c"]), EngineConfig::default(), generator);

    let debate = arbiter.debate(&aapl_bullish()).await.unwrap();
    assert_eq!(debate.votes.len(), 3);
    assert_eq!(debate.consensus.participant_count, 2);

    let abstention = debate.votes.iter().find(|v| v.agent == "b").unwrap();
    assert_eq!(abstention.signal, Signal::Hold);
    assert_eq!(abstention.weight, 0.0);
    assert!(abstention.reasoning.contains("scripted failure"));

    let history = arbiter.directory().vote_history("b").unwrap();
    assert!(history[0].is_abstention());
}

#[tokio::test]
async fn unrecognized_trend_abstains_every_rule_agent() {
    let directory = AgentDirectory::from_config(&default_roster(), 10).unwrap();
    let arbiter = arbiter_with(
        Arc::new(directory),
        EngineConfig::default(),
        Arc::new(RuleBasedGenerator::default()),
    );

    let context = MarketContext::new("AAPL").with_trend("moonshot");
    let decision = arbiter.decide(&context).await.unwrap();

    assert_eq!(decision.signal, Signal::Hold);
    assert_eq!(decision.breakdown.consensus, 0.0);
    assert!(decision.reasoning.contains("Market trend 'moonshot' not recognized"));
}

#[tokio::test]
async fn overrides_are_reported() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with("a", Signal::Buy, 0.8)
            .with("b", Signal::Buy, 0.7),
    );
    let arbiter = arbiter_with(analysts(&["a", "b"]), EngineConfig::default(), generator);

    let context = aapl_bullish()
        .with_override("a", Signal::Buy)
        .with_override("b", Signal::Sell)
        .with_override("nobody", Signal::Buy);
    let debate = arbiter.debate(&context).await.unwrap();

    // Forcing an agent onto the signal it already holds is not an override.
    assert_eq!(debate.votes[0].overridden_from, None);
    assert_eq!(debate.votes[1].overridden_from, Some(Signal::Buy));
    assert_eq!(debate.overrides, vec!["override:b=SELL".to_string()]);
}

#[tokio::test]
async fn knowledge_enriches_votes() {
    let generator = Arc::new(ScriptedGenerator::new().with("a", Signal::Buy, 0.7));
    let knowledge: Arc<dyn KnowledgeSource> =
        Arc::new(ScriptedKnowledge::new("Trends persist", 0.5));
    let arbiter = arbiter_with(analysts(&["a"]), EngineConfig::default(), generator)
        .with_knowledge(knowledge, Duration::from_secs(1));

    let debate = arbiter.debate(&aapl_bullish()).await.unwrap();
    assert!(debate.votes[0].reasoning.contains("[Trends persist]"));
}

#[tokio::test]
async fn slow_or_broken_knowledge_means_no_enrichment() {
    let sources: Vec<Arc<dyn KnowledgeSource>> = vec![
        Arc::new(ScriptedKnowledge::slow("Too late", 1.0, Duration::from_millis(500))),
        Arc::new(BrokenKnowledge),
    ];

    for source in sources {
        let generator = Arc::new(ScriptedGenerator::new().with("a", Signal::Buy, 0.7));
        let arbiter = arbiter_with(analysts(&["a"]), EngineConfig::default(), generator)
            .with_knowledge(source, Duration::from_millis(50));

        arbiter.decide(&aapl_bullish()).await.unwrap();
        let debate = arbiter.debate(&aapl_bullish()).await.unwrap();
        assert_eq!(debate.votes[0].reasoning, "scripted BUY");
        assert_eq!(debate.votes[0].confidence, 0.7);
    }
}

#[tokio::test]
async fn default_roster_produces_a_bounded_decision() {
    let directory = AgentDirectory::from_config(&default_roster(), 10).unwrap();
    let arbiter = arbiter_with(
        Arc::new(directory),
        EngineConfig::default(),
        Arc::new(RuleBasedGenerator::default()),
    );

    let context = MarketContext::new("NVDA")
        .with_trend("bearish")
        .with_volatility(0.7);
    let decision = arbiter.decide(&context).await.unwrap();

    let confidence = decision.breakdown.final_confidence;
    assert!((0.0..=1.0).contains(&confidence));
    assert!(decision.reasoning.contains("Market trend is bearish"));
    assert_eq!(arbiter.directory().len(), 11);
    let debate = arbiter.debate(&context).await.unwrap();
    assert_eq!(debate.consensus.participant_count, 11);
}
