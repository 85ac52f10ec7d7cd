//! Retry, fallback, budget and concurrency behaviour against scripted providers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use strata_core::types::SourceUnit;
use strata_core::AnalysisRun;
use strata_llm::{
    CallOutcome, Completion, CompletionClient, CompletionFuture, EnrichOptions, Enricher,
    Orchestrator, ProviderError, RetryPolicy,
};

/// Replays a fixed list of results, then keeps succeeding.
struct ScriptedClient {
    script: Mutex<VecDeque<Result<Completion, ProviderError>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedClient {
    fn new(script: Vec<Result<Completion, ProviderError>>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = Self {
            script: Mutex::new(script.into()),
            calls: calls.clone(),
        };
        (client, calls)
    }
}

fn ok(text: &str) -> Result<Completion, ProviderError> {
    Ok(Completion {
        text: text.to_string(),
        input_tokens: 10,
        output_tokens: 5,
    })
}

fn transport() -> Result<Completion, ProviderError> {
    Err(ProviderError::transport("scripted", "HTTP 503: overloaded"))
}

impl CompletionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    fn complete<'a>(&'a self, _prompt: &'a str, _max_output_tokens: u32) -> CompletionFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        Box::pin(async move { next.unwrap_or_else(|| ok("default")) })
    }
}

/// Sleeps while tracking how many calls are in flight.
struct SlowClient {
    in_flight: AtomicUsize,
    peak: Arc<AtomicUsize>,
}

impl CompletionClient for SlowClient {
    fn name(&self) -> &str {
        "slow"
    }

    fn model(&self) -> &str {
        "slow-1"
    }

    fn complete<'a>(&'a self, _prompt: &'a str, _max_output_tokens: u32) -> CompletionFuture<'a> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            ok("slow")
        })
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::ZERO, Duration::ZERO)
}

fn outcomes(orchestrator: &Orchestrator) -> Vec<CallOutcome> {
    orchestrator
        .usage()
        .snapshot()
        .iter()
        .map(|r| r.outcome)
        .collect()
}

#[tokio::test]
async fn test_two_failures_then_success() {
    let (client, calls) = ScriptedClient::new(vec![transport(), transport(), ok("described")]);
    let orchestrator = Orchestrator::new(Some(Box::new(client))).with_retry_policy(fast_policy());

    let text = orchestrator.complete("Class: shop.A (Other)", 100).await;

    assert_eq!(text, "described");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        outcomes(&orchestrator),
        vec![CallOutcome::Retried, CallOutcome::Retried, CallOutcome::Success]
    );
    let records = orchestrator.usage().snapshot();
    assert_eq!(records.iter().map(|r| r.attempt).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(records[2].input_tokens, 10);
}

#[tokio::test]
async fn test_exhausted_retries_fall_back() {
    let (client, calls) = ScriptedClient::new(vec![transport(), transport(), transport()]);
    let orchestrator = Orchestrator::new(Some(Box::new(client))).with_retry_policy(fast_policy());

    let text = orchestrator.complete("Class: shop.A (Other)\nmore", 100).await;

    assert_eq!(text, "[offline summary] Class: shop.A (Other)");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        outcomes(&orchestrator),
        vec![
            CallOutcome::Retried,
            CallOutcome::Retried,
            CallOutcome::Failure,
            CallOutcome::Fallback
        ]
    );
    let records = orchestrator.usage().snapshot();
    assert_eq!(
        records.iter().map(|r| r.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    let fallback = orchestrator.usage().snapshot().pop().unwrap();
    assert_eq!(fallback.provider, "local");
    assert!(fallback.error.unwrap().contains("overloaded"));
}

#[tokio::test]
async fn test_fatal_error_is_not_retried() {
    let (client, calls) = ScriptedClient::new(vec![Err(ProviderError::fatal(
        "scripted",
        "HTTP 401: invalid x-api-key",
    ))]);
    let orchestrator = Orchestrator::new(Some(Box::new(client))).with_retry_policy(fast_policy());

    let text = orchestrator.complete("Class: shop.A (Other)", 100).await;

    assert!(text.starts_with("[offline summary]"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcomes(&orchestrator),
        vec![CallOutcome::Failure, CallOutcome::Fallback]
    );
}

#[tokio::test(start_paused = true)]
async fn test_backoff_between_attempts() {
    let (client, _) = ScriptedClient::new(vec![transport(), transport(), ok("late")]);
    let policy = RetryPolicy::new(3, Duration::from_millis(500), Duration::from_millis(8000));
    let orchestrator = Orchestrator::new(Some(Box::new(client))).with_retry_policy(policy);

    let started = tokio::time::Instant::now();
    let text = orchestrator.complete("prompt", 100).await;

    assert_eq!(text, "late");
    assert!(started.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test]
async fn test_budget_exhaustion_skips_provider() {
    let (client, calls) = ScriptedClient::new(vec![ok("first")]);
    let orchestrator = Orchestrator::new(Some(Box::new(client)))
        .with_retry_policy(fast_policy())
        .with_token_budget(Some(15));

    assert_eq!(orchestrator.complete("Class: shop.A (Other)", 100).await, "first");
    let second = orchestrator.complete("Class: shop.B (Other)", 100).await;

    assert_eq!(second, "[offline summary] Class: shop.B (Other)");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcomes(&orchestrator),
        vec![CallOutcome::Success, CallOutcome::Fallback]
    );
    assert_eq!(orchestrator.usage().billable_tokens(), 15);
}

#[tokio::test]
async fn test_budget_applies_to_calls_waiting_for_a_permit() {
    let peak = Arc::new(AtomicUsize::new(0));
    let client = SlowClient {
        in_flight: AtomicUsize::new(0),
        peak: peak.clone(),
    };
    let orchestrator = Orchestrator::new(Some(Box::new(client)))
        .with_max_concurrency(1)
        .with_token_budget(Some(15));

    let calls = (0..5).map(|_| orchestrator.complete("prompt", 10));
    let results = futures::future::join_all(calls).await;

    assert_eq!(results.iter().filter(|r| r.as_str() == "slow").count(), 1);
    assert_eq!(orchestrator.usage().count(CallOutcome::Success), 1);
    assert_eq!(orchestrator.usage().count(CallOutcome::Fallback), 4);
    assert_eq!(orchestrator.usage().billable_tokens(), 15);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let peak = Arc::new(AtomicUsize::new(0));
    let client = SlowClient {
        in_flight: AtomicUsize::new(0),
        peak: peak.clone(),
    };
    let orchestrator = Orchestrator::new(Some(Box::new(client))).with_max_concurrency(2);

    let calls = (0..6).map(|_| orchestrator.complete("prompt", 10));
    let results = futures::future::join_all(calls).await;

    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| r == "slow"));
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(peak.load(Ordering::SeqCst) >= 1);
    assert_eq!(orchestrator.usage().count(CallOutcome::Success), 6);
}

#[tokio::test]
async fn test_enrichment_over_a_finalized_graph() {
    let units = vec![
        SourceUnit::new(
            "shop/OrderService.java",
            "package shop;\npublic class OrderService { private OrderDao dao; public Order find(Long id) { return null; } }\n",
        ),
        SourceUnit::new(
            "shop/OrderDao.java",
            "package shop;\npublic interface OrderDao { Order load(Long id); }\n",
        ),
    ];
    let mut run = AnalysisRun::new();
    run.offer_all(&units).unwrap();
    let graph = run.finalize().unwrap();

    let orchestrator = Orchestrator::new(None);
    let enrichment = Enricher::new(&orchestrator, EnrichOptions::default())
        .enrich(graph)
        .await;

    assert_eq!(enrichment.descriptions.len(), 2);
    assert_eq!(
        enrichment.description("shop.OrderService"),
        "[offline summary] Class: shop.OrderService (Service)"
    );
    assert_eq!(
        enrichment.overview.as_deref(),
        Some("[offline summary] Project with 2 classes: OrderDao, OrderService")
    );
    // Two classes plus the overview, all answered offline.
    assert_eq!(orchestrator.usage().count(CallOutcome::Fallback), 3);
}

#[tokio::test]
async fn test_long_prompts_are_chunked() {
    let methods: String = (0..20)
        .map(|i| format!("public void handle{i}(String payload) {{ }}\n"))
        .collect();
    let source = format!("package big;\npublic class BigService {{\n{methods}}}\n");
    let units = vec![SourceUnit::new("big/BigService.java", source)];
    let mut run = AnalysisRun::new();
    run.offer_all(&units).unwrap();
    let graph = run.finalize().unwrap();

    let orchestrator = Orchestrator::new(None);
    let options = EnrichOptions {
        max_input_tokens: 50,
        max_output_tokens: 400,
        chunk_target_tokens: 60,
        chunk_overlap_tokens: 10,
    };
    let enrichment = Enricher::new(&orchestrator, options).enrich(graph).await;

    let description = enrichment.description("big.BigService");
    assert!(description.starts_with("[offline summary] Class: big.BigService (Service)"));
    assert!(description.chars().count() <= 500);
    // More than one call for the class prompt, one for the overview.
    assert!(orchestrator.usage().len() > 2);
}
