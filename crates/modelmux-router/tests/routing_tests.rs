// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end routing behavior against scripted backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use modelmux_config::ClassifierConfig;
use modelmux_core::{
    ChatCompletionRequest, ChatMessage, ClassificationResult, ClassificationSource,
    CompletionBackend, ErrorClass, FailureKind, ModelCapabilities, ModelProfile, MuxError,
    TaskType,
};
use modelmux_metrics::MetricsCollector;
use modelmux_router::{
    Dispatcher, ModelRegistry, ModelRouter, RelayEvent, RelaySettings, RoutingService,
    TaskClassifier,
};
use modelmux_test_utils::{MockBackend, MockReply, MockStream};
use proptest::prelude::*;
use serde_json::json;

fn profile(id: &str, name: &str, priority: u32, affinities: &[TaskType], vision: bool) -> ModelProfile {
    ModelProfile {
        id: id.to_string(),
        name: name.to_string(),
        affinities: affinities.to_vec(),
        priority,
        max_output_tokens: 2048,
        timeout: Duration::from_secs(2),
        capabilities: ModelCapabilities {
            streaming: true,
            tool_calls: true,
            image_input: vision,
        },
    }
}

fn profiles() -> Vec<ModelProfile> {
    vec![
        profile("llama-8b-internal", "Fast", 1, &[TaskType::SimpleText, TaskType::GeneralText], false),
        profile("qwen-coder-internal", "Coder", 2, &[TaskType::Programming, TaskType::MathReasoning], false),
        profile("mistral-internal", "Writer", 3, &[TaskType::Creative], false),
        profile("llama-70b-internal", "Big", 4, &[TaskType::GeneralText], false),
        profile("llava-internal", "Eyes", 1, &[TaskType::Vision], true),
        profile("pixtral-internal", "Eyes Backup", 2, &[], true),
    ]
}

struct Harness {
    service: RoutingService,
    backends: HashMap<String, Arc<MockBackend>>,
    classifier: Arc<MockBackend>,
    metrics: Arc<MetricsCollector>,
}

impl Harness {
    fn new() -> Self {
        let registry = Arc::new(ModelRegistry::new(profiles(), 3).unwrap());
        let backends: HashMap<String, Arc<MockBackend>> = registry
            .profiles()
            .iter()
            .map(|p| (p.id.clone(), Arc::new(MockBackend::new(p.id.clone()))))
            .collect();
        let clients: HashMap<String, Arc<dyn CompletionBackend>> = backends
            .iter()
            .map(|(id, mock)| {
                let client: Arc<dyn CompletionBackend> = mock.clone();
                (id.clone(), client)
            })
            .collect();

        let classifier = Arc::new(MockBackend::new("classifier-internal"));
        let aux: Arc<dyn CompletionBackend> = classifier.clone();
        let metrics = Arc::new(MetricsCollector::new());
        let relay = RelaySettings {
            buffer_size: 4,
            cancel_grace: Duration::from_millis(100),
        };

        let service = RoutingService::new(
            TaskClassifier::new(&ClassifierConfig::default(), Some(aux)),
            ModelRouter::new(registry),
            Dispatcher::new(clients, Arc::clone(&metrics), "modelmux", relay),
            Arc::clone(&metrics),
        );
        Self {
            service,
            backends,
            classifier,
            metrics,
        }
    }

    fn backend(&self, id: &str) -> &Arc<MockBackend> {
        &self.backends[id]
    }
}

fn ask(text: &str) -> ChatCompletionRequest {
    ChatCompletionRequest::new(vec![ChatMessage::user(text)])
}

fn ask_stream(text: &str) -> ChatCompletionRequest {
    let mut request = ask(text);
    request.stream = true;
    request
}

fn image_request(text: &str) -> ChatCompletionRequest {
    serde_json::from_value(json!({
        "messages": [{"role": "user", "content": [
            {"type": "text", "text": text},
            {"type": "image_url", "image_url": {"url": "https://example.com/chart.png"}}
        ]}]
    }))
    .unwrap()
}

fn long_general_question() -> String {
    "I am planning a two week trip across northern Italy in the autumn and would like an overview \
     of which regions to visit, how to move between them by train, and what local dishes to try."
        .repeat(2)
}

#[tokio::test]
async fn simple_question_is_served_by_simple_tier_under_public_name() {
    let h = Harness::new();
    h.backend("llama-8b-internal").push(MockReply::text("4")).await;

    let body = h.service.complete(ask("What is 2+2?")).await.unwrap();

    assert_eq!(body["model"], "modelmux");
    assert_eq!(body["choices"][0]["message"]["content"], "4");
    assert_eq!(h.classifier.calls(), 0);
    assert_eq!(h.backend("llama-8b-internal").calls(), 1);

    let sent = h.backend("llama-8b-internal").requests().await;
    assert_eq!(sent[0].model.as_deref(), Some("llama-8b-internal"));

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.requests_by_task_type["simple_text"], 1);
    assert_eq!(snapshot.requests_by_model["Fast"], 1);
}

#[tokio::test]
async fn image_request_never_calls_the_classifier() {
    let h = Harness::new();
    let text = "Explain every line of this chart and write Python code that reproduces it. ".repeat(5);

    let decision = h.service.plan(&image_request(&text)).await;

    assert_eq!(decision.task_type(), TaskType::Vision);
    assert_eq!(decision.classification.confidence, 1.0);
    assert_eq!(decision.names(), vec!["Eyes", "Eyes Backup"]);
    assert_eq!(h.classifier.calls(), 0);
}

#[tokio::test]
async fn streaming_rate_limit_falls_back_to_first_fallback() {
    let h = Harness::new();
    h.backend("llama-8b-internal").push(MockReply::status(429)).await;
    h.backend("qwen-coder-internal")
        .push(MockReply::Stream(MockStream::text(["from ", "coder"])))
        .await;

    let relay = h.service.stream(ask_stream("What is 2+2?")).await.unwrap();
    let events: Vec<RelayEvent> = relay.collect().await;

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            RelayEvent::Chunk(chunk) => {
                assert_eq!(chunk["model"], "modelmux");
                chunk["choices"][0]["delta"]["content"].as_str().map(str::to_string)
            }
            _ => None,
        })
        .collect();
    assert_eq!(text, "from coder");
    assert!(matches!(events.last(), Some(RelayEvent::Done)));

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.fallback_count, 1);
    assert_eq!(snapshot.errors_by_model["Fast"], 1);
    assert_eq!(h.backend("mistral-internal").calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn classifier_timeout_degrades_to_general_text() {
    let h = Harness::new();
    h.classifier
        .push(MockReply::label("programming", 0.9).delayed(Duration::from_secs(30)))
        .await;
    h.backend("llama-8b-internal").push(MockReply::text("Start in Milan.")).await;

    let body = h.service.complete(ask(&long_general_question())).await.unwrap();

    assert_eq!(body["choices"][0]["message"]["content"], "Start in Milan.");
    assert_eq!(h.classifier.calls(), 1);
    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.requests_by_task_type["general_text"], 1);
    assert!(snapshot.failed_requests.is_empty());
}

#[tokio::test]
async fn malformed_label_degrades_to_general_text() {
    let h = Harness::new();
    h.classifier
        .push(MockReply::text("I think this is about travel."))
        .await;

    let decision = h.service.plan(&ask(&long_general_question())).await;
    assert_eq!(decision.task_type(), TaskType::GeneralText);
    assert_eq!(decision.classification.source, ClassificationSource::Fallback);
    assert_eq!(decision.names()[0], "Fast");
}

#[tokio::test]
async fn low_confidence_label_still_routes() {
    let h = Harness::new();
    h.classifier.push(MockReply::label("creative", 0.1)).await;

    let decision = h.service.plan(&ask(&long_general_question())).await;
    assert_eq!(decision.task_type(), TaskType::Creative);
    assert_eq!(decision.names()[0], "Writer");
}

#[tokio::test]
async fn repeated_503_is_counted_per_request_and_absorbed() {
    let h = Harness::new();
    let fast = h.backend("llama-8b-internal");
    fast.push(MockReply::status(503)).await;
    fast.push(MockReply::status(503)).await;

    for _ in 0..2 {
        let body = h.service.complete(ask("hello there")).await.unwrap();
        assert_eq!(body["model"], "modelmux");
    }

    assert_eq!(h.metrics.errors_for("Fast"), 2);
    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.errors_by_class["retryable_backend_error"], 2);
    assert_eq!(snapshot.fallback_count, 2);
    assert_eq!(snapshot.total_requests, 2);
}

#[tokio::test]
async fn non_retryable_error_is_surfaced_without_fallback() {
    let h = Harness::new();
    h.backend("llama-8b-internal")
        .push(MockReply::Fail(modelmux_core::BackendFailure::from_status(
            400,
            "max_tokens is too large",
        )))
        .await;

    let err = h.service.complete(ask("hi")).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::NonRetryableBackendError);
    assert!(err.to_string().contains("max_tokens is too large"));
    assert_eq!(h.backend("qwen-coder-internal").calls(), 0);
}

#[tokio::test]
async fn exhausting_all_candidates_names_the_last_one() {
    let h = Harness::new();
    for id in ["llama-8b-internal", "qwen-coder-internal", "mistral-internal"] {
        h.backend(id).push(MockReply::status(500)).await;
    }

    let err = h.service.complete(ask("hi")).await.unwrap_err();
    match err {
        MuxError::AllCandidatesExhausted {
            attempted,
            last_model,
            failure,
        } => {
            assert_eq!(attempted, vec!["Fast", "Coder", "Writer"]);
            assert_eq!(last_model, "Writer");
            assert_eq!(failure.kind, FailureKind::ServerError(500));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.backend("llama-70b-internal").calls(), 0);
}

#[tokio::test]
async fn mid_stream_failure_ends_the_stream_without_retry() {
    let h = Harness::new();
    h.backend("llama-8b-internal")
        .push(MockReply::Stream(MockStream::truncated(["partial ", "answer"])))
        .await;

    let relay = h.service.stream(ask_stream("hi")).await.unwrap();
    let events: Vec<RelayEvent> = relay.collect().await;

    assert_eq!(events.len(), 3);
    match &events[2] {
        RelayEvent::Failed(err) => assert_eq!(err.class(), ErrorClass::MidStreamFailure),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(h.backend("qwen-coder-internal").calls(), 0);
    assert_eq!(h.metrics.snapshot().failed_requests["mid_stream_failure"], 1);
}

#[tokio::test]
async fn caller_disconnect_cancels_backend_within_grace() {
    let h = Harness::new();
    let fast = Arc::clone(h.backend("llama-8b-internal"));
    fast.push(MockReply::Stream(
        MockStream::endless().every(Duration::from_millis(5)),
    ))
    .await;

    let mut relay = h.service.stream(ask_stream("count forever")).await.unwrap();
    for _ in 0..5 {
        assert!(matches!(relay.next().await, Some(RelayEvent::Chunk(_))));
    }
    drop(relay);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(fast.streams_dropped(), 1);
    let read = fast.chunks_read();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fast.chunks_read(), read);
    assert_eq!(h.metrics.snapshot().cancelled_streams, 1);
}

#[tokio::test]
async fn slow_caller_bounds_backend_reads() {
    let h = Harness::new();
    let fast = Arc::clone(h.backend("llama-8b-internal"));
    fast.push(MockReply::Stream(MockStream::endless())).await;

    let mut relay = h.service.stream(ask_stream("count forever")).await.unwrap();
    assert!(matches!(relay.next().await, Some(RelayEvent::Chunk(_))));

    tokio::time::sleep(Duration::from_millis(100)).await;
    // Buffer of 4, one parked send, one handed out, one peeked before commit.
    assert!(fast.chunks_read() <= 4 + 3, "read {}", fast.chunks_read());
}

#[tokio::test]
async fn concurrent_requests_do_not_wait_on_each_other() {
    let h = Arc::new(Harness::new());
    h.backend("llama-8b-internal")
        .push(MockReply::text("slow").delayed(Duration::from_millis(500)))
        .await;
    h.backend("llama-8b-internal").push(MockReply::text("quick")).await;

    let slow = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.service.complete(ask("first")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = tokio::time::Instant::now();
    let quick = h.service.complete(ask("second")).await.unwrap();
    assert_eq!(quick["choices"][0]["message"]["content"], "quick");
    assert!(started.elapsed() < Duration::from_millis(400));

    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow["choices"][0]["message"]["content"], "slow");
}

proptest! {
    #[test]
    fn image_requests_route_only_to_vision_models(text in ".{0,400}") {
        let registry = Arc::new(ModelRegistry::new(profiles(), 3).unwrap());
        let classifier = TaskClassifier::new(&ClassifierConfig::default(), None);
        let request = image_request(&text);

        let (task_type, confidence) = classifier.heuristic(&request).unwrap();
        prop_assert_eq!(task_type, TaskType::Vision);
        prop_assert_eq!(confidence, 1.0);

        let classification = ClassificationResult::heuristic(task_type, confidence, Duration::ZERO);
        let decision = ModelRouter::new(Arc::clone(&registry)).route(&request, &classification);
        prop_assert!(!decision.candidates.is_empty());
        prop_assert!(decision.candidates.iter().all(|p| p.capabilities.image_input));
    }
}
