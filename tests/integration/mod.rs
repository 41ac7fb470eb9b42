// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraprs::config::settings::{
    BrowserSettings, RetrySettings, ScraperSettings, Settings, WebDriverSettings,
};
use scraprs::domain::models::task::{EngineKind, Scenario, ScrapingTask};
use scraprs::engines::reqwest_engine::ReqwestEngine;
use scraprs::engines::router::EngineRouter;
use scraprs::engines::traits::FetchEngine;
use scraprs::workers::ScraperCoordinator;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_settings(max_instances: usize) -> Settings {
    Settings {
        scraper: ScraperSettings {
            max_instances,
            fetch_timeout: 5,
        },
        retry: RetrySettings {
            initial_backoff_secs: 0,
            max_backoff_secs: 0,
            backoff_multiplier: 2.0,
        },
        browser: BrowserSettings {
            remote_debugging_url: None,
        },
        webdriver: WebDriverSettings {
            endpoint: "http://localhost:9515".to_string(),
        },
    }
}

fn http_only_coordinator(max_instances: usize) -> ScraperCoordinator {
    let engines: Vec<Arc<dyn FetchEngine>> = vec![Arc::new(ReqwestEngine::new())];
    ScraperCoordinator::new(
        &test_settings(max_instances),
        Arc::new(EngineRouter::new(engines)),
    )
    .unwrap()
}

const EXAMPLE_PAGE: &str = r#"
    <html>
        <head>
            <title>Example Domain</title>
            <meta name="description" content="Illustrative example domain">
        </head>
        <body><p>This domain is for use in illustrative examples in documents.</p></body>
    </html>
"#;

const NEWS_PAGE: &str = r#"
    <html><body>
        <article><h2>Rust 2.0 announced</h2><span class="score">120 points</span></article>
        <article><h2>New browser engine ships</h2><span class="score">85 points</span></article>
    </body></html>
"#;

#[tokio::test]
async fn test_mixed_scenario_batch_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(EXAMPLE_PAGE)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(NEWS_PAGE)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let coordinator = http_only_coordinator(3);

    let custom = ScrapingTask::new(server.uri(), Scenario::Custom);
    let news = ScrapingTask::new(format!("{}/news", server.uri()), Scenario::News);
    let custom_id = custom.id;
    let news_id = news.id;

    let results = coordinator
        .execute_multi_instance(vec![custom, news])
        .await;
    assert_eq!(results.len(), 2);

    let custom_result = results.iter().find(|r| r.task_id == custom_id).unwrap();
    assert!(custom_result.is_success());
    assert_eq!(custom_result.data["title"], "Example Domain");
    assert_eq!(
        custom_result.data["meta_description"],
        "Illustrative example domain"
    );

    let news_result = results.iter().find(|r| r.task_id == news_id).unwrap();
    assert!(news_result.is_success());
    let headlines = news_result.data["headline"].as_array().unwrap();
    assert_eq!(headlines.len(), 2);
    assert_eq!(headlines[0], "Rust 2.0 announced");
}

#[tokio::test]
async fn test_invalid_task_makes_no_network_call() {
    let server = MockServer::start().await;
    // Nothing may reach the server for a task that fails validation
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("unexpected"))
        .expect(0)
        .mount(&server)
        .await;

    let coordinator = http_only_coordinator(2);
    let invalid = ScrapingTask::new("definitely not a url", Scenario::Custom);
    let invalid_id = invalid.id;

    let results = coordinator.execute_multi_instance(vec![invalid]).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].task_id, invalid_id);
    assert!(!results[0].is_success());
    assert!(results[0].error.is_some());
}

#[tokio::test]
async fn test_retry_exhaustion_and_permanent_failure_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = http_only_coordinator(2);

    let flaky = ScrapingTask::new(format!("{}/flaky", server.uri()), Scenario::Custom)
        .with_max_retries(2);
    let gone = ScrapingTask::new(format!("{}/gone", server.uri()), Scenario::Custom)
        .with_max_retries(3);
    let flaky_id = flaky.id;
    let gone_id = gone.id;

    let results = coordinator.execute_multi_instance(vec![flaky, gone]).await;

    let flaky_result = results.iter().find(|r| r.task_id == flaky_id).unwrap();
    assert!(!flaky_result.is_success());
    assert_eq!(flaky_result.attempts, 2);
    assert!(flaky_result.error.as_deref().unwrap().contains("503"));

    // 404 is permanent: one attempt despite max_retries = 3
    let gone_result = results.iter().find(|r| r.task_id == gone_id).unwrap();
    assert!(!gone_result.is_success());
    assert_eq!(gone_result.attempts, 1);
}

#[tokio::test]
async fn test_task_count_preserved_with_explicit_engine_tags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(EXAMPLE_PAGE)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let coordinator = http_only_coordinator(3);

    let input: Vec<ScrapingTask> = (0..6)
        .map(|i| {
            ScrapingTask::new(format!("{}/{i}", server.uri()), Scenario::Custom)
                .with_engine(EngineKind::Http)
        })
        .collect();
    let expected: HashSet<Uuid> = input.iter().map(|t| t.id).collect();

    let results = coordinator.execute_multi_instance(input).await;

    assert_eq!(results.len(), 6);
    let produced: HashSet<Uuid> = results.iter().map(|r| r.task_id).collect();
    assert_eq!(produced, expected);

    let health = coordinator.health_check();
    assert_eq!(health.completed_tasks, 6);
    assert_eq!(health.failed_tasks, 0);
    assert_eq!(health.active_instances, 0);
}

#[tokio::test]
async fn test_export_is_idempotent_after_real_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(EXAMPLE_PAGE)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let coordinator = http_only_coordinator(2);
    let input = vec![
        ScrapingTask::new(server.uri(), Scenario::Custom),
        ScrapingTask::new(format!("{}/other", server.uri()), Scenario::Custom),
    ];
    coordinator.execute_multi_instance(input).await;

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("results.json");
    let csv_path = dir.path().join("results.csv");

    coordinator.export_results_to_json(&json_path).unwrap();
    let first = std::fs::read(&json_path).unwrap();
    coordinator.export_results_to_json(&json_path).unwrap();
    let second = std::fs::read(&json_path).unwrap();
    assert_eq!(first, second);

    coordinator.export_results_to_csv(&csv_path).unwrap();
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert!(csv.starts_with("task_id,url,scenario,status,execution_time"));
    assert_eq!(csv.lines().count(), 3);
}
