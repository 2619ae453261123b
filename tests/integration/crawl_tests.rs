//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run whole jobs
//! end-to-end, collecting records through a shared MemorySink.

use serde_json::{json, Value};
use trawl::config::{
    Config, CrawlerConfig, Destination, IncompletePolicy, JobConfig, LogConfig, OutputConfig,
};
use trawl::crawler::{run_job, Coordinator};
use trawl::output::{build_sink, MemorySink};
use trawl::schema::JobDefinition;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration that writes nowhere and never retries
fn create_test_config(on_incomplete: IncompletePolicy) -> Config {
    Config {
        crawler: CrawlerConfig {
            concurrency: 4,
            request_timeout: 5,
            max_retries: 0,
            retry_delay: 1,
            stats_interval: 60,
            on_incomplete,
            ..CrawlerConfig::default()
        },
        job: JobConfig::default(),
        output: OutputConfig {
            destination: Destination::None,
            file: None,
        },
        log: LogConfig {
            enabled: false,
            ..LogConfig::default()
        },
    }
}

fn create_job(base_url: &str, structure: Value) -> JobDefinition {
    let text = json!({"base_url": base_url, "structure": structure}).to_string();
    JobDefinition::parse("test", &text).expect("Failed to parse job")
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Runs a job into a memory sink and returns its records sorted by url
async fn run_collecting(config: Config, job: JobDefinition) -> (Vec<Value>, trawl::output::StatsSnapshot) {
    let sink = MemorySink::new();
    let snapshot = run_job(config, job, Box::new(sink.clone()))
        .await
        .expect("Run failed");

    let mut records: Vec<Value> = sink.records().into_iter().map(Value::Object).collect();
    records.sort_by(|a, b| a["url"].as_str().cmp(&b["url"].as_str()));
    (records, snapshot)
}

#[tokio::test]
async fn test_list_follow_emits_one_record_per_item() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<html><body>
            <a class="item" href="/item/1">One</a>
            <a class="item" href="/item/2">Two</a>
            <a class="item" href="/item/1#reviews">One again</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        &mock_server,
        "/item/1",
        r#"<h1>First</h1><span class="price"> 10 </span>"#,
    )
    .await;
    mount_page(
        &mock_server,
        "/item/2",
        r#"<h1>Second</h1><span class="price">20</span>"#,
    )
    .await;

    let job = create_job(
        &format!("{}/", base_url),
        json!({
            "_list": {
                "_element": "a.item::attr(href)",
                "title": "h1::text",
                "price": "span.price::text"
            }
        }),
    );

    let (records, snapshot) = run_collecting(create_test_config(IncompletePolicy::Discard), job).await;

    assert_eq!(
        records,
        vec![
            json!({"url": format!("{}/item/1", base_url), "title": "First", "price": "10"}),
            json!({"url": format!("{}/item/2", base_url), "title": "Second", "price": "20"}),
        ]
    );
    assert_eq!(snapshot.pages_fetched, 3);
    assert_eq!(snapshot.records_emitted, 2);
    // the listing page itself holds only its identity
    assert_eq!(snapshot.records_discarded, 1);
}

#[tokio::test]
async fn test_loop_collects_items_on_one_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<html><body>
            <h1>Catalog</h1>
            <div class="product"><span class="name">A</span><b>1</b><i>x</i><i>y</i></div>
            <div class="product"><span class="name">B</span><b>2</b></div>
            <div class="product"></div>
        </body></html>"#,
    )
    .await;

    let job = create_job(
        &format!("{}/", base_url),
        json!({
            "heading": "h1::text",
            "_loop": {
                "_element": "div.product",
                "_key": "products",
                "name": "span.name::text",
                "price": "b::text",
                "tags": {"_element": "i", "tag": "::text"}
            }
        }),
    );

    let (records, _) = run_collecting(create_test_config(IncompletePolicy::Discard), job).await;

    assert_eq!(
        records,
        vec![json!({
            "url": format!("{}/", base_url),
            "heading": "Catalog",
            "products": [
                {"name": "A", "price": "1", "nested_loop": [{"tag": "x"}, {"tag": "y"}]},
                {"name": "B", "price": "2", "nested_loop": []}
            ]
        })]
    );
}

#[tokio::test]
async fn test_pagination_reapplies_group_to_next_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<ul><li>one</li><li>two</li></ul><a class="next" href="/page/2">Next</a>"#,
    )
    .await;
    mount_page(
        &mock_server,
        "/page/2",
        r#"<ul><li>three</li></ul><a class="prev" href="/">Back</a>"#,
    )
    .await;

    let job = create_job(
        &format!("{}/", base_url),
        json!({
            "_loop": {
                "_element": "li",
                "name": "::text",
                "_pagination": "a.next::attr(href)"
            }
        }),
    );

    let (records, snapshot) = run_collecting(create_test_config(IncompletePolicy::Discard), job).await;

    assert_eq!(
        records,
        vec![
            json!({
                "url": format!("{}/", base_url),
                "loop_data": [{"name": "one"}, {"name": "two"}]
            }),
            json!({
                "url": format!("{}/page/2", base_url),
                "loop_data": [{"name": "three"}]
            }),
        ]
    );
    assert_eq!(snapshot.pages_fetched, 2);
}

#[tokio::test]
async fn test_optional_field_may_be_absent() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", "<h1>Only a title</h1>").await;

    let job = create_job(
        &format!("{}/", base_url),
        json!({"title": "h1::text", "subtitle*": "h2::text"}),
    );

    let (records, _) = run_collecting(create_test_config(IncompletePolicy::Discard), job).await;

    assert_eq!(
        records,
        vec![json!({"url": format!("{}/", base_url), "title": "Only a title"})]
    );
}

#[tokio::test]
async fn test_nested_group_writes_sub_record() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<h1>Widget</h1><div id="seller"><a href="/s/9">Acme</a></div>"#,
    )
    .await;

    let job = create_job(
        &format!("{}/", base_url),
        json!({
            "title": "h1::text",
            "seller": {
                "name": "#seller a::text",
                "link": "#seller a::attr(href)"
            }
        }),
    );

    let (records, _) = run_collecting(create_test_config(IncompletePolicy::Discard), job).await;

    assert_eq!(
        records,
        vec![json!({
            "url": format!("{}/", base_url),
            "title": "Widget",
            "seller": {"name": "Acme", "link": "/s/9"}
        })]
    );
}

#[tokio::test]
async fn test_incomplete_record_discarded_at_end_of_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", "<h1>No price here</h1>").await;

    let job = create_job(
        &format!("{}/", base_url),
        json!({"title": "h1::text", "price": "span.price::text"}),
    );

    let (records, snapshot) = run_collecting(create_test_config(IncompletePolicy::Discard), job).await;

    assert!(records.is_empty());
    assert_eq!(snapshot.records_incomplete, 1);
    assert_eq!(snapshot.records_emitted, 0);
}

#[tokio::test]
async fn test_incomplete_record_emitted_when_configured() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", "<h1>No price here</h1>").await;

    let job = create_job(
        &format!("{}/", base_url),
        json!({"title": "h1::text", "price": "span.price::text"}),
    );

    let (records, snapshot) = run_collecting(create_test_config(IncompletePolicy::Emit), job).await;

    assert_eq!(
        records,
        vec![json!({"url": format!("{}/", base_url), "title": "No price here"})]
    );
    assert_eq!(snapshot.records_incomplete, 1);
    assert_eq!(snapshot.records_emitted, 1);
}

#[tokio::test]
async fn test_failed_item_does_not_stop_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<a href="/item/1">ok</a><a href="/item/missing">gone</a>"#,
    )
    .await;
    mount_page(&mock_server, "/item/1", "<h1>Found</h1>").await;
    Mock::given(method("GET"))
        .and(path("/item/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let job = create_job(
        &format!("{}/", base_url),
        json!({"_list": {"_element": "a::attr(href)", "title": "h1::text"}}),
    );

    let (records, snapshot) = run_collecting(create_test_config(IncompletePolicy::Discard), job).await;

    assert_eq!(
        records,
        vec![json!({"url": format!("{}/item/1", base_url), "title": "Found"})]
    );
    assert_eq!(snapshot.status_codes.get(&404), Some(&1));
}

#[tokio::test]
async fn test_job_cookies_sent_with_requests() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Welcome back</h1>"))
        .mount(&mock_server)
        .await;

    let text = json!({
        "base_url": format!("{}/", base_url),
        "structure": {"title": "h1::text"},
        "cookies": {"session": "abc"}
    })
    .to_string();
    let job = JobDefinition::parse("test", &text).unwrap();

    let (records, _) = run_collecting(create_test_config(IncompletePolicy::Discard), job).await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["title"], "Welcome back");
}

#[tokio::test]
async fn test_record_limit_stops_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<a href="/item/1">1</a><a href="/item/2">2</a><a href="/item/3">3</a>"#,
    )
    .await;
    for n in 1..=3 {
        mount_page(&mock_server, &format!("/item/{}", n), "<h1>Item</h1>").await;
    }

    let job = create_job(
        &format!("{}/", base_url),
        json!({"_list": {"_element": "a::attr(href)", "title": "h1::text"}}),
    );

    let sink = MemorySink::new();
    let mut coordinator = Coordinator::new(
        create_test_config(IncompletePolicy::Discard),
        job,
        Box::new(sink.clone()),
    )
    .unwrap()
    .with_max_records(1);

    let snapshot = coordinator.run().await.unwrap();

    assert_eq!(sink.records().len(), 1);
    assert_eq!(snapshot.records_emitted, 1);
}

#[tokio::test]
async fn test_records_appended_to_json_file() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", "<h1>Stored</h1>").await;

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file = temp_dir.path().join("records.json");

    let mut config = create_test_config(IncompletePolicy::Discard);
    config.output = OutputConfig {
        destination: Destination::Local,
        file: Some(file.to_string_lossy().into_owned()),
    };

    // two runs of the same job extend one array
    for _ in 0..2 {
        let job = create_job(&format!("{}/", base_url), json!({"title": "h1::text"}));
        let sink = build_sink(&config.output).expect("Failed to open sink");
        run_job(config.clone(), job, sink).await.expect("Run failed");
    }

    let content = std::fs::read_to_string(&file).unwrap();
    let stored: Value = serde_json::from_str(&content).unwrap();
    let record = json!({"url": format!("{}/", base_url), "title": "Stored"});
    assert_eq!(stored, json!([record.clone(), record]));
}
