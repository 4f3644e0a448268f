use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use sable_live::config::Config;
use sable_live::server::run_server;

const LIVE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Enduro des Sables - Live</title></head>
<body>
<table class="menu"><tr><td>Accueil</td></tr></table>
<div class="panel result-table">
  <table>
    <thead>
      <tr><th>Clt</th><th>Dossard</th><th>Pilote</th><th>Temps</th><th>Ecart</th></tr>
    </thead>
    <tbody>
      <tr><td>1</td><td>12</td><td>Jean DUPONT</td><td>1:02:03</td><td>-</td></tr>
      <tr><td>2</td><td>7</td><td>Paul Martin</td><td>1:02:40</td><td>+37s</td></tr>
      <tr><td>3</td><td>71</td><td>Luc S&eacute;ne</td><td>1:03:10</td><td>+1:07</td></tr>
    </tbody>
  </table>
</div>
</body>
</html>"#;

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn test_config(root: &Path, source: &str, port: u16) -> Config {
    let mut cfg = Config::default();
    cfg.source.url = source.to_string();
    cfg.server.bind = format!("127.0.0.1:{}", port);
    cfg.data.dir = root.join("data");
    cfg
}

/// Starts a server over `source` and returns its base URL.
async fn start(root: &Path, source: &str) -> String {
    let port = find_free_port();
    let cfg = test_config(root, source, port);
    tokio::spawn(async move {
        run_server(&cfg).await.unwrap();
    });
    wait_for_server(port).await;
    format!("http://127.0.0.1:{}", port)
}

async fn start_with_page(tmp: &TempDir) -> String {
    let page = tmp.path().join("test_live.html");
    fs::write(&page, LIVE_PAGE).unwrap();
    start(tmp.path(), page.to_str().unwrap()).await
}

async fn get_json(url: &str) -> (u16, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn post_json(url: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health_reports_version_without_fetching() {
    let tmp = TempDir::new().unwrap();
    let base = start_with_page(&tmp).await;

    let (status, body) = get_json(&format!("{}/health", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["records"], 0);
    assert_eq!(body["upstream_status"], 0);
}

#[tokio::test]
async fn test_meta_and_pilots_from_local_page() {
    let tmp = TempDir::new().unwrap();
    let base = start_with_page(&tmp).await;

    let (status, meta) = get_json(&format!("{}/api/meta", base)).await;
    assert_eq!(status, 200);
    assert_eq!(meta["ok"], true);
    assert_eq!(meta["title"], "Enduro des Sables - Live");
    assert_eq!(meta["kind"], "html");
    assert_eq!(meta["status"], 200);
    assert_eq!(meta["count"], 3);
    assert_eq!(meta["live_active"], true);
    assert!(meta["error"].is_null());
    assert!(meta["fetched_at"].is_string());

    let (_, body) = get_json(&format!("{}/api/pilots", base)).await;
    let pilots = body["pilots"].as_array().unwrap();
    assert_eq!(pilots.len(), 3);
    assert_eq!(pilots[0]["Dossard"], "12");
    assert_eq!(pilots[2]["Pilote"], "Luc Séne");

    let (_, health) = get_json(&format!("{}/health", base)).await;
    assert_eq!(health["records"], 3);
    assert_eq!(health["upstream_status"], 200);
}

#[tokio::test]
async fn test_pilot_lookup() {
    let tmp = TempDir::new().unwrap();
    let base = start_with_page(&tmp).await;

    let (status, body) = get_json(&format!("{}/api/pilot/7", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["pilot"]["Pilote"], "Paul Martin");

    let (status, body) = get_json(&format!("{}/api/pilot/99", base)).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_structured_search_ranks_exact_bib_first() {
    let tmp = TempDir::new().unwrap();
    let base = start_with_page(&tmp).await;

    let (status, body) = get_json(&format!("{}/api/search?q=7", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["query"], "7");
    assert_eq!(body["live_active"], true);
    let numbers: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["number"].as_str().unwrap())
        .collect();
    assert_eq!(numbers[0], "7");
    assert!(numbers.contains(&"71"));

    let (_, body) = get_json(&format!("{}/api/search?q=dupont", base)).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], "Jean DUPONT");
    assert_eq!(results[0]["position"], "1");
    assert_eq!(results[0]["time"], "1:02:03");

    let (_, body) = get_json(&format!("{}/api/search", base)).await;
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_free_text_search() {
    let tmp = TempDir::new().unwrap();
    let base = start_with_page(&tmp).await;
    let url = format!("{}/api/search", base);

    let (status, body) = post_json(&url, json!({"q": "martin"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["results"], json!(["2 7 Paul Martin 1:02:40 +37s"]));

    let (status, body) = post_json(&url, json!({"q": "  "})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_missing_source_degrades_gracefully() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.html");
    let base = start(tmp.path(), missing.to_str().unwrap()).await;

    let (status, body) = get_json(&format!("{}/api/search?q=dupont", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["live_active"], false);
    assert!(body["error"].as_str().unwrap().contains("fetch error"));
    assert!(body["results"].as_array().unwrap().is_empty());

    let (_, pilots) = get_json(&format!("{}/api/pilots?force=true", base)).await;
    assert_eq!(pilots["status"], 0);
    assert!(pilots["pilots"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_feedback_endpoints() {
    let tmp = TempDir::new().unwrap();
    let base = start_with_page(&tmp).await;

    let (status, body) = get_json(&format!("{}/", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["visits"], 1);

    let (status, body) = post_json(&format!("{}/api/vote", base), json!({"type": "like"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["likes"], 1);
    assert_eq!(body["dislikes"], 0);

    let (status, body) = post_json(&format!("{}/api/vote", base), json!({"type": "meh"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = post_json(
        &format!("{}/api/comment", base),
        json!({"name": "Lea", "message": "Bravo\nà tous"}),
    )
    .await;
    assert_eq!(status, 200);

    let (status, _) = post_json(&format!("{}/api/comment", base), json!({"name": "Lea"})).await;
    assert_eq!(status, 400);

    let (_, stats) = get_json(&format!("{}/api/stats", base)).await;
    assert_eq!(stats["likes"], 1);
    assert_eq!(stats["visits"], 1);
    assert_eq!(stats["comments"][0]["name"], "Lea");
    assert_eq!(stats["comments"][0]["message"], "Bravo à tous");

    let votes = fs::read_to_string(tmp.path().join("data").join("votes.json")).unwrap();
    let votes: Value = serde_json::from_str(&votes).unwrap();
    assert_eq!(votes, json!({"likes": 1, "dislikes": 0}));
}

#[tokio::test]
async fn test_vote_without_json_content_type() {
    let tmp = TempDir::new().unwrap();
    let base = start_with_page(&tmp).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/vote", base))
        .body(r#"{"type":"dislike"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["dislikes"], 1);
}
