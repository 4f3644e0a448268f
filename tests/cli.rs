use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn sable_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("sable");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let mut rows = String::new();
    let pilots = [
        ("1", "12", "Jean Dupont", "1:02:03", "-"),
        ("2", "7", "Paul Martin", "1:02:40", "+37s"),
        ("3", "71", "Luc Dupont", "1:03:10", "+1:07"),
    ];
    for (pos, num, name, time, gap) in pilots {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            pos, num, name, time, gap
        ));
    }
    let page = format!(
        "<html><head><title>Live</title></head><body>\
         <div class=\"result-table\"><table>\
         <tr><td>Pos</td><td>No</td><td>Pilot</td><td>Time</td><td>Gap</td></tr>\n{}\
         </table></div></body></html>",
        rows
    );
    let page_path = root.join("test_live.html");
    fs::write(&page_path, page).unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("sable.toml");
    fs::write(
        &config_path,
        format!(
            "[source]\nurl = \"{}\"\n\n[data]\ndir = \"{}/data\"\n",
            page_path.display(),
            root.display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn run_sable(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = sable_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RESULTS_URL")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run sable binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_meta() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_sable(&config, &["meta"]);
    assert!(success, "meta failed: {}", stderr);
    assert!(stdout.contains("title:      Live"));
    assert!(stdout.contains("kind:       html"));
    assert!(stdout.contains("records:    3"));
    assert!(stdout.contains("live:       yes"));
}

#[test]
fn test_pilots_lists_positional_columns() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_sable(&config, &["pilots"]);
    assert!(success);
    assert!(stdout.contains("POS"));
    assert!(stdout.contains("Paul Martin"));
    assert!(stdout.contains("3 pilots"));
}

#[test]
fn test_pilot_by_number() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_sable(&config, &["pilot", "7"]);
    assert!(success);
    assert!(stdout.contains("name"));
    assert!(stdout.contains("Paul Martin"));

    let (_, stderr, success) = run_sable(&config, &["pilot", "99"]);
    assert!(!success);
    assert!(stderr.contains("no pilot with number '99'"));
}

#[test]
fn test_search_prints_exact_bib_first() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_sable(&config, &["search", "7"]);
    assert!(success);
    let lines: Vec<&str> = stdout.lines().skip(1).collect();
    assert!(lines[0].contains("Paul Martin"));
    assert!(stdout.contains("Luc Dupont"));
}

#[test]
fn test_search_text_mode() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_sable(&config, &["search", "dupont", "--text"]);
    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec!["1 12 Jean Dupont 1:02:03 -", "3 71 Luc Dupont 1:03:10 +1:07"]
    );
}

#[test]
fn test_search_no_results() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_sable(&config, &["search", "zzz"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_source_flag_overrides_config() {
    let (tmp, config) = setup_test_env();
    let missing = tmp.path().join("missing.html");
    let (_, stderr, success) = run_sable(
        &config,
        &["--source", missing.to_str().unwrap(), "pilots"],
    );
    assert!(!success);
    assert!(stderr.contains("fetch error"));
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config) = setup_test_env();
    fs::write(&config, "[source]\nformat = \"xml\"\n").unwrap();
    let (_, stderr, success) = run_sable(&config, &["meta"]);
    assert!(!success);
    assert!(stderr.contains("Unknown source format"));
}
