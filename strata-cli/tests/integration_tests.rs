//! Integration tests for the strata CLI
//!
//! Tests end-to-end command behavior using the CLI binary.
//! Uses tempfile for isolated test directories.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// The strata binary with provider-related environment cleared, so runs
/// stay offline and deterministic.
fn strata_binary() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_strata"));
    for var in [
        "STRATA_LLM_MODEL",
        "STRATA_LLM_MAX_OUTPUT_TOKENS",
        "STRATA_LLM_TOKEN_BUDGET",
        "STRATA_LOG_LEVEL",
        "ANTHROPIC_API_KEY",
        "OPENAI_API_KEY",
        "GEMINI_API_KEY",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("STRATA_LLM_PROVIDER", "local");
    cmd
}

fn run_strata(dir: &Path, args: &[&str]) -> Output {
    strata_binary()
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to execute strata command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn write_file(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create directory");
    }
    fs::write(&path, content).expect("Failed to write sample file");
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    serde_json::from_str(&text).expect("Output should be valid JSON")
}

/// A small controller/service/DAO project under `app/`.
fn setup_layered_project(dir: &Path) {
    write_file(
        dir,
        "app/src/main/java/shop/OrderController.java",
        r#"package shop;

@RestController
@RequestMapping("/orders")
public class OrderController {
    private OrderService orderService;

    @GetMapping("/{id}")
    public Order get(@PathVariable Long id) {
        return orderService.find(id);
    }

    @PostMapping
    public Order create(@RequestBody Order order) {
        if (order == null) {
            return null;
        }
        return orderService.save(order);
    }
}
"#,
    );
    write_file(
        dir,
        "app/src/main/java/shop/OrderService.java",
        r#"package shop;

@Service
public class OrderService {
    private OrderDao orderDao;

    public Order find(Long id) {
        return orderDao.findById(id);
    }

    public Order save(Order order) {
        return orderDao.save(order);
    }
}
"#,
    );
    write_file(
        dir,
        "app/src/main/java/shop/OrderDao.java",
        r#"package shop;

@Repository
public interface OrderDao {
    Order findById(Long id);
    Order save(Order order);
}
"#,
    );
    write_file(
        dir,
        "app/src/main/java/shop/Order.java",
        r#"package shop;

@Entity
public class Order {
    private Long id;
    private String status;
}
"#,
    );
}

// ============================================================================
// Run Command Tests
// ============================================================================

#[test]
fn test_run_writes_knowledge_and_converted_code() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_layered_project(temp_dir.path());

    let output = run_strata(temp_dir.path(), &["run", "app", "--out", "out"]);
    assert!(
        output.status.success(),
        "run should succeed: {}",
        stderr(&output)
    );

    let out = temp_dir.path().join("out");
    for file in [
        "knowledge/knowledge.json",
        "knowledge/files.json",
        "knowledge/usage.json",
        "converted/app.js",
        "converted/controllers/OrderController.js",
        "converted/services/OrderService.js",
        "converted/daos/OrderDao.js",
    ] {
        assert!(out.join(file).exists(), "{} should exist", file);
    }

    let knowledge = read_json(&out.join("knowledge/knowledge.json"));
    let modules = knowledge["modules"].as_array().expect("modules array");
    assert_eq!(modules.len(), 4);
    assert!(knowledge["edges"]
        .as_array()
        .expect("edges array")
        .iter()
        .any(|e| e["from"] == "shop.OrderController" && e["to"] == "shop.OrderService"));

    let router = fs::read_to_string(out.join("converted/controllers/OrderController.js")).unwrap();
    assert!(router.contains("/:id"), "route placeholder rewritten: {}", router);

    let app = fs::read_to_string(out.join("converted/app.js")).unwrap();
    assert!(app.contains("/health"));
}

#[test]
fn test_run_local_provider_records_usage() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_layered_project(temp_dir.path());

    let output = run_strata(temp_dir.path(), &["run", "app", "--out", "out"]);
    assert!(output.status.success(), "run failed: {}", stderr(&output));

    let usage = read_json(&temp_dir.path().join("out/knowledge/usage.json"));
    assert_eq!(usage["provider"], "local");
    let records = usage["records"].as_array().expect("records array");
    // One description per class plus the overview.
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r["outcome"] == "success"));

    let knowledge = read_json(&temp_dir.path().join("out/knowledge/knowledge.json"));
    let overview = knowledge["projectOverview"].as_str().unwrap();
    assert!(overview.starts_with("[offline summary]"), "{}", overview);
}

#[test]
fn test_run_no_enrich() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_layered_project(temp_dir.path());

    let output = run_strata(
        temp_dir.path(),
        &["run", "app", "--out", "out", "--no-enrich", "--json"],
    );
    assert!(output.status.success(), "run failed: {}", stderr(&output));

    let summary: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("summary should be JSON");
    assert_eq!(summary["enriched"], false);
    assert_eq!(summary["providerCalls"], 0);
    assert_eq!(summary["classes"], 4);
    assert_eq!(summary["routers"], 1);

    let usage = read_json(&temp_dir.path().join("out/knowledge/usage.json"));
    assert_eq!(usage["provider"], "none");
    assert!(usage["records"].as_array().unwrap().is_empty());
}

#[test]
fn test_run_reports_parse_failures_without_aborting() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_layered_project(temp_dir.path());
    write_file(
        temp_dir.path(),
        "app/src/main/java/shop/Broken.java",
        "package shop;\npublic class Broken {\n    public void oops( {\n}\n",
    );

    let output = run_strata(
        temp_dir.path(),
        &["run", "app", "--out", "out", "--no-enrich", "--json"],
    );
    assert!(output.status.success(), "run failed: {}", stderr(&output));

    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(summary["classes"], 4);
    assert_eq!(summary["skipReasons"]["parse error"], 1);

    let files = read_json(&temp_dir.path().join("out/knowledge/files.json"));
    let broken = files["files"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["path"].as_str().unwrap_or("").ends_with("Broken.java"))
        .expect("Broken.java listed");
    assert_eq!(broken["status"], "failed");
}

#[test]
fn test_run_missing_codebase_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_strata(temp_dir.path(), &["run", "does-not-exist"]);
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("does not exist"),
        "unexpected error: {}",
        stderr(&output)
    );
}

#[test]
fn test_run_empty_codebase_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::create_dir_all(temp_dir.path().join("empty")).unwrap();
    let output = run_strata(temp_dir.path(), &["run", "empty", "--no-enrich"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No source files"));
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_malformed_config_is_a_warning() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_layered_project(temp_dir.path());
    write_file(temp_dir.path(), "strata.toml", "[llm\nprovider = ");

    let output = run_strata(temp_dir.path(), &["run", "app", "--out", "out", "--no-enrich"]);
    assert!(
        output.status.success(),
        "malformed config should not abort: {}",
        stderr(&output)
    );
    assert!(stderr(&output).contains("strata.toml"));
}

#[test]
fn test_malformed_config_is_fatal_when_strict() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_layered_project(temp_dir.path());
    write_file(temp_dir.path(), "strata.toml", "[llm\nprovider = ");

    let output = run_strata(
        temp_dir.path(),
        &["--strict", "run", "app", "--out", "out", "--no-enrich"],
    );
    assert!(!output.status.success());
    assert!(!temp_dir.path().join("out").exists());
}

#[test]
fn test_config_exclude_applies() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_layered_project(temp_dir.path());
    write_file(
        temp_dir.path(),
        "custom.toml",
        "[scanner]\nexclude = [\"**/Order.java\"]\n",
    );

    let output = run_strata(
        temp_dir.path(),
        &["--config", "custom.toml", "scan", "app", "--json"],
    );
    assert!(output.status.success(), "scan failed: {}", stderr(&output));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let paths: Vec<&str> = report["files"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["path"].as_str())
        .collect();
    assert_eq!(paths.len(), 3);
    assert!(!paths.iter().any(|p| p.ends_with("/Order.java")));
}

// ============================================================================
// Scan Command Tests
// ============================================================================

#[test]
fn test_scan_json() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_layered_project(temp_dir.path());
    write_file(temp_dir.path(), "app/README.md", "# shop\n");

    let output = run_strata(temp_dir.path(), &["scan", "app", "--json"]);
    assert!(output.status.success(), "scan failed: {}", stderr(&output));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["files"].as_array().unwrap().len(), 4);
    assert_eq!(report["byLanguage"]["java"], 4);
}

#[test]
fn test_scan_table() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_layered_project(temp_dir.path());

    let output = run_strata(temp_dir.path(), &["scan", "app"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Scanned"));
}

// ============================================================================
// Help
// ============================================================================

#[test]
fn test_no_command_prints_help() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_strata(temp_dir.path(), &[]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage"));
}
