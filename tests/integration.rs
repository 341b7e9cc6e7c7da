use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const P1_ENV: [&str; 5] = [
    "P1_API_BASE",
    "P1_AUTH_TOKEN",
    "P1_TENANT_ID",
    "P1_JWT_SECRET",
    "RUST_LOG",
];

fn p1_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("p1");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[api]
base_url = "http://127.0.0.1:9"
mock = true

[session]
path = "{}/state/session.json"

[settings]
confirm_before_delete = true
"#,
        root.display()
    );

    let config_path = config_dir.join("p1.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn p1_command(config_path: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(p1_binary());
    cmd.arg("--config").arg(config_path).args(args);
    for key in P1_ENV {
        cmd.env_remove(key);
    }
    cmd
}

fn run(mut cmd: Command) -> (String, String, Output) {
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("Failed to run p1 binary at {:?}: {}", p1_binary(), e));
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output)
}

fn run_p1(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let (stdout, stderr, output) = run(p1_command(config_path, args));
    (stdout, stderr, output.status.success())
}

fn conversation_line(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("conversation: "))
        .unwrap_or_else(|| panic!("no conversation line in: {}", stdout))
        .to_string()
}

#[test]
fn test_ask_renders_direct_answer() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_p1(&config_path, &["ask", "What was Q4 revenue?"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("● DIRECT ANSWER"));
    assert!(stdout.contains("(Answer found directly in documents)"));
    assert!(stdout.contains("Source Citations (2)"));
    assert!(stdout.contains("  - Q4-2024-Financial-Report.pdf  Page 3"));
    assert!(conversation_line(&stdout).starts_with("conv_"));
}

#[test]
fn test_ask_modes_follow_query() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, _) = run_p1(&config_path, &["ask", "how many employees?"]);
    assert!(stdout.contains("GUIDED FALLBACK"));

    let (stdout, _, _) = run_p1(&config_path, &["ask", "predict the future"]);
    assert!(stdout.contains("HARD REFUSAL"));
    assert!(!stdout.contains("Source Citations"));
}

#[test]
fn test_conversation_is_reused_until_new() {
    let (tmp, config_path) = setup_test_env();

    let (first, _, _) = run_p1(&config_path, &["ask", "revenue"]);
    let (second, _, _) = run_p1(&config_path, &["ask", "sales"]);
    assert_eq!(conversation_line(&first), conversation_line(&second));

    let session = fs::read_to_string(tmp.path().join("state/session.json")).unwrap();
    assert!(session.contains(&conversation_line(&first)));

    let (_, stderr, success) = run_p1(&config_path, &["conversations", "new"]);
    assert!(success);
    assert!(stderr.contains("✓ Started new conversation"));

    let (third, _, _) = run_p1(&config_path, &["ask", "revenue"]);
    assert_ne!(conversation_line(&first), conversation_line(&third));
}

#[test]
fn test_explicit_conversation_is_used() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_p1(
        &config_path,
        &["ask", "revenue", "--conversation", "conv_fixed"],
    );
    assert!(success);
    assert_eq!(conversation_line(&stdout), "conv_fixed");
}

#[test]
fn test_ask_raw_prints_json() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_p1(&config_path, &["ask", "revenue", "--raw"]);
    assert!(success, "raw ask failed: {}", stderr);
    let body: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(body["mode"], "direct_answer");
    assert_eq!(body["tenant_id"], "acme");
}

#[tokio::test]
async fn test_ask_raw_exits_2_on_rejected_query() {
    let router = axum::Router::new().route(
        "/query",
        axum::routing::post(|| async {
            (
                axum::http::StatusCode::FORBIDDEN,
                axum::Json(serde_json::json!({ "detail": "Tenant mismatch" })),
            )
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    let (_tmp, config_path) = setup_test_env();
    let config = fs::read_to_string(&config_path)
        .unwrap()
        .replace("http://127.0.0.1:9", &format!("http://127.0.0.1:{}", port))
        .replace("mock = true", "mock = false");
    fs::write(&config_path, config).unwrap();

    let (stdout, stderr, output) = tokio::task::spawn_blocking(move || {
        run(p1_command(&config_path, &["ask", "revenue", "--raw"]))
    })
    .await
    .unwrap();
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr);
    assert!(stdout.contains("Tenant mismatch"));
}

#[test]
fn test_ask_reset_sends_new_topic() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_p1(&config_path, &["ask", "--reset", "--raw"]);
    assert!(success);
    let body: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(body["query"], "new topic");
}

#[test]
fn test_blank_query_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_p1(&config_path, &["ask", "   "]);
    assert!(!success);
    assert!(stderr.contains("Query must not be empty"));
}

#[test]
fn test_docs_list_shows_badges() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_p1(&config_path, &["docs", "list"]);
    assert!(success);
    assert!(stdout.contains("Documents (4)"));
    assert!(stdout.contains("Q4-2024-Financial-Report.pdf  [indexed]"));
    assert!(stdout.contains("Product-Roadmap-Draft.pdf  [pending]"));
    assert!(stdout.contains("2.3 MB · Dec 15, 2025, 10:30 AM"));
}

#[test]
fn test_docs_list_without_badges() {
    let (_tmp, config_path) = setup_test_env();

    run_p1(&config_path, &["settings", "set", "showDocumentBadges", "off"]);
    let (stdout, _, _) = run_p1(&config_path, &["docs", "list"]);
    assert!(!stdout.contains("[indexed]"));
    assert!(!stdout.contains("[pending]"));
}

#[test]
fn test_docs_delete_with_yes() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_p1(
        &config_path,
        &["docs", "delete", "HR-Policy-2024.pdf", "--yes"],
    );
    assert!(success, "delete failed: {}", stderr);
    assert!(stderr.contains("✓ Document deleted"));
}

#[test]
fn test_docs_delete_declined_on_stdin() {
    let (_tmp, config_path) = setup_test_env();

    let mut cmd = p1_command(&config_path, &["docs", "delete", "HR-Policy-2024.pdf"]);
    cmd.stdin(std::process::Stdio::null());
    let (stdout, stderr, output) = run(cmd);
    assert!(output.status.success());
    assert!(stderr.contains("Delete \"HR-Policy-2024.pdf\"? This action cannot be undone."));
    assert!(stdout.contains("Cancelled"));
    assert!(!stderr.contains("Document deleted"));
}

#[test]
fn test_docs_delete_unknown_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_p1(&config_path, &["docs", "delete", "nope.pdf", "--yes"]);
    assert!(!success);
    assert!(stderr.contains("No document named 'nope.pdf'"));
}

#[test]
fn test_docs_upload_rejects_non_pdf() {
    let (tmp, config_path) = setup_test_env();
    let notes = tmp.path().join("notes.txt");
    fs::write(&notes, "plain text").unwrap();

    let (_, stderr, success) = run_p1(&config_path, &["docs", "upload", notes.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("✗ Failed to upload document"));
}

#[test]
fn test_docs_upload_pdf() {
    let (tmp, config_path) = setup_test_env();
    let pdf = tmp.path().join("contract.pdf");
    fs::write(&pdf, b"%PDF-1.4").unwrap();

    let (stdout, stderr, success) =
        run_p1(&config_path, &["docs", "upload", pdf.to_str().unwrap()]);
    assert!(success, "upload failed: {}", stderr);
    assert!(stderr.contains("Document \"contract.pdf\" uploaded successfully"));
    assert!(stdout.contains("data/tenants/acme/docs/contract.pdf"));
}

#[test]
fn test_settings_persist_across_runs() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_p1(&config_path, &["settings", "set", "compactView", "on"]);
    assert!(success, "settings set failed: {}", stderr);

    let (stdout, _, _) = run_p1(&config_path, &["settings", "show"]);
    let line = stdout
        .lines()
        .find(|l| l.starts_with("compact_view"))
        .unwrap();
    assert!(line.contains(" on "));

    run_p1(&config_path, &["settings", "reset"]);
    let (stdout, _, _) = run_p1(&config_path, &["settings", "show"]);
    let line = stdout
        .lines()
        .find(|l| l.starts_with("compact_view"))
        .unwrap();
    assert!(line.contains(" off "));
}

#[test]
fn test_unknown_setting_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_p1(&config_path, &["settings", "set", "turbo", "on"]);
    assert!(!success);
    assert!(stderr.contains("Unknown setting"));
}

#[test]
fn test_notifications_off_silences_toasts() {
    let (_tmp, config_path) = setup_test_env();

    run_p1(&config_path, &["settings", "set", "enable_notifications", "no"]);
    let (_, stderr, success) = run_p1(&config_path, &["conversations", "new"]);
    assert!(success);
    assert!(!stderr.contains("Started new conversation"));
}

#[test]
fn test_conversations_list_and_show() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_p1(&config_path, &["conversations", "list"]);
    assert!(success);
    assert!(stdout.contains("Conversations (3)"));
    assert!(stdout.contains("conv_001"));

    let (stdout, _, success) = run_p1(&config_path, &["conversations", "show", "conv_003"]);
    assert!(success);
    assert!(stdout.contains("Q: How many employees do we have?"));
    assert!(stdout.contains("GUIDED FALLBACK"));

    let (_, stderr, success) = run_p1(&config_path, &["conversations", "show", "conv_missing"]);
    assert!(!success);
    assert!(stderr.contains("Failed to load conversation details"));
}

#[test]
fn test_token_mint_and_whoami() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_p1(&config_path, &["whoami"]);
    assert!(success);
    assert!(stdout.contains("backend: mock"));
    assert!(stdout.contains("tenant:  acme"));
    assert!(stdout.contains("unauthenticated (no token)"));

    let (token, stderr, success) = run_p1(
        &config_path,
        &["token", "mint", "--tenant", "globex", "--secret", "dev-secret"],
    );
    assert!(success, "mint failed: {}", stderr);
    let token = token.trim().to_string();
    assert_eq!(token.split('.').count(), 3);

    let mut cmd = p1_command(&config_path, &["whoami"]);
    cmd.env("P1_AUTH_TOKEN", &token);
    let (stdout, _, output) = run(cmd);
    assert!(output.status.success());
    assert!(stdout.contains("tenant:  globex"));
    assert!(stdout.contains("auth:    authenticated"));
    assert!(stdout.contains("expires: "));
}

#[test]
fn test_token_mint_requires_secret() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_p1(&config_path, &["token", "mint", "--tenant", "acme"]);
    assert!(!success);
    assert!(stderr.contains("No signing secret"));
}

#[test]
fn test_token_mint_rejects_huge_ttl() {
    let (_tmp, config_path) = setup_test_env();

    for days in ["100000000", "9223372036854775807"] {
        let (stdout, stderr, output) = run(p1_command(
            &config_path,
            &["token", "mint", "--tenant", "a", "--secret", "s", "--ttl-days", days],
        ));
        assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr);
        assert!(stdout.is_empty());
        assert!(stderr.contains("is too large"));
        assert!(!stderr.contains("panicked"));
    }
}

#[test]
fn test_health_offline() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_p1(&config_path, &["health"]);
    assert!(success);
    assert!(stdout.contains("\"backend\": \"mock\""));
}

#[test]
fn test_conversations_list_marks_selected() {
    let (tmp, config_path) = setup_test_env();
    let state_dir = tmp.path().join("state");
    fs::create_dir_all(&state_dir).unwrap();
    fs::write(
        state_dir.join("session.json"),
        r#"{ "current_conversation_id": "conv_001" }"#,
    )
    .unwrap();

    let (_, _, success) = run_p1(&config_path, &["conversations", "show", "conv_003"]);
    assert!(success);

    let (stdout, _, _) = run_p1(&config_path, &["conversations", "list"]);
    assert!(stdout.lines().any(|l| l.starts_with("> conv_003")), "{}", stdout);
    assert!(!stdout.lines().any(|l| l.starts_with("> conv_001")), "{}", stdout);
}

#[test]
fn test_completions() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_p1(&config_path, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("p1"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("bad.toml");
    fs::write(&bad, "[api]\ntimeout_secs = 0\n").unwrap();

    let (_, stderr, success) = run_p1(&bad, &["docs", "list"]);
    assert!(!success);
    assert!(stderr.contains("timeout_secs"));
}

#[test]
fn test_offline_flag_overrides_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("p1.toml");
    fs::write(
        &config_path,
        format!(
            "[api]\nbase_url = \"http://127.0.0.1:9\"\n\n[session]\npath = \"{}/s.json\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (stdout, _, success) = run_p1(&config_path, &["--offline", "docs", "list"]);
    assert!(success);
    assert!(stdout.contains("Documents (4)"));
}
