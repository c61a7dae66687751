mod common;

use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use harness::process::ProcessOutput;
use harness::suite::{self, CaseStatus, RunOptions, StackCase, Suite, Verdict, cases};
use harness::testing::{RecordingConnector, ScriptedRunner, TestConfigBuilder};
use harness::{HarnessContext, HarnessError, Row, StackStatus};
use serde_json::json;

fn select_one(suite: &Suite) -> BoxFuture<'_, harness::Result<Verdict>> {
    async move {
        suite.analytics.query("SELECT 1").await?;
        Ok(Verdict::Passed)
    }
    .boxed()
}

fn always_fails(_suite: &Suite) -> BoxFuture<'_, harness::Result<Verdict>> {
    async move { Err(HarnessError::Check("boom".to_string())) }.boxed()
}

fn not_here(_suite: &Suite) -> BoxFuture<'_, harness::Result<Verdict>> {
    async move { Ok(Verdict::Skipped("not here".to_string())) }.boxed()
}

fn local_cases() -> Vec<StackCase> {
    vec![
        StackCase {
            name: "select_one",
            description: "query",
            run: select_one,
        },
        StackCase {
            name: "always_fails",
            description: "failing check",
            run: always_fails,
        },
        StackCase {
            name: "not_here",
            description: "skipped check",
            run: not_here,
        },
    ]
}

fn existing_stack_runner() -> Arc<ScriptedRunner> {
    Arc::new(
        ScriptedRunner::new()
            .respond(
                "docker compose ps --services --filter status=running",
                ProcessOutput::exited(0, "clickhouse\n", ""),
            )
            .respond(
                "docker compose config --services",
                ProcessOutput::exited(0, "clickhouse\n", ""),
            )
            .respond(
                "docker compose logs --no-color clickhouse",
                ProcessOutput::exited(0, "ready\n", ""),
            )
            .respond(
                "docker compose logs --no-color",
                ProcessOutput::exited(0, "ready\n", ""),
            ),
    )
}

#[tokio::test]
async fn test_failing_case_does_not_stop_the_run() {
    common::init_test_logging();
    let runner = existing_stack_runner();
    let (_temp, ctx) = common::scripted_context(TestConfigBuilder::new().build(), runner.clone());
    let connector = RecordingConnector::new();
    let analytics = ctx.analytics_client_with(Arc::new(connector.clone()));

    let report = suite::run(ctx, analytics, &local_cases(), &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.profile, "test");
    assert_eq!(
        report.stack,
        Some(StackStatus::Existing(vec!["clickhouse".to_string()]))
    );
    let statuses: Vec<&CaseStatus> = report.outcomes.iter().map(|o| &o.status).collect();
    assert_eq!(
        statuses,
        vec![
            &CaseStatus::Passed,
            &CaseStatus::Failed("Check failed: boom".to_string()),
            &CaseStatus::Skipped("not here".to_string()),
        ]
    );
    assert!(!report.is_success());
    assert_eq!(report.summary(), "profile test: 1 passed, 1 failed, 1 skipped");

    let capture = report.capture.as_ref().unwrap();
    assert!(capture.is_complete());
    assert_eq!(capture.saved_files().len(), 2);
    assert_eq!(connector.statements(), vec!["SELECT 1"]);
    assert!(!runner.calls().iter().any(|call| call == "docker compose down"));
}

#[tokio::test]
async fn test_filters_select_by_substring() {
    let runner = existing_stack_runner();
    let (_temp, ctx) = common::scripted_context(TestConfigBuilder::new().build(), runner);
    let analytics = ctx.analytics_client_with(Arc::new(RecordingConnector::new()));
    let options = RunOptions {
        filters: vec!["select".to_string(), "here".to_string()],
    };

    let report = suite::run(ctx, analytics, &local_cases(), &options)
        .await
        .unwrap();

    let names: Vec<&str> = report.outcomes.iter().map(|o| o.name).collect();
    assert_eq!(names, vec!["select_one", "not_here"]);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_without_docker_the_stack_is_left_alone() {
    let runner = Arc::new(ScriptedRunner::new());
    let config = TestConfigBuilder::new().without_docker().build();
    let (_temp, ctx) = common::scripted_context(config, runner.clone());
    let analytics = ctx.analytics_client_with(Arc::new(RecordingConnector::new()));
    let options = RunOptions {
        filters: vec!["iceberg_python_scripts".to_string()],
    };

    let report = suite::run(ctx, analytics, &cases::all(), &options)
        .await
        .unwrap();

    assert!(report.stack.is_none());
    assert!(report.capture.is_none());
    assert!(runner.calls().is_empty());
    assert!(matches!(
        report.outcomes[0].status,
        CaseStatus::Skipped(_)
    ));
}

#[tokio::test]
async fn test_catalog_checks_against_recording_server() {
    let config = TestConfigBuilder::new().without_docker().build();
    let (_temp, ctx) = common::scripted_context(config, Arc::new(ScriptedRunner::new()));
    let mut version = Row::new();
    version.insert("version()".to_string(), json!("25.3.2.10000.altinityantalya"));
    let connector = RecordingConnector::new().with_row("SELECT version()", version);
    let analytics = ctx.analytics_client_with(Arc::new(connector.clone()));
    let options = RunOptions {
        filters: vec![
            "clickhouse_vector_server_connection".to_string(),
            "ice_database_show_tables".to_string(),
        ],
    };

    let report = suite::run(ctx, analytics, &cases::all(), &options)
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.failed());
    assert_eq!(report.passed_count(), 2);
    let statements = connector.statements();
    assert_eq!(statements[0], "SELECT version()");
    assert_eq!(statements[1], "DROP DATABASE IF EXISTS ice_test");
    assert!(statements[2].starts_with("CREATE DATABASE ice_test ENGINE = DataLakeCatalog("));
    assert_eq!(statements[3], "SHOW TABLES FROM ice_test");
    assert_eq!(connector.sessions_opened(), connector.sessions_released());
}

#[tokio::test]
async fn test_missing_version_fails_the_connection_check() {
    let config = TestConfigBuilder::new().without_docker().build();
    let (_temp, ctx) = common::scripted_context(config, Arc::new(ScriptedRunner::new()));
    let analytics = ctx.analytics_client_with(Arc::new(RecordingConnector::new()));
    let options = RunOptions {
        filters: vec!["clickhouse_vector_server_connection".to_string()],
    };

    let report = suite::run(ctx, analytics, &cases::all(), &options)
        .await
        .unwrap();

    assert_eq!(report.failed().len(), 1);
}

#[tokio::test]
async fn test_failed_start_aborts_before_any_case() {
    let runner = Arc::new(ScriptedRunner::new().respond(
        "docker compose up -d",
        ProcessOutput::exited(1, "", "Cannot connect to the Docker daemon"),
    ));
    let (_temp, ctx) = common::scripted_context(TestConfigBuilder::new().build(), runner.clone());
    let ctx = ctx.with_stack_management(true);
    let connector = RecordingConnector::new();
    let analytics = ctx.analytics_client_with(Arc::new(connector.clone()));

    let err = suite::run(ctx, analytics, &local_cases(), &RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::StackStartup { .. }));
    assert!(err.to_string().contains("Cannot connect to the Docker daemon"));
    assert!(connector.statements().is_empty());
    assert_eq!(runner.calls(), vec!["docker compose up -d"]);
}

fn ice_command(tests_dir: &Path, args: &str) -> String {
    format!("ice -c {} {args}", tests_dir.join("ice.yaml").display())
}

fn count_row(count: u64) -> Row {
    let mut row = Row::new();
    row.insert("count".to_string(), json!(count));
    row.insert("passengers".to_string(), json!(1.3));
    row.insert("fare".to_string(), json!(17.5));
    row
}

fn swarm_stats_sql() -> String {
    format!("{} SETTINGS object_storage_cluster='swarm'", cases::taxi_stats_sql())
}

/// Runs `load_ice_and_select` with ice answered by the scripted runner.
async fn load_ice_and_select(
    insert_output: ProcessOutput,
    vector: Row,
    swarm: Row,
) -> (suite::SuiteReport, Arc<ScriptedRunner>, RecordingConnector, String) {
    let (temp, paths) = common::temp_layout();
    let delete = ice_command(&paths.tests_dir, "delete-table --purge nyc.taxis_test");
    let insert = ice_command(
        &paths.tests_dir,
        &format!("insert nyc.taxis_test -p {}", cases::TAXI_DATA_URL),
    );
    let runner = Arc::new(
        ScriptedRunner::new()
            .with_executable("ice", "/usr/local/bin/ice")
            .respond(&delete, ProcessOutput::exited(1, "", "table not found"))
            .respond(&insert, insert_output),
    );
    let tests_dir = paths.tests_dir.display().to_string();
    let ctx = HarnessContext::new("test", TestConfigBuilder::new().without_docker().build(), paths)
        .with_runner(runner.clone())
        .with_stack_management(false);
    let connector = RecordingConnector::new()
        .with_row(&cases::taxi_stats_sql(), vector)
        .with_row(&swarm_stats_sql(), swarm);
    let analytics = ctx.analytics_client_with(Arc::new(connector.clone()));
    let options = RunOptions {
        filters: vec!["load_ice_and_select".to_string()],
    };

    let report = suite::run(ctx, analytics, &cases::all(), &options)
        .await
        .unwrap();
    drop(temp);
    (report, runner, connector, tests_dir)
}

fn committed() -> ProcessOutput {
    ProcessOutput::exited(0, "", "Committed snapshot 5204116430453563212\n")
}

#[tokio::test]
async fn test_ice_insert_counts_match_between_vector_and_swarm() {
    common::init_test_logging();
    let (report, runner, connector, tests_dir) =
        load_ice_and_select(committed(), count_row(3_475_226), count_row(3_475_226)).await;

    assert!(report.is_success(), "{:?}", report.failed());
    assert_eq!(report.passed_count(), 1);
    assert_eq!(
        runner.calls(),
        vec![
            format!("ice -c {tests_dir}/ice.yaml delete-table --purge nyc.taxis_test"),
            format!(
                "ice -c {tests_dir}/ice.yaml insert nyc.taxis_test -p {}",
                cases::TAXI_DATA_URL
            ),
        ]
    );

    let statements = connector.statements();
    assert_eq!(statements.len(), 6);
    assert_eq!(statements[0], "DROP DATABASE IF EXISTS ice_test");
    assert!(statements[1].starts_with("CREATE DATABASE ice_test"));
    assert_eq!(statements[2], "DROP DATABASE IF EXISTS ice_test");
    assert!(statements[3].starts_with("CREATE DATABASE ice_test"));
    assert_eq!(statements[4], cases::taxi_stats_sql());
    assert_eq!(statements[5], swarm_stats_sql());
    assert_eq!(connector.sessions_opened(), connector.sessions_released());
}

#[tokio::test]
async fn test_ice_insert_fails_when_swarm_count_differs() {
    let (report, _runner, _connector, _) =
        load_ice_and_select(committed(), count_row(100), count_row(99)).await;

    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(
        failed[0].status,
        CaseStatus::Failed("Check failed: swarm count 99 differs from vector count 100".to_string())
    );
}

#[tokio::test]
async fn test_ice_insert_fails_on_empty_table() {
    let (report, _runner, connector, _) =
        load_ice_and_select(committed(), count_row(0), count_row(0)).await;

    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert!(matches!(
        &failed[0].status,
        CaseStatus::Failed(message) if message.contains("count must be greater than 0")
    ));
    assert!(!connector.statements().contains(&swarm_stats_sql()));
}

#[tokio::test]
async fn test_ice_insert_without_commit_stops_before_queries() {
    let (report, runner, connector, _) = load_ice_and_select(
        ProcessOutput::exited(0, "", "Rolled back\n"),
        count_row(10),
        count_row(10),
    )
    .await;

    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert!(matches!(
        &failed[0].status,
        CaseStatus::Failed(message) if message.contains("Committed snapshot")
    ));
    assert_eq!(runner.calls().len(), 2);
    assert_eq!(connector.statements().len(), 2);
}

#[tokio::test]
async fn test_ice_insert_needs_ice_executable() {
    let (_temp, ctx) = common::scripted_context(
        TestConfigBuilder::new().without_docker().build(),
        Arc::new(ScriptedRunner::new()),
    );
    let analytics = ctx.analytics_client_with(Arc::new(RecordingConnector::new()));
    let options = RunOptions {
        filters: vec!["load_ice_and_select".to_string()],
    };

    let report = suite::run(ctx, analytics, &cases::all(), &options)
        .await
        .unwrap();

    assert_eq!(
        report.outcomes[0].status,
        CaseStatus::Failed("Executable 'ice' not found in PATH".to_string())
    );
}
