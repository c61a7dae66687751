//! Checks run against a live Antalya stack.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use super::{StackCase, Suite, Verdict};
use crate::analytics::Row;
use crate::error::{HarnessError, Result, ensure};
use crate::os::{CommandExpectation, HttpExpectation, generate_basic_auth_header};

/// Database created in ClickHouse for the REST catalog.
pub const CATALOG_DATABASE: &str = "ice_test";

/// Iceberg table loaded by `load_ice_and_select`.
pub const TAXI_TABLE: &str = "nyc.taxis_test";

pub const TAXI_DATA_URL: &str =
    "https://d37ci6vzurychx.cloudfront.net/trip-data/yellow_tripdata_2025-01.parquet";

pub const SWARM_CLUSTER: &str = "swarm";

/// Every stack check, in run order.
pub fn all() -> Vec<StackCase> {
    vec![
        StackCase {
            name: "ice_catalog_liveness",
            description: "catalog REST API lists namespaces",
            run: ice_catalog_liveness,
        },
        StackCase {
            name: "vector_server_liveness",
            description: "ClickHouse answers /ping",
            run: vector_server_liveness,
        },
        StackCase {
            name: "vector_server_version",
            description: "ClickHouse HTTP query with basic auth",
            run: vector_server_version,
        },
        StackCase {
            name: "iceberg_python_scripts",
            description: "example iceberg scripts run cleanly",
            run: iceberg_python_scripts,
        },
        StackCase {
            name: "clickhouse_vector_server_connection",
            description: "native protocol SELECT version()",
            run: clickhouse_vector_server_connection,
        },
        StackCase {
            name: "ice_database_show_tables",
            description: "catalog database lists its tables",
            run: ice_database_show_tables,
        },
        StackCase {
            name: "load_ice_and_select",
            description: "ice insert is readable from vector server and swarm",
            run: load_ice_and_select,
        },
    ]
}

fn ice_catalog_liveness(suite: &Suite) -> BoxFuture<'_, Result<Verdict>> {
    async move {
        let config = &suite.ctx.config;
        let url = format!("{}/v1/namespaces", config.catalog_base_url());
        let expect = HttpExpectation::ok().with_bearer(&config.ice_rest_token);
        suite.os.http_get(&url, &expect).await?;
        Ok(Verdict::Passed)
    }
    .boxed()
}

fn vector_server_liveness(suite: &Suite) -> BoxFuture<'_, Result<Verdict>> {
    async move {
        let url = format!("{}/ping", suite.ctx.config.clickhouse_http_url());
        suite.os.http_get(&url, &HttpExpectation::ok()).await?;
        Ok(Verdict::Passed)
    }
    .boxed()
}

fn vector_server_version(suite: &Suite) -> BoxFuture<'_, Result<Verdict>> {
    async move {
        let config = &suite.ctx.config;
        // "select version()", percent-encoded
        let url = format!(
            "{}/?query=select%20version%28%29",
            config.clickhouse_http_url()
        );
        let auth = generate_basic_auth_header(&config.ch_user, &config.ch_password);
        let response = suite
            .os
            .http_get(&url, &HttpExpectation::ok().with_auth(auth))
            .await?;
        if let Ok(body) = response.text().await {
            log::info!("ClickHouse version: {}", body.trim());
        }
        Ok(Verdict::Passed)
    }
    .boxed()
}

fn iceberg_python_scripts(suite: &Suite) -> BoxFuture<'_, Result<Verdict>> {
    async move {
        // The scripts assume docker networking
        if !suite.ctx.config.use_docker {
            return Ok(Verdict::Skipped(
                "iceberg scripts only run against docker deployments".to_string(),
            ));
        }
        suite.os.run_python_script("iceberg_setup.py").await?;
        suite.os.run_python_script("iceberg_read.py").await?;
        Ok(Verdict::Passed)
    }
    .boxed()
}

fn clickhouse_vector_server_connection(suite: &Suite) -> BoxFuture<'_, Result<Verdict>> {
    async move {
        let row = suite.analytics.query("SELECT version()").await?;
        let version = row.get("version()").cloned().unwrap_or(Value::Null);
        ensure(!version.is_null(), || {
            format!("SELECT version() returned no version: {row:?}")
        })?;
        log::info!("ClickHouse version: {version}");
        Ok(Verdict::Passed)
    }
    .boxed()
}

fn ice_database_show_tables(suite: &Suite) -> BoxFuture<'_, Result<Verdict>> {
    async move {
        suite.analytics.create_catalog(CATALOG_DATABASE, true).await?;
        suite
            .analytics
            .query(&format!("SHOW TABLES FROM {CATALOG_DATABASE}"))
            .await?;
        Ok(Verdict::Passed)
    }
    .boxed()
}

fn load_ice_and_select(suite: &Suite) -> BoxFuture<'_, Result<Verdict>> {
    async move {
        suite.analytics.create_catalog(CATALOG_DATABASE, true).await?;

        suite
            .os
            .run_ice_command(
                &["delete-table", "--purge", TAXI_TABLE],
                &CommandExpectation::success().ignoring_return_code(),
            )
            .await?;
        suite
            .os
            .run_ice_command(
                &["insert", TAXI_TABLE, "-p", TAXI_DATA_URL],
                &CommandExpectation::success().containing("Committed snapshot"),
            )
            .await?;

        // Recreate so ClickHouse sees the new table
        suite.analytics.create_catalog(CATALOG_DATABASE, true).await?;

        let stats = taxi_stats_sql();
        let vector = suite.analytics.query(&stats).await?;
        let vector_count = positive_count(&vector)?;

        let swarm_sql = format!("{stats} SETTINGS object_storage_cluster='{SWARM_CLUSTER}'");
        let swarm = suite.analytics.query(&swarm_sql).await?;
        let swarm_count = positive_count(&swarm)?;

        ensure(swarm_count == vector_count, || {
            format!("swarm count {swarm_count} differs from vector count {vector_count}")
        })?;
        log::info!("Swarm count {swarm_count} equals vector count {vector_count}");
        Ok(Verdict::Passed)
    }
    .boxed()
}

pub fn taxi_stats_sql() -> String {
    format!(
        "SELECT count() AS count, avg(passenger_count) AS passengers, avg(fare_amount) AS fare \
         FROM {CATALOG_DATABASE}.`{TAXI_TABLE}`"
    )
}

/// The `count` column of `row`, which must be greater than zero.
fn positive_count(row: &Row) -> Result<u64> {
    let count = row
        .get("count")
        .and_then(Value::as_u64)
        .ok_or_else(|| HarnessError::Check(format!("no count column in {row:?}")))?;
    ensure(count > 0, || "count must be greater than 0".to_string())?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_names_are_unique() {
        let cases = all();
        let mut names: Vec<&str> = cases.iter().map(|case| case.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), cases.len());
    }

    #[test]
    fn test_taxi_stats_sql_targets_catalog_table() {
        assert_eq!(
            taxi_stats_sql(),
            "SELECT count() AS count, avg(passenger_count) AS passengers, avg(fare_amount) AS fare \
             FROM ice_test.`nyc.taxis_test`"
        );
    }

    #[test]
    fn test_positive_count() {
        let mut row = Row::new();
        let err = positive_count(&row).unwrap_err();
        assert!(err.to_string().contains("no count column"), "{err}");

        row.insert("count".to_string(), Value::String("many".to_string()));
        assert!(matches!(positive_count(&row), Err(HarnessError::Check(_))));

        row.insert("count".to_string(), Value::from(0u64));
        let err = positive_count(&row).unwrap_err();
        assert!(err.to_string().contains("greater than 0"), "{err}");

        row.insert("count".to_string(), Value::from(3_475_226u64));
        assert_eq!(positive_count(&row).unwrap(), 3_475_226);
    }
}
