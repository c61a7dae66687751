use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::TestConfig;
use crate::error::{BoxError, HarnessError, Result};

/// First result row: column name to value.
pub type Row = BTreeMap<String, serde_json::Value>;

/// An open connection to the analytics server.
///
/// Dropping the session releases the connection.
#[async_trait]
pub trait AnalyticsSession: Send {
    /// Runs `sql` and returns its first row, or `None` if it returned no rows.
    async fn first_row(&mut self, sql: &str) -> std::result::Result<Option<Row>, BoxError>;

    async fn execute(&mut self, sql: &str) -> std::result::Result<(), BoxError>;
}

#[async_trait]
pub trait AnalyticsConnector: Send + Sync {
    async fn connect(&self) -> std::result::Result<Box<dyn AnalyticsSession>, BoxError>;
}

/// `DataLakeCatalog` settings taken from the profile. Empty values are
/// left out of the generated DDL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogSettings {
    pub endpoint: String,
    pub auth_header: String,
    pub warehouse: String,
    pub storage_endpoint: String,
}

impl CatalogSettings {
    pub fn from_config(config: &TestConfig) -> Self {
        Self {
            endpoint: config.ice_catalog_endpoint.clone(),
            auth_header: config.ice_setting_auth_header.clone(),
            warehouse: config.ice_setting_warehouse.clone(),
            storage_endpoint: config.ice_setting_storage_endpoint.clone(),
        }
    }

    /// `CREATE DATABASE` statement for a REST catalog database named `name`.
    pub fn create_database_sql(&self, name: &str) -> String {
        let mut sql = format!(
            "CREATE DATABASE {name} ENGINE = DataLakeCatalog({}) SETTINGS catalog_type = 'rest'",
            quote(&self.endpoint)
        );
        for (setting, value) in [
            ("auth_header", &self.auth_header),
            ("warehouse", &self.warehouse),
            ("storage_endpoint", &self.storage_endpoint),
        ] {
            if !value.is_empty() {
                sql.push_str(&format!(", {setting} = {}", quote(value)));
            }
        }
        sql
    }
}

/// Single-quoted SQL string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Query and DDL helper over a fresh session per call.
#[derive(Clone)]
pub struct AnalyticsClient {
    connector: Arc<dyn AnalyticsConnector>,
    catalog: CatalogSettings,
}

impl AnalyticsClient {
    pub fn new(connector: Arc<dyn AnalyticsConnector>, catalog: CatalogSettings) -> Self {
        Self { connector, catalog }
    }

    pub fn catalog_settings(&self) -> &CatalogSettings {
        &self.catalog
    }

    /// Returns the first row of `sql`, or an empty row if there is none.
    pub async fn query(&self, sql: &str) -> Result<Row> {
        let mut session = self.connector.connect().await.map_err(HarnessError::Connect)?;
        let result = session.first_row(sql).await;
        drop(session);

        match result {
            Ok(row) => {
                log::info!("Query executed successfully: {}...", preview(sql));
                Ok(row.unwrap_or_default())
            }
            Err(source) => Err(HarnessError::Query {
                sql: sql.to_string(),
                source,
            }),
        }
    }

    pub async fn ddl(&self, sql: &str) -> Result<()> {
        let mut session = self.connector.connect().await.map_err(HarnessError::Connect)?;
        let result = session.execute(sql).await;
        drop(session);

        match result {
            Ok(()) => {
                log::info!("DDL executed successfully: {}...", preview(sql));
                Ok(())
            }
            Err(source) => Err(HarnessError::Ddl {
                sql: sql.to_string(),
                source,
            }),
        }
    }

    /// Creates a database backed by the REST catalog, optionally dropping
    /// an existing one first.
    pub async fn create_catalog(&self, name: &str, drop_first: bool) -> Result<()> {
        if drop_first {
            self.ddl(&format!("DROP DATABASE IF EXISTS {name}")).await?;
        }
        self.ddl(&self.catalog.create_database_sql(name)).await
    }
}

fn preview(sql: &str) -> String {
    sql.trim().chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(auth_header: &str, warehouse: &str, storage_endpoint: &str) -> CatalogSettings {
        CatalogSettings {
            endpoint: "http://ice-rest-catalog:5000".to_string(),
            auth_header: auth_header.to_string(),
            warehouse: warehouse.to_string(),
            storage_endpoint: storage_endpoint.to_string(),
        }
    }

    #[test]
    fn test_create_database_without_optional_settings() {
        assert_eq!(
            settings("", "", "").create_database_sql("ice_test"),
            "CREATE DATABASE ice_test ENGINE = DataLakeCatalog('http://ice-rest-catalog:5000') \
             SETTINGS catalog_type = 'rest'"
        );
    }

    #[test]
    fn test_create_database_with_all_settings() {
        let sql = settings("Authorization: Bearer foo", "s3://warehouse", "http://minio:9000")
            .create_database_sql("ice_test");
        assert_eq!(
            sql,
            "CREATE DATABASE ice_test ENGINE = DataLakeCatalog('http://ice-rest-catalog:5000') \
             SETTINGS catalog_type = 'rest', auth_header = 'Authorization: Bearer foo', \
             warehouse = 's3://warehouse', storage_endpoint = 'http://minio:9000'"
        );
    }

    #[test]
    fn test_each_setting_is_independent() {
        let only_storage = settings("", "", "http://minio:9000").create_database_sql("db");
        assert!(only_storage.ends_with("catalog_type = 'rest', storage_endpoint = 'http://minio:9000'"));
        assert!(!only_storage.contains("auth_header"));
        assert!(!only_storage.contains("warehouse"));

        let only_warehouse = settings("", "s3://wh", "").create_database_sql("db");
        assert!(only_warehouse.ends_with("catalog_type = 'rest', warehouse = 's3://wh'"));
    }

    #[test]
    fn test_setting_values_are_escaped() {
        let sql = settings("it's", "", "").create_database_sql("db");
        assert!(sql.ends_with(r"auth_header = 'it\'s'"));
    }
}
