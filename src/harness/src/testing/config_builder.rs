//! Builder for profile values used in tests.

use crate::config::TestConfig;

/// Builds a [`TestConfig`] matching the `docker` profile, with setters for
/// the values tests usually change.
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: TestConfig,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TestConfig {
                ch_host: "localhost".to_string(),
                ch_port: 9000,
                ch_http_port: 8123,
                ch_user: "root".to_string(),
                ch_password: "topsecret".to_string(),
                ice_rest_host: "localhost".to_string(),
                ice_rest_port: 5000,
                ice_rest_token: "foo".to_string(),
                ice_config: "ice.yaml".to_string(),
                ice_catalog_endpoint: "http://ice-rest-catalog:5000".to_string(),
                ice_setting_auth_header: String::new(),
                ice_setting_storage_endpoint: String::new(),
                ice_setting_warehouse: String::new(),
                use_docker: true,
            },
        }
    }

    pub fn without_docker(mut self) -> Self {
        self.config.use_docker = false;
        self
    }

    pub fn with_clickhouse(mut self, host: &str, port: u16, http_port: u16) -> Self {
        self.config.ch_host = host.to_string();
        self.config.ch_port = port;
        self.config.ch_http_port = http_port;
        self
    }

    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.config.ch_user = user.to_string();
        self.config.ch_password = password.to_string();
        self
    }

    pub fn with_catalog(mut self, host: &str, port: u16, token: &str) -> Self {
        self.config.ice_rest_host = host.to_string();
        self.config.ice_rest_port = port;
        self.config.ice_rest_token = token.to_string();
        self
    }

    /// Sets the `DataLakeCatalog` endpoint and its optional settings.
    pub fn with_catalog_settings(
        mut self,
        endpoint: &str,
        auth_header: &str,
        warehouse: &str,
        storage_endpoint: &str,
    ) -> Self {
        self.config.ice_catalog_endpoint = endpoint.to_string();
        self.config.ice_setting_auth_header = auth_header.to_string();
        self.config.ice_setting_warehouse = warehouse.to_string();
        self.config.ice_setting_storage_endpoint = storage_endpoint.to_string();
        self
    }

    pub fn build(self) -> TestConfig {
        self.config
    }
}
