use crate::Result;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use typed_builder::TypedBuilder;

const IMAGE: &str = "postgres";
const IMAGE_TAG: &str = "16-alpine";
const PORT: u16 = 5432;
const READY_MESSAGE: &str = "database system is ready to accept connections";

/// Credentials and database name the container is initialised with.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PostgresConfig {
    #[builder(default = "cutter".to_string())]
    database: String,
    #[builder(default = "cutter".to_string())]
    username: String,
    #[builder(default = "cutter".to_string())]
    password: String,
}

/// A PostgreSQL container that lives as long as this value.
pub struct PostgresServer {
    container: ContainerAsync<GenericImage>,
    config: PostgresConfig,
}

impl PostgresServer {
    pub async fn new(config: PostgresConfig) -> Result<Self> {
        // The entrypoint restarts the server once after initdb, so the ready
        // message can appear before the final server is up. Callers retry
        // their first connection.
        let container = GenericImage::new(IMAGE, IMAGE_TAG)
            .with_exposed_port(PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr(READY_MESSAGE))
            .with_env_var("POSTGRES_DB", config.database.as_str())
            .with_env_var("POSTGRES_USER", config.username.as_str())
            .with_env_var("POSTGRES_PASSWORD", config.password.as_str())
            .start()
            .await?;

        Ok(Self { container, config })
    }

    /// Connection string for the mapped host port, suitable for `sqlx`.
    pub async fn database_url(&self) -> Result<String> {
        let host = self.container.get_host().await?;
        let port = self.container.get_host_port_ipv4(PORT).await?;
        let PostgresConfig {
            database,
            username,
            password,
        } = &self.config;
        Ok(format!(
            "postgres://{username}:{password}@{host}:{port}/{database}"
        ))
    }
}
