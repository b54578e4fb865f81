//! Record client handle over the injected remote boundary.

use crate::config::ClientConfig;

/// Entry point to one container: account operations go to `container`,
/// record and subscription operations to `database` in the configured scope.
///
/// The client holds no mutable state. Cloning shares the boundary handles.
#[derive(Clone, Debug)]
pub struct RecordClient<C, D> {
    config: ClientConfig,
    container: C,
    database: D,
}

impl<C, D> RecordClient<C, D> {
    pub fn new(config: ClientConfig, container: C, database: D) -> Self {
        tracing::debug!(
            container = %config.container_id,
            environment = %config.environment,
            scope = %config.scope,
            "record client configured"
        );
        Self {
            config,
            container,
            database,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn database(&self) -> &D {
        &self.database
    }
}

impl<S: Clone> RecordClient<S, S> {
    /// Uses one service handle as both container and database.
    pub fn with_service(config: ClientConfig, service: S) -> Self {
        Self::new(config, service.clone(), service)
    }
}
