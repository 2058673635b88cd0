//! External resource adapters for Lazarus
//!
//! The recovery orchestrator touches live infrastructure only through the
//! traits in [`traits`]. Production implementations:
//!
//! - PostgreSQL (psql / pg_restore)
//! - Docker and Docker Compose
//! - Kubernetes (kubectl)
//! - DNS / load-balancer shell hooks
//! - git-tagged application releases with an HTTP health check
//! - Webhook notifications and the monitoring emergency flag

pub mod application;
pub mod docker;
pub mod kubernetes;
pub mod notification;
pub mod postgres;
pub mod traffic;
pub mod traits;
pub mod utils;

pub use application::{parse_version, sort_versions, GitApplication};
pub use docker::DockerAdapter;
pub use kubernetes::KubernetesAdapter;
pub use notification::WebhookNotifier;
pub use postgres::PostgresAdapter;
pub use traffic::CommandTrafficAdapter;
pub use traits::{
    ApplicationAdapter, ContainerAdapter, DatabaseAdapter, Notification, NotificationAdapter,
    NotificationLevel, OrchestrationAdapter, ServiceHealth, StopMode, TrafficAdapter,
};
