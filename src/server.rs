use crate::api::{create_router, AppState};
use crate::events::IntentKind;
use crate::kafka::{KafkaProducer, TopicManager};
use crate::retry::{RetryPolicy, RetryingPublisher};
use crate::{Config, Result};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Builds the publisher stack and the router around it.
    pub fn router(&self) -> Result<Router> {
        let producer = KafkaProducer::new(&self.config)?;
        let policy = RetryPolicy::from(&self.config.publish.retry);
        let publisher = RetryingPublisher::new(producer, policy);
        let state = AppState::new(Arc::new(publisher), self.config.publish.key_strategy);
        Ok(create_router(state))
    }

    pub async fn run(&self) -> Result<()> {
        info!("Server starting");
        self.config.validate()?;

        if self.config.kafka.create_topics {
            let mut topics = TopicManager::new(
                &self.config.bootstrap_servers(),
                self.config.kafka.topic_partitions,
                self.config.kafka.replication_factor,
                self.config.kafka.metadata_timeout(),
            )?;
            let names: Vec<&str> = IntentKind::ALL.iter().map(|k| k.topic()).collect();
            topics.ensure_topics_exist(&names).await?;
        }

        let router = self.router()?;
        let listener = TcpListener::bind(&self.config.server.bind_address).await?;
        info!(address = %listener.local_addr()?, "Listening for cat requests");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown requested");
}
