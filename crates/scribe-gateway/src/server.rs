use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use scribe_core::config::GatewayConfig;
use scribe_workflows::WorkflowService;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway over the workflow service, built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    service: Arc<WorkflowService>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, service: Arc<WorkflowService>) -> Self {
        Self { config, service }
    }

    /// The full route table with state attached.
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            service: self.service.clone(),
        });

        Router::new()
            .route("/api/health", get(routes::health))
            .route("/api/workflows", get(routes::list_workflows))
            .route("/api/workflows/{name}/run", post(routes::run_workflow))
            // Content endpoints
            .route("/x-post/generate", post(routes::generate_x_post))
            .route("/x-post/ideas", post(routes::x_post_ideas))
            .route("/repurpose-article", post(routes::repurpose_article))
            .route("/generate-blog", post(routes::generate_blog))
            .route("/image-prompt", post(routes::image_prompt))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = self.router();

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway stopped");
        Ok(())
    }
}
