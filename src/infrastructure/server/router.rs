use super::docs::ApiDoc;
use super::error::ServerError;
use super::routes;
use super::state::ServerState;
use crate::application::service::BriefingService;
use crate::infrastructure::model::ModelProvider;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use utoipa::OpenApi;

pub(super) async fn serve<P>(
    service: Arc<BriefingService<P>>,
    addr: SocketAddr,
) -> Result<(), ServerError>
where
    P: ModelProvider + 'static,
{
    let api = ApiDoc::openapi();
    info!(%addr, "Binding REST server");

    let state = Arc::new(ServerState::new(service));
    let app = Router::new()
        .route("/api-doc/openapi.json", get(|| async move { Json(api) }))
        .route(
            "/briefing",
            get(routes::briefing::briefing_handler::<P>)
                .post(routes::briefing::briefing_handler::<P>),
        )
        .with_state(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "REST server ready to accept connections");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(ServerError::Serve)
}
