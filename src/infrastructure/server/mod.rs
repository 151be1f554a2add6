mod docs;
mod dto;
mod error;
mod router;
mod routes;
mod state;

pub use error::ServerError;
pub(crate) use state::ServerState;

use crate::application::service::BriefingService;
use crate::infrastructure::model::ModelProvider;
use std::net::SocketAddr;
use std::sync::Arc;

pub async fn serve<P>(service: Arc<BriefingService<P>>, addr: SocketAddr) -> Result<(), ServerError>
where
    P: ModelProvider + 'static,
{
    router::serve(service, addr).await
}
