use crate::application::service::BriefingService;
use crate::infrastructure::model::ModelProvider;
use std::sync::Arc;

pub(crate) struct ServerState<P: ModelProvider> {
    service: Arc<BriefingService<P>>,
}

impl<P: ModelProvider> ServerState<P> {
    pub(crate) fn new(service: Arc<BriefingService<P>>) -> Self {
        Self { service }
    }

    pub(crate) fn service(&self) -> Arc<BriefingService<P>> {
        Arc::clone(&self.service)
    }
}
