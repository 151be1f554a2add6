use super::dto::ErrorResponse;
use super::routes;
use crate::domain::types::{DayPlanResult, Meeting};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(routes::briefing::briefing_handler),
    components(schemas(DayPlanResult, Meeting, ErrorResponse)),
    tags(
        (name = "briefing", description = "Daily meeting briefing for the calling user")
    )
)]
pub(super) struct ApiDoc;
