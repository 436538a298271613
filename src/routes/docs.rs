use crate::app::ApiContext;
use crate::routes::avatar::AvatarApi;
use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

pub const AVATAR_TAG: &str = "avatar";

pub fn router() -> Router<ApiContext> {
    Router::new().route("/api-docs/openapi.json", get(openapi))
}

#[derive(OpenApi)]
#[openapi(tags(
    (name = "avatar", description = "Gravatar urls and markup")
))]
struct Api;

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    let mut api = Api::openapi();
    api.merge(AvatarApi::openapi());

    Json(api)
}
