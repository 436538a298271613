use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use validator::Validate;

use crate::{
    app::{
        avatar::{context::RenderContext, AvatarRequest, FallbackMode},
        error::AppError,
        extrator::{ValidatedJson, ValidatedQuery},
        utils::validation::validate_rating,
        ApiContext,
    },
    telemetry::spawn_blocking_with_tracing,
};

use super::docs::AVATAR_TAG;

#[derive(OpenApi)]
#[openapi(paths(get_avatar, get_avatar_url, test_avatar, render_page))]
pub struct AvatarApi;

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvatarQuery {
    pub user_id: i64,

    #[serde(default)]
    pub user_name: String,

    #[validate(length(min = 1))]
    pub email: String,

    /// Pixels, 1 ~ 512
    #[serde(default = "default_size")]
    #[validate(range(min = 1, max = 512))]
    pub size: u32,

    /// g, pg, r or x
    #[serde(default = "default_rating")]
    #[validate(custom(function = "validate_rating"))]
    pub rating: String,
}

fn default_size() -> u32 {
    32
}

fn default_rating() -> String {
    "g".to_string()
}

impl From<AvatarQuery> for AvatarRequest {
    fn from(query: AvatarQuery) -> Self {
        AvatarRequest {
            user_id: query.user_id,
            user_name: query.user_name,
            email: query.email,
            size: query.size,
            rating: query.rating,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AvatarUrl {
    pub url: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AvatarPage {
    #[validate(nested)]
    pub avatars: Vec<AvatarQuery>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RenderedPage {
    /// Markup in request order, `null` where there was nothing to render
    pub avatars: Vec<Option<String>>,
}

pub fn router() -> Router<ApiContext> {
    Router::new()
        .route("/avatar", get(get_avatar))
        .route("/avatar/url", get(get_avatar_url))
        .route("/avatar/test", get(test_avatar))
        .route("/avatar/page", post(render_page))
}

#[utoipa::path(
    get,
    path = "/avatar",
    tag = AVATAR_TAG,
    params(AvatarQuery),
    responses(
        (status = 200, description = "Avatar markup", content_type = "text/html", body = String),
        (status = 204, description = "Nothing to render"),
        (status = 422, description = "Invalid input"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(name = "Get avatar", skip_all, fields(user_id = query.user_id))]
async fn get_avatar(
    ctx: State<ApiContext>,
    ValidatedQuery(query): ValidatedQuery<AvatarQuery>,
) -> Result<Response, AppError> {
    let resolver = ctx.resolver.clone();

    let markup = spawn_blocking_with_tracing(move || {
        let mut render = RenderContext::new();
        resolver.configure(&mut render, query.into());
        resolver.get_avatar(&mut render)
    })
    .await
    .context("avatar render task failed")??;

    Ok(html_or_no_content(markup))
}

#[utoipa::path(
    get,
    path = "/avatar/url",
    tag = AVATAR_TAG,
    params(AvatarQuery),
    responses(
        (status = 200, description = "Avatar url", body = AvatarUrl),
        (status = 422, description = "Invalid input"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(name = "Get avatar url", skip_all, fields(user_id = query.user_id))]
async fn get_avatar_url(
    ctx: State<ApiContext>,
    ValidatedQuery(query): ValidatedQuery<AvatarQuery>,
) -> Result<Json<AvatarUrl>, AppError> {
    let resolver = ctx.resolver.clone();

    let url = spawn_blocking_with_tracing(move || {
        let mut render = RenderContext::new();
        let request = AvatarRequest::from(query);
        resolver.configure(&mut render, request.clone());
        resolver.build_avatar_url(
            &mut render,
            &request.email,
            request.size,
            &request.rating,
            FallbackMode::Default,
        )
    })
    .await
    .context("avatar render task failed")??;

    Ok(Json(AvatarUrl { url }))
}

#[utoipa::path(
    get,
    path = "/avatar/test",
    tag = AVATAR_TAG,
    params(AvatarQuery),
    responses(
        (status = 200, description = "Gravatar exists, avatar markup", content_type = "text/html", body = String),
        (status = 204, description = "No gravatar registered or gravatar unreachable"),
        (status = 422, description = "Invalid input")
    )
)]
#[tracing::instrument(name = "Test avatar", skip_all, fields(user_id = query.user_id))]
async fn test_avatar(
    ctx: State<ApiContext>,
    ValidatedQuery(query): ValidatedQuery<AvatarQuery>,
) -> Result<Response, AppError> {
    let mut render = RenderContext::new();
    ctx.resolver.configure(&mut render, query.into());

    let markup = ctx.resolver.test_avatar(&mut render).await;

    Ok(html_or_no_content(markup))
}

#[utoipa::path(
    post,
    path = "/avatar/page",
    tag = AVATAR_TAG,
    request_body = AvatarPage,
    responses(
        (status = 200, description = "Markup for every avatar on the page", body = RenderedPage),
        (status = 400, description = "Bad request"),
        (status = 422, description = "Invalid input"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(name = "Render avatar page", skip_all, fields(count = req.avatars.len()))]
async fn render_page(
    ctx: State<ApiContext>,
    ValidatedJson(req): ValidatedJson<AvatarPage>,
) -> Result<Json<RenderedPage>, AppError> {
    if req.avatars.is_empty() {
        return Err(AppError::unprocessable_entity([("avatars", "length")]));
    }

    let resolver = ctx.resolver.clone();

    // One context for the whole page, random defaults stay put per user
    let avatars = spawn_blocking_with_tracing(move || {
        let mut render = RenderContext::new();

        req.avatars
            .into_iter()
            .map(|query| {
                resolver.configure(&mut render, query.into());
                resolver.get_avatar(&mut render)
            })
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .context("avatar render task failed")??;

    Ok(Json(RenderedPage { avatars }))
}

fn html_or_no_content(markup: Option<String>) -> Response {
    match markup {
        Some(markup) => Html(markup).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
