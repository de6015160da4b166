use crate::config::Config;
use crate::error::AppError;
use crate::handlers;
use crate::store::{ProductStore, SharedStore};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SharedStore,
}

impl AppState {
    /// Builds the shared state, creating the uploads directory if needed.
    pub async fn init(config: Config) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&config.uploads_dir).await?;
        let store = Arc::new(ProductStore::new(config.products_file.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/create", get(handlers::create_page))
        .route("/get_products", get(handlers::get_products))
        .route("/api/stats", get(handlers::get_stats))
        .route("/download/:file_id", get(handlers::download_file))
        .route("/uploads/*path", get(handlers::serve_upload))
        .route("/create_product", post(handlers::create_product))
        .route("/upload_image", post(handlers::upload_image))
        .route("/upload_file", post(handlers::upload_file))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(state.config.max_upload_size))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-cache, no-store, must-revalidate"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::PRAGMA,
                    HeaderValue::from_static("no-cache"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::EXPIRES,
                    HeaderValue::from_static("0"),
                )),
        )
        .with_state(state)
}

/// Unrouted GET and HEAD requests are served from the static directory.
async fn fallback(State(state): State<AppState>, request: Request) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return AppError::NotFound("Not Found".to_string()).into_response();
    }

    match ServeDir::new(&state.config.static_dir).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
