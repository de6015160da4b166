use crate::app::AppState;
use crate::error::{AppError, Result};
use crate::models::{
    CreatedResponse, NewProduct, Product, StatsResponse, UploadKind, UploadResponse, OCTET_STREAM,
    SERVER_VERSION,
};
use crate::multipart::{self, MultipartError};
use crate::store::Download;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::path::{Component, Path as FsPath, PathBuf};
use tokio::fs;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

pub async fn index(State(state): State<AppState>) -> Result<Response> {
    serve_page(&state.config.static_dir.join("index.html")).await
}

pub async fn create_page(State(state): State<AppState>) -> Result<Response> {
    serve_page(&state.config.static_dir.join("create.html")).await
}

async fn serve_page(path: &FsPath) -> Result<Response> {
    let file = fs::File::open(path)
        .await
        .map_err(|_| AppError::file_not_found())?;
    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    let body = Body::from_stream(ReaderStream::new(file));

    Ok(([(header::CONTENT_TYPE, mime_type.to_string())], body).into_response())
}

pub async fn get_products(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.store.load().await)
}

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let products = state.store.load().await;
    Json(StatsResponse {
        total_products: products.len(),
        last_updated: Utc::now(),
        server_version: SERVER_VERSION,
    })
}

/// The body is decoded by hand so missing fields surface as a server error
/// carrying the parse message.
pub async fn create_product(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CreatedResponse>> {
    let new_product: NewProduct = serde_json::from_slice(&body)?;
    let product = new_product.into_product();
    tracing::info!(
        "Creating product {} ({}) with file_id {}",
        product.name,
        product.id,
        product.file_id
    );

    state.store.append(product).await?;

    Ok(Json(CreatedResponse {
        status: "success",
        redirect: "/?created=true",
    }))
}

pub async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>> {
    store_upload(&state, UploadKind::Image, &headers, &body)
        .await
        .map(Json)
}

pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>> {
    store_upload(&state, UploadKind::File, &headers, &body)
        .await
        .map(Json)
}

async fn store_upload(
    state: &AppState,
    kind: UploadKind,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<UploadResponse> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("multipart/form-data") {
        return Err(AppError::BadRequest("Invalid content type".to_string()));
    }

    let boundary = multipart::boundary_from_content_type(content_type)
        .ok_or(MultipartError::MissingBoundary)?;
    let upload = multipart::parse(body, boundary.as_bytes())?;

    if !kind.accepts(&upload.filename) {
        return Err(AppError::BadRequest(format!(
            "Only {} files are allowed",
            UploadKind::ASSET_EXTENSION
        )));
    }

    let unique_filename = format!("{}_{}", Uuid::new_v4(), base_name(&upload.filename));
    let file_path = state.config.uploads_dir.join(&unique_filename);
    fs::write(&file_path, &upload.data).await?;

    tracing::info!(
        "Stored {} upload {} ({} bytes) as {}",
        kind.as_str(),
        upload.filename,
        upload.data.len(),
        file_path.display()
    );

    Ok(UploadResponse {
        status: "success",
        filename: unique_filename,
        filepath: file_path.display().to_string(),
        original_filename: upload.filename,
        file_type: OCTET_STREAM,
    })
}

/// Last path segment of a client-supplied filename.
fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("upload")
}

/// HEAD answers with the same headers as GET but leaves the counter alone.
pub async fn download_file(
    State(state): State<AppState>,
    method: Method,
    Path(file_id): Path<String>,
) -> Result<Response> {
    let file_id = Uuid::parse_str(&file_id).map_err(|_| AppError::file_not_found())?;
    let download = if method == Method::HEAD {
        state.store.find_download(file_id).await?
    } else {
        state.store.record_download(file_id).await?
    };
    let Download {
        product,
        file,
        size,
    } = download.ok_or_else(AppError::file_not_found)?;

    if method != Method::HEAD {
        tracing::info!(
            "Serving download {} for product {} (downloads: {})",
            product.original_file_name,
            product.id,
            product.downloads
        );
    }

    let disposition = format!(
        "attachment; filename=\"{}\"",
        product.original_file_name.replace('"', "\\\"")
    );
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, OCTET_STREAM.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, size.to_string()),
        ],
        body,
    )
        .into_response())
}

pub async fn serve_upload(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response> {
    let relative = PathBuf::from(&path);
    if !relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return Err(AppError::file_not_found());
    }

    let full_path = state.config.uploads_dir.join(relative);
    let file = fs::File::open(&full_path)
        .await
        .map_err(|_| AppError::file_not_found())?;
    if !file.metadata().await?.is_file() {
        return Err(AppError::file_not_found());
    }

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [(header::CONTENT_TYPE, upload_content_type(&full_path))],
        body,
    )
        .into_response())
}

fn upload_content_type(path: &FsPath) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => OCTET_STREAM,
    }
}
