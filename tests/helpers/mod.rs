//! Test helper utilities for poller scenarios

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use batch_edit_worker::services::poller::Poller;
use batch_edit_worker::services::transport::ImageTransport;
use batch_edit_worker::testing::{MemoryBlobStore, MemoryJobStore};

pub const CDN_BASE: &str = "https://cdn.test/public";

type ImageMap = Arc<HashMap<String, Vec<u8>>>;

/// Serve `bytes` at `/images/{name}`; everything else is a 404.
/// Returns the server's base URL.
pub async fn spawn_image_server(images: Vec<(&str, Vec<u8>)>) -> String {
    let images: ImageMap = Arc::new(
        images
            .into_iter()
            .map(|(name, bytes)| (name.to_string(), bytes))
            .collect(),
    );

    let app = Router::new()
        .route("/images/{name}", get(serve_image))
        .with_state(images);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind image server");
    let addr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Image server error");
    });

    format!("http://{}", addr)
}

async fn serve_image(State(images): State<ImageMap>, Path(name): Path<String>) -> Response {
    match images.get(&name) {
        Some(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .expect("PNG encoding failed");
    buf.into_inner()
}

/// The 2x2 red/green/blue/gray image used across scenarios.
pub fn primaries_2x2() -> RgbImage {
    let pixels = [[100, 0, 0], [0, 100, 0], [0, 0, 100], [50, 50, 50]];
    RgbImage::from_fn(2, 2, |x, y| Rgb(pixels[(y * 2 + x) as usize]))
}

pub struct Harness {
    pub store: Arc<MemoryJobStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub poller: Poller,
}

pub fn harness(strict_settings: bool) -> Harness {
    let store = Arc::new(MemoryJobStore::new());
    let blobs = Arc::new(MemoryBlobStore::new(CDN_BASE));
    let transport = ImageTransport::new(blobs.clone(), "edited", 92, Duration::from_secs(5))
        .expect("Failed to build transport");
    let poller = Poller::new(store.clone(), transport, Duration::from_millis(20))
        .with_strict_settings(strict_settings);

    Harness {
        store,
        blobs,
        poller,
    }
}
