//! Aggregate exports: every session as JSON, and the raw CSV log

use async_stream::try_stream;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::Stream;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::ApiError;
use crate::store::Session;
use crate::AppState;

const CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub sessions: Vec<Session>,
}

/// GET /api/results.json
pub async fn results_json(State(state): State<AppState>) -> Result<Json<ResultsResponse>, ApiError> {
    let sessions = state.store.results_json().await?;
    Ok(Json(ResultsResponse { sessions }))
}

/// GET /api/results.csv
///
/// Streams the CSV file verbatim, up to its length when the request arrived.
pub async fn results_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let file = state.store.results_csv().await?;
    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        Body::from_stream(file_chunks(file)),
    )
        .into_response())
}

fn file_chunks<R>(mut file: R) -> impl Stream<Item = std::io::Result<Bytes>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    try_stream! {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            yield Bytes::copy_from_slice(&buf[..n]);
        }
    }
}
