//! HTTP transport over `JudgeService`
//!
//! - `POST /submissions`: submit, 202 with the queued snapshot
//! - `GET /submissions/{id}`: current snapshot
//! - `GET /submissions/{id}/events`: SSE progress stream
//! - `GET /languages`: canonical language names
//!
//! Handlers only translate between HTTP and the service; no judging logic lives here.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream, StreamExt};
use serde_json::json;
use tracing::{debug, error};

use crate::core::{CreateSubmissionRequest, Event, JudgeError, SubmissionView};
use crate::service::JudgeService;
use crate::store::Subscription;

#[derive(Clone)]
struct AppState {
    service: Arc<JudgeService>,
    languages: Arc<Vec<&'static str>>,
}

pub fn router(service: Arc<JudgeService>, languages: Vec<&'static str>) -> Router {
    let state = AppState {
        service,
        languages: Arc::new(languages),
    };

    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route("/languages", get(list_languages))
        .route("/submissions", post(create_submission))
        .route("/submissions/{id}", get(get_submission))
        .route("/submissions/{id}/events", get(submission_events))
        .with_state(state)
}

/// `JudgeError` rendered as a JSON error body
struct ApiError(JudgeError);

impl From<JudgeError> for ApiError {
    fn from(e: JudgeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            JudgeError::NotFound(_) => StatusCode::NOT_FOUND,
            JudgeError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn list_languages(State(state): State<AppState>) -> Json<Vec<&'static str>> {
    Json(state.languages.as_ref().clone())
}

async fn create_submission(
    State(state): State<AppState>,
    Json(request): Json<CreateSubmissionRequest>,
) -> Result<(StatusCode, Json<SubmissionView>), ApiError> {
    let submission = state.service.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmissionView::from(&submission))))
}

async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionView>, ApiError> {
    let submission = state.service.get(&id)?;
    Ok(Json(SubmissionView::from(&submission)))
}

enum Feed {
    Live(Subscription),
    Finished,
}

async fn submission_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let subscription = state.service.subscribe(&id)?;
    let current = state.service.get(&id)?;
    debug!("SSE client connected to submission {}", id);

    let connected = SseEvent::default()
        .event("connected")
        .data(json!({ "submission_id": id }).to_string());
    let snapshot = status_frame(&Event::from_submission(&current));

    // A finished submission is fully described by the snapshot
    let feed = if current.status.is_terminal() {
        Feed::Finished
    } else {
        Feed::Live(subscription)
    };

    let service = state.service;
    let updates = stream::unfold(feed, move |feed| {
        let service = Arc::clone(&service);
        async move {
            let Feed::Live(mut subscription) = feed else {
                return None;
            };

            match subscription.recv().await {
                Some(event) => {
                    let next = if event.is_terminal() {
                        Feed::Finished
                    } else {
                        Feed::Live(subscription)
                    };
                    Some((status_frame(&event), next))
                }
                // Stream closed without a terminal event: report the stored state instead
                None => match service.get(subscription.submission_id()) {
                    Ok(current) => Some((
                        status_frame(&Event::from_submission(&current)),
                        Feed::Finished,
                    )),
                    Err(e) => {
                        error!("Lost submission while streaming: {}", e);
                        None
                    }
                },
            }
        }
    });

    let frames = stream::iter([connected, snapshot])
        .chain(updates)
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(frames).keep_alive(KeepAlive::default()))
}

fn status_frame(event: &Event) -> SseEvent {
    match SseEvent::default().event("status").json_data(event) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            SseEvent::default()
                .event("error")
                .data(json!({ "error": e.to_string() }).to_string())
        }
    }
}
