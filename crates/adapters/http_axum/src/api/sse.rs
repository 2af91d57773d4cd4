//! Server-sent event stream for live updates.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/events/stream` — SSE stream of broadcast events.
///
/// The subscription is opened *before* the status snapshot is taken, so
/// nothing published in between is lost; the snapshot goes out as the
/// first frame (`event: status`) and live events follow as JSON `data:`
/// frames. A lagged subscriber loses only its own frames.
///
/// # Errors
///
/// `503` when the control loop is gone.
pub async fn stream(
    State(state): State<AppState>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>, ApiError>
{
    let event_rx = state.event_bus.subscribe();
    let status = state.control.status().await?;
    let snapshot = serde_json::to_string(&status).unwrap_or_default();
    let first = tokio_stream::once(Ok(Event::default().event("status").data(snapshot)));

    let live = BroadcastStream::new(event_rx).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(err) => {
                tracing::warn!(%err, "failed to serialize event for SSE stream");
                None
            }
        },
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE subscriber lagged, some events were dropped");
            None
        }
    });

    Ok(Sse::new(first.chain(live)).keep_alive(KeepAlive::default()))
}
