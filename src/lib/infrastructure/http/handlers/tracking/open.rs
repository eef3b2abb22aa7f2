//! Open-tracking pixel

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    domain::communication::{
        analytics::{AnalyticsEvent, EventMetadata, EventType},
        dispatcher::EmailDispatcher,
        notifications::QuoteNotifier,
        suppressions::SuppressionService,
    },
    infrastructure::http::state::AppState,
};

/// A transparent 1x1 GIF
pub const PIXEL: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// Records an open and returns the pixel
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
    Path(message_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    if state.tracking.is_some() {
        let device = headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        debug!(message_id = %message_id, "email opened");

        state
            .analytics
            .record(
                AnalyticsEvent::new(&message_id, EventType::Opened).with_metadata(
                    EventMetadata::Engagement {
                        device,
                        location: None,
                        url: None,
                    },
                ),
            )
            .await;
    }

    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
        ],
        PIXEL,
    )
}
