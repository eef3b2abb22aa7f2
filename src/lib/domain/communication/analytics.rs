//! Delivery analytics

mod event;
mod recorder;
mod tracking;

pub use event::{AnalyticsEvent, EventMetadata, EventType};
pub use recorder::{AnalyticsRecorder, EmailStats};
pub use tracking::{add_click_tracking, add_open_tracking, TrackingConfig};
