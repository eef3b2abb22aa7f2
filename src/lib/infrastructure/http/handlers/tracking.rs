//! Open and click tracking endpoints
//!
//! These are reached from recipients' mail clients, so they never require the
//! webhook token and never fail loudly.

pub mod click;
pub mod open;
