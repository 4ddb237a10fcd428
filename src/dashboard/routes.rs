//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is the shared `SnapshotPublisher`;
//! handlers take their `Arc` copy of the snapshot and release the lock
//! before serializing.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::engine::publisher::SnapshotPublisher;
use crate::types::{CycleSnapshot, SnapshotMetadata};

pub type AppState = Arc<SnapshotPublisher>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// One table row on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct OpportunityRow {
    pub instrument: String,
    pub source: String,
    pub funding_rate: f64,
    pub price: String,
    pub annualized_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataResponse {
    pub opportunities: Vec<OpportunityRow>,
    pub metadata: SnapshotMetadata,
}

impl From<&CycleSnapshot> for DataResponse {
    fn from(snap: &CycleSnapshot) -> Self {
        Self {
            opportunities: snap
                .opportunities
                .iter()
                .map(|o| OpportunityRow {
                    instrument: o.instrument.clone(),
                    source: o.source.clone(),
                    funding_rate: o.rate,
                    price: o.price_display.clone(),
                    annualized_rate: o.annualized_rate,
                })
                .collect(),
            metadata: snap.metadata.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/data
pub async fn get_data(State(state): State<AppState>) -> Json<DataResponse> {
    let snapshot = state.latest().await;
    Json(DataResponse::from(&*snapshot))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
