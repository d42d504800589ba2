use crate::models::Device;
use crate::services::pairing::{self, PairingError};
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

#[derive(Serialize)]
pub struct RedeemResponse {
    pub device: Device,
    // The only time the secret leaves the server; the device stores it.
    pub secret_key: String,
}

/// Public endpoint an unpaired device calls with the code shown in the
/// dashboard. One successful redemption per code.
pub async fn redeem(
    State(state): State<AppState>,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>, StatusCode> {
    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let now = chrono::Utc::now().naive_utc();
    let code = req.code.trim().to_uppercase();

    match pairing::redeem(&mut conn, &code, now) {
        Ok(device) => {
            tracing::info!("Device {} paired via code redemption", device.id);
            let secret_key = device.secret_key.clone();
            Ok(Json(RedeemResponse { device, secret_key }))
        }
        Err(PairingError::InvalidCode) => {
            tracing::warn!("Rejected invalid pairing code");
            Err(StatusCode::UNPROCESSABLE_ENTITY)
        }
        Err(PairingError::Database(e)) => {
            tracing::error!("Pairing redemption failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
