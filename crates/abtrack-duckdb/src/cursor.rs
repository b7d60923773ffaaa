//! Continuation tokens for keyset pagination over `(ts, id)`.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPayload {
    pub ts: String,
    pub id: String,
}

pub fn encode_cursor(ts: &str, id: &str) -> Result<String> {
    let payload = CursorPayload {
        ts: ts.to_string(),
        id: id.to_string(),
    };
    let json = serde_json::to_vec(&payload)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub fn decode_cursor(cursor: &str) -> Result<CursorPayload> {
    let decoded = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| anyhow!("invalid continuation token"))?;
    serde_json::from_slice::<CursorPayload>(&decoded)
        .map_err(|_| anyhow!("invalid continuation token"))
}
