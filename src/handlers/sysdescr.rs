use axum::Json;

use crate::models::*;
use crate::sysdescr::decode_os;

use super::ApiError;

/// Decode an SNMP sysDescr string into OS facts
pub async fn parse_sysdescr(
    Json(req): Json<SysDescrRequest>,
) -> Result<Json<SysDescrResponse>, ApiError> {
    if req.sysdescr.trim().is_empty() {
        return Err(ApiError::bad_request("sysdescr is required"));
    }
    Ok(Json(SysDescrResponse {
        ansible_facts: decode_os(&req.sysdescr),
    }))
}
