//! Per-tenant authorization endpoint resolution.
use std::collections::BTreeMap;

use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use thiserror::Error;

use crate::core::protocol::HDR_ADDON_CONTEXT;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    #[error("Missing x-addon-context header")]
    MissingContext,

    #[error("Invalid x-addon-context header")]
    InvalidContext,

    #[error("Addon UUID not found in x-addon-context header")]
    MissingAddonId,

    #[error("No integration URL found for addon UUID: {0}")]
    UnknownAddon(String),
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AddonContext {
    #[serde(rename = "addonUUID")]
    addon_uuid: String,
}

/// Extract the addon identifier from the platform injected context header.
pub fn addon_id_from_headers(headers: &HeaderMap) -> Result<String, TenantError> {
    let encoded = headers
        .get(HDR_ADDON_CONTEXT)
        .ok_or(TenantError::MissingContext)?
        .to_str()
        .map_err(|_| TenantError::InvalidContext)?;

    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| TenantError::InvalidContext)?;
    let context: AddonContext =
        serde_json::from_slice(&decoded).map_err(|_| TenantError::InvalidContext)?;

    if context.addon_uuid.is_empty() {
        return Err(TenantError::MissingAddonId);
    }
    Ok(context.addon_uuid)
}

/// Find the authorization URL registered for `addon_id`.
///
/// A URL belongs to the addon when it contains the path segment `/addons/<id>`
/// followed by `/` or the end of the value. Candidates are checked in name order.
pub fn resolve_tenant_url<'a>(
    tenant_urls: &'a BTreeMap<String, String>,
    addon_id: &str,
) -> Result<&'a str, TenantError> {
    let segment = format!("/addons/{addon_id}");

    tenant_urls
        .values()
        .find(|url| {
            url.match_indices(segment.as_str()).any(|(start, _)| {
                let rest = &url[start + segment.len()..];
                rest.is_empty() || rest.starts_with('/')
            })
        })
        .map(String::as_str)
        .ok_or_else(|| TenantError::UnknownAddon(addon_id.to_string()))
}

/// Resolve the authorization base URL for the tenant a request belongs to.
pub fn resolve_auth_base_url<'a>(
    tenant_urls: &'a BTreeMap<String, String>,
    headers: &HeaderMap,
) -> Result<&'a str, TenantError> {
    let addon_id = addon_id_from_headers(headers)?;
    resolve_tenant_url(tenant_urls, &addon_id)
}
