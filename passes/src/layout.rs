//! Storage layout of the `passRequests` tree.
//!
//! Two layouts coexist:
//!
//! * legacy  `passRequests/{id}`
//! * current `passRequests/{sanitized_requester_id}/{id}`
//!
//! Every read merges both. New requests are always written in the current
//! layout; updates and deletes go wherever the record was found.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::model::PassRequest;

pub const REQUESTS_ROOT: &str = "passRequests";

static RESERVED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.#$\[\]/]").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Legacy,
    Current,
}

/// A request together with where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRequest {
    pub path: String,
    pub layout: Layout,
    pub request: PassRequest,
}

/// Replace characters the store reserves in keys.
pub fn sanitize_key(raw: &str) -> String {
    RESERVED.replace_all(raw.trim(), "_").into_owned()
}

pub fn legacy_path(id: &str) -> String {
    format!("{}/{}", REQUESTS_ROOT, id)
}

pub fn requester_folder(requester_id: &str) -> String {
    format!("{}/{}", REQUESTS_ROOT, sanitize_key(requester_id))
}

pub fn current_path(requester_id: &str, id: &str) -> String {
    format!("{}/{}", requester_folder(requester_id), id)
}

/// Which layout a document path belongs to, and the request key it holds.
pub fn classify(path: &str) -> Option<(Layout, &str)> {
    let rest = path.strip_prefix(REQUESTS_ROOT)?.strip_prefix('/')?;
    let segments: Vec<&str> = rest.split('/').collect();
    match segments.as_slice() {
        [id] if !id.is_empty() => Some((Layout::Legacy, id)),
        [folder, id] if !folder.is_empty() && !id.is_empty() => Some((Layout::Current, id)),
        _ => None,
    }
}

/// Normalise a raw document. A record without an id takes its storage key.
pub fn decode(path: &str, value: Value) -> Option<StoredRequest> {
    let (layout, key) = classify(path)?;
    match serde_json::from_value::<PassRequest>(value) {
        Ok(mut request) => {
            if request.id.is_empty() {
                request.id = key.to_string();
            }
            Some(StoredRequest {
                path: path.to_string(),
                layout,
                request,
            })
        }
        Err(e) => {
            warn!(%path, error = %e, "skipping unreadable pass request");
            None
        }
    }
}

/// Decode every document under the root and merge the two layouts. When an
/// id exists in both, the current-layout copy wins.
pub fn merge<I>(documents: I) -> Vec<StoredRequest>
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut by_id: HashMap<String, StoredRequest> = HashMap::new();
    for (path, value) in documents {
        let Some(stored) = decode(&path, value) else {
            continue;
        };
        match by_id.get(&stored.request.id) {
            Some(existing)
                if existing.layout == Layout::Current && stored.layout == Layout::Legacy => {}
            _ => {
                by_id.insert(stored.request.id.clone(), stored);
            }
        }
    }
    let mut merged: Vec<StoredRequest> = by_id.into_values().collect();
    merged.sort_by(|a, b| {
        b.request
            .created_at
            .cmp(&a.request.created_at)
            .then_with(|| a.request.id.cmp(&b.request.id))
    });
    merged
}
