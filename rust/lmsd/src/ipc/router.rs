use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const FAMILIES: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::auth::try_handle,
    handlers::courses::try_handle,
    handlers::tracking::try_handle,
    handlers::orders::try_handle,
    handlers::progress::try_handle,
    handlers::assignments::try_handle,
    handlers::ratings::try_handle,
    handlers::commissions::try_handle,
    handlers::wallet::try_handle,
    handlers::refunds::try_handle,
    handlers::certificates::try_handle,
    handlers::currencies::try_handle,
    handlers::settings::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, actor = ?req.actor, "request");
    for try_handle in FAMILIES {
        if let Some(resp) = try_handle(state, &req) {
            return resp;
        }
    }

    tracing::warn!(id = %req.id, method = %req.method, "unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
