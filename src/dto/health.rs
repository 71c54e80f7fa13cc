use serde::Serialize;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status, currently always `"ok"`.
    pub status: String,
    /// Number of identities tracked by the ledger.
    pub entries: usize,
    /// Whether unpersisted mutations exist.
    pub dirty: bool,
}

impl HealthResponse {
    /// Build the health payload from current ledger figures.
    pub fn ok(entries: usize, dirty: bool) -> Self {
        Self {
            status: "ok".to_string(),
            entries,
            dirty,
        }
    }
}
