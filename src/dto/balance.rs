use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Balance of a single identity as returned by every balance route.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Identity the balance belongs to.
    pub id: Uuid,
    /// Current token balance.
    pub balance: i64,
}

/// Token amount carried by the set/give/take request bodies.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    /// Signed token amount; per-route rules decide what is accepted.
    pub amount: i64,
}

/// Query parameters of the deliberate-save admin route.
#[derive(Debug, Default, Deserialize)]
pub struct SaveParams {
    /// Move the previous balances file to a timestamped backup first.
    #[serde(default)]
    pub backup: bool,
}

/// Acknowledgement returned once a deliberate save has been persisted.
#[derive(Debug, Serialize)]
pub struct SaveResponse {
    /// Number of identities written to disk.
    pub entries: usize,
    /// Whether backup mode was used.
    pub backup: bool,
}
