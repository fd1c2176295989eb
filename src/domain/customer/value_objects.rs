use serde::{Deserialize, Serialize};

// ============================================================================
// Customer Value Objects
// ============================================================================

/// Postal address, shared by customers and deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub zip: String,
}

impl Address {
    pub fn new(line1: impl Into<String>, line2: Option<&str>, zip: impl Into<String>) -> Self {
        Self {
            line1: line1.into(),
            line2: line2.map(str::to_string),
            zip: zip.into(),
        }
    }
}
