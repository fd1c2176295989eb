use super::value_objects::Address;

// ============================================================================
// Customer - referenced by orders, never owned by them
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub address: Address,
}

impl Customer {
    pub fn new(id: i64, name: impl Into<String>, address: Address) -> Self {
        Self {
            id,
            name: name.into(),
            address,
        }
    }
}
