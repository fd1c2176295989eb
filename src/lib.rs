// ============================================================================
// order_fetch - N+1-aware read path for the order aggregate
// ============================================================================
//
// - domain:     Order, Customer and their value objects
// - fetching:   criteria, fetch plans, store boundary, unit of work
// - repository: the four fetch strategies behind one facade
// - metrics:    Prometheus counters for round trips and cache behaviour
// - config:     layered configuration (defaults, TOML, environment)
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod fetching;
pub mod metrics;
pub mod repository;
