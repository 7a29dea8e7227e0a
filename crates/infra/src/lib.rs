//! `filmgate-infra` — storage adapters for the identity service.
//!
//! Two seams live here, each as a trait with a production backend and an
//! in-memory twin for tests:
//! - the token registry (Redis) tracking current token pairs and revoked
//!   token identifiers;
//! - the identity store (Postgres) holding users, roles and login history.

pub mod identity;
pub mod registry;

pub use identity::{
    DeviceKind, HistoryPage, IdentityStore, InMemoryIdentityStore, LoginRecord, NewUser,
    PostgresIdentityStore, RoleRecord, StoreError, UserRecord, UserUpdate,
};
pub use registry::{
    InMemoryTokenRegistry, RedisTokenRegistry, RegistryError, TokenRegistry, TokenTtls,
};
