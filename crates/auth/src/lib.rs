//! `filmgate-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: the token
//! codec, the role policy and password hashing live here; bearer extraction,
//! revocation lookups and identity resolution are wired on top by the API
//! layer.

pub mod claims;
pub mod codec;
pub mod password;
pub mod policy;

pub use claims::TokenClaims;
pub use codec::{CodecConfig, DecodeError, EncodeError, TokenCodec, TokenKind};
pub use password::{hash_password, verify_password, PasswordError};
pub use policy::{PolicyError, RolePolicy, SUPERUSER_ROLE};
