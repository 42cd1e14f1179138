//! # Shared Types Crate
//!
//! This crate contains all cross-service domain entities, the denormalized
//! replica stores, the signed access-token scheme, and the error taxonomy.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-service types are defined here.
//! - **Event-Carried Authorization**: Events embed a signed `AccessToken`;
//!   consumers verify it against the shared secret and their local replica
//!   instead of calling back to the authority service.
//! - **Allow-Listed Patches**: Field updates travel as closed patch structs
//!   (`UserPatch`, `ProductPatch`) with `deny_unknown_fields`, never as
//!   free-form maps.

pub mod entities;
pub mod errors;
pub mod replica;
pub mod security;

pub use entities::*;
pub use errors::MarketError;
pub use replica::{ProductReplicaStore, UserReplicaStore};
pub use security::{AccessToken, TokenSigner, TokenVerifier};
