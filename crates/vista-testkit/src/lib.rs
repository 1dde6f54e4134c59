//! # VISTA Testkit
//!
//! Testing utilities for VISTA.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed-seed credentials and squitters with stable bytes
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: An authority over a memory store on a manual clock
//!
//! ## Golden Vectors
//!
//! ```rust
//! use vista_testkit::vectors::{all_vectors, credential_from_vector};
//!
//! for vector in all_vectors() {
//!     let credential = credential_from_vector(&vector);
//!     println!("{}: {}", vector.name, credential.id().to_hex());
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use vista_testkit::generators::{SquitterParams, squitter_from_params};
//!
//! proptest! {
//!     #[test]
//!     fn squitter_bytes_are_deterministic(params: SquitterParams) {
//!         let m1 = squitter_from_params(&params);
//!         let m2 = squitter_from_params(&params);
//!         prop_assert_eq!(m1.to_bytes(), m2.to_bytes());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use vista_testkit::fixtures::AuthorityFixture;
//!
//! let fx = AuthorityFixture::new();
//! let auth = fx.authorize("veh-42", 600).await;
//! fx.clock.advance_secs(601);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{credential_for, fast_config, fleet, identity, squitter, AuthorityFixture};
pub use generators::{
    credential_from_params, squitter_from_params, CredentialParams, SquitterParams,
};
pub use vectors::{
    all_vectors, credential_from_vector, squitter_from_vector, squitter_wire_hex, verify_all_vectors,
    GoldenVector,
};
