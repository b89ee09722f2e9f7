//! defcheck: compile-checks parameterized configuration definitions.
//!
//! A definition (`define puppet_nonroot (String $user, ...) { ... }`) declares
//! the parameters it accepts. A declaration of it, with a title and a
//! parameter mapping, either compiles or fails with one of a small set of
//! reasons. [`compiler::check`] answers that question without applying
//! anything.
//!
//! ```rust
//! use defcheck::{check, Catalog, Invocation, Outcome};
//!
//! let catalog = Catalog::builtin().unwrap();
//! let invocation = Invocation::new("puppet_nonroot", "nra.puppet")
//!     .with_param("user", "bob")
//!     .with_param("puppet_master_fqdn", "puppet.fake")
//!     .with_param("challenge_password", "top_secret");
//! assert_eq!(check(&catalog, &invocation), Outcome::Compiled);
//! ```

pub use crate::catalog::Catalog;
pub use crate::compiler::{
    check, check_all, compile, CompiledResource, Failure, FailureReason, Outcome,
};
pub use crate::errors::{DefcheckError, DefcheckResult};
pub use crate::invocation::Invocation;
pub use crate::value::Value;

pub mod catalog;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod invocation;
pub mod schema;
pub mod suite;
pub mod value;
