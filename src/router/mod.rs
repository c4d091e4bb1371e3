//! # Router Module
//!
//! Path matching and route resolution: manifest keys are compiled into
//! anchored regex patterns once per manifest snapshot, and incoming paths
//! are tested against them in manifest order.
//!
//! ## Route derivation
//!
//! A manifest key structurally mirrors the page's file path. Derivation
//! drops a trailing `index` segment and turns `_name` segments into named
//! parameters:
//!
//! | manifest key        | route               |
//! |---------------------|---------------------|
//! | `index`             | `/`                 |
//! | `docs/index`        | `/docs`             |
//! | `blog/_id`          | `/blog/:id`         |
//! | `docs/_section/_page` | `/docs/:section/:page` |
//!
//! ## Matching semantics
//!
//! Exact match only (no prefixes), case-insensitive, trailing-slash
//! strict. The first pattern that matches wins — declaration order in the
//! manifest is the only precedence rule. Parameter values are strictly
//! percent-decoded, and a malformed escape anywhere in the path is
//! reported as an error rather than treated as a no-match.

mod core;

pub use core::{
    derive_route, percent_decode_strict, ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS,
};
