//! Service layer for web detection.
//!
//! Services own the flows; they take their collaborators (repository,
//! annotation client, storage settings) at construction and emit events or
//! return typed results, leaving presentation to the CLI and server.

pub mod backfill;
pub mod detect;
pub mod normalize;

#[cfg(test)]
pub(crate) mod test_support;

pub use backfill::{BackfillDriver, BackfillError, BackfillEvent, BackfillSummary, SkipReason};
pub use detect::{
    CallerIdentity, DetectService, DetectWebRequest, DetectWebResponse, DetectionData,
    ImageTarget,
};
pub use normalize::normalize;
