//! Threshline sync: the authority/mirror wire protocol.
//!
//! Two sides share one configuration over an ordered, reliable message
//! stream with no shared memory:
//!
//! - the **authority** owns canonical state and is the only writer of ground
//!   truth; on session open it sends a full [`messages::Snapshot`], and it
//!   broadcasts canonical values back after every change;
//! - the **mirror** holds a shadow copy for rendering and optimistic editing,
//!   applies snapshots atomically, and re-derives the configured count from
//!   its own shadow store on every render tick rather than trusting any
//!   transmitted counter ([`mirror::MirrorShadow::reconcile`]).
//!
//! Point updates ([`messages::PointUpdate`]) are idempotent, carry an explicit
//! `(field kind, index)` address, and may arrive in either direction and in
//! any order relative to a snapshot; the per-tick reconciliation is what keeps
//! a stale update from regressing rendered state.
//!
//! This crate is transport-agnostic: messages encode to bytes via
//! [`messages::encode`]/[`messages::decode`] and the caller moves them. The
//! authority-side driver that owns watchers and persistence lives in
//! `threshline-runtime`.

pub mod apply;
pub mod errors;
pub mod messages;
pub mod mirror;

pub use apply::{apply_point_update, apply_snapshot, build_snapshot};
pub use errors::{SyncError, SyncResult};
pub use messages::{AuthorityMessage, FieldKind, FieldValue, MirrorMessage, PointUpdate, Snapshot};
pub use mirror::{MirrorShadow, RowRebuild};
