mod pages;
mod snapshots;

pub use pages::{INDEX_DOCUMENT, Pages, StaticPage, render_template, script_json};
pub use snapshots::{SnapshotKind, SnapshotStore};
