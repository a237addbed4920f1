mod pages;
mod snapshots;
mod status;
mod util;

pub use pages::{cursor, data_status, serve_page, spa_fallback, static_asset};
pub use snapshots::{push_snapshot, serve_snapshot_file, serve_snapshot_timestamp};
pub use status::{process_status, status};
