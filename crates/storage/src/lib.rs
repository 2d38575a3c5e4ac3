#![forbid(unsafe_code)]

mod store;

pub use store::{
    InfoStorage, LEGACY_PAYLOAD_KEY, LEGACY_PROGRESS_KEY, SqliteStore, StoreError,
};
