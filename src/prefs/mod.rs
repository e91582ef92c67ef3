//! Persisted user preferences (contrast mode and text scale)

mod store;

pub use store::{
    ContrastMode, FileStore, KeyValueStore, MemoryStore, PreferenceStore, Preferences,
    StoreError, CONTRAST_KEY, TEXT_SIZE_KEY,
};
