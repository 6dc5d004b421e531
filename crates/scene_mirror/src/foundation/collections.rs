//! Specialized collection types

pub use slotmap::{SlotMap, DefaultKey, Key, KeyData};

/// Handle-based map using slot map for stable, generational references
pub type HandleMap<T> = SlotMap<DefaultKey, T>;

/// Pack a slot map key into an opaque integer handle
pub fn key_to_raw(key: DefaultKey) -> u64 {
    key.data().as_ffi()
}

/// Recover a slot map key from an opaque integer handle
pub fn raw_to_key(raw: u64) -> DefaultKey {
    KeyData::from_ffi(raw).into()
}
