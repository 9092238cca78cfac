//! String interning side-table: `hash -> (address, text)` (spec §4.1).

use super::Address;
use rustc_hash::FxHashMap;

/// Buckets by hash to stay correct under a DJB2 collision: two distinct
/// strings sharing a hash must not shadow one another's pool entry.
#[derive(Debug, Default)]
pub struct StringPool {
    entries: FxHashMap<u32, Vec<(Address, String)>>,
}

impl StringPool {
    pub fn lookup(&self, hash: u32, text: &str) -> Option<Address> {
        self.entries
            .get(&hash)?
            .iter()
            .find(|(_, stored)| stored == text)
            .map(|(addr, _)| *addr)
    }

    pub fn insert(&mut self, hash: u32, addr: Address, text: String) {
        self.entries.entry(hash).or_default().push((addr, text));
    }

    pub fn text_for(&self, hash: u32, addr: Address) -> Option<&str> {
        self.entries
            .get(&hash)?
            .iter()
            .find(|(stored_addr, _)| *stored_addr == addr)
            .map(|(_, text)| text.as_str())
    }

    pub fn remove(&mut self, hash: u32, addr: Address) {
        if let Some(bucket) = self.entries.get_mut(&hash) {
            bucket.retain(|(stored_addr, _)| *stored_addr != addr);
            if bucket.is_empty() {
                self.entries.remove(&hash);
            }
        }
    }
}

/// DJB2, folded to 32-bit unsigned: `hash = ((hash << 5) + hash) + ch`.
pub fn djb2(text: &str) -> u32 {
    let mut hash: u32 = 5381;
    for byte in text.bytes() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_add(hash)
            .wrapping_add(byte as u32);
    }
    hash
}
