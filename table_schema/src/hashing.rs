use std::hash::Hasher;

use crate::StateValue;

/// FNV-1a, 64-bit. Output depends only on the bytes written, so digests are
/// stable across builds, platforms and releases.
#[derive(Debug, Clone, Copy)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state ^= u64::from(*byte);
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }

    // Widths are pinned so digests match between 32 and 64-bit targets.
    fn write_usize(&mut self, value: usize) {
        self.write(&(value as u64).to_le_bytes());
    }

    fn write_i64(&mut self, value: i64) {
        self.write(&value.to_le_bytes());
    }
}

/// Deterministic 64-bit digest of a state tree, so replays can be compared
/// by digest alone.
pub fn digest_state(value: &StateValue) -> u64 {
    let mut hasher = FnvHasher::new();
    write_value(&mut hasher, value);
    hasher.finish()
}

/// Digest of an optional tree; an absent tree hashes differently from `Null`.
pub fn digest_optional(value: Option<&StateValue>) -> u64 {
    match value {
        Some(value) => digest_state(value),
        None => {
            let mut hasher = FnvHasher::new();
            hasher.write_u8(0xff);
            hasher.finish()
        }
    }
}

fn write_value<H: Hasher>(hasher: &mut H, value: &StateValue) {
    match value {
        StateValue::Null => hasher.write_u8(0),
        StateValue::Bool(flag) => {
            hasher.write_u8(1);
            hasher.write_u8(u8::from(*flag));
        }
        StateValue::Amount(amount) => {
            hasher.write_u8(2);
            hasher.write_i64(amount.raw());
        }
        StateValue::Text(text) => {
            hasher.write_u8(3);
            write_str(hasher, text);
        }
        StateValue::List(items) => {
            hasher.write_u8(4);
            hasher.write_usize(items.len());
            for item in items {
                write_value(hasher, item);
            }
        }
        StateValue::Map(entries) => {
            hasher.write_u8(5);
            hasher.write_usize(entries.len());
            for (key, item) in entries {
                write_str(hasher, key);
                write_value(hasher, item);
            }
        }
    }
}

fn write_str<H: Hasher>(hasher: &mut H, text: &str) {
    hasher.write_usize(text.len());
    hasher.write(text.as_bytes());
}
