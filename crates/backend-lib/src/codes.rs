// ============================
// crates/backend-lib/src/codes.rs
// ============================
//! Join-code generation and the cross-session uniqueness registry.
//!
//! The set of currently-live codes is the only state shared across
//! sessions; it has its own lock, held only for the check-and-reserve.
use crate::error::AppError;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;

/// Uppercase letters and digits, minus the ambiguous 0/O/I/1/L.
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
/// Join codes are short enough to type from a phone.
pub const CODE_LEN: usize = 6;

/// Registry of join codes belonging to non-ended sessions.
pub struct CodeRegistry {
    live: Mutex<HashSet<String>>,
}

impl CodeRegistry {
    pub fn new() -> Self {
        CodeRegistry {
            live: Mutex::new(HashSet::new()),
        }
    }

    /// Reserve a fresh code unique among live sessions. Collisions
    /// re-roll up to `attempts` times before `CodeSpaceExhausted`;
    /// with 31^6 codes against a handful of concurrent sessions the
    /// cap is practically unreachable.
    pub fn reserve(&self, attempts: u32) -> Result<String, AppError> {
        let mut live = self.live.lock();
        for _ in 0..attempts {
            let code = generate_code();
            if live.insert(code.clone()) {
                return Ok(code);
            }
        }
        Err(AppError::CodeSpaceExhausted)
    }

    /// Release a code when its session ends. Idempotent.
    pub fn release(&self, code: &str) {
        self.live.lock().remove(code);
    }

    pub fn is_live(&self, code: &str) -> bool {
        self.live.lock().contains(code)
    }
}

impl Default for CodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}
