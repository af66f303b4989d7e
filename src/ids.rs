use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

pub trait IdGenerator {
    fn generate(&self, prefix: &str) -> String;
}

/// `<prefix>_<random><seq>`: five random base36 chars from a v4 UUID, then a
/// per-generator sequence so two calls in one process never collide.
#[derive(Debug, Default)]
pub struct PrefixedIds {
    seq: AtomicU64,
}

impl PrefixedIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for PrefixedIds {
    fn generate(&self, prefix: &str) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let random = to_base36(Uuid::new_v4().as_u128());
        let random: String = random.chars().take(5).collect();
        format!("{}_{}{}", prefix, random, to_base36(n as u128))
    }
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
