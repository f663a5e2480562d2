//! Simulated identifiers and figures
//!
//! Block heights, fees, proof timings and similar values are all synthetic.
//! Components draw them through [`FakeDataGenerator`] so tests can swap in
//! a seeded generator and get reproducible output.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use uuid::Uuid;

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub trait FakeDataGenerator: Send + Sync {
    /// Uniform integer in `[low, high)`
    fn int_in(&self, low: u64, high: u64) -> u64;

    /// Uniform float in `[low, high)`
    fn float_in(&self, low: f64, high: f64) -> f64;

    fn fill_bytes(&self, buf: &mut [u8]);

    fn bytes(&self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.fill_bytes(&mut buf);
        buf
    }

    fn hex(&self, byte_len: usize) -> String {
        hex::encode(self.bytes(byte_len))
    }

    fn uuid(&self) -> Uuid {
        let mut raw = [0u8; 16];
        self.fill_bytes(&mut raw);
        uuid::Builder::from_random_bytes(raw).into_uuid()
    }

    fn alphanumeric(&self, len: usize) -> String {
        (0..len)
            .map(|_| ALPHANUMERIC[self.int_in(0, ALPHANUMERIC.len() as u64) as usize] as char)
            .collect()
    }

    /// 64-char hex string tied to `seed`. Same seed, same hash.
    fn derived_hash(&self, seed: &str) -> String {
        hex::encode(Sha256::digest(seed.as_bytes()))
    }

    /// 64-char hex transaction hash
    fn tx_hash(&self) -> String {
        self.hex(32)
    }

    fn block_height(&self) -> u64 {
        self.int_in(2_800_000, 2_900_000)
    }

    fn slot_number(&self) -> u64 {
        self.int_in(85_000_000, 86_000_000)
    }

    fn epoch(&self) -> u64 {
        self.int_in(520, 530)
    }

    /// `base + [0, spread)`
    fn jitter(&self, base: u32, spread: u32) -> u32 {
        base + self.int_in(0, u64::from(spread.max(1))) as u32
    }
}

/// Thread-local OS-seeded randomness
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomFakeData;

impl FakeDataGenerator for RandomFakeData {
    fn int_in(&self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        rand::thread_rng().gen_range(low..high)
    }

    fn float_in(&self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        rand::thread_rng().gen_range(low..high)
    }

    fn fill_bytes(&self, buf: &mut [u8]) {
        rand::thread_rng().fill_bytes(buf);
    }
}

/// Reproducible sequence from a fixed seed
pub struct SeededFakeData {
    rng: Mutex<StdRng>,
}

impl SeededFakeData {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A poisoned lock still holds a usable rng
        let mut guard = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl FakeDataGenerator for SeededFakeData {
    fn int_in(&self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        self.with_rng(|rng| rng.gen_range(low..high))
    }

    fn float_in(&self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.with_rng(|rng| rng.gen_range(low..high))
    }

    fn fill_bytes(&self, buf: &mut [u8]) {
        self.with_rng(|rng| rng.fill_bytes(buf));
    }
}
