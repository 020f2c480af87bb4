//! HyperLogLog running state
//!
//! While a row is buffered its HLL cell points at `HLL_REGISTERS` dense
//! one-byte registers in the arena. Finalize turns them into one of the
//! compact serialized forms below.
//!
//! ## Serialized Forms
//! ```text
//! Empty:  [0]
//! Sparse: [1][count: u16][(index: u16, rank: u8) * count]
//! Full:   [2][registers: HLL_REGISTERS bytes]
//! ```

use xxhash_rust::xxh64::xxh64;

use crate::error::{Result, TabletError};

/// Bits of the hash used to select a register
pub const HLL_PRECISION: u32 = 10;

/// Number of dense registers per sketch
pub const HLL_REGISTERS: usize = 1 << HLL_PRECISION;

const HLL_SEED: u64 = 0;

const TYPE_EMPTY: u8 = 0;
const TYPE_SPARSE: u8 = 1;
const TYPE_FULL: u8 = 2;

/// Sparse entries cost 3 bytes, so past this point full is smaller
const SPARSE_LIMIT: usize = HLL_REGISTERS / 3;

/// Largest rank a register can hold: every remaining hash bit was zero
pub const HLL_MAX_RANK: u8 = (64 - HLL_PRECISION + 1) as u8;

/// Owned sketch, used to read finalized cells back
#[derive(Debug, Clone, PartialEq)]
pub struct HyperLogLog {
    registers: Vec<u8>,
}

impl Default for HyperLogLog {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperLogLog {
    pub fn new() -> Self {
        Self {
            registers: vec![0; HLL_REGISTERS],
        }
    }

    /// Hash a value into the sketch
    pub fn insert(&mut self, value: &[u8]) {
        update_registers(&mut self.registers, hash_value(value));
    }

    pub fn merge(&mut self, other: &HyperLogLog) {
        merge_registers(&mut self.registers, &other.registers);
    }

    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    pub fn serialize(&self) -> Vec<u8> {
        serialize_registers(&self.registers)
    }

    /// Parse any of the serialized forms
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let corrupt = |msg: &str| TabletError::Serialization(format!("invalid HLL: {}", msg));
        let (&kind, body) = bytes.split_first().ok_or_else(|| corrupt("empty buffer"))?;
        let mut registers = vec![0u8; HLL_REGISTERS];

        match kind {
            TYPE_EMPTY => {}
            TYPE_SPARSE => {
                if body.len() < 2 {
                    return Err(corrupt("truncated sparse header"));
                }
                let count = u16::from_le_bytes([body[0], body[1]]) as usize;
                let entries = &body[2..];
                if entries.len() != count * 3 {
                    return Err(corrupt("sparse length mismatch"));
                }
                for entry in entries.chunks_exact(3) {
                    let idx = u16::from_le_bytes([entry[0], entry[1]]) as usize;
                    if idx >= HLL_REGISTERS {
                        return Err(corrupt("register index out of range"));
                    }
                    registers[idx] = entry[2];
                }
                if registers.iter().any(|&r| r > HLL_MAX_RANK) {
                    return Err(corrupt("register rank out of range"));
                }
            }
            TYPE_FULL => {
                if body.len() != HLL_REGISTERS {
                    return Err(corrupt("full length mismatch"));
                }
                if body.iter().any(|&r| r > HLL_MAX_RANK) {
                    return Err(corrupt("register rank out of range"));
                }
                registers.copy_from_slice(body);
            }
            other => return Err(corrupt(&format!("unknown type {}", other))),
        }

        Ok(Self { registers })
    }

    /// Approximate number of distinct values inserted
    pub fn estimate(&self) -> u64 {
        estimate_registers(&self.registers)
    }
}

pub(crate) fn hash_value(value: &[u8]) -> u64 {
    xxh64(value, HLL_SEED)
}

/// Record a hashed value in dense registers
pub(crate) fn update_registers(registers: &mut [u8], hash: u64) {
    let idx = (hash & (HLL_REGISTERS as u64 - 1)) as usize;
    let rest = hash >> HLL_PRECISION;
    // rank of the first set bit in the remaining 54 bits, 1-based
    let rank = (rest.trailing_zeros().min(64 - HLL_PRECISION) + 1) as u8;
    if rank > registers[idx] {
        registers[idx] = rank;
    }
}

pub(crate) fn merge_registers(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        if *s > *d {
            *d = *s;
        }
    }
}

pub(crate) fn serialize_registers(registers: &[u8]) -> Vec<u8> {
    let non_zero = registers.iter().filter(|&&r| r != 0).count();

    if non_zero == 0 {
        return vec![TYPE_EMPTY];
    }

    if non_zero <= SPARSE_LIMIT {
        let mut out = Vec::with_capacity(3 + non_zero * 3);
        out.push(TYPE_SPARSE);
        out.extend_from_slice(&(non_zero as u16).to_le_bytes());
        for (idx, &rank) in registers.iter().enumerate().filter(|(_, &r)| r != 0) {
            out.extend_from_slice(&(idx as u16).to_le_bytes());
            out.push(rank);
        }
        return out;
    }

    let mut out = Vec::with_capacity(1 + HLL_REGISTERS);
    out.push(TYPE_FULL);
    out.extend_from_slice(registers);
    out
}

fn estimate_registers(registers: &[u8]) -> u64 {
    let m = HLL_REGISTERS as f64;
    let alpha = 0.7213 / (1.0 + 1.079 / m);

    let mut sum = 0.0;
    let mut zeros = 0usize;
    for &r in registers {
        sum += 2f64.powi(-(r as i32));
        if r == 0 {
            zeros += 1;
        }
    }

    let raw = alpha * m * m / sum;
    let estimate = if raw <= 2.5 * m && zeros > 0 {
        // small range: linear counting
        m * (m / zeros as f64).ln()
    } else {
        raw
    };
    estimate.round() as u64
}
