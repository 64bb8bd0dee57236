//! Small deterministic PRNG for stimulus generation.
//!
//! Xorshift32 is plenty for picking memory symbols and attention
//! delays; this is not security-relevant randomness. Seeded from the
//! microsecond uptime counter at assessment start so each run differs.

#[derive(Debug, Clone, Copy)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    /// Zero would lock the generator at zero forever, so it is
    /// remapped to an arbitrary non-zero constant.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform-ish value in `0..bound`. `bound` must be non-zero.
    /// Modulo bias is irrelevant at the bounds used here (≤ 2001).
    pub fn below(&mut self, bound: u32) -> u32 {
        self.next_u32() % bound
    }
}
