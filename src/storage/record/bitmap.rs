//! Occupancy bitmap helpers. Bit `i` lives in byte `i / 8`, most significant bit first.

fn mask(pos: usize) -> u8 {
    0x80 >> (pos % 8)
}

/// Bytes needed for `num_bits` bits
pub fn size_for(num_bits: usize) -> usize {
    num_bits.div_ceil(8)
}

pub fn is_set(bits: &[u8], pos: usize) -> bool {
    bits[pos / 8] & mask(pos) != 0
}

pub fn set(bits: &mut [u8], pos: usize) {
    bits[pos / 8] |= mask(pos);
}

pub fn reset(bits: &mut [u8], pos: usize) {
    bits[pos / 8] &= !mask(pos);
}

/// First position in `from..max_n` whose bit equals `value`
pub fn next_bit(value: bool, bits: &[u8], max_n: usize, from: usize) -> Option<usize> {
    (from..max_n).find(|&pos| is_set(bits, pos) == value)
}

pub fn count_set(bits: &[u8], max_n: usize) -> usize {
    (0..max_n).filter(|&pos| is_set(bits, pos)).count()
}
