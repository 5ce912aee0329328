//! SNES internal checksum calculation
//!
//! The checksum is the 16-bit sum of every byte of the ROM body (copier
//! header excluded). Images whose size is not a power of two are summed as
//! if the part past the largest power of two were mirrored to fill it.

use super::header::InternalHeader;

/// Calculate the SNES checksum of a ROM body
pub fn calculate_checksum(body: &[u8]) -> u16 {
    (mirrored_sum(body, body.len().next_power_of_two()) & 0xFFFF) as u16
}

/// Byte sum of `data` mirrored to fill `span` bytes (a power of two)
///
/// The part past the largest power of two is itself mirrored up to that
/// size first, so a 0x38000-byte body sums as 0x20000 + 2 * 0x8000 + 0x10000.
fn mirrored_sum(data: &[u8], span: usize) -> u32 {
    if data.is_empty() {
        return 0;
    }

    let base = prev_power_of_two(data.len());
    if base == data.len() {
        return byte_sum(data).wrapping_mul((span / base) as u32);
    }

    let sum = byte_sum(&data[..base]).wrapping_add(mirrored_sum(&data[base..], base));
    sum.wrapping_mul((span / (base * 2)).max(1) as u32)
}

/// Recompute and store the checksum and its complement in the header at `header_offset`
pub fn update_checksum(body: &mut [u8], header_offset: usize) {
    let field = header_offset + InternalHeader::COMPLEMENT_OFFSET;
    if body.len() < field + 4 {
        return;
    }

    body[field..field + 4].copy_from_slice(&[0xFF, 0xFF, 0x00, 0x00]);
    let checksum = calculate_checksum(body);
    body[field..field + 2].copy_from_slice(&(!checksum).to_le_bytes());
    body[field + 2..field + 4].copy_from_slice(&checksum.to_le_bytes());
}

/// Verify the stored checksum of a located header
pub fn verify_checksum(body: &[u8], header: &InternalHeader) -> bool {
    header.checksum == calculate_checksum(body)
}

fn byte_sum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32))
}

fn prev_power_of_two(n: usize) -> usize {
    let mut power = 1;
    while power * 2 <= n {
        power *= 2;
    }
    power
}
