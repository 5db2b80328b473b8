/// Encodes a nibble as a lowercase hex digit.
#[inline(always)]
pub const fn encode_hex(nibble: u8) -> u8 {
    match nibble {
        0..=9 => b'0' + nibble,
        10..=15 => b'a' + nibble - 10,
        _ => panic!(),
    }
}

/// Encodes a single u32 value into eight hex characters.
///
/// # Examples
///
/// ```
/// # use offstage::util::str::encode_hex_u32;
///
/// assert_eq!(*b"00c0ffee", encode_hex_u32(0x00c0_ffee));
/// ```
#[inline]
pub const fn encode_hex_u32(value: u32) -> [u8; 8] {
    const MASK: u32 = (1 << 4) - 1;
    [
        encode_hex(((value >> 28) & MASK) as u8),
        encode_hex(((value >> 24) & MASK) as u8),
        encode_hex(((value >> 20) & MASK) as u8),
        encode_hex(((value >> 16) & MASK) as u8),
        encode_hex(((value >> 12) & MASK) as u8),
        encode_hex(((value >> 8) & MASK) as u8),
        encode_hex(((value >> 4) & MASK) as u8),
        encode_hex((value & MASK) as u8),
    ]
}
