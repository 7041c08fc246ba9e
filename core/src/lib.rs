#[cfg(feature = "io_ext")]
pub mod io_ext;

pub mod texture;

/// Converts a 4-byte string into a 32-bit big endian integer.
/// Byte strings longer than 4 bytes are truncated.
#[macro_export]
macro_rules! tag4 {
	($b4: literal) => {
		u32::from_be_bytes([$b4[0], $b4[1], $b4[2], $b4[3]])
	}
}

/// Scales a 3 bit value to 8 bits
pub const fn scale3to8(b: u8) -> u8 {
	b << 5 | b << 2 | b >> 1
}

/// Scales a 4 bit value to 8 bits
pub const fn scale4to8(b: u8) -> u8 {
	b << 4 | b
}

/// Scales a 5 bit value to 8 bits
pub const fn scale5to8(b: u8) -> u8 {
	b << 3 | b >> 2
}

/// Scales a 6 bit value to 8 bits
pub const fn scale6to8(b: u8) -> u8 {
	b << 2 | b >> 4
}

/// Scales an 8 bit value to 3 bits
pub const fn scale8to3(b: u8) -> u8 {
	b >> 5
}

/// Scales an 8 bit value to 4 bits
pub const fn scale8to4(b: u8) -> u8 {
	b >> 4
}

/// Scales an 8 bit value to 5 bits
pub const fn scale8to5(b: u8) -> u8 {
	(b & 0xF8) >> 3
}

/// Scales an 8 bit value to 6 bits
pub const fn scale8to6(b: u8) -> u8 {
	b >> 2
}
