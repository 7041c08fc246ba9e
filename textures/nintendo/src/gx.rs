//! GX texture formats and their tiling geometry.

/// Texel encodings supported by the GX texture unit
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum ImageFormat {
	I4 = 0,
	I8 = 1,
	IA4 = 2,
	IA8 = 3,
	RGB565 = 4,
	RGB5A3 = 5,
	RGBA32 = 6,
	C4 = 8,
	C8 = 9,
	C14X2 = 0xA,
	CMPR = 0xE,
}

impl ImageFormat {
	pub fn from_u8(value: u8) -> Option<ImageFormat> {
		match value {
			0 => Some(ImageFormat::I4),
			1 => Some(ImageFormat::I8),
			2 => Some(ImageFormat::IA4),
			3 => Some(ImageFormat::IA8),
			4 => Some(ImageFormat::RGB565),
			5 => Some(ImageFormat::RGB5A3),
			6 => Some(ImageFormat::RGBA32),
			8 => Some(ImageFormat::C4),
			9 => Some(ImageFormat::C8),
			0xA => Some(ImageFormat::C14X2),
			0xE => Some(ImageFormat::CMPR),
			_ => None,
		}
	}

	/// Width and height in texels of one tile
	pub const fn block_size(self) -> (u32, u32) {
		match self {
			ImageFormat::I4 | ImageFormat::C4 | ImageFormat::CMPR => (8, 8),
			ImageFormat::I8 | ImageFormat::IA4 | ImageFormat::C8 => (8, 4),
			ImageFormat::IA8 | ImageFormat::RGB565 | ImageFormat::RGB5A3 |
				ImageFormat::RGBA32 | ImageFormat::C14X2 => (4, 4),
		}
	}

	pub const fn bits_per_pixel(self) -> u32 {
		match self {
			ImageFormat::I4 | ImageFormat::C4 | ImageFormat::CMPR => 4,
			ImageFormat::I8 | ImageFormat::IA4 | ImageFormat::C8 => 8,
			ImageFormat::IA8 | ImageFormat::RGB565 | ImageFormat::RGB5A3 | ImageFormat::C14X2 => 16,
			ImageFormat::RGBA32 => 32,
		}
	}

	/// Bytes in one tile
	pub const fn block_bytes(self) -> usize {
		let (w, h) = self.block_size();
		(w * h * self.bits_per_pixel() / 8) as usize
	}

	pub const fn is_indexed(self) -> bool {
		matches!(self, ImageFormat::C4 | ImageFormat::C8 | ImageFormat::C14X2)
	}

	/// Largest palette the format's index width can address
	pub const fn max_colors(self) -> Option<usize> {
		match self {
			ImageFormat::C4 => Some(16),
			ImageFormat::C8 => Some(256),
			ImageFormat::C14X2 => Some(0x4000),
			_ => None,
		}
	}

	/// Whether the stored region is computed from macro-tile padded dimensions
	pub const fn is_padded(self) -> bool {
		self.is_indexed() || matches!(self, ImageFormat::CMPR)
	}
}

/// Color encodings of palette entries
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum PaletteFormat {
	IA8 = 0,
	RGB565 = 1,
	RGB5A3 = 2,
}

impl PaletteFormat {
	pub fn from_u8(value: u8) -> Option<PaletteFormat> {
		match value {
			0 => Some(PaletteFormat::IA8),
			1 => Some(PaletteFormat::RGB565),
			2 => Some(PaletteFormat::RGB5A3),
			_ => None,
		}
	}
}

#[inline]
const fn round_up(value: u32, multiple: u32) -> u32 {
	(value + multiple - 1) / multiple * multiple
}

/// Dimensions rounded up to a multiple of 4 and then to a multiple of 8
pub const fn padded_dimensions(width: u32, height: u32) -> (u32, u32) {
	(round_up(round_up(width, 4), 8), round_up(round_up(height, 4), 8))
}

/// Dimensions rounded up to whole tiles of `format`.
///
/// For padded formats this is the macro-tile padding, which is always a whole number of tiles.
pub const fn tiled_dimensions(format: ImageFormat, width: u32, height: u32) -> (u32, u32) {
	if format.is_padded() {
		padded_dimensions(width, height)
	} else {
		let (bw, bh) = format.block_size();
		(round_up(width, bw), round_up(height, bh))
	}
}

/// Number of bytes one image level of the given size occupies in a file.
///
/// Padded formats store whole macro-tiles. Every other format stores exactly
/// `width * height * bpp / 8` bytes.
pub const fn image_data_size(format: ImageFormat, width: u32, height: u32) -> usize {
	let (w, h) = if format.is_padded() {
		padded_dimensions(width, height)
	} else {
		(width, height)
	};

	(w as usize * h as usize * format.bits_per_pixel() as usize) / 8
}

/// Size of mip `level` for a base image, halving per level and never below 1
pub fn mip_dimensions(width: u32, height: u32, level: usize) -> (u32, u32) {
	let shift = level.min(31) as u32;
	((width >> shift).max(1), (height >> shift).max(1))
}
