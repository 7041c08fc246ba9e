//! CMPR block compression.
//!
//! Each 8x8 tile holds four 4x4 sub-blocks in top-left, top-right, bottom-left, bottom-right
//! order. A sub-block is two big endian RGB565 endpoints followed by four rows of 2 bit
//! selectors, leftmost texel in the high bits. When the first endpoint is numerically greater
//! the block has four opaque colors, otherwise three colors and transparent black.

use image::{
	Rgba,
	RgbaImage
};

use crate::pixel::{
	decode_rgb565,
	encode_rgb565,
	intensity
};

pub const SUB_BLOCK_SIZE: usize = 8;
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Sub-block origins within a tile, in storage order
const SUB_BLOCKS: [(u32, u32); 4] = [(0, 0), (4, 0), (0, 4), (4, 4)];

/// Alpha below this makes a texel transparent when encoding
const ALPHA_THRESHOLD: u8 = 0x80;

fn blend(a: Rgba<u8>, b: Rgba<u8>, wa: u32, wb: u32) -> Rgba<u8> {
	let mix = |i: usize| ((a[i] as u32 * wa + b[i] as u32 * wb) / (wa + wb)) as u8;
	Rgba([mix(0), mix(1), mix(2), 0xFF])
}

/// The four colors a sub-block's selectors index
pub fn block_colors(c0: u16, c1: u16) -> [Rgba<u8>; 4] {
	let (p0, p1) = (decode_rgb565(c0), decode_rgb565(c1));

	if c0 > c1 {
		[p0, p1, blend(p0, p1, 2, 1), blend(p0, p1, 1, 2)]
	} else {
		[p0, p1, blend(p0, p1, 1, 1), TRANSPARENT]
	}
}

/// Decodes one 8 byte sub-block into row-major texels
pub fn decode_block(block: &[u8]) -> [[Rgba<u8>; 4]; 4] {
	let c0 = u16::from_be_bytes([block[0], block[1]]);
	let c1 = u16::from_be_bytes([block[2], block[3]]);
	let colors = block_colors(c0, c1);

	let mut texels = [[TRANSPARENT; 4]; 4];
	for (y, row) in texels.iter_mut().enumerate() {
		let bits = block[4 + y];
		for (x, texel) in row.iter_mut().enumerate() {
			*texel = colors[((bits >> (6 - x * 2)) & 3) as usize];
		}
	}

	texels
}

fn distance(a: Rgba<u8>, b: Rgba<u8>) -> u32 {
	(0..3).map(|i| (a[i] as i32 - b[i] as i32).pow(2) as u32).sum()
}

/// Encodes up to 16 texels by fitting endpoints to the darkest and brightest opaque texels.
///
/// `None` marks texels outside the image; they get selector 0.
pub fn encode_block(texels: &[[Option<Rgba<u8>>; 4]; 4]) -> [u8; SUB_BLOCK_SIZE] {
	let present = texels.iter().flatten().flatten().copied();
	let has_transparency = present.clone().any(|c| c[3] < ALPHA_THRESHOLD);
	let opaque: Vec<Rgba<u8>> = present.filter(|c| c[3] >= ALPHA_THRESHOLD).collect();

	let mut out = [0; SUB_BLOCK_SIZE];

	let (lo, hi) = match (opaque.iter().min_by_key(|c| intensity(**c)), opaque.iter().max_by_key(|c| intensity(**c))) {
		(Some(lo), Some(hi)) => (encode_rgb565(*lo), encode_rgb565(*hi)),
		_ => {
			// fully transparent; three color mode with every selector on transparent
			out[4..].copy_from_slice(&[0xFF; 4]);
			return out;
		},
	};

	// four color mode needs c0 > c1, three color mode c0 <= c1
	let (c0, c1) = if has_transparency {
		(lo.min(hi), lo.max(hi))
	} else {
		(lo.max(hi), lo.min(hi))
	};

	let colors = block_colors(c0, c1);
	let usable = if c0 > c1 { 4 } else { 3 };

	out[0..2].copy_from_slice(&c0.to_be_bytes());
	out[2..4].copy_from_slice(&c1.to_be_bytes());

	for (y, row) in texels.iter().enumerate() {
		let mut bits = 0u8;
		for (x, texel) in row.iter().enumerate() {
			let selector = match texel {
				Some(c) if c[3] < ALPHA_THRESHOLD => 3,
				Some(c) => (0..usable).min_by_key(|i| distance(*c, colors[*i])).unwrap_or(0),
				None => 0,
			};
			bits |= (selector as u8) << (6 - x * 2);
		}
		out[4 + y] = bits;
	}

	out
}

/// Decodes whole tiles into `image`, whose dimensions must be multiples of 8
pub fn decode_tiles(data: &[u8], image: &mut RgbaImage) {
	let (width, height) = image.dimensions();
	let mut blocks = data.chunks_exact(SUB_BLOCK_SIZE);

	for ty in (0..height).step_by(8) {
		for tx in (0..width).step_by(8) {
			for (sx, sy) in SUB_BLOCKS.iter() {
				let texels = match blocks.next() {
					Some(block) => decode_block(block),
					None => return,
				};

				for (y, row) in texels.iter().enumerate() {
					for (x, texel) in row.iter().enumerate() {
						image.put_pixel(tx + sx + x as u32, ty + sy + y as u32, *texel);
					}
				}
			}
		}
	}
}

/// Encodes `image` as whole tiles covering `width` by `height` texels into `out`
pub fn encode_tiles(image: &RgbaImage, width: u32, height: u32, out: &mut [u8]) {
	let mut blocks = out.chunks_exact_mut(SUB_BLOCK_SIZE);

	for ty in (0..height).step_by(8) {
		for tx in (0..width).step_by(8) {
			for (sx, sy) in SUB_BLOCKS.iter() {
				let mut texels = [[None; 4]; 4];
				for (y, row) in texels.iter_mut().enumerate() {
					for (x, texel) in row.iter_mut().enumerate() {
						*texel = image.get_pixel_checked(tx + sx + x as u32, ty + sy + y as u32).copied();
					}
				}

				match blocks.next() {
					Some(block) => block.copy_from_slice(&encode_block(&texels)),
					None => return,
				}
			}
		}
	}
}
