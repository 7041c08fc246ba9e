//! Conversion between tiled GX texel data and RGBA8 images.
//!
//! Texels are stored tile by tile, left to right and top to bottom, with the texels of each
//! tile in row-major order. Sub-byte texels are packed high nibble first and 16 bit texels
//! are big endian.

use std::{
	borrow::Cow,
	collections::HashMap
};

use image::{
	imageops,
	Rgba,
	RgbaImage
};

use rgk_core::{
	scale3to8,
	scale4to8,
	scale5to8,
	scale6to8,
	scale8to3,
	scale8to4,
	scale8to5,
	scale8to6
};

use crate::{
	cmpr,
	gx::*,
	palette::Palette,
	BTIError
};

/// Alpha in the high byte, intensity in the low byte
pub fn decode_ia8(v: u16) -> Rgba<u8> {
	let i = v as u8;
	Rgba([i, i, i, (v >> 8) as u8])
}

pub fn encode_ia8(c: Rgba<u8>) -> u16 {
	(c[3] as u16) << 8 | intensity(c) as u16
}

pub fn decode_rgb565(v: u16) -> Rgba<u8> {
	Rgba([
		scale5to8((v >> 11) as u8 & 0x1F),
		scale6to8((v >> 5) as u8 & 0x3F),
		scale5to8(v as u8 & 0x1F),
		0xFF,
	])
}

pub fn encode_rgb565(c: Rgba<u8>) -> u16 {
	(scale8to5(c[0]) as u16) << 11 | (scale8to6(c[1]) as u16) << 5 | scale8to5(c[2]) as u16
}

/// With the top bit set the texel is opaque RGB555, otherwise it is 3 bit alpha and RGB444.
pub fn decode_rgb5a3(v: u16) -> Rgba<u8> {
	if v & 0x8000 != 0 {
		Rgba([
			scale5to8((v >> 10) as u8 & 0x1F),
			scale5to8((v >> 5) as u8 & 0x1F),
			scale5to8(v as u8 & 0x1F),
			0xFF,
		])
	} else {
		Rgba([
			scale4to8((v >> 8) as u8 & 0xF),
			scale4to8((v >> 4) as u8 & 0xF),
			scale4to8(v as u8 & 0xF),
			scale3to8((v >> 12) as u8 & 0x7),
		])
	}
}

pub fn encode_rgb5a3(c: Rgba<u8>) -> u16 {
	if c[3] == 0xFF {
		0x8000 | (scale8to5(c[0]) as u16) << 10 | (scale8to5(c[1]) as u16) << 5 | scale8to5(c[2]) as u16
	} else {
		(scale8to3(c[3]) as u16) << 12 | (scale8to4(c[0]) as u16) << 8 | (scale8to4(c[1]) as u16) << 4 |
			scale8to4(c[2]) as u16
	}
}

/// Rec. 601 luma; gray inputs map to themselves
pub fn intensity(c: Rgba<u8>) -> u8 {
	((c[0] as u32 * 299 + c[1] as u32 * 587 + c[2] as u32 * 114 + 500) / 1000) as u8
}

/// Texel coordinates in storage order for an image already padded to whole tiles
fn texel_order(format: ImageFormat, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
	let (bw, bh) = format.block_size();

	(0..height).step_by(bh as usize).flat_map(move |by| {
		(0..width).step_by(bw as usize).flat_map(move |bx| {
			(0..bh).flat_map(move |y| (0..bw).map(move |x| (bx + x, by + y)))
		})
	})
}

#[inline]
fn read_bits(data: &[u8], index: usize, bpp: u32) -> u16 {
	match bpp {
		4 => {
			let b = data[index / 2];
			if index % 2 == 0 { (b >> 4) as u16 } else { (b & 0xF) as u16 }
		},
		8 => data[index] as u16,
		_ => u16::from_be_bytes([data[index * 2], data[index * 2 + 1]]),
	}
}

#[inline]
fn write_bits(data: &mut [u8], index: usize, bpp: u32, value: u16) {
	match bpp {
		4 => {
			let shift = if index % 2 == 0 { 4 } else { 0 };
			data[index / 2] |= ((value & 0xF) as u8) << shift;
		},
		8 => data[index] = value as u8,
		_ => data[index * 2..index * 2 + 2].copy_from_slice(&value.to_be_bytes()),
	}
}

fn texel_color(format: ImageFormat, value: u16, palette: Option<&Palette>) -> Result<Rgba<u8>, BTIError> {
	Ok(match format {
		ImageFormat::I4 => {
			let i = scale4to8(value as u8);
			Rgba([i; 4])
		},
		ImageFormat::I8 => Rgba([value as u8; 4]),
		ImageFormat::IA4 => {
			let i = scale4to8(value as u8 & 0xF);
			Rgba([i, i, i, scale4to8((value >> 4) as u8 & 0xF)])
		},
		ImageFormat::IA8 => decode_ia8(value),
		ImageFormat::RGB565 => decode_rgb565(value),
		ImageFormat::RGB5A3 => decode_rgb5a3(value),
		ImageFormat::C4 | ImageFormat::C8 | ImageFormat::C14X2 => {
			let palette = palette.ok_or_else(|| {
				BTIError::CorruptPaletteReference(format!("{:?} image has no palette", format))
			})?;
			let index = (value & 0x3FFF) as usize;
			palette.get(index).ok_or_else(|| {
				BTIError::CorruptPaletteReference(format!("index {} past the {} palette entries", index, palette.len()))
			})?
		},
		ImageFormat::RGBA32 | ImageFormat::CMPR => unreachable!("{:?} is not stored per texel", format),
	})
}

fn texel_value(format: ImageFormat, c: Rgba<u8>, lookup: Option<&(PaletteFormat, HashMap<u16, u16>)>) -> Result<u16, BTIError> {
	Ok(match format {
		ImageFormat::I4 => scale8to4(intensity(c)) as u16,
		ImageFormat::I8 => intensity(c) as u16,
		ImageFormat::IA4 => (scale8to4(c[3]) << 4 | scale8to4(intensity(c))) as u16,
		ImageFormat::IA8 => encode_ia8(c),
		ImageFormat::RGB565 => encode_rgb565(c),
		ImageFormat::RGB5A3 => encode_rgb5a3(c),
		ImageFormat::C4 | ImageFormat::C8 | ImageFormat::C14X2 => {
			let (palette_format, indices) = lookup.ok_or_else(|| {
				BTIError::CorruptPaletteReference(format!("{:?} image has no palette", format))
			})?;
			*indices.get(&Palette::encode_color(*palette_format, c)).ok_or_else(|| {
				BTIError::CorruptPaletteReference(format!("color {:?} is not in the palette", c.0))
			})?
		},
		ImageFormat::RGBA32 | ImageFormat::CMPR => unreachable!("{:?} is not stored per texel", format),
	})
}

fn decode_rgba32(data: &[u8], image: &mut RgbaImage) {
	let (width, height) = image.dimensions();
	let mut tile = 0;

	for by in (0..height).step_by(4) {
		for bx in (0..width).step_by(4) {
			let ar = &data[tile * 64..tile * 64 + 32];
			let gb = &data[tile * 64 + 32..tile * 64 + 64];

			for i in 0..16 {
				let (x, y) = (bx + i as u32 % 4, by + i as u32 / 4);
				image.put_pixel(x, y, Rgba([ar[i * 2 + 1], gb[i * 2], gb[i * 2 + 1], ar[i * 2]]));
			}

			tile += 1;
		}
	}
}

fn encode_rgba32(image: &RgbaImage, width: u32, height: u32, out: &mut [u8]) {
	let mut tile = 0;

	for by in (0..height).step_by(4) {
		for bx in (0..width).step_by(4) {
			for i in 0..16 {
				let (x, y) = (bx + i as u32 % 4, by + i as u32 / 4);
				if let Some(c) = image.get_pixel_checked(x, y) {
					out[tile * 64 + i * 2..tile * 64 + i * 2 + 2].copy_from_slice(&[c[3], c[0]]);
					out[tile * 64 + 32 + i * 2..tile * 64 + 32 + i * 2 + 2].copy_from_slice(&[c[1], c[2]]);
				}
			}

			tile += 1;
		}
	}
}

/// Decodes one image level of `width` by `height` texels.
///
/// `data` is the stored region for the level as given by [`image_data_size`]. Tiles that run
/// past its end read as zero. Indexed formats resolve every texel through `palette`.
pub fn decode_image(data: &[u8], format: ImageFormat, palette: Option<&Palette>, width: u32, height: u32)
	-> Result<RgbaImage, BTIError>
{
	if width == 0 || height == 0 {
		return Err(BTIError::InvalidShape(format!("{}x{} image", width, height)));
	}

	let (tw, th) = tiled_dimensions(format, width, height);
	let bpp = format.bits_per_pixel();
	let needed = (tw as usize * th as usize * bpp as usize) / 8;

	let tiles: Cow<[u8]> = if data.len() >= needed {
		Cow::Borrowed(&data[..needed])
	} else {
		let mut owned = data.to_vec();
		owned.resize(needed, 0);
		Cow::Owned(owned)
	};

	let mut image = RgbaImage::new(tw, th);

	match format {
		ImageFormat::CMPR => cmpr::decode_tiles(&tiles, &mut image),
		ImageFormat::RGBA32 => decode_rgba32(&tiles, &mut image),
		_ => {
			for (i, (x, y)) in texel_order(format, tw, th).enumerate() {
				let c = texel_color(format, read_bits(&tiles, i, bpp), palette)?;
				image.put_pixel(x, y, c);
			}
		},
	}

	if (tw, th) == (width, height) {
		Ok(image)
	} else {
		Ok(imageops::crop_imm(&image, 0, 0, width, height).to_image())
	}
}

/// Encodes one image level, the inverse of [`decode_image`].
///
/// Texels outside the image are written as zero. The result is cut to the stored region size,
/// so levels smaller than one tile in a non-padded format keep only the leading texels.
pub fn encode_image(image: &RgbaImage, format: ImageFormat, palette: Option<&Palette>) -> Result<Vec<u8>, BTIError> {
	let (width, height) = image.dimensions();
	if width == 0 || height == 0 {
		return Err(BTIError::InvalidShape(format!("{}x{} image", width, height)));
	}

	let (tw, th) = tiled_dimensions(format, width, height);
	let bpp = format.bits_per_pixel();
	let mut out = vec![0; (tw as usize * th as usize * bpp as usize) / 8];

	match format {
		ImageFormat::CMPR => cmpr::encode_tiles(image, tw, th, &mut out),
		ImageFormat::RGBA32 => encode_rgba32(image, tw, th, &mut out),
		_ => {
			let lookup = match (format.is_indexed(), palette) {
				(true, Some(p)) => {
					let max = format.max_colors().unwrap_or(0);
					if p.len() > max {
						return Err(BTIError::TooManyColors {
							count: p.len(),
							max: max,
						});
					}
					Some((p.format, p.index_map()))
				},
				(true, None) => {
					return Err(BTIError::CorruptPaletteReference(format!("{:?} image has no palette", format)));
				},
				(false, _) => None,
			};

			for (i, (x, y)) in texel_order(format, tw, th).enumerate() {
				if let Some(c) = image.get_pixel_checked(x, y) {
					write_bits(&mut out, i, bpp, texel_value(format, *c, lookup.as_ref())?);
				}
			}
		},
	}

	out.truncate(image_data_size(format, width, height));
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn gradient(width: u32, height: u32) -> RgbaImage {
		RgbaImage::from_fn(width, height, |x, y| {
			Rgba([(x * 255 / width.max(2).saturating_sub(1).max(1)) as u8, (y * 16) as u8, ((x + y) * 8) as u8, 0xFF])
		})
	}

	/// Snaps every pixel to what `format` can represent
	fn quantized(image: &RgbaImage, format: ImageFormat) -> RgbaImage {
		let data = encode_image(image, format, None).unwrap();
		decode_image(&data, format, None, image.width(), image.height()).unwrap()
	}

	#[test]
	fn test_color_codecs() {
		assert_eq!(decode_rgb565(0xF800), Rgba([255, 0, 0, 255]));
		assert_eq!(decode_rgb565(0x07E0), Rgba([0, 255, 0, 255]));
		assert_eq!(decode_ia8(0x80FF), Rgba([255, 255, 255, 0x80]));
		assert_eq!(decode_rgb5a3(0xFFFF), Rgba([255; 4]));
		assert_eq!(decode_rgb5a3(0x3F00), Rgba([255, 0, 0, scale3to8(3)]));

		for v in [0x0000u16, 0x1234, 0x8000, 0xFC1F, 0x5A5A] {
			assert_eq!(encode_rgb565(decode_rgb565(v)), v);
			assert_eq!(encode_ia8(decode_ia8(v)), v);
		}
		for v in [0x8000u16, 0xFFFF, 0x0123, 0x6ABC] {
			assert_eq!(encode_rgb5a3(decode_rgb5a3(v)), v);
		}
	}

	#[test]
	fn test_texel_order() {
		let order: Vec<_> = texel_order(ImageFormat::RGB565, 8, 4).collect();
		assert_eq!(order[0], (0, 0));
		assert_eq!(order[3], (3, 0));
		assert_eq!(order[4], (0, 1));
		assert_eq!(order[16], (4, 0));
		assert_eq!(order.len(), 32);
	}

	#[test]
	fn test_i4_nibble_order() {
		let mut data = vec![0; 32];
		data[0] = 0xF0;
		let image = decode_image(&data, ImageFormat::I4, None, 8, 8).unwrap();
		assert_eq!(*image.get_pixel(0, 0), Rgba([255; 4]));
		assert_eq!(*image.get_pixel(1, 0), Rgba([0; 4]));
	}

	#[test]
	fn test_ia4_alpha_is_high_nibble() {
		let mut data = vec![0; 32];
		data[0] = 0xA5;
		let image = decode_image(&data, ImageFormat::IA4, None, 8, 4).unwrap();
		assert_eq!(*image.get_pixel(0, 0), Rgba([0x55, 0x55, 0x55, 0xAA]));
	}

	#[test]
	fn test_rgba32_tile_layout() {
		let mut data = vec![0; 64];
		data[0..2].copy_from_slice(&[0x11, 0x22]);
		data[32..34].copy_from_slice(&[0x33, 0x44]);
		let image = decode_image(&data, ImageFormat::RGBA32, None, 4, 4).unwrap();
		assert_eq!(*image.get_pixel(0, 0), Rgba([0x22, 0x33, 0x44, 0x11]));
	}

	#[test]
	fn test_direct_formats_round_trip() {
		let source = gradient(16, 8);

		for format in [ImageFormat::I4, ImageFormat::I8, ImageFormat::IA4, ImageFormat::IA8, ImageFormat::RGB565,
			ImageFormat::RGB5A3, ImageFormat::RGBA32, ImageFormat::CMPR] {
			let expected = quantized(&source, format);
			let data = encode_image(&expected, format, None).unwrap();
			assert_eq!(data.len(), image_data_size(format, 16, 8), "{:?}", format);

			let decoded = decode_image(&data, format, None, 16, 8).unwrap();
			if format == ImageFormat::CMPR {
				// block compression is lossy even on its own output
				assert_eq!(decoded.dimensions(), (16, 8));
			} else {
				assert_eq!(decoded, expected, "{:?}", format);
			}
		}
	}

	#[test]
	fn test_rgba32_is_lossless() {
		let source = RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8, y as u8, (x * y) as u8, 0x7F]));
		let data = encode_image(&source, ImageFormat::RGBA32, None).unwrap();
		assert_eq!(decode_image(&data, ImageFormat::RGBA32, None, 8, 8).unwrap(), source);
	}

	#[test]
	fn test_unaligned_direct_format_is_cropped() {
		let data = vec![0xFF; image_data_size(ImageFormat::RGB565, 6, 2)];
		let image = decode_image(&data, ImageFormat::RGB565, None, 6, 2).unwrap();
		assert_eq!(image.dimensions(), (6, 2));
		// the first tile is fully stored
		assert_eq!(*image.get_pixel(3, 1), Rgba([255; 4]));
	}

	#[test]
	fn test_cmpr_padding_and_crop() {
		assert_eq!(padded_dimensions(10, 10), (16, 16));
		let data = vec![0; image_data_size(ImageFormat::CMPR, 10, 10)];
		assert_eq!(data.len(), 128);

		let image = decode_image(&data, ImageFormat::CMPR, None, 10, 10).unwrap();
		assert_eq!(image.dimensions(), (10, 10));
	}

	#[test]
	fn test_indexed_round_trip() {
		let source = RgbaImage::from_fn(12, 6, |x, y| {
			if (x + y) % 3 == 0 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 255, 255]) }
		});

		for format in [ImageFormat::C4, ImageFormat::C8, ImageFormat::C14X2] {
			let palette = Palette::from_images(std::slice::from_ref(&source), PaletteFormat::RGB565, format).unwrap();
			assert_eq!(palette.len(), 2);

			let data = encode_image(&source, format, Some(&palette)).unwrap();
			assert_eq!(data.len(), image_data_size(format, 12, 6));

			let decoded = decode_image(&data, format, Some(&palette), 12, 6).unwrap();
			assert_eq!(decoded, source, "{:?}", format);
		}
	}

	#[test]
	fn test_indexed_without_palette() {
		let data = vec![0; 32];
		assert!(matches!(decode_image(&data, ImageFormat::C8, None, 8, 4),
			Err(BTIError::CorruptPaletteReference(_))));
	}

	#[test]
	fn test_index_past_palette_end() {
		let palette = Palette::new(PaletteFormat::IA8, vec![Rgba([0, 0, 0, 0])]);
		let mut data = vec![0; 32];
		data[5] = 1;
		assert!(matches!(decode_image(&data, ImageFormat::C8, Some(&palette), 8, 4),
			Err(BTIError::CorruptPaletteReference(_))));
	}

	#[test]
	fn test_color_missing_from_palette() {
		let palette = Palette::new(PaletteFormat::RGB565, vec![Rgba([255, 0, 0, 255])]);
		let image = RgbaImage::from_pixel(8, 4, Rgba([0, 255, 0, 255]));
		assert!(matches!(encode_image(&image, ImageFormat::C8, Some(&palette)),
			Err(BTIError::CorruptPaletteReference(_))));
	}

	#[test]
	fn test_palette_wider_than_index() {
		let colors = (0..20u8).map(|i| Rgba([i * 8, 0, 0, 255])).collect();
		let palette = Palette::new(PaletteFormat::RGB565, colors);
		let image = RgbaImage::from_pixel(8, 8, palette.colors[17]);

		assert!(matches!(encode_image(&image, ImageFormat::C4, Some(&palette)),
			Err(BTIError::TooManyColors { count: 20, max: 16 })));
		assert!(encode_image(&image, ImageFormat::C8, Some(&palette)).is_ok());
	}
}
