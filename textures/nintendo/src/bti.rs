use byteorder::{
	BE,
	ReadBytesExt,
	WriteBytesExt
};

use std::io::{
	Seek,
	SeekFrom,
	Write
};

use image::{
	imageops::{
		self,
		FilterType
	},
	RgbaImage
};

use rgk_core::io_ext::ReadBinExt;

use crate::{
	gx::*,
	palette::Palette,
	pixel::{
		decode_image,
		encode_image
	},
	BTIError
};

pub const HEADER_SIZE: u64 = 0x20;

/// LOD values are stored as fixed point
const LOD_SCALE: f32 = 8.0;
const LOD_BIAS_SCALE: f32 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Header {
	pub format: u8,
	pub alpha_mode: u8,
	pub width: u16,
	pub height: u16,
	pub wrap_s: u8,
	pub wrap_t: u8,
	pub use_palette: u8,
	pub palette_format: u8,
	pub palette_count: u16,
	/// Relative to the header start
	pub palette_offset: u32,
	pub mipmaps: u8,
	pub edge_lod: u8,
	pub clamp_lod_bias: u8,
	pub max_anisotropy: u8,
	pub min_filter: u8,
	pub mag_filter: u8,
	pub min_lod: i8,
	pub max_lod: i8,
	pub image_count: u8,
	reserved: u8, // safe to be 0
	pub lod_bias: i16,
	/// Relative to the header start
	pub image_offset: u32,
}

impl Header {
	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> Result<Header, BTIError>
	where
		R: ReadBytesExt,
	{
		Ok(Header {
			format: buf.read_u8()?,
			alpha_mode: buf.read_u8()?,
			width: buf.read_u16::<BE>()?,
			height: buf.read_u16::<BE>()?,
			wrap_s: buf.read_u8()?,
			wrap_t: buf.read_u8()?,
			use_palette: buf.read_u8()?,
			palette_format: buf.read_u8()?,
			palette_count: buf.read_u16::<BE>()?,
			palette_offset: buf.read_u32::<BE>()?,
			mipmaps: buf.read_u8()?,
			edge_lod: buf.read_u8()?,
			clamp_lod_bias: buf.read_u8()?,
			max_anisotropy: buf.read_u8()?,
			min_filter: buf.read_u8()?,
			mag_filter: buf.read_u8()?,
			min_lod: buf.read_i8()?,
			max_lod: buf.read_i8()?,
			image_count: buf.read_u8()?,
			reserved: buf.read_u8()?,
			lod_bias: buf.read_i16::<BE>()?,
			image_offset: buf.read_u32::<BE>()?,
		})
	}

	#[cfg(feature = "export")]
	fn write<W>(&self, buf: &mut W) -> Result<(), BTIError>
	where
		W: WriteBytesExt,
	{
		buf.write_u8(self.format)?;
		buf.write_u8(self.alpha_mode)?;
		buf.write_u16::<BE>(self.width)?;
		buf.write_u16::<BE>(self.height)?;
		buf.write_u8(self.wrap_s)?;
		buf.write_u8(self.wrap_t)?;
		buf.write_u8(self.use_palette)?;
		buf.write_u8(self.palette_format)?;
		buf.write_u16::<BE>(self.palette_count)?;
		buf.write_u32::<BE>(self.palette_offset)?;
		buf.write_u8(self.mipmaps)?;
		buf.write_u8(self.edge_lod)?;
		buf.write_u8(self.clamp_lod_bias)?;
		buf.write_u8(self.max_anisotropy)?;
		buf.write_u8(self.min_filter)?;
		buf.write_u8(self.mag_filter)?;
		buf.write_i8(self.min_lod)?;
		buf.write_i8(self.max_lod)?;
		buf.write_u8(self.image_count)?;
		buf.write_u8(self.reserved)?;
		buf.write_i16::<BE>(self.lod_bias)?;
		buf.write_u32::<BE>(self.image_offset)?;
		Ok(())
	}
}

/// A GX texture: sampler settings, an optional shared palette and the decoded mip chain
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
	pub format: ImageFormat,
	pub alpha_mode: u8,
	pub wrap_s: u8,
	pub wrap_t: u8,
	pub min_filter: u8,
	pub mag_filter: u8,
	pub min_lod: f32,
	pub max_lod: f32,
	pub lod_bias: f32,
	pub edge_lod: bool,
	pub clamp_lod_bias: bool,
	pub max_anisotropy: u8,
	/// Present for indexed formats; every level indexes this one table
	pub palette: Option<Palette>,
	levels: Vec<RgbaImage>,
}

impl Texture {
	/// A single-level texture with linear filtering and clamped wrapping
	pub fn new(format: ImageFormat, image: RgbaImage) -> Texture {
		Texture {
			format: format,
			alpha_mode: 0,
			wrap_s: 0,
			wrap_t: 0,
			min_filter: 1,
			mag_filter: 1,
			min_lod: 0.0,
			max_lod: 0.0,
			lod_bias: 0.0,
			edge_lod: false,
			clamp_lod_bias: false,
			max_anisotropy: 0,
			palette: None,
			levels: vec![image],
		}
	}

	pub fn width(&self) -> u32 {
		self.levels.first().map_or(0, |l| l.width())
	}

	pub fn height(&self) -> u32 {
		self.levels.first().map_or(0, |l| l.height())
	}

	pub fn levels(&self) -> &[RgbaImage] {
		&self.levels
	}

	pub fn level(&self, index: usize) -> Option<&RgbaImage> {
		self.levels.get(index)
	}

	/// Replaces or appends mip `index`.
	///
	/// Level 0 may take any size; a size change drops every other level. Later levels must
	/// match the halved base size. Gaps before `index` are filled by downscaling the level
	/// above them.
	pub fn set_level(&mut self, index: usize, image: RgbaImage) -> Result<(), BTIError> {
		if index == 0 {
			if image.dimensions() != (self.width(), self.height()) {
				self.levels.truncate(0);
			}

			match self.levels.first_mut() {
				Some(base) => *base = image,
				None => self.levels.push(image),
			}
			return Ok(());
		}

		let expected = mip_dimensions(self.width(), self.height(), index);
		if image.dimensions() != expected {
			return Err(BTIError::InvalidShape(format!("mip {} must be {}x{}, got {}x{}", index,
				expected.0, expected.1, image.width(), image.height())));
		}

		while self.levels.len() < index {
			let (w, h) = mip_dimensions(self.width(), self.height(), self.levels.len());
			let above = self.levels.last()
				.ok_or_else(|| BTIError::InvalidShape("texture has no base level".to_string()))?;
			log::trace!("BTI: generating mip {} at {}x{}", self.levels.len(), w, h);
			let generated = imageops::resize(above, w, h, FilterType::Triangle);
			self.levels.push(generated);
		}

		if index < self.levels.len() {
			self.levels[index] = image;
		} else {
			self.levels.push(image);
		}

		Ok(())
	}

	/// Rebuilds the palette from every level's colors
	pub fn build_palette(&mut self, format: PaletteFormat) -> Result<(), BTIError> {
		self.palette = Some(Palette::from_images(&self.levels, format, self.format)?);
		Ok(())
	}

	/// Reads a texture whose header starts at the current position.
	///
	/// The cursor is left just past the 0x20 byte header.
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Texture, BTIError>
	where
		R: ReadBytesExt + ReadBinExt + Seek,
	{
		let header_start = buf.stream_position()?;
		let stream_end = buf.seek(SeekFrom::End(0))?;
		buf.seek(SeekFrom::Start(header_start))?;

		let header = Header::read(buf)?;

		let format = ImageFormat::from_u8(header.format)
			.ok_or_else(|| BTIError::UnsupportedFormat(format!("image format {:#x}", header.format)))?;

		if header.image_count == 0 {
			return Err(BTIError::MalformedHeader("no images".to_string()));
		}

		let palette = if header.use_palette != 0 {
			let palette_format = PaletteFormat::from_u8(header.palette_format)
				.ok_or_else(|| BTIError::UnsupportedFormat(format!("palette format {:#x}", header.palette_format)))?;

			let palette_start = header_start + header.palette_offset as u64;
			if palette_start + header.palette_count as u64 * 2 > stream_end {
				return Err(BTIError::CorruptPaletteReference(format!("{} entries at {:#x} run past the end of the data",
					header.palette_count, palette_start)));
			}

			let palette = buf.read_at(palette_start, |buf| {
				Palette::read(buf, palette_format, header.palette_count as usize)
			})?;
			log::debug!("BTI: {:?} palette with {} entries", palette_format, palette.len());
			Some(palette)
		} else {
			None
		};

		let image_start = header_start + header.image_offset as u64;
		let image_size: u64 = (0..header.image_count as usize)
			.map(|i| {
				let (w, h) = mip_dimensions(header.width as u32, header.height as u32, i);
				image_data_size(format, w, h) as u64
			})
			.sum();
		if image_start + image_size > stream_end {
			return Err(BTIError::MalformedHeader(format!("{:#x} bytes of image data at {:#x} run past the end of the data",
				image_size, image_start)));
		}

		let levels = buf.read_at(image_start, |buf| {
			let mut levels = Vec::with_capacity(header.image_count as usize);

			for i in 0..header.image_count as usize {
				let (w, h) = mip_dimensions(header.width as u32, header.height as u32, i);
				let data = buf.read_vec(image_data_size(format, w, h))?;
				log::trace!("BTI: level {} is {}x{} ({} bytes)", i, w, h, data.len());

				levels.push(decode_image(&data, format, palette.as_ref(), w, h)?);
			}

			Ok::<_, BTIError>(levels)
		})?;

		log::debug!("BTI: {:?} {}x{} with {} levels", format, header.width, header.height, levels.len());

		Ok(Texture {
			format: format,
			alpha_mode: header.alpha_mode,
			wrap_s: header.wrap_s,
			wrap_t: header.wrap_t,
			min_filter: header.min_filter,
			mag_filter: header.mag_filter,
			min_lod: header.min_lod as f32 / LOD_SCALE,
			max_lod: header.max_lod as f32 / LOD_SCALE,
			lod_bias: header.lod_bias as f32 / LOD_BIAS_SCALE,
			edge_lod: header.edge_lod != 0,
			clamp_lod_bias: header.clamp_lod_bias != 0,
			max_anisotropy: header.max_anisotropy,
			palette: palette,
			levels: levels,
		})
	}

	/// Writes the header at the current position and its palette and image data at the
	/// absolute position `data_offset`, for layouts where several headers share a data block.
	///
	/// The palette comes first, then every level back to back. The cursor is left just past
	/// the header and the end of the written data is returned.
	#[cfg(feature = "export")]
	pub fn write_with_data_offset<W>(&self, buf: &mut W, data_offset: u64) -> Result<u64, BTIError>
	where
		W: WriteBytesExt + Seek,
	{
		let header_start = buf.stream_position()?;
		let relative = |pos: u64| {
			u32::try_from(pos.wrapping_sub(header_start))
				.map_err(|_| BTIError::MalformedHeader(format!("data at {:#x} is out of reach of the header", pos)))
		};

		if self.levels.is_empty() {
			return Err(BTIError::InvalidShape("texture has no images".to_string()));
		}
		if (header_start..header_start + HEADER_SIZE).contains(&data_offset) {
			return Err(BTIError::MalformedHeader("data overlaps the header".to_string()));
		}
		if self.width() > u16::MAX as u32 || self.height() > u16::MAX as u32 || self.levels.len() > u8::MAX as usize {
			return Err(BTIError::InvalidShape(format!("{}x{} with {} levels does not fit a header",
				self.width(), self.height(), self.levels.len())));
		}

		let palette = match (self.format.is_indexed(), &self.palette) {
			(true, Some(p)) => {
				let max = self.format.max_colors().unwrap_or(0);
				if p.len() > max {
					return Err(BTIError::TooManyColors {
						count: p.len(),
						max: max,
					});
				}
				Some(p)
			},
			(true, None) => {
				return Err(BTIError::CorruptPaletteReference(format!("{:?} texture has no palette", self.format)));
			},
			(false, _) => None,
		};

		let mut images = Vec::with_capacity(self.levels.len());
		for level in self.levels.iter() {
			images.push(encode_image(level, self.format, palette)?);
		}

		let palette_size = palette.map_or(0, |p| p.len() as u64 * 2);

		let header = Header {
			format: self.format as u8,
			alpha_mode: self.alpha_mode,
			width: self.width() as u16,
			height: self.height() as u16,
			wrap_s: self.wrap_s,
			wrap_t: self.wrap_t,
			use_palette: palette.is_some() as u8,
			palette_format: palette.map_or(0, |p| p.format as u8),
			palette_count: palette.map_or(0, |p| p.len() as u16),
			palette_offset: if palette.is_some() { relative(data_offset)? } else { 0 },
			mipmaps: (self.levels.len() > 1) as u8,
			edge_lod: self.edge_lod as u8,
			clamp_lod_bias: self.clamp_lod_bias as u8,
			max_anisotropy: self.max_anisotropy,
			min_filter: self.min_filter,
			mag_filter: self.mag_filter,
			min_lod: (self.min_lod * LOD_SCALE).round() as i8,
			max_lod: (self.max_lod * LOD_SCALE).round() as i8,
			image_count: self.levels.len() as u8,
			reserved: 0,
			lod_bias: (self.lod_bias * LOD_BIAS_SCALE).round() as i16,
			image_offset: relative(data_offset + palette_size)?,
		};
		header.write(buf)?;

		let resume = buf.stream_position()?;
		buf.seek(SeekFrom::Start(data_offset))?;

		if let Some(p) = palette {
			p.write(buf)?;
		}
		for image in images.iter() {
			buf.write_all(image)?;
		}

		let end = buf.stream_position()?;
		buf.seek(SeekFrom::Start(resume))?;

		log::debug!("BTI: wrote {:?} {}x{} with {} levels, data {:#x}..{:#x}", self.format, self.width(),
			self.height(), self.levels.len(), data_offset, end);
		Ok(end)
	}

	/// Writes a standalone texture at the current position and returns its size in bytes.
	///
	/// The cursor is left at the end of the written data.
	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<u64, BTIError>
	where
		W: WriteBytesExt + Seek,
	{
		let start = buf.stream_position()?;
		let end = self.write_with_data_offset(buf, start + HEADER_SIZE)?;
		buf.seek(SeekFrom::Start(end))?;
		Ok(end - start)
	}
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use image::Rgba;

	use super::*;

	fn checker(width: u32, height: u32) -> RgbaImage {
		RgbaImage::from_fn(width, height, |x, y| {
			if (x / 2 + y / 2) % 2 == 0 { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 0, 255]) }
		})
	}

	fn mip_chain(format: ImageFormat, size: u32, count: usize) -> Texture {
		let mut texture = Texture::new(format, checker(size, size));
		for i in 1..count {
			let (w, h) = mip_dimensions(size, size, i);
			texture.set_level(i, checker(w, h)).unwrap();
		}
		texture
	}

	fn bytes(texture: &Texture) -> Vec<u8> {
		let mut out = Cursor::new(vec![]);
		let size = texture.write(&mut out).unwrap();
		let bytes = out.into_inner();
		assert_eq!(size as usize, bytes.len());
		bytes
	}

	#[test]
	fn test_mip_chain_geometry() {
		let texture = mip_chain(ImageFormat::RGB565, 64, 3);
		let decoded = Texture::read(&mut Cursor::new(bytes(&texture))).unwrap();

		let sizes: Vec<_> = decoded.levels().iter().map(|l| l.dimensions()).collect();
		assert_eq!(sizes, vec![(64, 64), (32, 32), (16, 16)]);
		assert_eq!(decoded.levels(), texture.levels());
	}

	#[test]
	fn test_header_layout() {
		let mut texture = mip_chain(ImageFormat::I8, 16, 2);
		texture.wrap_s = 1;
		texture.min_lod = 0.5;
		texture.max_lod = 1.0;
		texture.lod_bias = -0.25;

		let data = bytes(&texture);
		assert_eq!(data[0], ImageFormat::I8 as u8);
		assert_eq!(&data[2..6], &[0, 16, 0, 16]);
		assert_eq!(data[6], 1);
		assert_eq!(data[8], 0);
		assert_eq!(data[0x10], 1);
		assert_eq!(data[0x16] as i8, 4);
		assert_eq!(data[0x17] as i8, 8);
		assert_eq!(data[0x18], 2);
		assert_eq!(&data[0x1A..0x1C], &(-25i16).to_be_bytes());
		assert_eq!(&data[0x1C..0x20], &0x20u32.to_be_bytes());
		assert_eq!(data.len(), 0x20 + 16 * 16 + 8 * 8);

		let decoded = Texture::read(&mut Cursor::new(data)).unwrap();
		assert_eq!(decoded.min_lod, 0.5);
		assert_eq!(decoded.max_lod, 1.0);
		assert_eq!(decoded.lod_bias, -0.25);
		assert_eq!(decoded.wrap_s, 1);
	}

	#[test]
	fn test_c8_palette_is_shared_across_levels() {
		let mut texture = mip_chain(ImageFormat::C8, 32, 3);
		texture.build_palette(PaletteFormat::RGB5A3).unwrap();

		let data = bytes(&texture);
		// palette directly follows the header, images after it
		assert_eq!(data[8], 1);
		assert_eq!(&data[0x0A..0x0C], &2u16.to_be_bytes());
		assert_eq!(&data[0x0C..0x10], &0x20u32.to_be_bytes());
		assert_eq!(&data[0x1C..0x20], &0x24u32.to_be_bytes());

		let decoded = Texture::read(&mut Cursor::new(data)).unwrap();
		let palette = decoded.palette.as_ref().unwrap();
		assert_eq!(palette.len(), 2);
		assert_eq!(decoded.levels().len(), 3);

		for level in decoded.levels() {
			assert!(level.pixels().all(|p| palette.colors.contains(p)));
		}
		assert_eq!(decoded.levels(), texture.levels());
	}

	#[test]
	fn test_palette_past_end() {
		let mut texture = mip_chain(ImageFormat::C8, 16, 1);
		texture.build_palette(PaletteFormat::RGB565).unwrap();
		let data = bytes(&texture);

		let mut long = data.clone();
		long[0x0A..0x0C].copy_from_slice(&0xFFFFu16.to_be_bytes());
		assert!(matches!(Texture::read(&mut Cursor::new(long)), Err(BTIError::CorruptPaletteReference(_))));

		let mut moved = data;
		moved[0x0C..0x10].copy_from_slice(&0x10_0000u32.to_be_bytes());
		assert!(matches!(Texture::read(&mut Cursor::new(moved)), Err(BTIError::CorruptPaletteReference(_))));
	}

	#[test]
	fn test_image_data_past_end() {
		let mut data = bytes(&Texture::new(ImageFormat::RGBA32, checker(8, 4)));
		data[2..6].copy_from_slice(&[0xFF; 4]);
		assert!(matches!(Texture::read(&mut Cursor::new(data)), Err(BTIError::MalformedHeader(_))));
	}

	#[test]
	fn test_cmpr_unaligned_level_is_cropped() {
		let texture = Texture::new(ImageFormat::CMPR, RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
		let data = bytes(&texture);
		assert_eq!(data.len(), 0x20 + 16 * 16 / 2);

		let decoded = Texture::read(&mut Cursor::new(data)).unwrap();
		assert_eq!(decoded.levels()[0], *texture.level(0).unwrap());
	}

	#[test]
	fn test_shared_data_offset() {
		let a = Texture::new(ImageFormat::IA4, checker(8, 4));
		let b = Texture::new(ImageFormat::IA8, checker(4, 4));

		let mut out = Cursor::new(vec![]);
		let data_start = 2 * HEADER_SIZE;
		let next = a.write_with_data_offset(&mut out, data_start).unwrap();
		assert_eq!(out.position(), HEADER_SIZE);
		let end = b.write_with_data_offset(&mut out, next).unwrap();
		assert_eq!(end, data_start + 32 + 32);

		let mut input = Cursor::new(out.into_inner());
		let first = Texture::read(&mut input).unwrap();
		assert_eq!(input.position(), HEADER_SIZE);
		let second = Texture::read(&mut input).unwrap();

		assert_eq!(first.levels(), a.levels());
		assert_eq!(second.levels(), b.levels());
	}

	#[test]
	fn test_indexed_write_needs_palette() {
		let texture = Texture::new(ImageFormat::C4, checker(8, 8));
		assert!(matches!(texture.write(&mut Cursor::new(vec![])), Err(BTIError::CorruptPaletteReference(_))));
	}

	#[test]
	fn test_unknown_format() {
		let mut data = bytes(&Texture::new(ImageFormat::I8, checker(8, 4)));
		data[0] = 7;
		assert!(matches!(Texture::read(&mut Cursor::new(data)), Err(BTIError::UnsupportedFormat(_))));
	}

	#[test]
	fn test_set_level_validates_and_fills() {
		let mut texture = Texture::new(ImageFormat::RGBA32, checker(16, 8));

		assert!(matches!(texture.set_level(1, checker(4, 4)), Err(BTIError::InvalidShape(_))));

		texture.set_level(3, checker(2, 1)).unwrap();
		let sizes: Vec<_> = texture.levels().iter().map(|l| l.dimensions()).collect();
		assert_eq!(sizes, vec![(16, 8), (8, 4), (4, 2), (2, 1)]);

		texture.set_level(0, checker(32, 32)).unwrap();
		assert_eq!(texture.levels().len(), 1);
	}
}
