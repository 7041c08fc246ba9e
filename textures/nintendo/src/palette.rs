use byteorder::{
	BE,
	ReadBytesExt,
	WriteBytesExt
};

use std::collections::HashMap;

use image::{
	Rgba,
	RgbaImage
};

use crate::{
	gx::{
		ImageFormat,
		PaletteFormat
	},
	pixel::{
		decode_ia8,
		decode_rgb565,
		decode_rgb5a3,
		encode_ia8,
		encode_rgb565,
		encode_rgb5a3
	},
	BTIError
};

/// Color table shared by every level of an indexed texture
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
	pub format: PaletteFormat,
	pub colors: Vec<Rgba<u8>>,
}

impl Palette {
	pub fn new(format: PaletteFormat, colors: Vec<Rgba<u8>>) -> Palette {
		Palette {
			format: format,
			colors: colors,
		}
	}

	pub fn len(&self) -> usize {
		self.colors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.colors.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<Rgba<u8>> {
		self.colors.get(index).copied()
	}

	pub fn decode_color(format: PaletteFormat, value: u16) -> Rgba<u8> {
		match format {
			PaletteFormat::IA8 => decode_ia8(value),
			PaletteFormat::RGB565 => decode_rgb565(value),
			PaletteFormat::RGB5A3 => decode_rgb5a3(value),
		}
	}

	pub fn encode_color(format: PaletteFormat, color: Rgba<u8>) -> u16 {
		match format {
			PaletteFormat::IA8 => encode_ia8(color),
			PaletteFormat::RGB565 => encode_rgb565(color),
			PaletteFormat::RGB5A3 => encode_rgb5a3(color),
		}
	}

	/// Maps each stored entry to the first index holding it
	pub fn index_map(&self) -> HashMap<u16, u16> {
		let mut map = HashMap::with_capacity(self.colors.len());
		for (i, c) in self.colors.iter().enumerate() {
			map.entry(Palette::encode_color(self.format, *c)).or_insert(i as u16);
		}
		map
	}

	/// Builds a palette holding every distinct color of `images` after quantizing to `format`,
	/// in first-seen order.
	pub fn from_images(images: &[RgbaImage], format: PaletteFormat, image_format: ImageFormat) -> Result<Palette, BTIError> {
		let max = image_format.max_colors()
			.ok_or_else(|| BTIError::UnsupportedFormat(format!("{:?} does not use a palette", image_format)))?;

		let mut seen = HashMap::new();
		let mut colors = vec![];

		for pixel in images.iter().flat_map(|image| image.pixels()) {
			let raw = Palette::encode_color(format, *pixel);
			seen.entry(raw).or_insert_with(|| {
				colors.push(Palette::decode_color(format, raw));
				colors.len() - 1
			});
		}

		if colors.len() > max {
			return Err(BTIError::TooManyColors {
				count: colors.len(),
				max: max,
			});
		}

		log::debug!("BTI: built {:?} palette with {} colors", format, colors.len());
		Ok(Palette::new(format, colors))
	}

	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R, format: PaletteFormat, count: usize) -> Result<Palette, BTIError>
	where
		R: ReadBytesExt,
	{
		let mut colors = Vec::with_capacity(count);
		for _ in 0..count {
			colors.push(Palette::decode_color(format, buf.read_u16::<BE>()?));
		}

		Ok(Palette::new(format, colors))
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<(), BTIError>
	where
		W: WriteBytesExt,
	{
		for c in self.colors.iter() {
			buf.write_u16::<BE>(Palette::encode_color(self.format, *c))?;
		}

		Ok(())
	}
}
