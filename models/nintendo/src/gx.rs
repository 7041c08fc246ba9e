//! GX vertex formats and the numeric conversions between their raw encodings and floats.
//!
//! Every multi-byte value is big endian.

use byteorder::{
	BE,
	ReadBytesExt,
	WriteBytesExt
};

use std::io;

use rgk_core::texture::Color;

/// Vertex attribute identifiers as stored in descriptor records
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u32)]
pub enum Attribute {
	PositionMatrixIndex = 0,
	Tex0MatrixIndex,
	Tex1MatrixIndex,
	Tex2MatrixIndex,
	Tex3MatrixIndex,
	Tex4MatrixIndex,
	Tex5MatrixIndex,
	Tex6MatrixIndex,
	Tex7MatrixIndex,
	Position,
	Normal,
	Color0,
	Color1,
	Tex0,
	Tex1,
	Tex2,
	Tex3,
	Tex4,
	Tex5,
	Tex6,
	Tex7,
	PositionMatrixArray,
	NormalMatrixArray,
	TextureMatrixArray,
	LitMatrixArray,
	NormalBinormalTangent,
	Null = 0xFF,
}

impl Attribute {
	pub fn from_u32(value: u32) -> Option<Attribute> {
		match value {
			0 => Some(Attribute::PositionMatrixIndex),
			1 => Some(Attribute::Tex0MatrixIndex),
			2 => Some(Attribute::Tex1MatrixIndex),
			3 => Some(Attribute::Tex2MatrixIndex),
			4 => Some(Attribute::Tex3MatrixIndex),
			5 => Some(Attribute::Tex4MatrixIndex),
			6 => Some(Attribute::Tex5MatrixIndex),
			7 => Some(Attribute::Tex6MatrixIndex),
			8 => Some(Attribute::Tex7MatrixIndex),
			9 => Some(Attribute::Position),
			10 => Some(Attribute::Normal),
			11 => Some(Attribute::Color0),
			12 => Some(Attribute::Color1),
			13 => Some(Attribute::Tex0),
			14 => Some(Attribute::Tex1),
			15 => Some(Attribute::Tex2),
			16 => Some(Attribute::Tex3),
			17 => Some(Attribute::Tex4),
			18 => Some(Attribute::Tex5),
			19 => Some(Attribute::Tex6),
			20 => Some(Attribute::Tex7),
			21 => Some(Attribute::PositionMatrixArray),
			22 => Some(Attribute::NormalMatrixArray),
			23 => Some(Attribute::TextureMatrixArray),
			24 => Some(Attribute::LitMatrixArray),
			25 => Some(Attribute::NormalBinormalTangent),
			0xFF => Some(Attribute::Null),
			_ => None,
		}
	}
}

/// Storage type of a single geometric or texture coordinate component
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum ComponentType {
	Unsigned8 = 0,
	Signed8,
	Unsigned16,
	Signed16,
	Float32,
}

impl ComponentType {
	pub fn from_u32(value: u32) -> Option<ComponentType> {
		match value {
			0 => Some(ComponentType::Unsigned8),
			1 => Some(ComponentType::Signed8),
			2 => Some(ComponentType::Unsigned16),
			3 => Some(ComponentType::Signed16),
			4 => Some(ComponentType::Float32),
			_ => None,
		}
	}

	/// Byte width of one component
	pub const fn size(self) -> usize {
		match self {
			ComponentType::Unsigned8 | ComponentType::Signed8 => 1,
			ComponentType::Unsigned16 | ComponentType::Signed16 => 2,
			ComponentType::Float32 => 4,
		}
	}
}

/// Packed vertex color encodings
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum ColorType {
	RGB565 = 0,
	RGB8,
	RGBX8,
	RGBA4,
	RGBA6,
	RGBA8,
}

impl ColorType {
	pub fn from_u32(value: u32) -> Option<ColorType> {
		match value {
			0 => Some(ColorType::RGB565),
			1 => Some(ColorType::RGB8),
			2 => Some(ColorType::RGBX8),
			3 => Some(ColorType::RGBA4),
			4 => Some(ColorType::RGBA6),
			5 => Some(ColorType::RGBA8),
			_ => None,
		}
	}

	/// Byte width of one packed color, padding included
	pub const fn size(self) -> usize {
		match self {
			ColorType::RGB565 | ColorType::RGBA4 => 2,
			ColorType::RGB8 | ColorType::RGBX8 | ColorType::RGBA6 | ColorType::RGBA8 => 4,
		}
	}

	pub const fn has_alpha(self) -> bool {
		matches!(self, ColorType::RGBA4 | ColorType::RGBA6 | ColorType::RGBA8)
	}
}

/// The data type field of a descriptor record. Its meaning depends on the channel kind.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DataType {
	Component(ComponentType),
	Color(ColorType),
}

impl DataType {
	pub fn raw(self) -> u32 {
		match self {
			DataType::Component(t) => t as u32,
			DataType::Color(t) => t as u32,
		}
	}
}

/// Per-channel storage format
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StorageFormat {
	pub data_type: DataType,
	/// Fixed point scale is `1 / 2^fraction_bits`. Ignored by colors and floats.
	pub fraction_bits: u8,
}

impl StorageFormat {
	pub const fn component(data_type: ComponentType, fraction_bits: u8) -> StorageFormat {
		StorageFormat {
			data_type: DataType::Component(data_type),
			fraction_bits: fraction_bits,
		}
	}

	pub const fn color(data_type: ColorType) -> StorageFormat {
		StorageFormat {
			data_type: DataType::Color(data_type),
			fraction_bits: 0,
		}
	}
}

/// Component-count selector, decoded according to the channel it belongs to
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ComponentCount {
	PositionXY,
	PositionXYZ,
	NormalXYZ,
	/// Normal, binormal and tangent sharing one index
	NormalNBT,
	/// Normal, binormal and tangent with separate indices
	NormalNBT3,
	ColorRGB,
	ColorRGBA,
	TexCoordS,
	TexCoordST,
}

impl ComponentCount {
	/// Interprets a raw selector for `attribute`. Unknown pairings give `None`.
	pub fn from_raw(attribute: Attribute, value: u32) -> Option<ComponentCount> {
		match attribute {
			Attribute::Position => match value {
				0 => Some(ComponentCount::PositionXY),
				1 => Some(ComponentCount::PositionXYZ),
				_ => None,
			},
			Attribute::Normal | Attribute::NormalBinormalTangent => match value {
				0 => Some(ComponentCount::NormalXYZ),
				1 => Some(ComponentCount::NormalNBT),
				2 => Some(ComponentCount::NormalNBT3),
				_ => None,
			},
			Attribute::Color0 | Attribute::Color1 => match value {
				0 => Some(ComponentCount::ColorRGB),
				1 => Some(ComponentCount::ColorRGBA),
				_ => None,
			},
			Attribute::Tex0 | Attribute::Tex1 | Attribute::Tex2 | Attribute::Tex3 |
			Attribute::Tex4 | Attribute::Tex5 | Attribute::Tex6 | Attribute::Tex7 => match value {
				0 => Some(ComponentCount::TexCoordS),
				1 => Some(ComponentCount::TexCoordST),
				_ => None,
			},
			_ => None,
		}
	}

	pub const fn raw(self) -> u32 {
		match self {
			ComponentCount::PositionXY | ComponentCount::NormalXYZ |
				ComponentCount::ColorRGB | ComponentCount::TexCoordS => 0,
			ComponentCount::PositionXYZ | ComponentCount::NormalNBT |
				ComponentCount::ColorRGBA | ComponentCount::TexCoordST => 1,
			ComponentCount::NormalNBT3 => 2,
		}
	}

	/// Number of scalar components per element. Colors count as one packed element.
	pub const fn components(self) -> usize {
		match self {
			ComponentCount::TexCoordS | ComponentCount::ColorRGB | ComponentCount::ColorRGBA => 1,
			ComponentCount::PositionXY | ComponentCount::TexCoordST => 2,
			ComponentCount::PositionXYZ | ComponentCount::NormalXYZ => 3,
			ComponentCount::NormalNBT | ComponentCount::NormalNBT3 => 9,
		}
	}
}

#[inline]
fn fixed_scale(fraction_bits: u8) -> f32 {
	2f32.powi(fraction_bits as i32)
}

/// Reads one component and converts it to a float.
///
/// Integer types are divided by `2^fraction_bits`; floats are read unscaled.
pub fn read_scalar<R>(buf: &mut R, data_type: ComponentType, fraction_bits: u8) -> io::Result<f32>
where
	R: ReadBytesExt,
{
	let raw = match data_type {
		ComponentType::Unsigned8 => buf.read_u8()? as f32,
		ComponentType::Signed8 => buf.read_i8()? as f32,
		ComponentType::Unsigned16 => buf.read_u16::<BE>()? as f32,
		ComponentType::Signed16 => buf.read_i16::<BE>()? as f32,
		ComponentType::Float32 => return buf.read_f32::<BE>(),
	};

	Ok(raw / fixed_scale(fraction_bits))
}

/// Writes one component, the inverse of [`read_scalar`].
///
/// The scaled value is rounded half away from zero. Nothing is clamped: a value outside the
/// target type's range wraps to its low bits, so callers must keep values in range.
pub fn write_scalar<W>(buf: &mut W, value: f32, data_type: ComponentType, fraction_bits: u8) -> io::Result<()>
where
	W: WriteBytesExt,
{
	if data_type == ComponentType::Float32 {
		return buf.write_f32::<BE>(value);
	}

	let fixed = (value * fixed_scale(fraction_bits)).round() as i64;

	match data_type {
		ComponentType::Unsigned8 => buf.write_u8(fixed as u8),
		ComponentType::Signed8 => buf.write_i8(fixed as i8),
		ComponentType::Unsigned16 => buf.write_u16::<BE>(fixed as u16),
		ComponentType::Signed16 => buf.write_i16::<BE>(fixed as i16),
		ComponentType::Float32 => unreachable!(),
	}
}

/// Reads one packed color.
///
/// Every channel is divided by 255 whatever its stored width, so a 5 bit red of 31 reads
/// as `31 / 255`. Existing assets depend on this, so it is kept as is.
pub fn read_color<R>(buf: &mut R, data_type: ColorType) -> io::Result<Color>
where
	R: ReadBytesExt,
{
	let n = |v: u32| v as f32 / 255.0;

	match data_type {
		ColorType::RGB565 => {
			let v = buf.read_u16::<BE>()? as u32;
			Ok(Color::new(n((v >> 11) & 0x1F), n((v >> 5) & 0x3F), n(v & 0x1F), 1.0))
		},
		ColorType::RGB8 | ColorType::RGBX8 => {
			let mut rgbx = [0; 4];
			buf.read_exact(&mut rgbx)?;
			Ok(Color::new(n(rgbx[0] as u32), n(rgbx[1] as u32), n(rgbx[2] as u32), 1.0))
		},
		ColorType::RGBA4 => {
			let v = buf.read_u16::<BE>()? as u32;
			Ok(Color::new(n((v >> 12) & 0xF), n((v >> 8) & 0xF), n((v >> 4) & 0xF), n(v & 0xF)))
		},
		ColorType::RGBA6 => {
			let v = buf.read_u32::<BE>()?;
			Ok(Color::new(n((v >> 18) & 0x3F), n((v >> 12) & 0x3F), n((v >> 6) & 0x3F), n(v & 0x3F)))
		},
		ColorType::RGBA8 => {
			let mut rgba = [0; 4];
			buf.read_exact(&mut rgba)?;
			Ok(Color::from_rgba8(rgba))
		},
	}
}

/// Writes one packed color, the inverse of [`read_color`].
///
/// Channels become `round(c * 255)`, saturated to the stored width.
pub fn write_color<W>(buf: &mut W, color: &Color, data_type: ColorType) -> io::Result<()>
where
	W: WriteBytesExt,
{
	let q = |c: f32, max: u32| ((c * 255.0).round().max(0.0) as u32).min(max);

	match data_type {
		ColorType::RGB565 => {
			let v = q(color.red, 0x1F) << 11 | q(color.green, 0x3F) << 5 | q(color.blue, 0x1F);
			buf.write_u16::<BE>(v as u16)
		},
		ColorType::RGB8 | ColorType::RGBX8 => {
			buf.write_all(&[q(color.red, 0xFF) as u8, q(color.green, 0xFF) as u8, q(color.blue, 0xFF) as u8, 0])
		},
		ColorType::RGBA4 => {
			let v = q(color.red, 0xF) << 12 | q(color.green, 0xF) << 8 | q(color.blue, 0xF) << 4 |
				q(color.alpha, 0xF);
			buf.write_u16::<BE>(v as u16)
		},
		ColorType::RGBA6 => {
			let v = q(color.red, 0x3F) << 18 | q(color.green, 0x3F) << 12 | q(color.blue, 0x3F) << 6 |
				q(color.alpha, 0x3F);
			buf.write_u32::<BE>(v)
		},
		ColorType::RGBA8 => {
			buf.write_all(&[q(color.red, 0xFF) as u8, q(color.green, 0xFF) as u8, q(color.blue, 0xFF) as u8,
				q(color.alpha, 0xFF) as u8])
		},
	}
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use proptest::prelude::*;

	use super::*;

	fn scalar_bytes(value: f32, data_type: ComponentType, fraction_bits: u8) -> Vec<u8> {
		let mut out = vec![];
		write_scalar(&mut out, value, data_type, fraction_bits).unwrap();
		out
	}

	#[test]
	fn test_read_scalar_fixed_point() {
		let mut data: &[u8] = &[0xFF, 0x80];
		assert_eq!(read_scalar(&mut data, ComponentType::Signed16, 8).unwrap(), -0.5);

		let mut data: &[u8] = &[0x40];
		assert_eq!(read_scalar(&mut data, ComponentType::Unsigned8, 7).unwrap(), 0.5);

		let mut data: &[u8] = &[0x3F, 0x80, 0x00, 0x00];
		assert_eq!(read_scalar(&mut data, ComponentType::Float32, 12).unwrap(), 1.0);
	}

	#[test]
	fn test_write_scalar_rounds_half_away_from_zero() {
		// 0.5 / 2^2 and -0.5 / 2^2
		assert_eq!(scalar_bytes(0.125, ComponentType::Signed8, 2), vec![1]);
		assert_eq!(scalar_bytes(-0.125, ComponentType::Signed8, 2), vec![0xFF]);
		assert_eq!(scalar_bytes(1.5, ComponentType::Unsigned16, 0), vec![0, 2]);
		assert_eq!(scalar_bytes(-2.5, ComponentType::Signed16, 0), vec![0xFF, 0xFD]);
	}

	#[test]
	fn test_write_scalar_out_of_range_wraps() {
		assert_eq!(scalar_bytes(256.0, ComponentType::Unsigned8, 0), vec![0]);
	}

	#[test]
	fn test_read_color_rgba8() {
		let mut data: &[u8] = &[0xFF, 0x80, 0x00, 0x40];
		let c = read_color(&mut data, ColorType::RGBA8).unwrap();
		assert_eq!(c.red, 1.0);
		assert!((c.green - 0.50196).abs() < 1e-4);
		assert_eq!(c.blue, 0.0);
		assert!((c.alpha - 0.25098).abs() < 1e-4);
	}

	#[test]
	fn test_read_color_rgb565_keeps_raw_channel() {
		let mut data: &[u8] = &[0xF8, 0x00];
		let c = read_color(&mut data, ColorType::RGB565).unwrap();
		assert_eq!(c, Color::new(31.0 / 255.0, 0.0, 0.0, 1.0));
	}

	#[test]
	fn test_read_color_rgbx8_skips_padding() {
		let mut data = Cursor::new(vec![0x10, 0x20, 0x30, 0x99, 0xAA]);
		let c = read_color(&mut data, ColorType::RGBX8).unwrap();
		assert_eq!(c, Color::new(16.0 / 255.0, 32.0 / 255.0, 48.0 / 255.0, 1.0));
		assert_eq!(data.position(), 4);
	}

	#[test]
	fn test_read_color_rgba6() {
		// r = 63, g = 0, b = 1, a = 32
		let v: u32 = 63 << 18 | 0 << 12 | 1 << 6 | 32;
		let mut data: &[u8] = &v.to_be_bytes();
		let c = read_color(&mut data, ColorType::RGBA6).unwrap();
		assert_eq!(c, Color::new(63.0 / 255.0, 0.0, 1.0 / 255.0, 32.0 / 255.0));
	}

	#[test]
	fn test_color_round_trips() {
		let samples: [(ColorType, &[u8]); 6] = [
			(ColorType::RGB565, &[0xA5, 0x5A]),
			(ColorType::RGB8, &[0x01, 0x7F, 0xFE, 0x00]),
			(ColorType::RGBX8, &[0x12, 0x34, 0x56, 0x00]),
			(ColorType::RGBA4, &[0x1F, 0xE3]),
			(ColorType::RGBA6, &[0x00, 0xAB, 0xCD, 0xEF]),
			(ColorType::RGBA8, &[0xDE, 0xAD, 0xBE, 0xEF]),
		];

		for (ty, bytes) in samples.iter() {
			let mut input = *bytes;
			let color = read_color(&mut input, *ty).unwrap();
			let mut out = vec![];
			write_color(&mut out, &color, *ty).unwrap();
			assert_eq!(&out[..], *bytes, "{:?}", ty);
		}
	}

	#[test]
	fn test_component_count_is_per_channel() {
		assert_eq!(ComponentCount::from_raw(Attribute::Position, 1), Some(ComponentCount::PositionXYZ));
		assert_eq!(ComponentCount::from_raw(Attribute::Normal, 0), Some(ComponentCount::NormalXYZ));
		assert_eq!(ComponentCount::from_raw(Attribute::Tex3, 0), Some(ComponentCount::TexCoordS));
		assert_eq!(ComponentCount::from_raw(Attribute::Color1, 2), None);
		assert_eq!(ComponentCount::from_raw(Attribute::Tex0, 7), None);
	}

	proptest! {
		#[test]
		fn fixed_point_round_trip_within_one_step(raw in any::<i16>(), fraction_bits in 0u8..15) {
			let step = 1.0 / 2f32.powi(fraction_bits as i32);
			let value = raw as f32 * step;
			let bytes = scalar_bytes(value, ComponentType::Signed16, fraction_bits);
			let back = read_scalar(&mut &bytes[..], ComponentType::Signed16, fraction_bits).unwrap();
			prop_assert!((back - value).abs() <= step);
		}

		#[test]
		fn unsigned8_round_trip_within_one_step(value in 0.0f32..1.99, fraction_bits in 0u8..8) {
			let step = 1.0 / 2f32.powi(fraction_bits as i32);
			prop_assume!(value * 2f32.powi(fraction_bits as i32) < 255.0);
			let bytes = scalar_bytes(value, ComponentType::Unsigned8, fraction_bits);
			let back = read_scalar(&mut &bytes[..], ComponentType::Unsigned8, fraction_bits).unwrap();
			prop_assert!((back - value).abs() <= step);
		}

		#[test]
		fn float32_round_trip_is_exact(value in any::<f32>().prop_filter("finite", |v| v.is_finite())) {
			let bytes = scalar_bytes(value, ComponentType::Float32, 5);
			let back = read_scalar(&mut &bytes[..], ComponentType::Float32, 5).unwrap();
			prop_assert_eq!(back, value);
		}
	}
}
