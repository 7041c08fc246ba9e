use byteorder::{
	BE,
	ReadBytesExt,
	WriteBytesExt
};

use std::{
	collections::{
		BTreeMap,
		BTreeSet
	},
	io::{
		Seek,
		SeekFrom,
		Write
	}
};

use ultraviolet::vec::{
	Vec2,
	Vec3
};

use rgk_core::{
	io_ext::{
		ReadBinExt,
		WriteBinExt
	},
	tag4,
	texture::Color
};

use crate::{
	gx::*,
	offsets::OffsetTable,
	J3DError
};

pub const MAGIC: u32 = tag4!(b"VTX1");
pub const NUM_OFFSETS: usize = 13;
/// Descriptor records always follow the 0x40 byte header
pub const DESCRIPTOR_OFFSET: u32 = 0x40;
/// Offset table slot of the unsupported normal/binormal/tangent data
pub const NBT_SLOT: usize = 2;
pub const ALIGNMENT: u64 = 32;

const OFFSET_TABLE_POS: u64 = 0x0C;

/// A vertex attribute stream that VTX1 can hold
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Channel {
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
}

impl Channel {
	/// Canonical write order
	pub const ALL: [Channel; 12] = [
		Channel::Position,
		Channel::Normal,
		Channel::Color0,
		Channel::Color1,
		Channel::Tex0,
		Channel::Tex1,
		Channel::Tex2,
		Channel::Tex3,
		Channel::Tex4,
		Channel::Tex5,
		Channel::Tex6,
		Channel::Tex7,
	];

	pub fn from_attribute(attribute: Attribute) -> Option<Channel> {
		match attribute {
			Attribute::Position => Some(Channel::Position),
			Attribute::Normal => Some(Channel::Normal),
			Attribute::Color0 => Some(Channel::Color0),
			Attribute::Color1 => Some(Channel::Color1),
			Attribute::Tex0 => Some(Channel::Tex0),
			Attribute::Tex1 => Some(Channel::Tex1),
			Attribute::Tex2 => Some(Channel::Tex2),
			Attribute::Tex3 => Some(Channel::Tex3),
			Attribute::Tex4 => Some(Channel::Tex4),
			Attribute::Tex5 => Some(Channel::Tex5),
			Attribute::Tex6 => Some(Channel::Tex6),
			Attribute::Tex7 => Some(Channel::Tex7),
			_ => None,
		}
	}

	pub fn attribute(self) -> Attribute {
		match self {
			Channel::Position => Attribute::Position,
			Channel::Normal => Attribute::Normal,
			Channel::Color0 => Attribute::Color0,
			Channel::Color1 => Attribute::Color1,
			Channel::Tex0 => Attribute::Tex0,
			Channel::Tex1 => Attribute::Tex1,
			Channel::Tex2 => Attribute::Tex2,
			Channel::Tex3 => Attribute::Tex3,
			Channel::Tex4 => Attribute::Tex4,
			Channel::Tex5 => Attribute::Tex5,
			Channel::Tex6 => Attribute::Tex6,
			Channel::Tex7 => Attribute::Tex7,
		}
	}

	/// Index into the header's offset table
	pub fn slot(self) -> usize {
		match self {
			Channel::Position => 0,
			Channel::Normal => 1,
			Channel::Color0 => 3,
			Channel::Color1 => 4,
			Channel::Tex0 => 5,
			Channel::Tex1 => 6,
			Channel::Tex2 => 7,
			Channel::Tex3 => 8,
			Channel::Tex4 => 9,
			Channel::Tex5 => 10,
			Channel::Tex6 => 11,
			Channel::Tex7 => 12,
		}
	}

	pub fn is_color(self) -> bool {
		matches!(self, Channel::Color0 | Channel::Color1)
	}

	/// Decodes a descriptor's data type field in this channel's type space
	pub fn data_type(self, value: u32) -> Option<DataType> {
		if self.is_color() {
			ColorType::from_u32(value).map(DataType::Color)
		} else {
			ComponentType::from_u32(value).map(DataType::Component)
		}
	}
}

/// One decoded element of a channel
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttributeValue {
	Scalar(f32),
	Vec2(Vec2),
	Vec3(Vec3),
	Color(Color),
}

/// Every element of a channel, in file order
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeData {
	/// Single component texture coordinates
	Scalar(Vec<f32>),
	/// XY positions and ST texture coordinates
	Vec2(Vec<Vec2>),
	/// XYZ positions and normals
	Vec3(Vec<Vec3>),
	Color(Vec<Color>),
}

impl AttributeData {
	pub fn len(&self) -> usize {
		match self {
			AttributeData::Scalar(v) => v.len(),
			AttributeData::Vec2(v) => v.len(),
			AttributeData::Vec3(v) => v.len(),
			AttributeData::Color(v) => v.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn get(&self, index: usize) -> Option<AttributeValue> {
		match self {
			AttributeData::Scalar(v) => v.get(index).map(|s| AttributeValue::Scalar(*s)),
			AttributeData::Vec2(v) => v.get(index).map(|s| AttributeValue::Vec2(*s)),
			AttributeData::Vec3(v) => v.get(index).map(|s| AttributeValue::Vec3(*s)),
			AttributeData::Color(v) => v.get(index).map(|s| AttributeValue::Color(*s)),
		}
	}

	/// Builds a new array holding the given elements in order. Indices must be in bounds.
	fn select(&self, indices: &[usize]) -> AttributeData {
		match self {
			AttributeData::Scalar(v) => AttributeData::Scalar(indices.iter().map(|i| v[*i]).collect()),
			AttributeData::Vec2(v) => AttributeData::Vec2(indices.iter().map(|i| v[*i]).collect()),
			AttributeData::Vec3(v) => AttributeData::Vec3(indices.iter().map(|i| v[*i]).collect()),
			AttributeData::Color(v) => AttributeData::Color(indices.iter().map(|i| v[*i]).collect()),
		}
	}

	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R, count: usize, format: StorageFormat, count_type: ComponentCount) -> Result<AttributeData, J3DError>
	where
		R: ReadBytesExt,
	{
		let frac = format.fraction_bits;

		match (format.data_type, count_type) {
			(DataType::Color(t), _) => {
				let mut colors = Vec::with_capacity(count);
				for _ in 0..count {
					colors.push(read_color(buf, t)?);
				}
				Ok(AttributeData::Color(colors))
			},
			(DataType::Component(t), ComponentCount::TexCoordS) => {
				let mut scalars = Vec::with_capacity(count);
				for _ in 0..count {
					scalars.push(read_scalar(buf, t, frac)?);
				}
				Ok(AttributeData::Scalar(scalars))
			},
			(DataType::Component(t), ComponentCount::PositionXY | ComponentCount::TexCoordST) => {
				let mut vecs = Vec::with_capacity(count);
				for _ in 0..count {
					vecs.push(Vec2::new(read_scalar(buf, t, frac)?, read_scalar(buf, t, frac)?));
				}
				Ok(AttributeData::Vec2(vecs))
			},
			(DataType::Component(t), ComponentCount::PositionXYZ | ComponentCount::NormalXYZ) => {
				let mut vecs = Vec::with_capacity(count);
				for _ in 0..count {
					vecs.push(Vec3::new(read_scalar(buf, t, frac)?, read_scalar(buf, t, frac)?,
						read_scalar(buf, t, frac)?));
				}
				Ok(AttributeData::Vec3(vecs))
			},
			(_, c) => Err(J3DError::UnsupportedFormat(format!("{:?} vertex data", c))),
		}
	}

	#[cfg(feature = "export")]
	fn write<W>(&self, buf: &mut W, format: StorageFormat) -> Result<(), J3DError>
	where
		W: WriteBytesExt,
	{
		let frac = format.fraction_bits;

		match (self, format.data_type) {
			(AttributeData::Color(colors), DataType::Color(t)) => {
				for c in colors.iter() {
					write_color(buf, c, t)?;
				}
			},
			(AttributeData::Scalar(scalars), DataType::Component(t)) => {
				for s in scalars.iter() {
					write_scalar(buf, *s, t, frac)?;
				}
			},
			(AttributeData::Vec2(vecs), DataType::Component(t)) => {
				for v in vecs.iter() {
					write_scalar(buf, v.x, t, frac)?;
					write_scalar(buf, v.y, t, frac)?;
				}
			},
			(AttributeData::Vec3(vecs), DataType::Component(t)) => {
				for v in vecs.iter() {
					write_scalar(buf, v.x, t, frac)?;
					write_scalar(buf, v.y, t, frac)?;
					write_scalar(buf, v.z, t, frac)?;
				}
			},
			_ => return Err(J3DError::InvalidShape(format!("{:?} cannot hold {:?}", format, self.kind()))),
		}

		Ok(())
	}

	fn kind(&self) -> &'static str {
		match self {
			AttributeData::Scalar(_) => "scalars",
			AttributeData::Vec2(_) => "2D vectors",
			AttributeData::Vec3(_) => "3D vectors",
			AttributeData::Color(_) => "colors",
		}
	}
}

/// A channel's storage format together with its decoded elements
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeArray {
	pub format: StorageFormat,
	pub data: AttributeData,
}

impl AttributeArray {
	pub fn new(format: StorageFormat, data: AttributeData) -> AttributeArray {
		AttributeArray {
			format: format,
			data: data,
		}
	}

	/// Selector describing this array's shape, or `InvalidShape` if `channel` can't hold it
	pub fn component_count(&self, channel: Channel) -> Result<ComponentCount, J3DError> {
		let count = match (channel, &self.data, self.format.data_type) {
			(Channel::Position, AttributeData::Vec2(_), DataType::Component(_)) => Some(ComponentCount::PositionXY),
			(Channel::Position, AttributeData::Vec3(_), DataType::Component(_)) => Some(ComponentCount::PositionXYZ),
			(Channel::Normal, AttributeData::Vec3(_), DataType::Component(_)) => Some(ComponentCount::NormalXYZ),
			(Channel::Color0 | Channel::Color1, AttributeData::Color(_), DataType::Color(t)) => {
				if t.has_alpha() {
					Some(ComponentCount::ColorRGBA)
				} else {
					Some(ComponentCount::ColorRGB)
				}
			},
			(c, AttributeData::Scalar(_), DataType::Component(_)) if c >= Channel::Tex0 => Some(ComponentCount::TexCoordS),
			(c, AttributeData::Vec2(_), DataType::Component(_)) if c >= Channel::Tex0 => Some(ComponentCount::TexCoordST),
			_ => None,
		};

		count.ok_or_else(|| J3DError::InvalidShape(format!("{:?} cannot hold {} stored as {:?}",
			channel, self.data.kind(), self.format.data_type)))
	}

	/// Bytes per element
	pub fn stride(&self, channel: Channel) -> Result<usize, J3DError> {
		Ok(element_stride(self.format.data_type, self.component_count(channel)?))
	}
}

/// Bytes taken by one element of the given format and shape
pub fn element_stride(data_type: DataType, count: ComponentCount) -> usize {
	match data_type {
		DataType::Color(t) => t.size(),
		DataType::Component(t) => t.size() * count.components(),
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Header {
	pub magic: u32,
	pub size: u32,
	pub descriptor_offset: u32,
	pub offsets: OffsetTable<NUM_OFFSETS>,
}

impl Header {
	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> Result<Header, J3DError>
	where
		R: ReadBytesExt,
	{
		let magic = buf.read_u32::<BE>()?;
		if magic != MAGIC {
			return Err(J3DError::Magic(magic));
		}

		Ok(Header {
			magic: magic,
			size: buf.read_u32::<BE>()?,
			descriptor_offset: buf.read_u32::<BE>()?,
			offsets: OffsetTable::read(buf)?,
		})
	}
}

/// A format record from the descriptor list
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Descriptor {
	pub attribute: u32,
	pub component_count: u32,
	pub data_type: u32,
	pub fraction_bits: u8,
}

impl Descriptor {
	pub const fn terminator() -> Descriptor {
		Descriptor {
			attribute: Attribute::Null as u32,
			component_count: 1,
			data_type: 0,
			fraction_bits: 0,
		}
	}

	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> Result<Descriptor, J3DError>
	where
		R: ReadBytesExt,
	{
		let desc = Descriptor {
			attribute: buf.read_u32::<BE>()?,
			component_count: buf.read_u32::<BE>()?,
			data_type: buf.read_u32::<BE>()?,
			fraction_bits: buf.read_u8()?,
		};

		let mut padding = [0; 3];
		buf.read_exact(&mut padding)?;

		Ok(desc)
	}

	#[cfg(feature = "export")]
	fn write<W>(&self, buf: &mut W) -> Result<(), J3DError>
	where
		W: WriteBytesExt,
	{
		buf.write_u32::<BE>(self.attribute)?;
		buf.write_u32::<BE>(self.component_count)?;
		buf.write_u32::<BE>(self.data_type)?;
		buf.write_u8(self.fraction_bits)?;
		buf.write_all(&[0xFF; 3])?;
		Ok(())
	}
}

/// Per-channel element indices of one vertex, as referenced by shape primitives
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ShapeVertex {
	pub position: u32,
	pub normal: u32,
	pub color: [u32; 2],
	pub tex: [u32; 8],
}

impl ShapeVertex {
	pub fn index(&self, channel: Channel) -> u32 {
		match channel {
			Channel::Position => self.position,
			Channel::Normal => self.normal,
			Channel::Color0 => self.color[0],
			Channel::Color1 => self.color[1],
			c => self.tex[c as usize - Channel::Tex0 as usize],
		}
	}

	pub fn set_index(&mut self, channel: Channel, index: u32) {
		match channel {
			Channel::Position => self.position = index,
			Channel::Normal => self.normal = index,
			Channel::Color0 => self.color[0] = index,
			Channel::Color1 => self.color[1] = index,
			c => self.tex[c as usize - Channel::Tex0 as usize] = index,
		}
	}
}

/// Decoded contents of a VTX1 section: every present channel and its storage format
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexData {
	arrays: BTreeMap<Channel, AttributeArray>,
}

impl VertexData {
	pub fn new() -> VertexData {
		VertexData::default()
	}

	pub fn contains(&self, channel: Channel) -> bool {
		self.arrays.contains_key(&channel)
	}

	pub fn get(&self, channel: Channel) -> Option<&AttributeArray> {
		self.arrays.get(&channel)
	}

	/// Present channels in canonical order
	pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
		self.arrays.keys().copied()
	}

	pub fn iter(&self) -> impl Iterator<Item = (Channel, &AttributeArray)> + '_ {
		self.arrays.iter().map(|(c, a)| (*c, a))
	}

	/// Replaces a channel's whole array after checking the channel can hold it
	pub fn set(&mut self, channel: Channel, array: AttributeArray) -> Result<Option<AttributeArray>, J3DError> {
		array.component_count(channel)?;
		Ok(self.arrays.insert(channel, array))
	}

	pub fn remove(&mut self, channel: Channel) -> Option<AttributeArray> {
		self.arrays.remove(&channel)
	}

	/// Resolves every present channel's value for one shape vertex
	pub fn lookup(&self, vertex: &ShapeVertex) -> Result<BTreeMap<Channel, AttributeValue>, J3DError> {
		let mut values = BTreeMap::new();

		for (channel, array) in self.arrays.iter() {
			let index = vertex.index(*channel);
			let value = array.data.get(index as usize).ok_or(J3DError::IndexOutOfBounds {
				channel: *channel,
				index: index,
				len: array.data.len(),
			})?;
			values.insert(*channel, value);
		}

		Ok(values)
	}

	/// Drops elements no vertex refers to and rewrites the vertices' indices to match.
	///
	/// Surviving elements keep their relative order.
	pub fn compact(&mut self, vertices: &mut [ShapeVertex]) -> Result<(), J3DError> {
		for (channel, array) in self.arrays.iter_mut() {
			let used: BTreeSet<u32> = vertices.iter().map(|v| v.index(*channel)).collect();

			if let Some(last) = used.iter().next_back() {
				if *last as usize >= array.data.len() {
					return Err(J3DError::IndexOutOfBounds {
						channel: *channel,
						index: *last,
						len: array.data.len(),
					});
				}
			}

			let kept: Vec<usize> = used.iter().map(|i| *i as usize).collect();
			let remap: BTreeMap<u32, u32> = used.iter().enumerate().map(|(new, old)| (*old, new as u32)).collect();

			log::debug!("VTX1: compacting {:?} from {} to {} entries", channel, array.data.len(), kept.len());
			array.data = array.data.select(&kept);

			for v in vertices.iter_mut() {
				let old = v.index(*channel);
				v.set_index(*channel, remap[&old]);
			}
		}

		Ok(())
	}

	/// Decodes a VTX1 section starting at the current position.
	///
	/// Element counts are never stored; each channel's count is its byte range divided by its
	/// stride, so trailing alignment padding can show up as extra elements. The cursor is left
	/// at the end of the section.
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R, vertex_count: usize) -> Result<VertexData, J3DError>
	where
		R: ReadBytesExt + ReadBinExt + Seek,
	{
		let chunk_start = buf.stream_position()?;
		let stream_end = buf.seek(SeekFrom::End(0))?;
		buf.seek(SeekFrom::Start(chunk_start))?;

		let header = Header::read(buf)?;
		if chunk_start + header.size as u64 > stream_end {
			return Err(J3DError::MalformedHeader(format!("section size {:#x} runs past the end of the data ({:#x} bytes left)",
				header.size, stream_end.saturating_sub(chunk_start))));
		}

		if header.offsets.is_occupied(NBT_SLOT) {
			log::debug!("VTX1: section carries normal/binormal/tangent data, which bounds the normal array but is not decoded");
		}

		buf.seek(SeekFrom::Start(chunk_start + header.descriptor_offset as u64))?;

		let mut data = VertexData::new();

		loop {
			let desc = Descriptor::read(buf)?;

			let attribute = Attribute::from_u32(desc.attribute)
				.ok_or_else(|| J3DError::MalformedHeader(format!("unknown vertex attribute {}", desc.attribute)))?;

			if attribute == Attribute::Null {
				break;
			}

			if attribute == Attribute::NormalBinormalTangent {
				log::warn!("VTX1: normal/binormal/tangent data is not supported, skipping");
				continue;
			}

			let channel = Channel::from_attribute(attribute)
				.ok_or_else(|| J3DError::UnsupportedFormat(format!("{:?} has no vertex array", attribute)))?;

			let count_type = match ComponentCount::from_raw(attribute, desc.component_count) {
				Some(ComponentCount::NormalNBT) | Some(ComponentCount::NormalNBT3) => {
					log::warn!("VTX1: {:?} uses normal/binormal/tangent data, which is not supported; skipping", channel);
					continue;
				},
				Some(c) => c,
				None => {
					log::warn!("VTX1: {:?} has unknown component count {}, skipping", channel, desc.component_count);
					continue;
				},
			};

			let data_type = channel.data_type(desc.data_type)
				.ok_or_else(|| J3DError::UnsupportedFormat(format!("{:?} data type {}", channel, desc.data_type)))?;
			let format = StorageFormat {
				data_type: data_type,
				fraction_bits: desc.fraction_bits,
			};

			let (start, length) = header.offsets.resolve(channel.slot(), header.size)?;
			let count = length as usize / element_stride(data_type, count_type);

			let array = buf.read_at(chunk_start + start as u64, |buf| {
				AttributeData::read(buf, count, format, count_type)
			})?;

			log::debug!("VTX1: {:?} holds {} entries ({} vertices)", channel, count, vertex_count);
			data.arrays.insert(channel, AttributeArray::new(format, array));
		}

		buf.seek(SeekFrom::Start(chunk_start + header.size as u64))?;
		Ok(data)
	}

	/// Encodes a VTX1 section at the current position and returns its size in bytes.
	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<u32, J3DError>
	where
		W: WriteBytesExt + WriteBinExt + Seek,
	{
		let chunk_start = buf.stream_position()?;

		buf.write_u32::<BE>(MAGIC)?;
		buf.write_u32::<BE>(0)?;
		buf.write_u32::<BE>(DESCRIPTOR_OFFSET)?;
		for _ in 0..NUM_OFFSETS {
			buf.write_u32::<BE>(0)?;
		}

		for (channel, array) in self.arrays.iter() {
			Descriptor {
				attribute: channel.attribute() as u32,
				component_count: array.component_count(*channel)?.raw(),
				data_type: array.format.data_type.raw(),
				fraction_bits: array.format.fraction_bits,
			}.write(buf)?;
		}
		Descriptor::terminator().write(buf)?;
		buf.pad_to(ALIGNMENT)?;

		for (channel, array) in self.arrays.iter() {
			let pos = buf.stream_position()?;
			buf.patch_u32_be(chunk_start + OFFSET_TABLE_POS + channel.slot() as u64 * 4, (pos - chunk_start) as u32)?;

			array.data.write(buf, array.format)?;
			buf.pad_to(ALIGNMENT)?;
		}

		let size = (buf.stream_position()? - chunk_start) as u32;
		buf.patch_u32_be(chunk_start + 4, size)?;

		Ok(size)
	}
}
