pub mod gx;
pub mod offsets;
pub mod vtx1;

use std::io;

use thiserror::Error;

use vtx1::Channel;

#[derive(Debug, Error)]
pub enum J3DError {
	#[error("I/O error")]
	IO {
		#[from]
		source: io::Error,
	},
	#[error("Not a VTX1 section: {0:#010x}")]
	Magic(u32),
	#[error("Malformed section header: {0}")]
	MalformedHeader(String),
	#[error("Unsupported vertex format: {0}")]
	UnsupportedFormat(String),
	#[error("Invalid attribute shape: {0}")]
	InvalidShape(String),
	#[error("{channel:?} index {index} is out of bounds ({len} entries)")]
	IndexOutOfBounds {
		channel: Channel,
		index: u32,
		len: usize,
	},
}

/// Decodes a VTX1 section from the start of `data`.
#[cfg(feature = "import")]
pub fn read_vtx1(data: &[u8], vertex_count: usize) -> Result<vtx1::VertexData, J3DError> {
	vtx1::VertexData::read(&mut io::Cursor::new(data), vertex_count)
}

/// Encodes `data` as a standalone VTX1 section.
#[cfg(feature = "export")]
pub fn write_vtx1(data: &vtx1::VertexData) -> Result<Vec<u8>, J3DError> {
	let mut out = io::Cursor::new(vec![]);
	data.write(&mut out)?;
	Ok(out.into_inner())
}
