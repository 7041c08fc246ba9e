use byteorder::{
	BE,
	ReadBytesExt
};

use crate::J3DError;

/// Fixed-size table of section-relative offsets where 0 marks an empty slot.
///
/// Slot lengths are never stored; a slot owns everything up to the next occupied slot,
/// or up to the end of the section for the last one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OffsetTable<const N: usize> {
	pub offsets: [u32; N],
}

impl<const N: usize> Default for OffsetTable<N> {
	fn default() -> Self {
		OffsetTable {
			offsets: [0; N],
		}
	}
}

impl<const N: usize> OffsetTable<N> {
	pub fn new(offsets: [u32; N]) -> OffsetTable<N> {
		OffsetTable {
			offsets: offsets,
		}
	}

	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<OffsetTable<N>, J3DError>
	where
		R: ReadBytesExt,
	{
		let mut offsets = [0; N];
		for offset in offsets.iter_mut() {
			*offset = buf.read_u32::<BE>()?;
		}

		Ok(OffsetTable::new(offsets))
	}

	pub fn is_occupied(&self, index: usize) -> bool {
		self.offsets.get(index).map_or(false, |o| *o != 0)
	}

	/// Returns `(start, length)` of the occupied slot at `index`.
	///
	/// Slots must appear in non-decreasing offset order. A table that breaks this, an empty
	/// slot or a start past the section end yields [`J3DError::MalformedHeader`].
	pub fn resolve(&self, index: usize, section_size: u32) -> Result<(u32, u32), J3DError> {
		let start = match self.offsets.get(index) {
			Some(0) => return Err(J3DError::MalformedHeader(format!("offset slot {} is empty", index))),
			Some(o) => *o,
			None => return Err(J3DError::MalformedHeader(format!("offset slot {} out of range", index))),
		};

		let end = self.offsets[index + 1..].iter()
			.copied()
			.find(|o| *o != 0)
			.unwrap_or(section_size);

		match end.checked_sub(start) {
			Some(length) => Ok((start, length)),
			None => Err(J3DError::MalformedHeader(format!(
				"offset slot {} starts at {:#x} but its data ends at {:#x}", index, start, end))),
		}
	}
}
