use std::io::{
	self,
	Read,
	Result,
	Seek,
	SeekFrom,
	Write
};

/// Filler written between aligned blocks by J3D-family tools
pub const PADDING: &[u8] = b"This is padding data to align";

pub trait ReadBinExt: Read + Seek {
	/// Reads exactly `len` bytes into a new buffer.
	///
	/// The buffer grows with the data actually read, so a bogus length fails with
	/// `UnexpectedEof` instead of allocating up front.
	fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
		let mut data = vec![];
		Read::take(&mut *self, len as u64).read_to_end(&mut data)?;

		if data.len() < len {
			return Err(io::Error::new(io::ErrorKind::UnexpectedEof,
				format!("wanted {} bytes, only {} left", len, data.len())));
		}

		Ok(data)
	}

	/// Runs `f` with the cursor moved to `pos`, then puts the cursor back where it was.
	fn read_at<T, E, F>(&mut self, pos: u64, f: F) -> std::result::Result<T, E>
	where
		E: From<io::Error>,
		F: FnOnce(&mut Self) -> std::result::Result<T, E>,
	{
		let resume = self.stream_position()?;
		self.seek(SeekFrom::Start(pos))?;
		let out = f(self);
		self.seek(SeekFrom::Start(resume))?;
		out
	}
}

impl<R> ReadBinExt for R
where
	R: Read + Seek + ?Sized,
{
}

pub trait WriteBinExt: Write + Seek {
	/// Writes filler until the absolute position is a multiple of `align`
	fn pad_to(&mut self, align: u64) -> Result<()> {
		let pos = self.stream_position()?;
		let needed = ((align - pos % align) % align) as usize;

		for i in 0..needed {
			self.write_all(&[PADDING[i % PADDING.len()]])?;
		}

		Ok(())
	}

	/// Overwrites a big endian u32 at `pos` without moving the cursor
	fn patch_u32_be(&mut self, pos: u64, value: u32) -> Result<()> {
		let resume = self.stream_position()?;
		self.seek(SeekFrom::Start(pos))?;
		self.write_all(&value.to_be_bytes())?;
		self.seek(SeekFrom::Start(resume))?;
		Ok(())
	}
}

impl<W> WriteBinExt for W
where
	W: Write + Seek + ?Sized,
{
}

#[cfg(test)]
mod tests {
	use std::io::{
		Cursor,
		Seek,
		SeekFrom,
		Write
	};

	use super::*;

	#[test]
	fn test_read_at_restores_position() {
		let mut data = Cursor::new(vec![1u8, 2, 3, 4, 5, 6]);
		data.seek(SeekFrom::Start(1)).unwrap();

		let tail: io::Result<Vec<u8>> = data.read_at(4, |buf| buf.read_vec(2));
		assert_eq!(tail.unwrap(), vec![5, 6]);
		assert_eq!(data.stream_position().unwrap(), 1);
	}

	#[test]
	fn test_read_vec_past_end() {
		let mut data = Cursor::new(vec![1u8, 2, 3]);
		let err = data.read_vec(usize::MAX).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

		let mut data = Cursor::new(vec![1u8, 2, 3]);
		assert_eq!(data.read_vec(3).unwrap(), vec![1, 2, 3]);
	}

	#[test]
	fn test_pad_to() {
		let mut data = Cursor::new(vec![]);
		data.write_all(&[0xAA; 5]).unwrap();
		data.pad_to(32).unwrap();

		let bytes = data.into_inner();
		assert_eq!(bytes.len(), 32);
		assert_eq!(&bytes[5..10], b"This ");
	}

	#[test]
	fn test_pad_to_aligned_is_noop() {
		let mut data = Cursor::new(vec![]);
		data.write_all(&[0; 32]).unwrap();
		data.pad_to(32).unwrap();
		assert_eq!(data.into_inner().len(), 32);
	}

	#[test]
	fn test_patch_u32_be() {
		let mut data = Cursor::new(vec![]);
		data.write_all(&[0; 8]).unwrap();
		data.patch_u32_be(2, 0x11223344).unwrap();
		assert_eq!(data.stream_position().unwrap(), 8);
		assert_eq!(data.into_inner(), vec![0, 0, 0x11, 0x22, 0x33, 0x44, 0, 0]);
	}
}
