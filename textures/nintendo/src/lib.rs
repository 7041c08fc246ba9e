pub mod bti;
pub mod cmpr;
pub mod gx;
pub mod palette;
pub mod pixel;

use std::{
	fs,
	io
};

use thiserror::Error;

use bti::Texture;

#[derive(Debug, Error)]
pub enum BTIError {
	#[error("I/O error")]
	IO {
		#[from]
		source: io::Error,
	},
	#[error("Malformed texture header: {0}")]
	MalformedHeader(String),
	#[error("Unsupported texture format: {0}")]
	UnsupportedFormat(String),
	#[error("Invalid image shape: {0}")]
	InvalidShape(String),
	#[error("Corrupt palette reference: {0}")]
	CorruptPaletteReference(String),
	#[error("Palette needs {count} colors but the format addresses at most {max}")]
	TooManyColors {
		count: usize,
		max: usize,
	},
}

#[cfg(feature = "import")]
pub fn read_bti(filepath: &str) -> Result<Texture, BTIError> {
	let input = fs::read(filepath)?;
	Texture::read(&mut io::Cursor::new(input))
}

#[cfg(feature = "export")]
pub fn write_bti(texture: &Texture, filepath: &str) -> Result<(), BTIError> {
	let mut output = io::Cursor::new(vec![]);
	texture.write(&mut output)?;
	fs::write(filepath, output.into_inner())?;
	Ok(())
}
