/// Normalized color, each channel nominally in `[0, 1]`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
	pub red: f32,
	pub green: f32,
	pub blue: f32,
	pub alpha: f32,
}

impl Color {
	pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Color {
		Color {
			red: red,
			green: green,
			blue: blue,
			alpha: alpha,
		}
	}

	pub fn from_rgba8(rgba: [u8; 4]) -> Color {
		Color {
			red: rgba[0] as f32 / 255.0,
			green: rgba[1] as f32 / 255.0,
			blue: rgba[2] as f32 / 255.0,
			alpha: rgba[3] as f32 / 255.0,
		}
	}
}
