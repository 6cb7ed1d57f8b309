pub mod error;
pub mod image;

pub use error::{LazarusError, LazarusResult};
pub use image::DiskImage;
