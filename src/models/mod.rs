pub mod classification;
pub mod enums;

pub use classification::*;
pub use enums::*;
