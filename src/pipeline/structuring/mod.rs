pub mod normalize;
pub mod dates;
pub mod cleanup;

pub use normalize::*;
pub use dates::*;
pub use cleanup::*;
