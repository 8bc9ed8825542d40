mod misc;
pub use misc::*;

mod definitions;
pub use definitions::*;
