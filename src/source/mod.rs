pub mod locate;
pub mod mortality;
pub mod reader;
pub mod reference;

pub use locate::*;
pub use mortality::*;
pub use reader::*;
pub use reference::*;
