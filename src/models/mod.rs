pub mod climate;
pub mod crop;
pub mod params;
pub mod result;
pub mod soil;

pub use climate::*;
pub use crop::*;
pub use params::*;
pub use result::*;
pub use soil::*;
