//! Request handlers.

pub mod health;
pub mod hls;
pub mod medias;

pub use health::*;
pub use hls::*;
pub use medias::*;
