pub mod codec;
pub mod format;
pub mod loader;
pub mod manifest;
pub mod pack;
