pub mod handlers;
pub mod swizzle;
pub mod texture;
