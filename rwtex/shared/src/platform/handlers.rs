use std::fmt;

use crate::error::Result;
pub use crate::pixel::color::{browse_texel_rgba, put_texel_rgba, Rgba8};

/// Translates a Direct3D format the engine has no built-in mapping for.
///
/// The generic side is always byte-ordered RGBA8888 with unpadded rows;
/// native texels use DWORD aligned rows as stored in the container.
pub trait D3dFormatHandler: Send + Sync {
    /// The `D3DFORMAT` value handled
    fn format(&self) -> u32;

    /// Bits per native texel
    fn depth(&self) -> u32;

    fn convert_to_rw(&self, texels: &[u8], width: u32, height: u32, rgba: &mut [u8]) -> Result<()>;

    fn convert_from_rw(&self, rgba: &[u8], width: u32, height: u32, texels: &mut [u8]) -> Result<()>;
}

/// Immutable set of extension handlers consulted by the D3D9 adapter
#[derive(Default)]
pub struct FormatHandlerTable {
    handlers: Vec<Box<dyn D3dFormatHandler>>,
}

impl FormatHandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations for the same format replace earlier ones
    pub fn with_handler<H: D3dFormatHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.retain(|h| h.format() != handler.format());
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn get(&self, format: u32) -> Option<&dyn D3dFormatHandler> {
        self.handlers
            .iter()
            .find(|h| h.format() == format)
            .map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for FormatHandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| format!("0x{:x}", h.format())))
            .finish()
    }
}
