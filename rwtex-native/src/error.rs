use thiserror::Error;

pub type Result<T> = std::result::Result<T, TextureError>;

#[derive(Error, Debug)]
pub enum TextureError {
    /// The input bytes violate the binary contract of the format
    #[error("Structural error: {0}")]
    Structural(String),

    /// Caller-supplied pixel data violates the rules of the target format
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Input/output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("BinRW error: {0}")]
    BinRw(#[from] binrw::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    InvalidConfiguration,
    Internal,
}

impl TextureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Structural(_) | Self::Io(_) | Self::BinRw(_) => ErrorKind::Structural,
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Builds a [`TextureError::Structural`] from a format string
#[macro_export]
macro_rules! structural {
    ($($arg:tt)*) => {
        $crate::error::TextureError::Structural(format!($($arg)*))
    };
}

/// Builds a [`TextureError::InvalidConfiguration`] from a format string
#[macro_export]
macro_rules! invalid_config {
    ($($arg:tt)*) => {
        $crate::error::TextureError::InvalidConfiguration(format!($($arg)*))
    };
}

/// Builds a [`TextureError::Internal`] from a format string
#[macro_export]
macro_rules! internal {
    ($($arg:tt)*) => {
        $crate::error::TextureError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binrw_and_io_errors_are_structural() {
        let io = TextureError::from(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert_eq!(io.kind(), ErrorKind::Structural);

        let bad_magic = TextureError::from(binrw::Error::BadMagic {
            pos: 0,
            found: Box::new(0u32),
        });
        assert_eq!(bad_magic.kind(), ErrorKind::Structural);

        assert_eq!(invalid_config!("x").kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(internal!("y {}", 1).kind(), ErrorKind::Internal);
    }
}
