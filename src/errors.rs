use crate::render::Vector2u;

/// Errors reported at the texture, renderer and context boundaries.
///
/// Backend and driver failures are translated into one of these variants; none of the
/// operations in this crate panic on a backend failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Texture size {requested:?} exceeds the maximum texture size of {maximum}")]
    TextureTooLarge { requested: Vector2u, maximum: u32 },

    #[error("Invalid texture size {0:?}")]
    InvalidSize(Vector2u),

    #[error("Pixel data has {actual} bytes, expected {expected}")]
    InvalidPixelData { expected: usize, actual: usize },

    #[error("Backend could not allocate a texture of size {0:?}")]
    AllocationFailed(Vector2u),

    #[error("Texture has no native resource")]
    NotLoaded,

    #[error("Texture does not retain its pixels")]
    PixelsNotRetained,

    #[error("Pixel {0:?} is outside the texture")]
    OutOfBounds(Vector2u),

    #[error("Surface was not created by the {0} backend")]
    SurfaceMismatch(String),

    #[error("No backend renderer is active")]
    NoActiveBackend,

    #[error("A backend renderer is already active")]
    BackendAlreadyActive,

    #[error("Backend device was shut down")]
    BackendGone,

    #[error("Unknown surface")]
    UnknownSurface,

    #[error("Backend error: {0}")]
    Backend(String),
}
