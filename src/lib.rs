//! Backend-agnostic 2D rendering layer for retained-mode GUI toolkits.
//!
//! Widgets draw through a [`RenderTarget`](render::target::RenderTarget) and own
//! [`BackendTexture`](render::texture::BackendTexture)s without knowing which backend
//! is active. The [`BackendContext`](context::BackendContext) selects the backend.

pub mod config;
pub mod context;
pub mod errors;
pub mod icons;
pub mod logging;
pub mod render;
pub mod svg;

pub use context::{BackendContext, SurfaceId};
pub use errors::RenderError;
pub use svg::SvgImage;
