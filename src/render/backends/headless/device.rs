//! In-memory texture device.
//!
//! Behaves like the texture API of a GPU driver or `SDL_Renderer`: textures live inside
//! the device and are referred to by opaque handles. The device reports each texture's
//! size and scale mode, enforces a maximum texture size and, optionally, a memory budget.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::config::DeviceConfig;
use crate::errors::RenderError;
use crate::render::texture::validate_load;
use crate::render::types::Vector2u;

pub(crate) struct TextureData {
    pub size: Vector2u,
    pub smooth: bool,
    pub pixels: Vec<u8>,
}

pub(crate) struct DeviceState {
    config: DeviceConfig,
    next_id: u64,
    textures: HashMap<u64, TextureData>,
    allocated: usize,
}

impl DeviceState {
    pub(crate) fn texture(&self, id: u64) -> Option<&TextureData> {
        self.textures.get(&id)
    }
}

/// Shared reference to the device. Cloning is cheap and refers to the same device.
#[derive(Clone)]
pub struct HeadlessDevice {
    state: Rc<RefCell<DeviceState>>,
}

impl std::fmt::Debug for HeadlessDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("HeadlessDevice")
            .field("max_texture_size", &state.config.max_texture_size)
            .field("textures", &state.textures.len())
            .field("allocated", &state.allocated)
            .finish()
    }
}

impl HeadlessDevice {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(DeviceState {
                config,
                next_id: 1,
                textures: HashMap::new(),
                allocated: 0,
            })),
        }
    }

    pub fn max_texture_size(&self) -> u32 {
        self.state.borrow().config.max_texture_size
    }

    /// Number of textures currently alive on the device.
    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    /// Bytes currently held by textures.
    pub fn allocated_bytes(&self) -> usize {
        self.state.borrow().allocated
    }

    /// Creates a texture with zeroed content.
    pub fn create_texture(&self, size: Vector2u, smooth: bool) -> Result<DeviceTexture, RenderError> {
        let mut state = self.state.borrow_mut();
        let len = validate_load(size, None, state.config.max_texture_size)?;

        if let Some(budget) = state.config.memory_budget {
            if state.allocated + len > budget {
                return Err(RenderError::AllocationFailed(size));
            }
        }

        let id = state.next_id;
        state.next_id += 1;
        state.allocated += len;
        state.textures.insert(
            id,
            TextureData {
                size,
                smooth,
                pixels: vec![0; len],
            },
        );
        log::debug!("device: created texture {id} ({}x{})", size.x, size.y);

        Ok(DeviceTexture {
            id,
            device: Rc::downgrade(&self.state),
        })
    }

    pub(crate) fn from_state(state: Rc<RefCell<DeviceState>>) -> Self {
        Self { state }
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<DeviceState>> {
        Rc::downgrade(&self.state)
    }
}

/// Owning handle to a device texture.
///
/// Not `Clone`: the handle is the only owner and destroys the texture when dropped.
/// Moving it is the only way to hand the texture to someone else.
pub struct DeviceTexture {
    id: u64,
    device: Weak<RefCell<DeviceState>>,
}

impl std::fmt::Debug for DeviceTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceTexture").field("id", &self.id).finish()
    }
}

impl DeviceTexture {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True when this texture was created by the device behind `device`. Ids are only
    /// unique within one device.
    pub(crate) fn belongs_to(&self, device: &Weak<RefCell<DeviceState>>) -> bool {
        Weak::ptr_eq(&self.device, device)
    }

    fn with_data<R>(&self, f: impl FnOnce(&mut TextureData) -> R) -> Result<R, RenderError> {
        let device = self.device.upgrade().ok_or(RenderError::BackendGone)?;
        let mut state = device.borrow_mut();
        let data = state.textures.get_mut(&self.id).ok_or(RenderError::BackendGone)?;
        Ok(f(data))
    }

    /// Size and scale mode (`true` for linear filtering) as reported by the device.
    pub fn query(&self) -> Result<(Vector2u, bool), RenderError> {
        self.with_data(|data| (data.size, data.smooth))
    }

    pub fn set_scale_mode(&self, smooth: bool) -> Result<(), RenderError> {
        self.with_data(|data| data.smooth = smooth)
    }

    /// Overwrites the whole texture with RGBA8 `pixels`.
    pub fn update(&self, pixels: &[u8]) -> Result<(), RenderError> {
        self.with_data(|data| {
            if pixels.len() != data.pixels.len() {
                return Err(RenderError::InvalidPixelData {
                    expected: data.pixels.len(),
                    actual: pixels.len(),
                });
            }
            data.pixels.copy_from_slice(pixels);
            Ok(())
        })?
    }

    /// Copies the texture content back as RGBA8.
    pub fn read(&self) -> Result<Vec<u8>, RenderError> {
        self.with_data(|data| data.pixels.clone())
    }
}

impl Drop for DeviceTexture {
    fn drop(&mut self) {
        let Some(device) = self.device.upgrade() else {
            return;
        };
        let mut state = device.borrow_mut();
        if let Some(data) = state.textures.remove(&self.id) {
            state.allocated -= data.pixels.len();
            log::debug!("device: destroyed texture {}", self.id);
        }
    }
}
