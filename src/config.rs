use log::LevelFilter;

/// Maximum texture size of the headless device when nothing else is configured.
const DEFAULT_DEVICE_MAX_TEXTURE_SIZE: u32 = 8192;
/// Maximum texture size of the software backend. Pixmaps are plain memory, so this
/// only guards against absurd allocations.
const DEFAULT_SOFTWARE_MAX_TEXTURE_SIZE: u32 = 16384;
/// Edge length in pixels of file dialog icons.
const DEFAULT_ICON_SIZE: u32 = 32;

/// Configuration for the headless device backend.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Largest width or height a single texture may have
    pub max_texture_size: u32,
    /// Total bytes the device may hand out for textures. `None` means unlimited.
    pub memory_budget: Option<usize>,
}

/// Rendering configuration shared by the backends and the backend context.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Smooth flag used for textures created by the context helpers
    pub default_smooth: bool,
    /// Headless device settings
    pub device: DeviceConfig,
    /// Largest width or height of a software texture
    pub software_max_texture_size: u32,
    /// Size of the icons produced by the icon loader
    pub icon_size: u32,
    /// Log level used by [`crate::logging::init`]
    pub log_level: LevelFilter,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_smooth: true,
            device: DeviceConfig {
                max_texture_size: DEFAULT_DEVICE_MAX_TEXTURE_SIZE,
                memory_budget: None,
            },
            software_max_texture_size: DEFAULT_SOFTWARE_MAX_TEXTURE_SIZE,
            icon_size: DEFAULT_ICON_SIZE,
            log_level: LevelFilter::Info,
        }
    }
}

impl RenderConfig {
    /// Default configuration with overrides taken from the environment.
    ///
    /// `PANE_MAX_TEXTURE_SIZE` caps the texture size of every backend and `PANE_LOG` sets
    /// the log level (`error`, `warn`, `info`, `debug`, `trace` or `off`). Values that do
    /// not parse are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(max) = std::env::var("PANE_MAX_TEXTURE_SIZE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&n| n > 0)
        {
            config.device.max_texture_size = max;
            config.software_max_texture_size = max;
        }

        if let Some(level) = std::env::var("PANE_LOG")
            .ok()
            .and_then(|v| v.parse::<LevelFilter>().ok())
        {
            config.log_level = level;
        }

        config
    }
}
