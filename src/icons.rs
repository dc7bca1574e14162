//! File icons for file dialogs.
//!
//! Icons are rasterized from built-in vector sources on a blocking worker of the tokio
//! runtime. Only pixel data crosses threads: the UI thread polls
//! [`IconLoader::update`], takes the finished batch and turns it into textures with
//! [`BackendContext::texture_from_image`](crate::context::BackendContext::texture_from_image).
//!
//! A new request supersedes the previous one. The previous worker is cancelled and any
//! result it still manages to publish is discarded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::render::types::{RgbaImage, Vector2u};
use crate::svg::SvgImage;

const FOLDER_ICON: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="32" height="32" viewBox="0 0 32 32">
    <path d="M2 7h11l3 3h14v17H2z" fill="#e8b84a"/>
    <path d="M2 12h28v15H2z" fill="#f5cf6b"/>
</svg>"##;

const FILE_ICON: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="32" height="32" viewBox="0 0 32 32">
    <path d="M7 2h13l6 6v22H7z" fill="#f4f4f4" stroke="#8a8a8a"/>
    <path d="M20 2v6h6" fill="#d8d8d8" stroke="#8a8a8a"/>
</svg>"##;

const TEXT_ICON: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="32" height="32" viewBox="0 0 32 32">
    <path d="M7 2h13l6 6v22H7z" fill="#f4f4f4" stroke="#8a8a8a"/>
    <path d="M11 13h11M11 17h11M11 21h11M11 25h7" stroke="#5a6f8c" stroke-width="1.5"/>
</svg>"##;

const IMAGE_ICON: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="32" height="32" viewBox="0 0 32 32">
    <path d="M7 2h13l6 6v22H7z" fill="#f4f4f4" stroke="#8a8a8a"/>
    <circle cx="13" cy="14" r="2.5" fill="#e0a030"/>
    <path d="M9 26l5-7 3 4 3-3 4 6z" fill="#4a9a5a"/>
</svg>"##;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "svg", "webp", "tga", "ico"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "rs", "toml", "json", "xml", "csv", "log", "ini", "cfg"];

/// A file shown in a file dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub is_directory: bool,
}

impl FileInfo {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
        }
    }
}

/// Built-in icon shown for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconKind {
    Folder,
    Image,
    Text,
    Generic,
}

impl IconKind {
    /// Picks the icon from the directory flag and, for files, the extension.
    pub fn for_file(file: &FileInfo) -> Self {
        if file.is_directory {
            return IconKind::Folder;
        }

        let Some(ext) = extension(&file.path) else {
            return IconKind::Generic;
        };
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            IconKind::Image
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            IconKind::Text
        } else {
            IconKind::Generic
        }
    }

    fn source(self) -> &'static str {
        match self {
            IconKind::Folder => FOLDER_ICON,
            IconKind::Image => IMAGE_ICON,
            IconKind::Text => TEXT_ICON,
            IconKind::Generic => FILE_ICON,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn rasterize_icon(kind: IconKind, size: u32) -> RgbaImage {
    SvgImage::from_str(kind.source())
        .rasterize_to_image(Vector2u::new(size, size))
        .unwrap_or_else(|| RgbaImage::transparent(size, size))
}

type Slot = Arc<Mutex<Option<(u64, Vec<RgbaImage>)>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<(u64, Vec<RgbaImage>)>> {
    // A panicking worker leaves nothing half-written in the slot.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Loads file icons in the background.
pub struct IconLoader {
    runtime: Handle,
    icon_size: u32,
    generation: Arc<AtomicU64>,
    cancel: Option<CancellationToken>,
    slot: Slot,
    ready: Option<Vec<RgbaImage>>,
}

impl std::fmt::Debug for IconLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconLoader")
            .field("icon_size", &self.icon_size)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("ready", &self.ready.as_ref().map(Vec::len))
            .finish()
    }
}

impl IconLoader {
    /// Creates a loader whose workers run on `runtime`. Icons are `icon_size` pixels
    /// square.
    pub fn new(runtime: Handle, icon_size: u32) -> Self {
        Self {
            runtime,
            icon_size: icon_size.max(1),
            generation: Arc::new(AtomicU64::new(0)),
            cancel: None,
            slot: Arc::new(Mutex::new(None)),
            ready: None,
        }
    }

    pub fn icon_size(&self) -> u32 {
        self.icon_size
    }

    /// Icons from the desktop environment are not available, only the built-in ones.
    pub fn supports_system_icons(&self) -> bool {
        false
    }

    pub fn has_generic_icons(&self) -> bool {
        true
    }

    /// Rasterizes the generic icon for `file` on the calling thread.
    pub fn generic_file_icon(&self, file: &FileInfo) -> RgbaImage {
        rasterize_icon(IconKind::for_file(file), self.icon_size)
    }

    /// Starts loading icons for `files`, replacing any request still in flight.
    pub fn request_file_icons(&mut self, files: Vec<FileInfo>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.cancel.take() {
            previous.cancel();
        }
        self.ready = None;

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let current = Arc::clone(&self.generation);
        let slot = Arc::clone(&self.slot);
        let size = self.icon_size;
        log::debug!("icons: batch {generation} requested for {} files", files.len());

        self.runtime.spawn_blocking(move || {
            let mut cache: HashMap<IconKind, RgbaImage> = HashMap::new();
            let mut icons = Vec::with_capacity(files.len());

            for file in &files {
                if cancel.is_cancelled() {
                    log::debug!("icons: batch {generation} cancelled");
                    return;
                }
                let kind = IconKind::for_file(file);
                let icon = cache.entry(kind).or_insert_with(|| rasterize_icon(kind, size));
                icons.push(icon.clone());
            }

            let mut slot = lock(&slot);
            if current.load(Ordering::SeqCst) == generation {
                *slot = Some((generation, icons));
            }
        });
    }

    /// Polled from the UI thread. Returns true when the icons of the latest request are
    /// ready to be retrieved.
    pub fn update(&mut self) -> bool {
        if self.ready.is_some() {
            return true;
        }

        let Some((generation, icons)) = lock(&self.slot).take() else {
            return false;
        };

        if generation != self.generation.load(Ordering::SeqCst) {
            log::debug!("icons: discarding stale batch {generation}");
            return false;
        }

        self.cancel = None;
        self.ready = Some(icons);
        true
    }

    /// Takes the icons of the latest request, in the order the files were given. Empty
    /// when [`update`](Self::update) has not reported them ready.
    pub fn retrieve_file_icons(&mut self) -> Vec<RgbaImage> {
        self.ready.take().unwrap_or_default()
    }
}

impl Drop for IconLoader {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}
