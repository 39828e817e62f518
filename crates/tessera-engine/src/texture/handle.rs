use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::LoadError;

/// Decoded RGBA8 image, row-major, `width * height * 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ImageData {
    pub fn from_image(img: &image::DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        Self { width: rgba.width(), height: rgba.height(), rgba: rgba.into_raw() }
    }

    /// A `width × height` image filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        Self { width, height, rgba: rgba.repeat(pixels) }
    }
}

/// Process-unique texture identity. GPU backends key their uploads on it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Observable load progress of a texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded,
    Failed(LoadError),
}

enum Slot {
    Pending,
    Loaded(Rc<ImageData>),
    Failed(LoadError),
}

struct TextureInner {
    id: TextureId,
    key: String,
    slot: RefCell<Slot>,
}

/// Shared handle to a texture that may still be loading.
///
/// Cloning is cheap and every clone observes the same state, so a handle
/// obtained while the load is pending can be bound into an atlas right away;
/// it starts drawing once the image arrives.
#[derive(Clone)]
pub struct TextureHandle(Rc<TextureInner>);

impl TextureHandle {
    pub(crate) fn pending(key: &str) -> Self {
        Self(Rc::new(TextureInner {
            id: TextureId::next(),
            key: key.to_owned(),
            slot: RefCell::new(Slot::Pending),
        }))
    }

    /// Creates an already-loaded handle, e.g. for generated textures.
    pub fn from_image(key: &str, image: ImageData) -> Self {
        let handle = Self::pending(key);
        handle.resolve(Ok(image));
        handle
    }

    #[inline]
    pub fn id(&self) -> TextureId {
        self.0.id
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.0.key
    }

    pub fn load_state(&self) -> LoadState {
        match &*self.0.slot.borrow() {
            Slot::Pending => LoadState::Pending,
            Slot::Loaded(_) => LoadState::Loaded,
            Slot::Failed(err) => LoadState::Failed(err.clone()),
        }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        matches!(&*self.0.slot.borrow(), Slot::Loaded(_))
    }

    /// The decoded image, once loaded.
    pub fn image(&self) -> Option<Rc<ImageData>> {
        match &*self.0.slot.borrow() {
            Slot::Loaded(img) => Some(Rc::clone(img)),
            _ => None,
        }
    }

    /// `(width, height)` in pixels, once loaded.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.image().map(|img| (img.width, img.height))
    }

    pub(crate) fn resolve(&self, result: Result<ImageData, LoadError>) {
        *self.0.slot.borrow_mut() = match result {
            Ok(image) => Slot::Loaded(Rc::new(image)),
            Err(err) => Slot::Failed(err),
        };
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for TextureHandle {}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureHandle")
            .field("id", &self.0.id)
            .field("key", &self.0.key)
            .field("state", &self.load_state())
            .finish()
    }
}
