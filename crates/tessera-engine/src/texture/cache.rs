use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;

use super::{ImageData, ImageLoader, LoadState, TextureHandle, TextureId};
use crate::error::LoadError;

type Waiter = Box<dyn FnOnce(Result<TextureHandle, LoadError>)>;

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, TextureHandle>,
    // Keyed by handle rather than key so an evicted in-flight load still
    // reaches the callers that asked for it. A queue stays here until its
    // last waiter has been called.
    waiters: HashMap<TextureId, VecDeque<Waiter>>,
    loads_started: u64,
}

/// Deduplicating texture cache.
///
/// At most one load is in flight per key. Completion callbacks run on the
/// `LocalPool` that owns `spawner`, in registration order, never
/// concurrently with the caller: whoever drives that pool (once per frame,
/// typically via `run_until_stalled`) decides when they run.
///
/// Entries are never evicted implicitly; see
/// [`remove_texture_for_key`](Self::remove_texture_for_key) and
/// [`shutdown`](Self::shutdown).
pub struct TextureCache {
    state: Rc<RefCell<CacheState>>,
    loader: Rc<dyn ImageLoader>,
    spawner: LocalSpawner,
}

impl fmt::Debug for TextureCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TextureCache")
            .field("entries", &state.entries.len())
            .field("pending_waiters", &state.waiters.len())
            .field("loads_started", &state.loads_started)
            .finish()
    }
}

impl TextureCache {
    pub fn new(loader: Rc<dyn ImageLoader>, spawner: LocalSpawner) -> Self {
        Self { state: Rc::default(), loader, spawner }
    }

    /// Requests the texture for `key`, invoking `callback` once it resolves.
    ///
    /// - loaded: `callback` runs before this returns
    /// - failed: `callback` runs before this returns, with the stored error;
    ///   the load is not retried
    /// - pending, or resolved with earlier callbacks still being notified:
    ///   `callback` is queued behind them
    /// - unknown: a pending entry is created and one load is started
    ///
    /// The returned handle is usable immediately; it reports `Pending` until
    /// the load completes.
    pub fn add_image<C>(&self, key: &str, callback: C) -> TextureHandle
    where
        C: FnOnce(Result<TextureHandle, LoadError>) + 'static,
    {
        let mut state = self.state.borrow_mut();

        if let Some(handle) = state.entries.get(key).cloned() {
            let load_state = handle.load_state();
            if load_state == LoadState::Pending || state.waiters.contains_key(&handle.id()) {
                state.waiters.entry(handle.id()).or_default().push_back(Box::new(callback));
                return handle;
            }
            drop(state);
            match load_state {
                LoadState::Failed(err) => callback(Err(err)),
                _ => callback(Ok(handle.clone())),
            }
            return handle;
        }

        let handle = TextureHandle::pending(key);
        state.entries.insert(key.to_owned(), handle.clone());
        state.waiters.insert(handle.id(), VecDeque::from([Box::new(callback) as Waiter]));
        state.loads_started += 1;
        drop(state);

        log::debug!("TextureCache: loading {key}");
        self.start_load(&handle);
        handle
    }

    /// Inserts an already-decoded image under `key`, replacing any entry.
    pub fn add_loaded_image(&self, key: &str, image: ImageData) -> TextureHandle {
        let handle = TextureHandle::from_image(key, image);
        self.state.borrow_mut().entries.insert(key.to_owned(), handle.clone());
        handle
    }

    pub fn texture_for_key(&self, key: &str) -> Option<TextureHandle> {
        self.state.borrow().entries.get(key).cloned()
    }

    pub fn load_state(&self, key: &str) -> Option<LoadState> {
        self.state.borrow().entries.get(key).map(TextureHandle::load_state)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.borrow().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of loads started since creation.
    pub fn loads_started(&self) -> u64 {
        self.state.borrow().loads_started
    }

    /// Forgets `key`. A later `add_image` starts a fresh load.
    ///
    /// An in-flight load for the removed entry still completes into its handle
    /// and still notifies the callers that were waiting for it.
    pub fn remove_texture_for_key(&self, key: &str) -> Option<TextureHandle> {
        self.state.borrow_mut().entries.remove(key)
    }

    /// Drops every entry and every queued callback.
    ///
    /// Outstanding loads still resolve their handles but notify nobody. The
    /// cache stays usable afterwards.
    pub fn shutdown(&self) {
        let mut state = self.state.borrow_mut();
        let dropped_waiters: usize = state.waiters.values().map(VecDeque::len).sum();
        log::info!(
            "TextureCache: shutdown ({} entries, {} pending callbacks dropped)",
            state.entries.len(),
            dropped_waiters
        );
        state.entries.clear();
        state.waiters.clear();
    }

    fn start_load(&self, handle: &TextureHandle) {
        let load = self.loader.load_image(handle.key());
        let state = Rc::downgrade(&self.state);
        let task_handle = handle.clone();

        let spawned = self.spawner.spawn_local(async move {
            let result = load.await;
            complete_load(&state, &task_handle, result);
        });

        if let Err(err) = spawned {
            log::warn!("TextureCache: could not schedule load of {}: {err}", handle.key());
            complete_load(
                &Rc::downgrade(&self.state),
                handle,
                Err(LoadError::Spawn(err.to_string())),
            );
        }
    }
}

fn complete_load(
    state: &Weak<RefCell<CacheState>>,
    handle: &TextureHandle,
    result: Result<ImageData, LoadError>,
) {
    let outcome = match &result {
        Ok(_) => Ok(handle.clone()),
        Err(err) => {
            log::warn!("TextureCache: {} failed: {err}", handle.key());
            Err(err.clone())
        }
    };
    handle.resolve(result);

    let Some(state) = state.upgrade() else { return };
    let id = handle.id();
    log::debug!("TextureCache: {} resolved", handle.key());

    // One waiter at a time, borrow released between calls: a callback may
    // re-enter the cache and its own requests queue behind the rest.
    loop {
        let next = state.borrow_mut().waiters.get_mut(&id).and_then(VecDeque::pop_front);
        match next {
            Some(waiter) => waiter(outcome.clone()),
            None => {
                state.borrow_mut().waiters.remove(&id);
                break;
            }
        }
    }
}
