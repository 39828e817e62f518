use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::future::LocalBoxFuture;

use tessera_engine::error::LoadError;
use tessera_engine::texture::{
    FileImageLoader, ImageData, ImageLoader, LoadState, TextureCache, TextureHandle,
};

/// Loader whose loads complete only when the test says so.
#[derive(Default)]
struct GatedLoader {
    gates: RefCell<HashMap<String, Vec<oneshot::Sender<Result<ImageData, LoadError>>>>>,
    requests: RefCell<Vec<String>>,
}

impl GatedLoader {
    fn complete(&self, path: &str, result: Result<ImageData, LoadError>) {
        let senders = self.gates.borrow_mut().remove(path).unwrap_or_default();
        assert!(!senders.is_empty(), "no load in flight for {path}");
        for tx in senders {
            let _ = tx.send(result.clone());
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl ImageLoader for GatedLoader {
    fn load_image(&self, path: &str) -> LocalBoxFuture<'static, Result<ImageData, LoadError>> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().entry(path.to_owned()).or_default().push(tx);
        self.requests.borrow_mut().push(path.to_owned());
        let path = path.to_owned();
        async move {
            rx.await
                .unwrap_or_else(|_| Err(LoadError::Io { path, message: "loader dropped".into() }))
        }
        .boxed_local()
    }
}

type Log = Rc<RefCell<Vec<(&'static str, Result<TextureHandle, LoadError>)>>>;

fn recorder(log: &Log, name: &'static str) -> impl FnOnce(Result<TextureHandle, LoadError>) + 'static {
    let log = log.clone();
    move |result| log.borrow_mut().push((name, result))
}

fn setup() -> (LocalPool, Rc<GatedLoader>, TextureCache) {
    let pool = LocalPool::new();
    let loader = Rc::new(GatedLoader::default());
    let cache = TextureCache::new(loader.clone(), pool.spawner());
    (pool, loader, cache)
}

// ── dedup and fan-out ─────────────────────────────────────────────────────

#[test]
fn concurrent_requests_share_one_load() {
    let (mut pool, loader, cache) = setup();
    let log: Log = Rc::default();

    let h1 = cache.add_image("x", recorder(&log, "cb1"));
    pool.run_until_stalled();
    let h2 = cache.add_image("x", recorder(&log, "cb2"));
    pool.run_until_stalled();

    assert_eq!(h1, h2);
    assert_eq!(loader.requests(), vec!["x".to_owned()]);
    assert!(log.borrow().is_empty());

    loader.complete("x", Ok(ImageData::solid(8, 8, [1, 2, 3, 4])));
    pool.run_until_stalled();

    let log = log.borrow();
    let names: Vec<_> = log.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["cb1", "cb2"]);
    for (_, result) in log.iter() {
        let handle = result.as_ref().unwrap();
        assert_eq!(handle, &h1);
        assert_eq!(handle.size(), Some((8, 8)));
    }
    assert_eq!(cache.loads_started(), 1);
}

#[test]
fn reentrant_request_queues_behind_earlier_waiters() {
    let (mut pool, loader, cache) = setup();
    let cache = Rc::new(cache);
    let log: Log = Rc::default();

    let c = cache.clone();
    let inner = log.clone();
    cache.add_image("x", move |result| {
        inner.borrow_mut().push(("cb1", result));
        c.add_image("x", recorder(&inner, "cb3"));
    });
    cache.add_image("x", recorder(&log, "cb2"));
    pool.run_until_stalled();

    loader.complete("x", Ok(ImageData::solid(1, 1, [0; 4])));
    pool.run_until_stalled();

    let names: Vec<_> = log.borrow().iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["cb1", "cb2", "cb3"]);
    assert!(log.borrow().iter().all(|(_, r)| r.is_ok()));

    // Once the queue has drained, a resolved key calls back immediately.
    let late = Rc::new(std::cell::Cell::new(false));
    let l = late.clone();
    cache.add_image("x", move |r| l.set(r.is_ok()));
    assert!(late.get());
    assert_eq!(cache.loads_started(), 1);
}

#[test]
fn failure_reaches_every_waiter() {
    let (mut pool, loader, cache) = setup();
    let log: Log = Rc::default();

    cache.add_image("broken", recorder(&log, "a"));
    cache.add_image("broken", recorder(&log, "b"));
    pool.run_until_stalled();

    let err = LoadError::Decode { path: "broken".into(), message: "bad header".into() };
    loader.complete("broken", Err(err.clone()));
    pool.run_until_stalled();

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|(_, r)| r.as_ref().err() == Some(&err)));
    assert_eq!(cache.load_state("broken"), Some(LoadState::Failed(err)));
}

#[test]
fn distinct_keys_load_independently() {
    let (mut pool, loader, cache) = setup();
    let a = cache.add_image("a", |_| {});
    let b = cache.add_image("b", |_| {});
    pool.run_until_stalled();

    loader.complete("b", Ok(ImageData::solid(1, 1, [0; 4])));
    pool.run_until_stalled();
    assert_eq!(a.load_state(), LoadState::Pending);
    assert!(b.is_loaded());
    assert_eq!(cache.len(), 2);
}

// ── lifecycle ─────────────────────────────────────────────────────────────

#[test]
fn pending_handle_becomes_drawable() {
    let (mut pool, loader, cache) = setup();
    let handle = cache.add_image("late", |_| {});
    assert!(handle.image().is_none());

    loader.complete("late", Ok(ImageData::solid(2, 1, [9; 4])));
    pool.run_until_stalled();
    assert_eq!(cache.texture_for_key("late").and_then(|h| h.size()), Some((2, 1)));
    assert_eq!(handle.image().map(|img| img.rgba.len()), Some(8));
}

#[test]
fn shutdown_then_reuse() {
    let (mut pool, loader, cache) = setup();
    let log: Log = Rc::default();
    cache.add_image("x", recorder(&log, "before"));
    pool.run_until_stalled();
    cache.shutdown();
    assert!(cache.is_empty());

    cache.add_image("x", recorder(&log, "after"));
    pool.run_until_stalled();
    assert_eq!(loader.requests().len(), 2);

    loader.complete("x", Ok(ImageData::solid(1, 1, [0; 4])));
    pool.run_until_stalled();
    let names: Vec<_> = log.borrow().iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["after"]);
}

// ── file loader ───────────────────────────────────────────────────────────

#[test]
fn file_loader_through_cache() {
    let dir = tempfile::tempdir().unwrap();
    image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 128, 255, 255]))
        .save(dir.path().join("sprite.png"))
        .unwrap();

    let mut pool = LocalPool::new();
    let cache = TextureCache::new(Rc::new(FileImageLoader::new(dir.path())), pool.spawner());
    let ok = cache.add_image("sprite.png", |_| {});
    let missing = cache.add_image("missing.png", |_| {});
    pool.run_until_stalled();

    assert_eq!(ok.size(), Some((4, 4)));
    assert_eq!(&ok.image().unwrap().rgba[..4], &[0, 128, 255, 255]);
    assert!(matches!(missing.load_state(), LoadState::Failed(LoadError::Io { .. })));
}
