//! The thumbnail service: one object owning the whole engine

use crate::config::AppConfig;
use crate::events::EventPublisher;
use crate::generator::{FrameExtractor, ThumbnailGenerator};
use crate::reclaimer::{self, CleanupSummary};
use crate::resolver::CachePathResolver;
use crate::scheduler::{BatchSummary, Scheduler};
use crate::session::{SessionId, SessionManager};
use crate::store::{CacheStore, DiskCacheStore};
use crate::AppError;
use app_fs::SourcePath;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// Built once at startup and shared with every command handler
pub struct ThumbnailService {
    config: AppConfig,
    store: Arc<dyn CacheStore>,
    scheduler: Scheduler,
    sessions: Arc<SessionManager>,
    /// Tracked library roots, normalized
    roots: RwLock<Vec<String>>,
}

impl ThumbnailService {
    /// Open the on-disk cache named by `config`
    pub fn open(config: AppConfig, events: EventPublisher) -> Result<Self, AppError> {
        let store = Arc::new(DiskCacheStore::open(config.cache_root())?);
        Self::with_store(config, store, None, events)
    }

    /// Assemble the service over an arbitrary store
    pub fn with_store(
        config: AppConfig,
        store: Arc<dyn CacheStore>,
        frames: Option<Arc<dyn FrameExtractor>>,
        events: EventPublisher,
    ) -> Result<Self, AppError> {
        let resolver = CachePathResolver::new(store.root(), config.cache.thumbnail_size);
        let mut generator =
            ThumbnailGenerator::new(store.clone(), resolver, config.cache.jpeg_quality);
        if let Some(frames) = frames {
            generator = generator.with_frame_extractor(frames);
        }

        let scheduler = Scheduler::new(
            Arc::new(generator),
            store.clone(),
            events,
            config.workers.resolved(),
        )?;

        let roots = config
            .library
            .roots
            .iter()
            .map(|r| SourcePath::new(r).normalized().to_string())
            .collect();

        Ok(Self {
            config,
            store,
            scheduler,
            sessions: Arc::new(SessionManager::new()),
            roots: RwLock::new(roots),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Start browsing `dir`; supersedes the current session
    pub fn start_session(&self, dir: &str) -> SessionId {
        self.sessions.start_session(dir)
    }

    pub fn is_current(&self, id: SessionId) -> bool {
        self.sessions.is_current(id)
    }

    /// Generate thumbnails for `dir` on behalf of `session_id`.
    ///
    /// An id newer than any seen becomes the current session. An already
    /// superseded id produces an all-cancelled batch.
    pub fn generate_for_dir(&self, dir: &str, session_id: SessionId) -> Result<BatchSummary, AppError> {
        let token = self.sessions.adopt(session_id, dir);
        self.scheduler.generate(Path::new(dir), session_id, &token)
    }

    /// Reclaim orphans in this service's cache against the tracked roots
    pub fn cleanup_orphans(&self) -> Result<CleanupSummary, AppError> {
        let roots = self.roots();
        reclaimer::cleanup_orphans(self.store.as_ref(), &roots)
    }

    /// Reclaim orphans in the cache at `cache_root`
    pub fn cleanup_orphans_in(&self, cache_root: &Path) -> Result<CleanupSummary, AppError> {
        let roots = self.roots();
        self.with_cache_at(cache_root, |store| reclaimer::cleanup_orphans(store, &roots))
    }

    pub fn cleanup_for_dir(&self, dir: &str) -> Result<CleanupSummary, AppError> {
        reclaimer::cleanup_for_directory(self.store.as_ref(), dir)
    }

    pub fn delete_all(&self) -> Result<CleanupSummary, AppError> {
        reclaimer::delete_all(self.store.as_ref())
    }

    /// Wipe the cache at `cache_root`
    pub fn delete_all_in(&self, cache_root: &Path) -> Result<CleanupSummary, AppError> {
        self.with_cache_at(cache_root, reclaimer::delete_all)
    }

    /// Start tracking a library root. Returns false if already tracked.
    pub fn add_root(&self, root: &str) -> bool {
        let root = SourcePath::new(root).normalized().to_string();
        let mut roots = self.roots.write();
        if roots.contains(&root) {
            return false;
        }
        tracing::info!("Tracking library root {}", root);
        roots.push(root);
        true
    }

    /// Stop tracking a root and purge its thumbnails
    pub fn remove_root(&self, root: &str) -> Result<CleanupSummary, AppError> {
        let root = SourcePath::new(root).normalized().to_string();
        let removed = {
            let mut roots = self.roots.write();
            let before = roots.len();
            roots.retain(|r| r != &root);
            roots.len() != before
        };
        if removed {
            tracing::info!("Stopped tracking library root {}", root);
        }
        self.cleanup_for_dir(&root)
    }

    pub fn roots(&self) -> Vec<String> {
        self.roots.read().clone()
    }

    fn with_cache_at<F>(&self, cache_root: &Path, op: F) -> Result<CleanupSummary, AppError>
    where
        F: FnOnce(&dyn CacheStore) -> Result<CleanupSummary, AppError>,
    {
        if cache_root == self.store.root() {
            return op(self.store.as_ref());
        }
        if !cache_root.is_dir() {
            tracing::info!("No thumbnail cache at {}", cache_root.display());
            return Ok(CleanupSummary::default());
        }
        let store = DiskCacheStore::open(cache_root)?;
        op(&store as &dyn CacheStore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::ThumbnailBoard;
    use crate::events::{event_channel, EventReceiver, ThumbnailStatus};
    use crate::store::MemoryCacheStore;
    use image::{ImageBuffer, Rgb};
    use std::fs;

    fn config_with_root(root: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.cache.thumbnail_size = 32;
        config.workers.max_workers = Some(2);
        config.library.roots = vec![root.to_string_lossy().into_owned()];
        config
    }

    fn write_image(path: &Path) {
        ImageBuffer::from_pixel(40, 30, Rgb([200u8, 100, 50])).save(path).unwrap();
    }

    fn memory_service(root: &Path) -> (ThumbnailService, Arc<MemoryCacheStore>, EventReceiver) {
        let store = Arc::new(MemoryCacheStore::new("/cache"));
        let (events, rx) = event_channel();
        let service =
            ThumbnailService::with_store(config_with_root(root), store.clone(), None, events).unwrap();
        (service, store, rx)
    }

    /// Blocks every extraction until the gate sender is dropped
    struct GatedFrames {
        started: crossbeam_channel::Sender<()>,
        gate: crossbeam_channel::Receiver<()>,
    }

    impl FrameExtractor for GatedFrames {
        fn extract_frame(&self, _path: &Path) -> Result<image::DynamicImage, AppError> {
            let _ = self.started.send(());
            let _ = self.gate.recv();
            Ok(image::DynamicImage::ImageRgb8(ImageBuffer::from_pixel(64, 36, Rgb([0, 90, 0]))))
        }
    }

    #[test]
    fn test_superseding_mid_batch_fences_in_flight_files() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().to_string_lossy().into_owned();
        for i in 0..4 {
            fs::write(temp.path().join(format!("clip{}.mp4", i)), b"x").unwrap();
        }

        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded::<()>();
        let frames = Arc::new(GatedFrames {
            started: started_tx,
            gate: gate_rx,
        });

        let store = Arc::new(MemoryCacheStore::new("/cache"));
        let (events, rx) = event_channel();
        let service =
            ThumbnailService::with_store(config_with_root(temp.path()), store.clone(), Some(frames), events)
                .unwrap();
        let mut board = ThumbnailBoard::new(service.sessions().clone());

        let s1 = service.start_session(&dir);
        let (s2, summary) = std::thread::scope(|scope| {
            let batch = scope.spawn(|| service.generate_for_dir(&dir, s1));

            // Both workers are inside the extractor
            for _ in 0..2 {
                started_rx.recv().unwrap();
            }
            let s2 = service.start_session(&dir);
            drop(gate_tx);

            (s2, batch.join().unwrap().unwrap())
        });

        assert!(s2 > s1);
        assert_eq!(summary.generated, 2);
        assert_eq!(summary.cancelled, 2);

        let updates: Vec<_> = rx.try_iter().collect();
        let ready: Vec<_> = updates
            .iter()
            .filter(|u| u.status == ThumbnailStatus::Ready)
            .collect();
        assert_eq!(ready.len(), 2);
        assert!(updates.iter().all(|u| u.session_id == s1));

        board.begin(updates.iter().map(|u| u.path.clone()));
        for update in &updates {
            assert!(!board.apply(update.clone()));
        }
        assert!(board.thumbnail_path(&ready[0].path).is_none());
    }

    #[test]
    fn test_reclaimer_alongside_generation() {
        let temp = tempfile::tempdir().unwrap();
        let library = temp.path().join("library");
        fs::create_dir_all(&library).unwrap();
        for i in 0..16 {
            write_image(&library.join(format!("img{}.jpg", i)));
        }

        let mut config = config_with_root(&library);
        config.cache.root = Some(temp.path().join("cache"));
        let (events, _rx) = event_channel();
        let service = ThumbnailService::open(config, events).unwrap();
        let dir = library.to_string_lossy().into_owned();

        let done = std::sync::atomic::AtomicBool::new(false);
        let summary = std::thread::scope(|scope| {
            let cleaner = scope.spawn(|| {
                let mut removed = 0;
                while !done.load(std::sync::atomic::Ordering::SeqCst) {
                    removed += service.cleanup_orphans().unwrap().removed;
                }
                removed
            });

            let summary = service.generate_for_dir(&dir, 1).unwrap();
            done.store(true, std::sync::atomic::Ordering::SeqCst);
            assert_eq!(cleaner.join().unwrap(), 0);
            summary
        });
        assert_eq!(summary.generated, 16);

        let listed = service.store().list_all().unwrap();
        assert_eq!(listed.len(), 16);
        assert!(listed.iter().all(|e| e.source.is_some()));
        assert_eq!(service.cleanup_orphans().unwrap().removed, 0);
    }

    #[test]
    fn test_superseded_id_is_cancelled() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().to_string_lossy().into_owned();
        write_image(&temp.path().join("a.jpg"));
        let (service, store, rx) = memory_service(temp.path());

        service.generate_for_dir(&dir, 5).unwrap();
        assert!(service.is_current(5));
        rx.try_iter().for_each(drop);

        let stale = service.generate_for_dir(&dir, 4).unwrap();
        assert_eq!(stale.cancelled, 1);
        assert_eq!(rx.try_iter().count(), 0);
        assert_eq!(store.writes(), 1);
        assert!(service.is_current(5));
    }

    #[test]
    fn test_remove_root_purges_and_untracks() {
        let temp = tempfile::tempdir().unwrap();
        let photos = temp.path().join("photos");
        let other = temp.path().join("other");
        fs::create_dir_all(&photos).unwrap();
        fs::create_dir_all(&other).unwrap();
        write_image(&photos.join("a.jpg"));
        write_image(&other.join("b.jpg"));

        let (service, store, _rx) = memory_service(&photos);
        assert!(service.add_root(&other.to_string_lossy()));
        assert!(!service.add_root(&other.to_string_lossy()));

        service.generate_for_dir(&photos.to_string_lossy(), 1).unwrap();
        service.generate_for_dir(&other.to_string_lossy(), 2).unwrap();
        assert_eq!(store.len(), 2);

        let summary = service.remove_root(&photos.to_string_lossy()).unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(service.roots(), vec![SourcePath::new(&other).normalized().to_string()]);
    }

    #[test]
    fn test_delete_all_then_browse_regenerates() {
        let temp = tempfile::tempdir().unwrap();
        let cache = temp.path().join("cache");
        let library = temp.path().join("library");
        fs::create_dir_all(&library).unwrap();
        write_image(&library.join("a.jpg"));
        write_image(&library.join("b.png"));

        let mut config = config_with_root(&library);
        config.cache.root = Some(cache.clone());
        let (events, rx) = event_channel();
        let service = ThumbnailService::open(config, events).unwrap();
        let dir = library.to_string_lossy().into_owned();

        assert_eq!(service.generate_for_dir(&dir, 1).unwrap().generated, 2);
        assert_eq!(service.delete_all().unwrap().removed, 2);
        assert!(service.store().list_all().unwrap().is_empty());

        rx.try_iter().for_each(drop);
        let again = service.generate_for_dir(&dir, 2).unwrap();
        assert_eq!(again.generated, 2);
        assert_eq!(again.cached, 0);

        let ready: Vec<_> = rx
            .try_iter()
            .filter(|u| u.status == ThumbnailStatus::Ready)
            .collect();
        assert_eq!(ready.len(), 2);
        for update in ready {
            assert!(Path::new(update.thumbnail_path.as_deref().unwrap()).exists());
        }
    }

    #[test]
    fn test_cleanup_in_other_cache_root() {
        let temp = tempfile::tempdir().unwrap();
        let library = temp.path().join("library");
        fs::create_dir_all(&library).unwrap();
        write_image(&library.join("a.jpg"));

        // Populate a second cache through its own service
        let other_cache = temp.path().join("other-cache");
        let mut other_config = config_with_root(&library);
        other_config.cache.root = Some(other_cache.clone());
        let (events, _rx) = event_channel();
        let other = ThumbnailService::open(other_config, events).unwrap();
        other.generate_for_dir(&library.to_string_lossy(), 1).unwrap();
        drop(other);

        let (service, _store, _rx) = memory_service(&library);
        assert_eq!(service.delete_all_in(&other_cache).unwrap().removed, 1);
        assert_eq!(service.cleanup_orphans_in(&other_cache).unwrap().removed, 0);
    }

    #[test]
    fn test_missing_cache_root_is_left_alone() {
        let temp = tempfile::tempdir().unwrap();
        let (service, _store, _rx) = memory_service(temp.path());
        let typo = temp.path().join("no-such-cache");

        assert_eq!(service.delete_all_in(&typo).unwrap(), CleanupSummary::default());
        assert_eq!(service.cleanup_orphans_in(&typo).unwrap().removed, 0);
        assert!(!typo.exists());
    }

    #[test]
    fn test_cleanup_orphans_after_source_deleted() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a.jpg");
        let b = temp.path().join("b.jpg");
        write_image(&a);
        write_image(&b);
        let (service, store, _rx) = memory_service(temp.path());

        service.generate_for_dir(&temp.path().to_string_lossy(), 1).unwrap();
        fs::remove_file(&a).unwrap();

        let summary = service.cleanup_orphans().unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(store.len(), 1);
    }
}
