use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::config::FallbackPolicy;
use crate::error::{StreamError, SurfaceError};
use crate::pyramid::{DescriptorLoader, PyramidDescriptor};
use crate::surface::{SurfaceContent, TiledContent, ViewingSurface};
use crate::tile::{PyramidTileSource, TileAddressBuilder};

use super::state::{OverviewReason, SelectOutcome, SessionId, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisplayMode {
    Tiled,
    Overview,
}

/// Drives the lifecycle of one viewing surface.
///
/// Each `select` starts a new session: the surface is detached, the
/// descriptor is loaded, a [`PyramidTileSource`] is built and attached. The
/// controller is the only component that opens or closes surface content.
///
/// # Session Ordering
///
/// Selections may overlap. Every selection bumps a generation counter, and
/// every state transition is applied only if its session is still the newest
/// one, so a slow completion for a previous image can never overwrite the
/// state or the surface of a later selection. The surface sits behind a
/// mutex; after acquiring it a session re-checks that it is still current
/// before touching the surface. Descriptor loads and surface opens race
/// against newer selections: a session that is superseded mid-open drops the
/// open, closes the surface and releases it, so a backend that never answers
/// cannot block the next `select` or `clear`.
///
/// # Observing State
///
/// State is published through a `tokio::sync::watch` channel. Use
/// [`subscribe`](Self::subscribe) to follow transitions or
/// [`state`](Self::state) for a snapshot.
pub struct SessionController<L, V> {
    loader: L,
    builder: TileAddressBuilder,
    surface: Mutex<V>,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
    fallback: FallbackPolicy,
    descriptors: Option<Mutex<LruCache<String, Arc<PyramidDescriptor>>>>,
}

impl<L, V> SessionController<L, V>
where
    L: DescriptorLoader,
    V: ViewingSurface,
{
    /// Create an idle controller with no fallback and no descriptor cache.
    pub fn new(loader: L, surface: V, builder: TileAddressBuilder) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            loader,
            builder,
            surface: Mutex::new(surface),
            state,
            generation: AtomicU64::new(0),
            fallback: FallbackPolicy::None,
            descriptors: None,
        }
    }

    /// Set the behavior when the tile source fails to attach.
    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Cache up to `capacity` descriptors across selections (0 disables).
    pub fn with_descriptor_cache(mut self, capacity: usize) -> Self {
        self.descriptors = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        self
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Follow state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The tile source currently attached, if streaming.
    pub fn active_source(&self) -> Option<Arc<PyramidTileSource>> {
        match &*self.state.borrow() {
            SessionState::Streaming { source, .. } => Some(Arc::clone(source)),
            _ => None,
        }
    }

    /// Inspect the surface without changing what it displays.
    ///
    /// Waits for any open or close in progress.
    pub async fn inspect_surface<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        let surface = self.surface.lock().await;
        f(&surface)
    }

    /// Select an image and stream its tiles.
    ///
    /// Returns once the session settles or is superseded by a newer
    /// selection. The outcome is also reflected in [`state`](Self::state).
    pub async fn select(&self, image_id: &str) -> SelectOutcome {
        self.run(image_id, DisplayMode::Tiled).await
    }

    /// Select an image and display its overview instead of tiles.
    pub async fn select_overview(&self, image_id: &str) -> SelectOutcome {
        self.run(image_id, DisplayMode::Overview).await
    }

    /// Detach whatever is displayed and return to `Idle`.
    ///
    /// Any selection in flight is superseded.
    pub async fn clear(&self) {
        let mut session = SessionId(0);
        self.state.send_modify(|state| {
            session = SessionId(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
            *state = SessionState::Idle;
        });
        info!(%session, "Clearing viewing surface");
        self.detach(session).await;
    }

    async fn run(&self, image_id: &str, mode: DisplayMode) -> SelectOutcome {
        let session = self.begin(image_id);
        info!(%session, image_id, ?mode, "Image selected");

        if !self.detach(session).await {
            return self.superseded(session, image_id);
        }

        let descriptor = match self
            .unless_superseded(session, self.load_descriptor(image_id))
            .await
        {
            Some(Ok(descriptor)) => descriptor,
            Some(Err(e)) => return self.fail(session, image_id, e),
            None => return self.superseded(session, image_id),
        };

        let attaching = SessionState::Attaching {
            session,
            image_id: image_id.to_string(),
            descriptor: Arc::clone(&descriptor),
        };
        if !self.transition(session, attaching) {
            return self.superseded(session, image_id);
        }

        let mut surface = self.surface.lock().await;
        if !self.is_current(session) {
            return self.superseded(session, image_id);
        }

        match mode {
            DisplayMode::Tiled => {
                self.attach_tiles(&mut surface, session, image_id, descriptor)
                    .await
            }
            DisplayMode::Overview => self.attach_overview(&mut surface, session, image_id).await,
        }
    }

    /// Start a new session and enter `DescriptorLoading`.
    fn begin(&self, image_id: &str) -> SessionId {
        let mut session = SessionId(0);
        self.state.send_modify(|state| {
            session = SessionId(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
            *state = SessionState::DescriptorLoading {
                session,
                image_id: image_id.to_string(),
            };
        });
        session
    }

    fn is_current(&self, session: SessionId) -> bool {
        self.generation.load(Ordering::SeqCst) == session.0
    }

    /// Apply `next` only if `session` is still the newest session.
    fn transition(&self, session: SessionId, next: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if !self.is_current(session) {
                return false;
            }
            debug!(%session, from = state.name(), to = next.name(), "State transition");
            *state = next;
            true
        })
    }

    /// Run `op` unless `session` is superseded first.
    ///
    /// Returns `None` once a newer session has begun; `op` is dropped at
    /// that point.
    async fn unless_superseded<T>(
        &self,
        session: SessionId,
        op: impl Future<Output = T>,
    ) -> Option<T> {
        let mut state = self.state.subscribe();
        let superseded = async move {
            // The sender lives in `self`, so this only returns on supersession
            let _ = state.wait_for(|_| !self.is_current(session)).await;
        };

        tokio::select! {
            biased;
            _ = superseded => None,
            result = op => Some(result),
        }
    }

    /// Close the surface on behalf of `session`. Returns false if superseded.
    async fn detach(&self, session: SessionId) -> bool {
        let mut surface = self.surface.lock().await;
        if !self.is_current(session) {
            return false;
        }
        surface.close().await;
        true
    }

    async fn load_descriptor(&self, image_id: &str) -> Result<Arc<PyramidDescriptor>, StreamError> {
        if let Some(cache) = &self.descriptors {
            if let Some(descriptor) = cache.lock().await.get(image_id) {
                debug!(image_id, "Descriptor cache hit");
                return Ok(Arc::clone(descriptor));
            }
        }

        let descriptor = Arc::new(self.loader.load(image_id).await?);
        debug!(
            image_id,
            width = descriptor.width(),
            height = descriptor.height(),
            levels = descriptor.level_count(),
            "Descriptor loaded"
        );

        if let Some(cache) = &self.descriptors {
            cache
                .lock()
                .await
                .put(image_id.to_string(), Arc::clone(&descriptor));
        }
        Ok(descriptor)
    }

    async fn attach_tiles(
        &self,
        surface: &mut V,
        session: SessionId,
        image_id: &str,
        descriptor: Arc<PyramidDescriptor>,
    ) -> SelectOutcome {
        let source = Arc::new(PyramidTileSource::new(
            image_id,
            descriptor,
            self.builder.clone(),
        ));
        let content = SurfaceContent::Tiled(TiledContent {
            image_id: Arc::from(image_id),
            source: source.clone(),
        });

        let Some(opened) = self
            .unless_superseded(session, surface.open(content))
            .await
        else {
            return self.abandon(surface, session, image_id).await;
        };

        match opened {
            Ok(()) => {
                let streaming = SessionState::Streaming {
                    session,
                    source: Arc::clone(&source),
                };
                if self.transition(session, streaming) {
                    info!(%session, image_id, levels = source.descriptor().level_count(), "Streaming tiles");
                    SelectOutcome::Streaming(source)
                } else {
                    self.superseded(session, image_id)
                }
            }
            Err(e) => {
                surface.close().await;
                let error = StreamError::AttachFailed(e);
                warn!(%session, image_id, "Tile source failed to attach: {}", error);
                self.fall_back(surface, session, image_id, error).await
            }
        }
    }

    async fn fall_back(
        &self,
        surface: &mut V,
        session: SessionId,
        image_id: &str,
        error: StreamError,
    ) -> SelectOutcome {
        let url = match (self.fallback, self.builder.overview_url(image_id)) {
            (FallbackPolicy::Overview, Some(url)) => url,
            _ => return self.fail(session, image_id, error),
        };
        if !self.is_current(session) {
            return self.superseded(session, image_id);
        }

        let content = SurfaceContent::Overview {
            image_id: image_id.to_string(),
            url: url.clone(),
        };
        let Some(opened) = self
            .unless_superseded(session, surface.open(content))
            .await
        else {
            return self.abandon(surface, session, image_id).await;
        };
        if let Err(e) = opened {
            surface.close().await;
            warn!(%session, image_id, "Overview fallback failed: {}", e);
            return self.fail(session, image_id, error);
        }

        let overview = SessionState::Overview {
            session,
            image_id: image_id.to_string(),
            url: url.clone(),
            reason: OverviewReason::Fallback {
                cause: error.to_string(),
            },
        };
        if self.transition(session, overview) {
            warn!(%session, image_id, "Displaying overview instead of tiles (degraded)");
            SelectOutcome::Degraded { url, error }
        } else {
            self.superseded(session, image_id)
        }
    }

    async fn attach_overview(
        &self,
        surface: &mut V,
        session: SessionId,
        image_id: &str,
    ) -> SelectOutcome {
        let Some(url) = self.builder.overview_url(image_id) else {
            let error = StreamError::AttachFailed(SurfaceError::Rejected(
                "backend has no overview route".to_string(),
            ));
            return self.fail(session, image_id, error);
        };

        let content = SurfaceContent::Overview {
            image_id: image_id.to_string(),
            url: url.clone(),
        };
        let Some(opened) = self
            .unless_superseded(session, surface.open(content))
            .await
        else {
            return self.abandon(surface, session, image_id).await;
        };
        if let Err(e) = opened {
            surface.close().await;
            return self.fail(session, image_id, StreamError::AttachFailed(e));
        }

        let overview = SessionState::Overview {
            session,
            image_id: image_id.to_string(),
            url: url.clone(),
            reason: OverviewReason::Requested,
        };
        if self.transition(session, overview) {
            info!(%session, image_id, "Displaying overview");
            SelectOutcome::Overview { url }
        } else {
            self.superseded(session, image_id)
        }
    }

    fn fail(&self, session: SessionId, image_id: &str, error: StreamError) -> SelectOutcome {
        let failed = SessionState::Error {
            session,
            image_id: image_id.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        };
        if self.transition(session, failed) {
            warn!(%session, image_id, kind = %error.kind(), "Session failed: {}", error);
            SelectOutcome::Failed(error)
        } else {
            self.superseded(session, image_id)
        }
    }

    /// Close a half-opened surface after the session was superseded mid-open.
    async fn abandon(&self, surface: &mut V, session: SessionId, image_id: &str) -> SelectOutcome {
        info!(%session, image_id, "Open interrupted by a newer selection");
        surface.close().await;
        self.superseded(session, image_id)
    }

    fn superseded(&self, session: SessionId, image_id: &str) -> SelectOutcome {
        debug!(%session, image_id, "Discarding completion of superseded session");
        SelectOutcome::Superseded
    }
}

impl<L, V> std::fmt::Debug for SessionController<L, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state.borrow().name())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("fallback", &self.fallback)
            .field("descriptor_cache", &self.descriptors.is_some())
            .finish()
    }
}
