//! Per-view design state.
//!
//! The store owns the persisted records of every view and the single garment
//! color. The active view's objects live on the drawing surface; they are
//! flushed into the store when the view is left and whenever a snapshot of
//! the whole design is taken.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::color::GarmentColor;
use crate::error::DesignError;
use crate::fetch::AssetFetcher;
use crate::garment::{GarmentBackground, GarmentRenderer};
use crate::scene::record::{SceneRecord, deserialize, serialize_objects};
use crate::scene::{GARMENT_BACKGROUND, ObjectKind, SceneObject};
use crate::surface::{DrawingSurface, MutationKind, SurfaceEvent, replace_user_objects};
use crate::view::View;

// ============================================================================
// DesignState
// ============================================================================

/// Ordered records of one view, bottom first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(transparent)]
pub struct ViewState {
    pub records: Vec<SceneRecord>,
}

impl ViewState {
    pub fn new(records: Vec<SceneRecord>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The whole design: every view's records, the garment color and the active view.
///
/// This is also the on-disk design document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct DesignState {
    #[cfg_attr(feature = "jsonschema", schemars(with = "String"))]
    pub garment_color: GarmentColor,
    pub active_view: View,
    pub views: BTreeMap<View, ViewState>,
}

impl DesignState {
    /// Records stored for `view`; empty if the view was never visited.
    pub fn records(&self, view: View) -> &[SceneRecord] {
        self.views
            .get(&view)
            .map(|state| state.records.as_slice())
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String, DesignError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, DesignError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a design document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DesignError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DesignError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Change notifications broadcast by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum DesignEvent {
    /// The live objects of `view` were written into the store.
    ViewPersisted { view: View, objects: usize },
    ViewSwitched { from: View, to: View },
    GarmentColorChanged(GarmentColor),
    /// A whole design document replaced the state.
    Loaded,
}

// ============================================================================
// DesignStateStore
// ============================================================================

pub struct DesignStateStore {
    state: DesignState,
    renderer: GarmentRenderer,
    fetcher: Arc<dyn AssetFetcher>,
    /// The background currently on the surface, if it loaded.
    background: Option<GarmentBackground>,
    notifier: broadcast::Sender<DesignEvent>,
}

impl std::fmt::Debug for DesignStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesignStateStore")
            .field("state", &self.state)
            .field("background", &self.background)
            .finish()
    }
}

impl DesignStateStore {
    pub fn new(state: DesignState, renderer: GarmentRenderer, fetcher: Arc<dyn AssetFetcher>) -> Self {
        let (notifier, _) = broadcast::channel(64);
        Self {
            state,
            renderer,
            fetcher,
            background: None,
            notifier,
        }
    }

    /// The stored state. The active view's entry may lag the surface; use
    /// [`snapshot`](Self::snapshot) for a current copy.
    pub fn state(&self) -> &DesignState {
        &self.state
    }

    pub fn active_view(&self) -> View {
        self.state.active_view
    }

    pub fn garment_color(&self) -> GarmentColor {
        self.state.garment_color
    }

    pub fn renderer(&self) -> &GarmentRenderer {
        &self.renderer
    }

    /// The background currently placed on the surface.
    pub fn background(&self) -> Option<&GarmentBackground> {
        self.background.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DesignEvent> {
        self.notifier.subscribe()
    }

    fn notify(&self, event: DesignEvent) {
        // No subscribers is fine.
        let _ = self.notifier.send(event);
    }

    /// Live objects of the active view, excluding structural objects.
    pub fn active_objects<'a, S: DrawingSurface + ?Sized>(&self, surface: &'a S) -> Vec<&'a SceneObject> {
        surface.user_objects()
    }

    /// Writes the surface's user objects into the active view's entry.
    pub fn persist_active<S: DrawingSurface + ?Sized>(&mut self, surface: &S) {
        let view = self.state.active_view;
        let records = serialize_objects(surface.objects());
        let objects = records.len();
        self.state.views.insert(view, ViewState::new(records));
        debug!(%view, objects, "Persisted view");
        self.notify(DesignEvent::ViewPersisted { view, objects });
    }

    /// Makes `view` the active view.
    ///
    /// Persists the outgoing view, replaces the surface's user objects with
    /// the incoming view's and re-resolves the background. Returns false when
    /// `view` is already active.
    pub async fn switch_view<S: DrawingSurface + ?Sized>(&mut self, view: View, surface: &mut S) -> bool {
        let from = self.state.active_view;
        if view == from {
            return false;
        }

        self.persist_active(surface);

        let objects = deserialize(self.state.records(view), self.fetcher.as_ref()).await;
        replace_user_objects(surface, objects);

        self.state.active_view = view;
        self.refresh_background(surface).await;

        debug!(%from, to = %view, "Switched view");
        self.notify(DesignEvent::ViewSwitched { from, to: view });
        true
    }

    /// Sets the global garment color and refreshes the active view's background.
    pub async fn set_garment_color<S: DrawingSurface + ?Sized>(&mut self, color: GarmentColor, surface: &mut S) {
        self.state.garment_color = color;
        self.refresh_background(surface).await;
        self.notify(DesignEvent::GarmentColorChanged(color));
    }

    /// Places the background for the active view and color.
    ///
    /// When only the tint changes the existing image is re-filtered in place;
    /// otherwise the old background is removed and the new asset fetched. A
    /// fetch failure leaves the view without a garment.
    pub async fn refresh_background<S: DrawingSurface + ?Sized>(&mut self, surface: &mut S) {
        let resolved = self.renderer.resolve(self.state.active_view, self.state.garment_color);
        let existing = surface
            .objects()
            .iter()
            .find(|object| object.name.as_deref() == Some(GARMENT_BACKGROUND))
            .map(|object| object.id);

        if let (Some(id), Some(current)) = (existing, &self.background) {
            if current.asset == resolved.asset && current.scaled_width == resolved.scaled_width {
                if let Some(object) = surface.object_mut(id) {
                    if let ObjectKind::Image(image) = &mut object.kind {
                        image.filters = resolved.filters();
                    }
                    let event = SurfaceEvent::new(MutationKind::Modified, object);
                    surface.fire(event);
                }
                self.background = Some(resolved);
                surface.render_now();
                return;
            }
        }

        if let Some(id) = existing {
            surface.remove(id);
        }
        self.background = None;

        match self.renderer.background_object(&resolved, self.fetcher.as_ref()).await {
            Ok(object) => {
                let id = surface.add(object);
                surface.send_to_back(id);
                self.background = Some(resolved);
            }
            Err(err) => warn!(view = %resolved.view, asset = %resolved.asset, "Garment background unavailable: {}", err),
        }
        surface.render_now();
    }

    /// A copy of the full design with the live active view flushed in.
    pub fn snapshot<S: DrawingSurface + ?Sized>(&self, surface: &S) -> DesignState {
        let mut state = self.state.clone();
        state
            .views
            .insert(state.active_view, ViewState::new(serialize_objects(surface.objects())));
        state
    }

    /// Replaces the whole design and loads its active view onto the surface.
    pub async fn load<S: DrawingSurface + ?Sized>(&mut self, state: DesignState, surface: &mut S) {
        self.state = state;
        let objects = deserialize(self.state.records(self.state.active_view), self.fetcher.as_ref()).await;
        replace_user_objects(surface, objects);
        self.refresh_background(surface).await;
        self.notify(DesignEvent::Loaded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DesignerConfig;
    use crate::scene::{Geometry, ShapeKind};
    use crate::surface::MemorySurface;
    use crate::testing;

    fn store() -> DesignStateStore {
        DesignStateStore::new(
            DesignState::default(),
            GarmentRenderer::default(),
            Arc::new(testing::garment_fetcher()),
        )
    }

    fn rect(left: f64) -> SceneObject {
        SceneObject::new(
            ObjectKind::Shape(ShapeKind::Rect { rx: 0.0, ry: 0.0 }),
            Geometry::centered(left, 10.0, 5.0, 5.0),
        )
    }

    fn background_of(surface: &MemorySurface) -> Option<&SceneObject> {
        surface
            .objects()
            .iter()
            .find(|o| o.name.as_deref() == Some(GARMENT_BACKGROUND))
    }

    #[test]
    fn design_document_roundtrip() {
        let mut state = DesignState {
            garment_color: GarmentColor::new(1, 2, 3),
            active_view: View::Left,
            ..DesignState::default()
        };
        state.views.insert(
            View::Back,
            ViewState::new(serialize_objects([&rect(1.0)])),
        );

        let json = state.to_json().unwrap();
        assert!(json.contains("\"garmentColor\": \"#010203\""));
        assert!(json.contains("\"back\""));
        assert_eq!(DesignState::from_json(&json).unwrap(), state);
        assert!(DesignState::from_json("{}").unwrap().views.is_empty());
    }

    #[tokio::test]
    async fn switching_to_active_view_is_noop() {
        let mut store = store();
        let mut surface = MemorySurface::new(&DesignerConfig::default());
        assert!(!store.switch_view(View::Front, &mut surface).await);
    }

    #[tokio::test]
    async fn view_isolation() {
        let mut store = store();
        let mut surface = MemorySurface::new(&DesignerConfig::default());
        let mut events = store.subscribe();

        let id = surface.add(rect(1.0));
        assert!(store.switch_view(View::Back, &mut surface).await);
        assert!(store.active_objects(&surface).is_empty());
        assert_eq!(store.state().records(View::Front).len(), 1);
        assert_eq!(
            background_of(&surface).and_then(|o| o.image_source()),
            Some("/tshirt-back.png")
        );

        assert!(store.switch_view(View::Front, &mut surface).await);
        let live = store.active_objects(&surface);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, id);
        assert!(surface.has_delete_control(id));

        assert_eq!(
            events.try_recv().unwrap(),
            DesignEvent::ViewPersisted {
                view: View::Front,
                objects: 1
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            DesignEvent::ViewSwitched {
                from: View::Front,
                to: View::Back
            }
        );
    }

    #[tokio::test]
    async fn color_change_refilters_in_place() {
        let mut store = store();
        let mut surface = MemorySurface::new(&DesignerConfig::default());
        store.refresh_background(&mut surface).await;
        let original = background_of(&surface).unwrap().id;
        assert_eq!(surface.objects()[0].id, original);

        let red = GarmentColor::new(255, 0, 0);
        store.set_garment_color(red, &mut surface).await;
        let bg = background_of(&surface).unwrap();
        assert_eq!(bg.id, original);
        let ObjectKind::Image(image) = &bg.kind else {
            panic!("expected image");
        };
        assert_eq!(image.filters.len(), 1);

        store.set_garment_color(GarmentColor::BLACK, &mut surface).await;
        let bg = background_of(&surface).unwrap();
        assert_ne!(bg.id, original);
        assert_eq!(bg.image_source(), Some("/black-tshirt.png"));
        assert_eq!(surface.objects()[0].id, bg.id);
        assert_eq!(store.garment_color(), GarmentColor::BLACK);
    }

    #[tokio::test]
    async fn missing_background_leaves_bare_canvas() {
        let mut store = DesignStateStore::new(
            DesignState::default(),
            GarmentRenderer::default(),
            Arc::new(crate::fetch::MemoryFetcher::new()),
        );
        let mut surface = MemorySurface::new(&DesignerConfig::default());
        store.refresh_background(&mut surface).await;
        assert!(background_of(&surface).is_none());
        assert!(store.background().is_none());
        assert_eq!(surface.render_count(), 1);
    }

    #[tokio::test]
    async fn snapshot_flushes_live_view() {
        let mut store = store();
        let mut surface = MemorySurface::new(&DesignerConfig::default());
        surface.add(rect(1.0));
        store.switch_view(View::Right, &mut surface).await;
        surface.add(rect(2.0));
        surface.add(rect(3.0));

        let snapshot = store.snapshot(&surface);
        assert_eq!(snapshot.records(View::Front).len(), 1);
        assert_eq!(snapshot.records(View::Right).len(), 2);
        assert!(store.state().records(View::Right).is_empty());
    }

    #[tokio::test]
    async fn load_replaces_state() {
        let mut store = store();
        let mut surface = MemorySurface::new(&DesignerConfig::default());
        surface.add(rect(9.0));

        let mut state = DesignState {
            active_view: View::Left,
            ..DesignState::default()
        };
        state
            .views
            .insert(View::Left, ViewState::new(serialize_objects([&rect(1.0), &rect(2.0)])));
        store.load(state, &mut surface).await;

        assert_eq!(store.active_view(), View::Left);
        assert_eq!(store.active_objects(&surface).len(), 2);
        assert_eq!(
            background_of(&surface).and_then(|o| o.image_source()),
            Some("/tshirt-left.png")
        );
    }
}
