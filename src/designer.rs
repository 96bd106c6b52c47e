//! The design session.
//!
//! [`Designer`] owns a drawing surface together with the per-view store, the
//! undo history and the font book, and exposes the editor's operations. Every
//! mutating operation fires exactly one surface mutation event, which is fed
//! to the history before the operation returns.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::color::GarmentColor;
use crate::config::DesignerConfig;
use crate::error::{DesignError, ExportError, FetchError};
use crate::export::{ExportArchive, ExportCompositor, ExportJob};
use crate::fetch::AssetFetcher;
use crate::fonts::FontBook;
use crate::garment::GarmentRenderer;
use crate::geometry::RectPx;
use crate::history::HistoryManager;
use crate::scene::icon::parse_icon;
use crate::scene::record::{load_payload, serialize_objects};
use crate::scene::{
    ClipShape, Geometry, ImageContent, ObjectId, ObjectKind, SceneObject, Shadow, TextAlign, TextContent,
};
use crate::store::{DesignState, DesignStateStore};
use crate::surface::{DrawingSurface, MutationKind, SurfaceEvent};
use crate::view::View;

// ============================================================================
// Alignment
// ============================================================================

/// Edge or center of the printable area an object is aligned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Top,
    Middle,
    Bottom,
}

impl Alignment {
    /// Moves `geometry` so its scaled box touches the matching edge of `area`.
    ///
    /// Only one axis changes. The object's origin is honoured, so an object
    /// anchored at its center ends up with `left` half its width inside the
    /// edge.
    pub fn apply(&self, geometry: &mut Geometry, area: &RectPx) {
        let w = geometry.scaled_width();
        let h = geometry.scaled_height();
        let ox = geometry.origin_x.factor() * w;
        let oy = geometry.origin_y.factor() * h;

        match self {
            Self::Left => geometry.left = area.x + ox,
            Self::Center => geometry.left = area.center_x() - w / 2.0 + ox,
            Self::Right => geometry.left = area.right() - w + ox,
            Self::Top => geometry.top = area.y + oy,
            Self::Middle => geometry.top = area.center_y() - h / 2.0 + oy,
            Self::Bottom => geometry.top = area.bottom() - h + oy,
        }
    }
}

// ============================================================================
// Designer
// ============================================================================

pub struct Designer<S: DrawingSurface> {
    config: DesignerConfig,
    surface: S,
    store: DesignStateStore,
    history: HistoryManager,
    fonts: FontBook,
    fetcher: Arc<dyn AssetFetcher>,
}

impl<S: DrawingSurface + std::fmt::Debug> std::fmt::Debug for Designer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Designer")
            .field("surface", &self.surface)
            .field("store", &self.store)
            .field("history", &self.history)
            .field("fonts", &self.fonts)
            .finish()
    }
}

impl<S: DrawingSurface> Designer<S> {
    /// Starts an empty session on the front view with a white garment.
    pub async fn attach(surface: S, config: DesignerConfig, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self::open(surface, config, fetcher, DesignState::default()).await
    }

    /// Starts a session from a saved design.
    pub async fn open(surface: S, config: DesignerConfig, fetcher: Arc<dyn AssetFetcher>, state: DesignState) -> Self {
        let store = DesignStateStore::new(
            DesignState::default(),
            GarmentRenderer::new(config.garment.clone()),
            Arc::clone(&fetcher),
        );
        let mut designer = Self {
            history: HistoryManager::new(config.history_limit),
            fonts: FontBook::new(config.fonts.clone()),
            config,
            surface,
            store,
            fetcher,
        };
        designer.load(state).await;
        designer
    }

    /// Replaces the whole design. History restarts from the loaded view.
    pub async fn load(&mut self, state: DesignState) {
        self.history.begin_restore();
        self.store.load(state, &mut self.surface).await;
        self.surface.take_events();
        self.history.end_restore();
        self.history.reset(serialize_objects(self.surface.objects()));
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Direct access for hosts that mutate the surface themselves; call
    /// [`pump_events`](Self::pump_events) afterwards.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn config(&self) -> &DesignerConfig {
        &self.config
    }

    pub fn store(&self) -> &DesignStateStore {
        &self.store
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub fn active_view(&self) -> View {
        self.store.active_view()
    }

    pub fn garment_color(&self) -> GarmentColor {
        self.store.garment_color()
    }

    /// User objects of the active view, bottom first.
    pub fn active_objects(&self) -> Vec<&SceneObject> {
        self.store.active_objects(&self.surface)
    }

    pub fn selected(&self) -> Option<&SceneObject> {
        self.surface
            .active_object()
            .and_then(|id| self.surface.object(id))
    }

    /// Feeds queued surface events to the history.
    ///
    /// Returns the number of snapshots recorded.
    pub fn pump_events(&mut self) -> usize {
        let mut recorded = 0;
        for event in self.surface.take_events() {
            if self.history.observe(&event, &self.surface) {
                recorded += 1;
            }
        }
        recorded
    }

    // ------------------------------------------------------------------------
    // Adding objects
    // ------------------------------------------------------------------------

    /// Adds an uploaded logo given as a `data:` URI.
    pub async fn add_logo(&mut self, data_uri: &str) -> Result<ObjectId, DesignError> {
        if !data_uri.starts_with("data:") {
            return Err(FetchError::InvalidDataUri("logo must be a data URI".to_string()).into());
        }
        self.add_image(data_uri).await
    }

    /// Adds a meme image fetched from `url`.
    pub async fn add_meme(&mut self, url: &str) -> Result<ObjectId, DesignError> {
        self.add_image(url).await
    }

    /// Adds an image centred at the placement point, scaled to the image width.
    pub async fn add_image(&mut self, src: &str) -> Result<ObjectId, DesignError> {
        let payload = load_payload(src, self.fetcher.as_ref()).await?;
        let placement = &self.config.placement;
        let mut geometry = Geometry::centered(
            placement.center_x,
            placement.center_y,
            f64::from(payload.size.width),
            f64::from(payload.size.height),
        );
        geometry.scale_to_width(placement.image_width);

        let mut content = ImageContent::new(src);
        content.payload = Some(payload);
        Ok(self.place(SceneObject::new(ObjectKind::Image(content), geometry)))
    }

    /// Adds an icon from SVG markup as a group of paths.
    pub fn add_icon(&mut self, markup: &str) -> Result<ObjectId, DesignError> {
        let mut icon = parse_icon(markup)?;
        let placement = &self.config.placement;
        icon.apply_fill(&placement.default_fill);
        icon.geometry = Geometry::centered(
            placement.center_x,
            placement.center_y,
            icon.geometry.width,
            icon.geometry.height,
        );
        icon.geometry.scale_to_width(placement.icon_width);
        Ok(self.place(icon))
    }

    /// Adds the placeholder text box in `font`.
    ///
    /// Waits for the font up to the configured timeout; the box is added
    /// either way and falls back to the fallback family when rendering.
    pub async fn add_text(&mut self, font: &str) -> ObjectId {
        let status = self.fonts.ensure(font, self.fetcher.as_ref()).await;
        let placement = &self.config.placement;
        let content = TextContent {
            text: placement.placeholder_text.clone(),
            font_family: font.to_string(),
            font_size: placement.font_size,
            text_align: TextAlign::default(),
        };
        let lines = self.fonts.layout().wrap(&content, placement.text_width);
        let geometry = Geometry::centered(
            placement.center_x,
            placement.center_y,
            placement.text_width,
            content.block_height(lines.len()),
        );
        let object = SceneObject::new(ObjectKind::Text(content), geometry).with_fill(placement.default_fill.clone());
        debug!(font, ?status, "Adding text");
        self.place(object)
    }

    fn place(&mut self, object: SceneObject) -> ObjectId {
        let id = self.surface.add(object);
        self.surface.attach_delete_control(id);
        self.surface.set_active_object(Some(id));
        self.surface.render_now();
        self.pump_events();
        id
    }

    // ------------------------------------------------------------------------
    // Editing objects
    // ------------------------------------------------------------------------

    /// Applies `edit` to the selected object.
    pub fn modify_selected(&mut self, edit: impl FnOnce(&mut SceneObject)) -> Result<(), DesignError> {
        let id = self.surface.active_object().ok_or(DesignError::NoSelection)?;
        self.modify(id, edit)
    }

    /// Applies `edit` to a user object and records one modification.
    pub fn modify(&mut self, id: ObjectId, edit: impl FnOnce(&mut SceneObject)) -> Result<(), DesignError> {
        let object = self
            .surface
            .object_mut(id)
            .filter(|object| !object.is_structural())
            .ok_or_else(|| DesignError::UnknownObject(id.to_string()))?;
        edit(object);
        let event = SurfaceEvent::new(MutationKind::Modified, object);
        self.surface.fire(event);
        self.surface.render_now();
        self.pump_events();
        Ok(())
    }

    /// Sets the fill of the selection, recursing into groups.
    pub fn set_fill(&mut self, color: &str) -> Result<(), DesignError> {
        self.modify_selected(|object| object.apply_fill(color))
    }

    pub fn set_border(&mut self, color: &str, width: f64) -> Result<(), DesignError> {
        self.modify_selected(|object| object.apply_stroke(color, width))
    }

    /// Rounds the selection's corners. A radius of zero removes the clip.
    pub fn set_corner_radius(&mut self, radius: f64) -> Result<(), DesignError> {
        self.modify_selected(|object| {
            object.paint.clip = (radius > 0.0)
                .then(|| ClipShape::rounded(object.geometry.width, object.geometry.height, radius));
        })
    }

    /// Sets a centred drop shadow. A blur of zero removes it.
    pub fn set_shadow(&mut self, color: &str, blur: f64) -> Result<(), DesignError> {
        self.modify_selected(|object| {
            object.paint.shadow = (blur > 0.0).then(|| Shadow {
                color: color.to_string(),
                blur,
                offset_x: 0.0,
                offset_y: 0.0,
            });
        })
    }

    /// Changes the font of the selected text box.
    ///
    /// Returns false without changing anything when the selection is not text.
    pub async fn set_font(&mut self, font: &str) -> Result<bool, DesignError> {
        let id = self.surface.active_object().ok_or(DesignError::NoSelection)?;
        let Some((mut content, width)) = self.surface.object(id).and_then(|object| match &object.kind {
            ObjectKind::Text(text) => Some((text.clone(), object.geometry.width)),
            _ => None,
        }) else {
            return Ok(false);
        };

        let status = self.fonts.ensure(font, self.fetcher.as_ref()).await;
        debug!(font, ?status, "Changing font");
        content.font_family = font.to_string();
        let height = content.block_height(self.fonts.layout().wrap(&content, width).len());
        self.modify(id, |object| {
            if let ObjectKind::Text(text) = &mut object.kind {
                text.font_family = content.font_family;
                object.geometry.height = height;
            }
        })?;
        Ok(true)
    }

    /// Aligns the selection inside the printable area.
    pub fn align(&mut self, alignment: Alignment) -> Result<(), DesignError> {
        let area = self.config.printable_area;
        self.modify_selected(|object| alignment.apply(&mut object.geometry, &area))
    }

    /// Moves, resizes or rotates an object.
    pub fn transform(&mut self, id: ObjectId, edit: impl FnOnce(&mut Geometry)) -> Result<(), DesignError> {
        self.modify(id, |object| edit(&mut object.geometry))
    }

    /// Selects a user object, or clears the selection with `None`.
    pub fn select(&mut self, id: Option<ObjectId>) -> Result<(), DesignError> {
        if let Some(id) = id {
            if !self.surface.object(id).is_some_and(|object| !object.is_structural()) {
                return Err(DesignError::UnknownObject(id.to_string()));
            }
        }
        self.surface.set_active_object(id);
        Ok(())
    }

    /// Removes a user object, as its delete control does.
    pub fn delete(&mut self, id: ObjectId) -> Result<SceneObject, DesignError> {
        if self.surface.object(id).is_none_or(SceneObject::is_structural) {
            return Err(DesignError::UnknownObject(id.to_string()));
        }
        let removed = self
            .surface
            .remove(id)
            .ok_or_else(|| DesignError::UnknownObject(id.to_string()))?;
        if self.surface.active_object() == Some(id) {
            self.surface.set_active_object(None);
        }
        self.surface.render_now();
        self.pump_events();
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // History, views and garment
    // ------------------------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Restores the previous snapshot. Returns false when there is none.
    ///
    /// Events the host left queued are recorded first, so they count as the
    /// latest mutation.
    pub async fn undo(&mut self) -> bool {
        self.pump_events();
        self.history.undo(&mut self.surface, self.fetcher.as_ref()).await
    }

    /// Makes `view` active. History restarts from the incoming view.
    ///
    /// Returns false when `view` is already active.
    pub async fn switch_view(&mut self, view: View) -> bool {
        if view == self.store.active_view() {
            return false;
        }

        self.pump_events();
        self.history.begin_restore();
        let switched = self.store.switch_view(view, &mut self.surface).await;
        self.surface.take_events();
        self.history.end_restore();
        self.history.reset(serialize_objects(self.surface.objects()));
        switched
    }

    pub async fn set_garment_color(&mut self, color: GarmentColor) {
        self.store.set_garment_color(color, &mut self.surface).await;
        // Background events are structural and never recorded.
        self.pump_events();
    }

    // ------------------------------------------------------------------------
    // Persistence and export
    // ------------------------------------------------------------------------

    /// The full design with the live view flushed in.
    pub fn snapshot(&self) -> DesignState {
        self.store.snapshot(&self.surface)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DesignError> {
        self.snapshot().save(path)
    }

    /// Captures the design now; later edits do not reach the job.
    pub fn begin_export(&self) -> ExportJob {
        let compositor = ExportCompositor::new(&self.config, Arc::clone(&self.fetcher), self.fonts.database());
        ExportJob::new(compositor, self.snapshot())
    }

    pub async fn export(&self) -> Result<ExportArchive, ExportError> {
        self.begin_export().run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use crate::scene::record::SceneRecord;
    use crate::scene::{GARMENT_BACKGROUND, OriginX, OriginY, ShapeKind};
    use crate::surface::MemorySurface;
    use crate::testing::{self, SQUARE_ICON};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use proptest::prelude::*;

    async fn designer() -> Designer<MemorySurface> {
        let config = testing::small_config();
        let fetcher = Arc::new(testing::garment_fetcher_for(&config));
        Designer::attach(MemorySurface::new(&config), config, fetcher).await
    }

    fn logo_uri() -> String {
        format!(
            "data:image/png;base64,{}",
            STANDARD.encode(testing::png_bytes(40, 20, [200, 10, 10, 255]))
        )
    }

    fn live(designer: &Designer<MemorySurface>) -> Vec<SceneRecord> {
        serialize_objects(designer.surface().objects())
    }

    #[tokio::test]
    async fn attach_places_background_and_seeds_history() {
        let designer = designer().await;
        let objects = designer.surface().objects();
        assert_eq!(objects[0].name.as_deref(), Some(GARMENT_BACKGROUND));
        assert!(designer.active_objects().is_empty());
        assert_eq!(designer.history().len(), 1);
        assert!(designer.history().current().is_empty());
        assert!(!designer.can_undo());
        assert!(designer.surface().pending_events().is_empty());
    }

    #[tokio::test]
    async fn add_logo_is_scaled_centred_and_selected() {
        let mut designer = designer().await;
        let id = designer.add_logo(&logo_uri()).await.unwrap();

        let logo = designer.selected().unwrap();
        assert_eq!(logo.id, id);
        assert_eq!(logo.geometry.left, 35.0);
        assert_eq!(logo.geometry.top, 45.0);
        assert_eq!(logo.geometry.origin_x, OriginX::Center);
        assert_eq!(logo.geometry.origin_y, OriginY::Center);
        assert_eq!(logo.geometry.scaled_width(), 20.0);
        assert_eq!(logo.geometry.scaled_height(), 10.0);
        assert!(designer.surface().has_delete_control(id));
        assert_eq!(designer.history().len(), 2);
    }

    #[tokio::test]
    async fn logo_must_be_a_data_uri() {
        let mut designer = designer().await;
        let err = designer.add_logo("/logo.png").await.unwrap_err();
        assert!(matches!(err, DesignError::Codec(_)));
        assert!(designer.active_objects().is_empty());
        assert_eq!(designer.history().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_meme_adds_nothing() {
        let mut designer = designer().await;
        assert!(designer.add_meme("https://memes.invalid/cat.png").await.is_err());
        assert!(designer.active_objects().is_empty());
    }

    #[tokio::test]
    async fn add_icon_fills_black_and_scales() {
        let mut designer = designer().await;
        designer.add_icon(SQUARE_ICON).unwrap();

        let icon = designer.selected().unwrap();
        assert_eq!(icon.type_tag(), "group");
        assert_eq!(icon.paint.fill.as_deref(), Some("#000000"));
        let ObjectKind::Group(group) = &icon.kind else {
            panic!("icon is not a group");
        };
        assert!(group.objects.iter().all(|part| part.paint.fill.as_deref() == Some("#000000")));
        assert!((icon.geometry.scaled_width() - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn add_text_falls_back_on_missing_font() {
        let mut designer = designer().await;
        designer.add_text("Lobster").await;

        let text = designer.selected().unwrap();
        let ObjectKind::Text(content) = &text.kind else {
            panic!("not a text box");
        };
        assert_eq!(content.text, "Double click to edit");
        assert_eq!(content.font_family, "Lobster");
        assert_eq!(content.font_size, 4.0);
        assert_eq!(text.geometry.width, 20.0);
        // The placeholder wraps to three lines in a 20px box.
        assert!((text.geometry.height - 13.92).abs() < 1e-9);
        assert_eq!(text.paint.fill.as_deref(), Some("#000000"));
        assert!(!designer.fonts().has_family("Lobster"));
    }

    #[tokio::test]
    async fn edits_record_exactly_one_snapshot() {
        let mut designer = designer().await;
        designer.add_icon(SQUARE_ICON).unwrap();
        let before = designer.history().len();

        designer.set_fill("#ff0000").unwrap();
        assert_eq!(designer.history().len(), before + 1);
        let icon = designer.selected().unwrap();
        let ObjectKind::Group(group) = &icon.kind else {
            panic!("icon is not a group");
        };
        assert!(group.objects.iter().all(|part| part.paint.fill.as_deref() == Some("#ff0000")));

        designer.set_border("#00ff00", 2.0).unwrap();
        assert_eq!(designer.history().len(), before + 2);
        assert!(designer.selected().unwrap().paint.stroke_uniform);
    }

    #[tokio::test]
    async fn corner_radius_and_shadow_clear_at_zero() {
        let mut designer = designer().await;
        designer.add_logo(&logo_uri()).await.unwrap();

        designer.set_corner_radius(6.0).unwrap();
        let clip = designer.selected().unwrap().paint.clip.clone().unwrap();
        assert_eq!((clip.left, clip.top, clip.width, clip.height), (-20.0, -10.0, 40.0, 20.0));
        assert_eq!(clip.rx, 6.0);
        designer.set_corner_radius(0.0).unwrap();
        assert!(designer.selected().unwrap().paint.clip.is_none());

        designer.set_shadow("#333333", 8.0).unwrap();
        let shadow = designer.selected().unwrap().paint.shadow.clone().unwrap();
        assert_eq!(shadow.blur, 8.0);
        assert_eq!((shadow.offset_x, shadow.offset_y), (0.0, 0.0));
        designer.set_shadow("#333333", 0.0).unwrap();
        assert!(designer.selected().unwrap().paint.shadow.is_none());
    }

    #[tokio::test]
    async fn set_font_ignores_non_text() {
        let mut designer = designer().await;
        designer.add_icon(SQUARE_ICON).unwrap();
        let before = designer.history().len();
        assert!(!designer.set_font("Lobster").await.unwrap());
        assert_eq!(designer.history().len(), before);

        designer.add_text("sans-serif").await;
        assert!(designer.set_font("Lobster").await.unwrap());
        let ObjectKind::Text(content) = &designer.selected().unwrap().kind else {
            panic!("not a text box");
        };
        assert_eq!(content.font_family, "Lobster");
    }

    #[tokio::test]
    async fn edits_need_a_selection() {
        let mut designer = designer().await;
        assert!(matches!(designer.set_fill("#ffffff"), Err(DesignError::NoSelection)));
        assert!(matches!(designer.set_font("Lobster").await, Err(DesignError::NoSelection)));
        assert!(matches!(designer.align(Alignment::Left), Err(DesignError::NoSelection)));
    }

    #[tokio::test]
    async fn align_honours_origin() {
        let mut designer = designer().await;
        designer.add_icon(SQUARE_ICON).unwrap();

        // Printable area spans x 21..49, y 24..66; the icon is 10x10 centred.
        designer.align(Alignment::Left).unwrap();
        assert!((designer.selected().unwrap().geometry.left - 26.0).abs() < 1e-9);
        designer.align(Alignment::Right).unwrap();
        assert!((designer.selected().unwrap().geometry.left - 44.0).abs() < 1e-9);
        designer.align(Alignment::Top).unwrap();
        assert!((designer.selected().unwrap().geometry.top - 29.0).abs() < 1e-9);
        designer.align(Alignment::Bottom).unwrap();
        assert!((designer.selected().unwrap().geometry.top - 61.0).abs() < 1e-9);
        designer.align(Alignment::Center).unwrap();
        designer.align(Alignment::Middle).unwrap();
        let geometry = &designer.selected().unwrap().geometry;
        assert!((geometry.left - 35.0).abs() < 1e-9);
        assert!((geometry.top - 45.0).abs() < 1e-9);
    }

    #[test]
    fn align_top_left_origin() {
        let area = RectPx::new(10.0, 20.0, 100.0, 50.0);
        let mut geometry = Geometry {
            width: 10.0,
            height: 4.0,
            scale_x: 2.0,
            scale_y: 2.0,
            ..Geometry::default()
        };
        Alignment::Right.apply(&mut geometry, &area);
        Alignment::Bottom.apply(&mut geometry, &area);
        assert_eq!(geometry.left, 90.0);
        assert_eq!(geometry.top, 62.0);
    }

    #[tokio::test]
    async fn structural_objects_cannot_be_edited() {
        let mut designer = designer().await;
        let background = designer.surface().objects()[0].id;
        assert!(matches!(designer.select(Some(background)), Err(DesignError::UnknownObject(_))));
        assert!(matches!(designer.delete(background), Err(DesignError::UnknownObject(_))));
        assert!(designer.transform(background, |geometry| geometry.left = 0.0).is_err());
    }

    #[tokio::test]
    async fn delete_then_undo_restores() {
        let mut designer = designer().await;
        let id = designer.add_icon(SQUARE_ICON).unwrap();
        designer
            .transform(id, |geometry| {
                geometry.angle = 30.0;
                geometry.left = 30.0;
            })
            .unwrap();
        let placed = live(&designer);

        designer.delete(id).unwrap();
        assert!(designer.active_objects().is_empty());
        assert!(designer.selected().is_none());

        assert!(designer.undo().await);
        assert_eq!(live(&designer), placed);
        assert_eq!(designer.active_objects()[0].id, id);
        assert!(designer.surface().has_delete_control(id));
        // The restore itself recorded nothing.
        assert_eq!(designer.history().cursor(), 2);
        assert_eq!(designer.history().len(), 4);
    }

    #[tokio::test]
    async fn undo_records_host_edits_left_queued() {
        let mut designer = designer().await;
        let icon = designer.add_icon(SQUARE_ICON).unwrap();
        let rect = SceneObject::new(
            ObjectKind::Shape(ShapeKind::Rect { rx: 0.0, ry: 0.0 }),
            Geometry::centered(30.0, 40.0, 6.0, 6.0),
        );
        designer.surface_mut().add(rect);

        assert!(designer.undo().await);
        let remaining: Vec<ObjectId> = designer.active_objects().iter().map(|object| object.id).collect();
        assert_eq!(remaining, vec![icon]);
        assert_eq!(designer.history().cursor(), 1);

        assert!(designer.undo().await);
        assert!(designer.active_objects().is_empty());
    }

    #[tokio::test]
    async fn switch_view_isolates_and_resets_history() {
        let mut designer = designer().await;
        designer.add_icon(SQUARE_ICON).unwrap();
        let front = live(&designer);

        assert!(!designer.switch_view(View::Front).await);
        assert!(designer.switch_view(View::Back).await);
        assert!(designer.active_objects().is_empty());
        assert!(!designer.can_undo());
        assert_eq!(designer.history().len(), 1);

        designer.add_text("sans-serif").await;
        assert!(designer.switch_view(View::Front).await);
        assert_eq!(live(&designer), front);
        assert_eq!(designer.snapshot().records(View::Back).len(), 1);
        assert!(!designer.can_undo());
    }

    #[tokio::test]
    async fn garment_color_is_not_undoable() {
        let mut designer = designer().await;
        designer.set_garment_color(GarmentColor::new(0, 0, 200)).await;
        assert_eq!(designer.garment_color(), GarmentColor::new(0, 0, 200));
        assert!(!designer.can_undo());

        designer.switch_view(View::Left).await;
        assert_eq!(designer.garment_color(), GarmentColor::new(0, 0, 200));
    }

    #[tokio::test]
    async fn export_job_is_isolated_from_later_edits() {
        let mut designer = designer().await;
        designer.add_icon(SQUARE_ICON).unwrap();
        let expected = designer.export().await.unwrap();

        let job = designer.begin_export();
        designer.set_fill("#ff0000").unwrap();
        designer.add_text("sans-serif").await;
        designer.set_garment_color(GarmentColor::BLACK).await;

        assert_eq!(job.snapshot().records(View::Front).len(), 1);
        let archive = job.run().await.unwrap();
        assert_eq!(archive.bytes, expected.bytes);
    }

    #[tokio::test]
    async fn save_and_reopen() {
        let mut designer = designer().await;
        designer.add_icon(SQUARE_ICON).unwrap();
        designer.set_garment_color(GarmentColor::new(10, 120, 10)).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("design.json");
        designer.save(&path).unwrap();

        let config = testing::small_config();
        let fetcher = Arc::new(testing::garment_fetcher_for(&config));
        let state = DesignState::load(&path).unwrap();
        let reopened = Designer::open(MemorySurface::new(&config), config, fetcher, state).await;
        assert_eq!(live(&reopened), live(&designer));
        assert_eq!(reopened.garment_color(), GarmentColor::new(10, 120, 10));
        assert!(!reopened.can_undo());
    }

    // ------------------------------------------------------------------------
    // Undo law
    // ------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Op {
        AddIcon,
        Recolor(usize, u8),
        Reshape(usize),
        Remove(usize),
        Undo,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::AddIcon),
            (any::<usize>(), any::<u8>()).prop_map(|(index, shade)| Op::Recolor(index, shade)),
            any::<usize>().prop_map(Op::Reshape),
            any::<usize>().prop_map(Op::Remove),
            Just(Op::Undo),
        ]
    }

    fn pick(designer: &Designer<MemorySurface>, index: usize) -> Option<ObjectId> {
        let objects = designer.active_objects();
        (!objects.is_empty()).then(|| objects[index % objects.len()].id)
    }

    async fn run_ops(ops: Vec<Op>) -> Result<(), TestCaseError> {
        let config = testing::small_config();
        let fetcher = Arc::new(MemoryFetcher::new());
        let mut designer = Designer::attach(MemorySurface::new(&config), config, fetcher).await;
        let mut expected: Vec<Vec<SceneRecord>> = vec![Vec::new()];

        for op in ops {
            match op {
                Op::AddIcon => {
                    designer.add_icon(SQUARE_ICON).map_err(|err| TestCaseError::fail(err.to_string()))?;
                }
                Op::Recolor(index, shade) => {
                    let Some(id) = pick(&designer, index) else { continue };
                    designer.select(Some(id)).map_err(|err| TestCaseError::fail(err.to_string()))?;
                    let color = GarmentColor::new(shade, 0, 255 - shade).to_hex();
                    designer.set_fill(&color).map_err(|err| TestCaseError::fail(err.to_string()))?;
                }
                Op::Reshape(index) => {
                    let Some(id) = pick(&designer, index) else { continue };
                    designer
                        .transform(id, |geometry| geometry.angle += 15.0)
                        .map_err(|err| TestCaseError::fail(err.to_string()))?;
                }
                Op::Remove(index) => {
                    let Some(id) = pick(&designer, index) else { continue };
                    designer.delete(id).map_err(|err| TestCaseError::fail(err.to_string()))?;
                }
                Op::Undo => {
                    let undone = designer.undo().await;
                    prop_assert_eq!(undone, expected.len() > 1);
                    if undone {
                        expected.pop();
                    }
                    let restored = live(&designer);
                    prop_assert_eq!(Some(&restored), expected.last());
                    continue;
                }
            }
            let current = live(&designer);
            prop_assert_eq!(designer.history().current(), current.as_slice());
            expected.push(current);
            prop_assert_eq!(designer.history().len(), expected.len());
        }
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn undo_walks_back_through_mutations(ops in prop::collection::vec(op(), 1..12)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(run_ops(ops))?;
        }
    }
}
