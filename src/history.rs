//! Undo history.
//!
//! A single stack of serialized snapshots driven by surface mutation events.
//! The cursor always points at the snapshot matching the live objects.
//! Restores set a guard so the add/remove events they cause are not recorded
//! as new user mutations.

use tracing::debug;

use crate::fetch::AssetFetcher;
use crate::scene::record::{SceneRecord, deserialize, serialize_objects};
use crate::surface::{DrawingSurface, SurfaceEvent, replace_user_objects};

/// Ordered records of the active view's objects at one point in time.
pub type HistorySnapshot = Vec<SceneRecord>;

#[derive(Debug, Clone)]
pub struct HistoryManager {
    snapshots: Vec<HistorySnapshot>,
    cursor: usize,
    restoring: bool,
    limit: Option<usize>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HistoryManager {
    /// Creates a history holding one empty snapshot.
    ///
    /// `limit` caps the number of snapshots kept; the oldest are dropped.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            snapshots: vec![Vec::new()],
            cursor: 0,
            restoring: false,
            limit: limit.map(|l| l.max(1)),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// The snapshot matching the live state.
    pub fn current(&self) -> &[SceneRecord] {
        self.snapshots
            .get(self.cursor)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn snapshots(&self) -> &[HistorySnapshot] {
        &self.snapshots
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    /// Sets the guard; mutation events are ignored until [`end_restore`](Self::end_restore).
    pub fn begin_restore(&mut self) {
        self.restoring = true;
    }

    pub fn end_restore(&mut self) {
        self.restoring = false;
    }

    /// Records a snapshot of `surface` if `event` is a user mutation.
    ///
    /// Returns true if a snapshot was appended.
    pub fn observe<S: DrawingSurface + ?Sized>(&mut self, event: &SurfaceEvent, surface: &S) -> bool {
        if self.restoring || event.structural {
            return false;
        }
        self.record(serialize_objects(surface.objects()));
        true
    }

    /// Appends `snapshot` after the cursor, dropping any undone future.
    pub fn record(&mut self, snapshot: HistorySnapshot) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);
        self.cursor = self.snapshots.len() - 1;

        if let Some(limit) = self.limit {
            if self.snapshots.len() > limit {
                let excess = self.snapshots.len() - limit;
                self.snapshots.drain(..excess);
                self.cursor -= excess;
            }
        }
        debug!(cursor = self.cursor, len = self.snapshots.len(), "History snapshot recorded");
    }

    /// Replaces the whole stack with a single snapshot.
    pub fn reset(&mut self, live: HistorySnapshot) {
        self.snapshots = vec![live];
        self.cursor = 0;
    }

    /// Restores the previous snapshot onto `surface`.
    ///
    /// Returns false (and does nothing) at the first snapshot.
    pub async fn undo<S: DrawingSurface + ?Sized>(&mut self, surface: &mut S, fetcher: &dyn AssetFetcher) -> bool {
        if self.cursor == 0 {
            return false;
        }

        self.begin_restore();
        let target = self.cursor - 1;
        let objects = deserialize(&self.snapshots[target], fetcher).await;
        replace_user_objects(surface, objects);
        // The restore's own add/remove events must not become snapshots.
        surface.take_events();
        self.end_restore();

        self.cursor = target;
        debug!(cursor = self.cursor, "Undo");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DesignerConfig;
    use crate::fetch::MemoryFetcher;
    use crate::scene::{Geometry, ObjectKind, SceneObject, ShapeKind};
    use crate::surface::{MemorySurface, MutationKind};

    fn rect(left: f64) -> SceneObject {
        SceneObject::new(
            ObjectKind::Shape(ShapeKind::Rect { rx: 0.0, ry: 0.0 }),
            Geometry::centered(left, 10.0, 5.0, 5.0),
        )
    }

    fn pump(history: &mut HistoryManager, surface: &mut MemorySurface) {
        for event in surface.take_events() {
            history.observe(&event, &*surface);
        }
    }

    #[test]
    fn starts_with_one_empty_snapshot() {
        let history = HistoryManager::default();
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), 0);
        assert!(history.current().is_empty());
        assert!(!history.can_undo());
    }

    #[test]
    fn mutations_append_snapshots() {
        let mut surface = MemorySurface::new(&DesignerConfig::default());
        let mut history = HistoryManager::default();

        surface.add(rect(1.0));
        pump(&mut history, &mut surface);
        surface.add(rect(2.0));
        pump(&mut history, &mut surface);

        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 2);
        assert_eq!(history.current().len(), 2);
    }

    #[test]
    fn guard_and_structural_events_are_ignored() {
        let surface = MemorySurface::new(&DesignerConfig::default());
        let mut history = HistoryManager::default();
        let object = rect(1.0);

        history.begin_restore();
        assert!(!history.observe(&SurfaceEvent::new(MutationKind::Added, &object), &surface));
        history.end_restore();

        let guide = &surface.objects()[0];
        assert!(!history.observe(&SurfaceEvent::new(MutationKind::Modified, guide), &surface));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn new_mutation_truncates_future() {
        let mut history = HistoryManager::default();
        history.record(vec![]);
        history.record(vec![]);
        history.cursor = 1;
        history.record(vec![]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 2);
    }

    #[test]
    fn limit_drops_oldest() {
        let mut history = HistoryManager::new(Some(3));
        for _ in 0..5 {
            history.record(vec![]);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 2);
    }

    #[test]
    fn reset_replaces_stack() {
        let mut history = HistoryManager::default();
        history.record(vec![]);
        history.reset(vec![]);
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
    }

    #[tokio::test]
    async fn undo_restores_previous_snapshot() {
        let mut surface = MemorySurface::new(&DesignerConfig::default());
        let mut history = HistoryManager::default();
        let fetcher = MemoryFetcher::new();

        let first = surface.add(rect(1.0));
        pump(&mut history, &mut surface);
        surface.add(rect(2.0));
        pump(&mut history, &mut surface);

        assert!(history.undo(&mut surface, &fetcher).await);
        assert_eq!(history.cursor(), 1);
        assert_eq!(surface.user_objects().len(), 1);
        assert_eq!(surface.user_objects()[0].id, first);
        assert!(surface.has_delete_control(first));
        assert!(surface.take_events().is_empty());
        assert!(!history.is_restoring());

        assert!(history.undo(&mut surface, &fetcher).await);
        assert!(surface.user_objects().is_empty());
        assert_eq!(surface.render_count(), 2);

        assert!(!history.undo(&mut surface, &fetcher).await);
        assert_eq!(surface.render_count(), 2);
    }
}
