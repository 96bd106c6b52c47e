//! The interactive drawing surface, as seen by the design engine.
//!
//! Pointer handling, hit testing and selection handles live behind this
//! trait. The engine only needs to add and remove objects, edit them, track
//! the selection and observe mutation events.

use std::collections::HashSet;

use tracing::trace;

use crate::config::DesignerConfig;
use crate::scene::{
    Geometry, ObjectId, ObjectKind, PRINTABLE_AREA, SceneObject, ShapeKind,
};

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Added,
    Modified,
    Removed,
}

/// A mutation notification fired by the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceEvent {
    pub kind: MutationKind,
    pub target: ObjectId,
    /// The target is a structural object (background, guide).
    pub structural: bool,
}

impl SurfaceEvent {
    pub fn new(kind: MutationKind, target: &SceneObject) -> Self {
        Self {
            kind,
            target: target.id,
            structural: target.is_structural(),
        }
    }

    /// The conventional event name, e.g. `object:added`.
    pub fn name(&self) -> &'static str {
        match self.kind {
            MutationKind::Added => "object:added",
            MutationKind::Modified => "object:modified",
            MutationKind::Removed => "object:removed",
        }
    }
}

// ============================================================================
// DrawingSurface
// ============================================================================

/// Capabilities the engine requires from a drawing surface.
///
/// `add` and `remove` fire their own events. Edits made through
/// `object_mut` are silent; callers fire `Modified` once the edit is done.
pub trait DrawingSurface {
    /// Adds an object on top of the stack and returns its id.
    fn add(&mut self, object: SceneObject) -> ObjectId;

    fn remove(&mut self, id: ObjectId) -> Option<SceneObject>;

    /// All objects, bottom first.
    fn objects(&self) -> &[SceneObject];

    fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects().iter().find(|object| object.id == id)
    }

    fn object_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject>;

    fn active_object(&self) -> Option<ObjectId>;

    fn set_active_object(&mut self, id: Option<ObjectId>);

    fn send_to_back(&mut self, id: ObjectId);

    /// Queues a mutation event.
    fn fire(&mut self, event: SurfaceEvent);

    /// Drains queued mutation events in firing order.
    fn take_events(&mut self) -> Vec<SurfaceEvent>;

    fn render_now(&mut self);

    /// Attaches the per-object delete affordance.
    fn attach_delete_control(&mut self, id: ObjectId);

    /// Non-structural objects, bottom first.
    fn user_objects(&self) -> Vec<&SceneObject> {
        self.objects().iter().filter(|object| !object.is_structural()).collect()
    }

    /// Removes every non-structural object.
    fn clear_user_objects(&mut self) -> Vec<SceneObject> {
        let ids: Vec<ObjectId> = self.user_objects().iter().map(|object| object.id).collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }
}

/// Replaces the user objects on `surface` with `objects`.
///
/// Clears the selection, attaches delete controls and renders, also when
/// `objects` is empty.
pub fn replace_user_objects<S: DrawingSurface + ?Sized>(surface: &mut S, objects: Vec<SceneObject>) {
    surface.set_active_object(None);
    surface.clear_user_objects();
    for object in objects {
        let id = surface.add(object);
        surface.attach_delete_control(id);
    }
    surface.render_now();
}

// ============================================================================
// MemorySurface
// ============================================================================

/// Headless surface keeping objects in memory.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    width: u32,
    height: u32,
    objects: Vec<SceneObject>,
    active: Option<ObjectId>,
    events: Vec<SurfaceEvent>,
    delete_controls: HashSet<ObjectId>,
    renders: usize,
}

impl MemorySurface {
    /// Creates a surface with the printable-area guide already placed.
    pub fn new(config: &DesignerConfig) -> Self {
        let area = config.printable_area;
        let mut guide = SceneObject::new(
            ObjectKind::Shape(ShapeKind::Rect { rx: 0.0, ry: 0.0 }),
            Geometry {
                left: area.x,
                top: area.y,
                width: area.width,
                height: area.height,
                ..Geometry::default()
            },
        )
        .with_name(PRINTABLE_AREA)
        .with_fill("transparent");
        guide.paint.stroke = Some("#cccccc".to_string());
        guide.extra.insert("strokeDashArray".to_string(), serde_json::json!([5, 5]));
        guide.extra.insert("selectable".to_string(), serde_json::Value::Bool(false));

        Self {
            width: config.canvas.width,
            height: config.canvas.height,
            objects: vec![guide],
            active: None,
            events: Vec::new(),
            delete_controls: HashSet::new(),
            renders: 0,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// How many times the surface has been asked to render.
    pub fn render_count(&self) -> usize {
        self.renders
    }

    pub fn has_delete_control(&self, id: ObjectId) -> bool {
        self.delete_controls.contains(&id)
    }

    /// Events queued and not yet drained.
    pub fn pending_events(&self) -> &[SurfaceEvent] {
        &self.events
    }
}

impl DrawingSurface for MemorySurface {
    fn add(&mut self, object: SceneObject) -> ObjectId {
        let id = object.id;
        self.events.push(SurfaceEvent::new(MutationKind::Added, &object));
        self.objects.push(object);
        id
    }

    fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let index = self.objects.iter().position(|object| object.id == id)?;
        let object = self.objects.remove(index);
        self.events.push(SurfaceEvent::new(MutationKind::Removed, &object));
        self.delete_controls.remove(&id);
        if self.active == Some(id) {
            self.active = None;
        }
        Some(object)
    }

    fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    fn object_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|object| object.id == id)
    }

    fn active_object(&self) -> Option<ObjectId> {
        self.active
    }

    fn set_active_object(&mut self, id: Option<ObjectId>) {
        self.active = id.filter(|id| self.objects.iter().any(|object| object.id == *id));
    }

    fn send_to_back(&mut self, id: ObjectId) {
        if let Some(index) = self.objects.iter().position(|object| object.id == id) {
            let object = self.objects.remove(index);
            self.objects.insert(0, object);
        }
    }

    fn fire(&mut self, event: SurfaceEvent) {
        trace!(event = event.name(), target = %event.target, "Surface event");
        self.events.push(event);
    }

    fn take_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }

    fn render_now(&mut self) {
        self.renders += 1;
    }

    fn attach_delete_control(&mut self, id: ObjectId) {
        self.delete_controls.insert(id);
    }
}
