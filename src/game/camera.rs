//! Camera / Viewport Tracker
//!
//! Each player owns a camera: a fixed-size window over the stage it stands
//! on. The window follows the player with a hysteresis band (`padding`) and
//! every shift is reported as one delta carrying only the tiles that
//! entered and the coordinates that left.
//!
//! The view lives behind the camera's position lock. Zone membership is
//! changed only while that lock is held, and always after it (position →
//! zone). Broadcasters read the top-left cached in the zone entry and never
//! touch the position lock.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::config::clamp_padding;
use crate::core::sync::lock;
use crate::game::actor::{ActorId, Location};
use crate::game::events::{TileSnapshot, Update};
use crate::grid::stage::Stage;

/// Current window placement.
#[derive(Clone, Debug)]
pub struct View {
    stage: Weak<Stage>,
    top: usize,
    left: usize,
}

/// Per-player viewport.
pub struct Camera {
    id: ActorId,
    height: usize,
    width: usize,
    padding: usize,
    view: Mutex<Option<View>>,
    outbound: UnboundedSender<Update>,
}

impl Camera {
    /// New camera without a view. Padding is clamped so a band remains.
    pub fn new(
        id: ActorId,
        height: usize,
        width: usize,
        padding: usize,
        outbound: UnboundedSender<Update>,
    ) -> Self {
        Self {
            id,
            height,
            width,
            padding: clamp_padding(padding, height, width),
            view: Mutex::new(None),
            outbound,
        }
    }

    /// Owner id.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Window rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Window columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Effective padding.
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Current `(stage name, top, left)`, if a view is set.
    pub fn view(&self) -> Option<(String, usize, usize)> {
        let view = lock(&self.view);
        let view = view.as_ref()?;
        let stage = view.stage.upgrade()?;
        Some((stage.name().to_string(), view.top, view.left))
    }

    /// Queue an update to the owner.
    pub fn send(&self, update: Update) {
        if self.outbound.send(update).is_err() {
            debug!("Dropping update for disconnected camera {}", self.id);
        }
    }

    /// Centre a fresh window on `focus`, register in the zone of its
    /// top-left and send the full window. Fails if a view already exists.
    pub fn set_view(self: &Arc<Self>, focus: &Location) -> bool {
        let mut view = lock(&self.view);
        if view.is_some() {
            error!("Camera {} already has a view in set_view", self.id);
            return false;
        }

        let stage = &focus.stage;
        let (top, left) = top_left(
            stage.height(),
            stage.width(),
            self.height,
            self.width,
            focus.y(),
            focus.x(),
        );

        stage
            .zone(stage.zone_index(top, left))
            .insert(Arc::clone(self), top, left);
        *view = Some(View {
            stage: Arc::downgrade(stage),
            top,
            left,
        });

        let tiles = self.window(stage, top, left).map(|index| stage.tile_at(index).snapshot()).collect();
        self.send(Update::ViewReset {
            stage: stage.name().to_string(),
            top,
            left,
            tiles,
        });
        true
    }

    /// Shift the window if `focus` left the padding band. Emits one
    /// `ViewDelta` per shift and nothing otherwise. Returns true on shift.
    pub fn track(self: &Arc<Self>, focus: &Location) -> bool {
        let mut guard = lock(&self.view);
        let Some(view) = guard.as_mut() else {
            warn!("Camera {} has no view in track", self.id);
            return false;
        };
        let Some(stage) = view.stage.upgrade().filter(|s| Arc::ptr_eq(s, &focus.stage)) else {
            warn!("Camera {} tracking a focus on another stage", self.id);
            return false;
        };

        let new_top = axis_adjust(focus.y(), view.top, self.height, stage.height(), self.padding);
        let new_left = axis_adjust(focus.x(), view.left, self.width, stage.width(), self.padding);
        if new_top == view.top && new_left == view.left {
            return false;
        }

        let old_zone = stage.zone_index(view.top, view.left);
        let new_zone = stage.zone_index(new_top, new_left);
        if old_zone != new_zone && !stage.zone(old_zone).remove(self.id) {
            error!("Camera {} missing from its zone in track", self.id);
            return false;
        }
        stage.zone(new_zone).insert(Arc::clone(self), new_top, new_left);

        let (old_top, old_left) = (view.top, view.left);
        view.top = new_top;
        view.left = new_left;

        let rows = self.height.min(stage.height());
        let cols = self.width.min(stage.width());
        let inside = |top: usize, left: usize, y: usize, x: usize| {
            y >= top && y < top + rows && x >= left && x < left + cols
        };

        let entered: Vec<TileSnapshot> = self
            .window(&stage, new_top, new_left)
            .filter(|&index| {
                let tile = stage.tile_at(index);
                !inside(old_top, old_left, tile.y(), tile.x())
            })
            .map(|index| stage.tile_at(index).snapshot())
            .collect();
        let exited: Vec<(usize, usize)> = self
            .window(&stage, old_top, old_left)
            .map(|index| (index / stage.width(), index % stage.width()))
            .filter(|&(y, x)| !inside(new_top, new_left, y, x))
            .collect();

        self.send(Update::ViewDelta {
            top: new_top,
            left: new_left,
            dy: new_top as i32 - old_top as i32,
            dx: new_left as i32 - old_left as i32,
            entered,
            exited,
        });
        true
    }

    /// Leave the current zone and clear the view.
    pub fn drop_view(&self) -> bool {
        let mut view = lock(&self.view);
        let Some(current) = view.take() else {
            warn!("Camera {} has no view in drop", self.id);
            return false;
        };
        if let Some(stage) = current.stage.upgrade() {
            stage.zone(stage.zone_index(current.top, current.left)).remove(self.id);
        }
        true
    }

    fn window<'a>(&self, stage: &'a Stage, top: usize, left: usize) -> impl Iterator<Item = usize> + 'a {
        let bottom = (top + self.height).min(stage.height());
        let right = (left + self.width).min(stage.width());
        let width = stage.width();
        (top..bottom).flat_map(move |y| (left..right).map(move |x| y * width + x))
    }
}

/// Top-left of a window centred on `(y, x)`, clamped to the grid. A view
/// larger than the grid is shrunk to the grid first.
pub fn top_left(
    grid_height: usize,
    grid_width: usize,
    view_height: usize,
    view_width: usize,
    y: usize,
    x: usize,
) -> (usize, usize) {
    let view_height = view_height.min(grid_height);
    let view_width = view_width.min(grid_width);
    let row = y.saturating_sub(view_height / 2).min(grid_height - view_height);
    let col = x.saturating_sub(view_width / 2).min(grid_width - view_width);
    (row, col)
}

/// New window start on one axis. Keeps `pos` within
/// `[old + padding, old + view_len - padding - 1]`, shifting exactly enough
/// and then clamping to `[0, grid_len - view_len]`. A view at least as long
/// as the grid always starts at 0.
pub fn axis_adjust(pos: usize, old: usize, view_len: usize, grid_len: usize, padding: usize) -> usize {
    if view_len >= grid_len {
        return 0;
    }
    let (pos, old) = (pos as i64, old as i64);
    let lo = old + padding as i64;
    let hi = old + view_len as i64 - padding as i64 - 1;

    let shifted = if pos < lo {
        old - (lo - pos)
    } else if pos > hi {
        old + (pos - hi)
    } else {
        old
    };
    shifted.clamp(0, (grid_len - view_len) as i64) as usize
}
