use xcap::Monitor;

use crate::capture::{to_physical, PhysicalRect, Region};
use crate::recorder::{SelectionReply, SelectionUi};

/// Selection stand-in that confirms a fixed rectangle.
///
/// Uses the configured physical rect (corners in either order), or the whole
/// primary monitor when none is set. The scale factor is read from the monitor under the rect's
/// bottom-right corner (where a drag would end) at confirmation time.
#[derive(Debug, Clone, Default)]
pub struct PresetSelection {
    rect: Option<PhysicalRect>,
}

impl PresetSelection {
    pub fn new(rect: Option<PhysicalRect>) -> Self {
        let rect = rect.map(|r| PhysicalRect::from_drag((r.left, r.top), (r.right, r.bottom)));
        Self { rect }
    }

    fn primary_monitor_rect() -> Option<(PhysicalRect, f64)> {
        let monitors = Monitor::all().ok()?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())?;
        let scale = monitor.scale_factor() as f64;
        let bounds = Region::new(
            monitor.x(),
            monitor.y(),
            monitor.x().saturating_add(monitor.width() as i32),
            monitor.y().saturating_add(monitor.height() as i32),
        )
        .ok()?;
        let rect = to_physical(&bounds, scale).ok()?;
        Some((rect, scale))
    }

    fn scale_at(rect: &PhysicalRect) -> f64 {
        Monitor::from_point(rect.right - 1, rect.bottom - 1)
            .map(|m| m.scale_factor() as f64)
            .unwrap_or(1.0)
    }
}

impl SelectionUi for PresetSelection {
    fn begin(&self, reply: SelectionReply) {
        let configured = self.rect;

        std::thread::spawn(move || {
            let chosen = match configured {
                Some(rect) => Some((rect, Self::scale_at(&rect))),
                None => Self::primary_monitor_rect(),
            };

            match chosen {
                Some((rect, scale)) => {
                    tracing::info!(target: "session", "[SELECTION] Confirming {:?} at scale {}", rect, scale);
                    reply.confirm(rect, scale);
                }
                None => {
                    tracing::warn!(target: "session", "[SELECTION] No monitor available, cancelling selection");
                    reply.cancel();
                }
            }
        });
    }
}
