//! Layout engine
//!
//! Pure geometry: maps the chosen layout and the set of active sources to a
//! [`RenderPlan`]. The plan is the authoritative contract a real compositor
//! must satisfy; nothing in this module owns state or can fail.

use crate::sources::SourceId;
use serde::{Deserialize, Serialize};

/// Selectable visual layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutId {
    /// Primary fills the frame; a secondary source is not composited
    Fullscreen,
    /// Primary fills the frame; secondary inset bottom-right
    PipBr,
    /// Primary fills the frame; secondary inset bottom-left
    PipBl,
    /// Primary fills the frame; secondary inset top-right
    PipTr,
    /// Primary fills the frame; secondary inset top-left
    PipTl,
    /// Both sources get equal half-frames
    Split,
}

/// Operator-selected layout, consumed by [`compute_geometry`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub id: LayoutId,
    /// Source the operator last marked primary. When absent or no longer
    /// active, geometry falls back to whichever active source exists.
    pub primary_source_id: Option<SourceId>,
    pub secondary_source_id: Option<SourceId>,
}

impl LayoutConfig {
    pub fn new(id: LayoutId) -> Self {
        Self {
            id,
            primary_source_id: None,
            secondary_source_id: None,
        }
    }

    pub fn with_primary(mut self, id: SourceId) -> Self {
        self.primary_source_id = Some(id);
        self
    }

    pub fn with_secondary(mut self, id: SourceId) -> Self {
        self.secondary_source_id = Some(id);
        self
    }
}

/// Rectangle in normalized frame coordinates (0.0..=1.0 on both axes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const FULL: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };
}

/// Placement of one source within the frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub source_id: SourceId,
    pub rect: Rect,
    /// Higher values render on top
    pub z_index: u8,
}

/// Geometric placement instructions produced by the layout engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPlan {
    pub placements: Vec<Placement>,
}

impl RenderPlan {
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Normalized edge length of a picture-in-picture inset
const PIP_SIZE: f32 = 0.25;
/// Normalized margin between an inset and the frame edge
const PIP_MARGIN: f32 = 0.03;

/// Computes render geometry for the given layout and active sources.
///
/// Total for every reachable input: any layout id combined with any subset
/// of active sources yields a plan. A configured primary that is no longer
/// active falls back to whichever active source exists; with no active
/// sources the plan is empty.
pub fn compute_geometry(config: &LayoutConfig, active: &[SourceId]) -> RenderPlan {
    let primary = config
        .primary_source_id
        .filter(|id| active.contains(id))
        .or_else(|| active.first().copied());

    let Some(primary) = primary else {
        return RenderPlan::default();
    };

    // Secondary: the configured one if still active, otherwise the other
    // active source, if any.
    let secondary = config
        .secondary_source_id
        .filter(|id| *id != primary && active.contains(id))
        .or_else(|| active.iter().copied().find(|id| *id != primary));

    let mut placements = vec![Placement {
        source_id: primary,
        rect: Rect::FULL,
        z_index: 0,
    }];

    match (config.id, secondary) {
        (LayoutId::Fullscreen, _) | (_, None) => {}
        (LayoutId::Split, Some(secondary)) => {
            placements[0].rect = Rect {
                x: 0.0,
                y: 0.0,
                width: 0.5,
                height: 1.0,
            };
            placements.push(Placement {
                source_id: secondary,
                rect: Rect {
                    x: 0.5,
                    y: 0.0,
                    width: 0.5,
                    height: 1.0,
                },
                z_index: 0,
            });
        }
        (pip, Some(secondary)) => {
            placements.push(Placement {
                source_id: secondary,
                rect: pip_rect(pip),
                z_index: 1,
            });
        }
    }

    RenderPlan { placements }
}

fn pip_rect(id: LayoutId) -> Rect {
    let near = PIP_MARGIN;
    let far = 1.0 - PIP_SIZE - PIP_MARGIN;
    let (x, y) = match id {
        LayoutId::PipBr => (far, far),
        LayoutId::PipBl => (near, far),
        LayoutId::PipTr => (far, near),
        LayoutId::PipTl => (near, near),
        // Unreachable by construction; keep the function total anyway.
        LayoutId::Fullscreen | LayoutId::Split => (far, far),
    };
    Rect {
        x,
        y,
        width: PIP_SIZE,
        height: PIP_SIZE,
    }
}
