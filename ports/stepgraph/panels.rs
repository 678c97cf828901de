/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Resizable three-panel page layout (editor | graph | chat).
//!
//! Widths are stored as fractions of the container so the layout survives
//! window resizes. Dragging a divider moves width between its two
//! neighbours only; the fractions always sum to one.

use serde::{Deserialize, Serialize};

/// No panel may shrink below this share of the container
pub const MIN_PANEL_FRACTION: f32 = 0.15;

const SUM_TOLERANCE: f32 = 1e-3;

/// Draggable boundary between two adjacent panels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divider {
    EditorGraph,
    GraphChat,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelLayout {
    pub editor: f32,
    pub graph: f32,
    pub chat: f32,
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self {
            editor: 0.3,
            graph: 0.45,
            chat: 0.25,
        }
    }
}

impl PanelLayout {
    /// Move a divider by `delta_px` (positive = right) inside a container
    /// `container_px` wide. The move is clamped so both neighbours keep
    /// at least `MIN_PANEL_FRACTION`.
    pub fn resize(&mut self, divider: Divider, delta_px: f32, container_px: f32) {
        if container_px.is_nan() || container_px <= 0.0 || !delta_px.is_finite() {
            return;
        }
        let delta = delta_px / container_px;

        let (left, right) = match divider {
            Divider::EditorGraph => (&mut self.editor, &mut self.graph),
            Divider::GraphChat => (&mut self.graph, &mut self.chat),
        };
        let lower = MIN_PANEL_FRACTION - *left;
        let upper = *right - MIN_PANEL_FRACTION;
        let delta = delta.max(lower).min(upper);

        *left += delta;
        *right -= delta;
    }

    /// Panel widths in pixels for a container `container_px` wide
    pub fn widths_px(&self, container_px: f32) -> [f32; 3] {
        [
            self.editor * container_px,
            self.graph * container_px,
            self.chat * container_px,
        ]
    }

    /// Whether the fractions are finite, each at least the minimum, and sum to one
    pub fn is_valid(&self) -> bool {
        let parts = [self.editor, self.graph, self.chat];
        parts
            .iter()
            .all(|p| p.is_finite() && *p >= MIN_PANEL_FRACTION - SUM_TOLERANCE)
            && (parts.iter().sum::<f32>() - 1.0).abs() <= SUM_TOLERANCE
    }

    /// `self` if valid, otherwise the default layout
    pub fn sanitized(self) -> Self {
        if self.is_valid() { self } else { Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() <= 1e-4 * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_default_is_valid() {
        assert!(PanelLayout::default().is_valid());
    }

    #[test]
    fn test_resize_moves_width_between_neighbours() {
        let mut layout = PanelLayout::default();
        layout.resize(Divider::EditorGraph, 100.0, 1000.0);

        assert_close(layout.editor, 0.4);
        assert_close(layout.graph, 0.35);
        assert_close(layout.chat, 0.25);
        assert!(layout.is_valid());
    }

    #[test]
    fn test_resize_clamps_at_minimum() {
        let mut layout = PanelLayout::default();
        layout.resize(Divider::GraphChat, 5000.0, 1000.0);
        assert_close(layout.chat, MIN_PANEL_FRACTION);
        assert_close(layout.graph, 0.55);

        layout.resize(Divider::EditorGraph, -5000.0, 1000.0);
        assert_close(layout.editor, MIN_PANEL_FRACTION);
        assert_close(layout.graph, 0.7);
        assert!(layout.is_valid());
    }

    #[test]
    fn test_resize_ignores_degenerate_input() {
        let mut layout = PanelLayout::default();
        layout.resize(Divider::EditorGraph, 50.0, 0.0);
        layout.resize(Divider::EditorGraph, f32::NAN, 1000.0);
        assert_eq!(layout, PanelLayout::default());
    }

    #[test]
    fn test_widths_px() {
        let widths = PanelLayout::default().widths_px(1000.0);
        assert_close(widths[0], 300.0);
        assert_close(widths[1], 450.0);
        assert_close(widths[2], 250.0);
    }

    #[test]
    fn test_sanitized() {
        let broken = PanelLayout {
            editor: 0.05,
            graph: 0.9,
            chat: 0.05,
        };
        assert!(!broken.is_valid());
        assert_eq!(broken.sanitized(), PanelLayout::default());

        let fine = PanelLayout {
            editor: 0.2,
            graph: 0.5,
            chat: 0.3,
        };
        assert_eq!(fine.sanitized(), fine);
    }
}
