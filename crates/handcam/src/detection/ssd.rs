//! Anchors of Single Shot MultiBox Detector (SSD) networks.
//!
//! The palm detector uses fixed-size anchors: each feature map cell contributes
//! `boxes_per_cell` anchors, all centered on the cell.

use std::ops::Index;

use itertools::iproduct;

/// Center of an anchor box, normalized to `0.0..=1.0` of the network input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x: f32,
    y: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x
    }

    pub fn y_center(&self) -> f32 {
        self.y
    }
}

/// Feature map geometry of one SSD output layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    boxes_per_cell: u32,
    columns: u32,
    rows: u32,
}

impl LayerInfo {
    /// A `columns` x `rows` feature map with `boxes_per_cell` anchors per cell.
    ///
    /// # Panics
    ///
    /// Panics if `boxes_per_cell` is zero.
    pub const fn new(boxes_per_cell: u32, columns: u32, rows: u32) -> Self {
        assert!(boxes_per_cell > 0, "layer without anchors");
        Self {
            boxes_per_cell,
            columns,
            rows,
        }
    }

    /// Anchors of this layer, row-major.
    fn anchors(self) -> impl Iterator<Item = Anchor> {
        let (w, h) = (self.columns as f32, self.rows as f32);
        iproduct!(0..self.rows, 0..self.columns, 0..self.boxes_per_cell).map(move |(row, col, _)| {
            Anchor {
                x: (col as f32 + 0.5) / w,
                y: (row as f32 + 0.5) / h,
            }
        })
    }
}

/// All anchors of a network, indexed like its box and score outputs.
pub struct Anchors(Vec<Anchor>);

impl Anchors {
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        Self(layers.iter().flat_map(|layer| layer.anchors()).collect())
    }

    pub fn anchor_count(&self) -> usize {
        self.0.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.0[index]
    }
}
