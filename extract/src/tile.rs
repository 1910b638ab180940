//! Tile planes: the flattened geometric representation searched by the
//! extractor.
//!
//! A [`PlaneSet`] holds one bag of typed, axis-aligned tiles per plane of
//! the technology. The extractor consumes planes only through paint,
//! clipped copy, masked area search, and boundary-segment enumeration;
//! there is no corner stitching.

use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::tech::{PlaneId, TileTypeId};

/// One typed rectangle of mask geometry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// The area covered by the tile.
    pub rect: Rect,
    /// The tile's type.
    pub ty: TileTypeId,
}

impl Tile {
    /// The four boundary segments of the tile, in [`Side::ALL`] order.
    pub fn edges(&self) -> [EdgeSeg; 4] {
        Side::ALL.map(|side| EdgeSeg {
            side,
            coord: self.rect.side_coord(side),
            span: self.rect.side_span(side),
        })
    }
}

/// One boundary segment of a tile: a side, the coordinate of that side,
/// and the span of the edge along its direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSeg {
    /// Which side of the tile the segment lies on.
    pub side: Side,
    /// The coordinate of the edge perpendicular to its direction.
    pub coord: i64,
    /// The extent of the edge along its direction.
    pub span: Span,
}

impl EdgeSeg {
    /// The rectangular band extending `depth` units outward from this
    /// edge.
    pub fn band(&self, depth: i64) -> Rect {
        let near = self.coord;
        let far = self.coord + self.side.sign() * depth;
        match self.side.edge_dir() {
            Dir::Vert => Rect::from_spans(Span::new(near, far), self.span),
            Dir::Horiz => Rect::from_spans(self.span, Span::new(near, far)),
        }
    }
}

/// A stable reference to a tile within a [`PlaneSet`].
///
/// Keys remain valid until the plane set is cleared.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    /// The plane holding the tile.
    pub plane: PlaneId,
    /// The index of the tile within its plane.
    pub index: usize,
}

/// A set of tile planes, indexed by [`PlaneId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaneSet {
    planes: Vec<Vec<Tile>>,
}

impl PlaneSet {
    /// Creates a plane set with `num_planes` empty planes.
    pub fn new(num_planes: usize) -> Self {
        Self {
            planes: vec![Vec::new(); num_planes],
        }
    }

    /// The number of planes.
    #[inline]
    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    /// Removes all tiles from all planes. Plane count is preserved.
    pub fn clear(&mut self) {
        for plane in &mut self.planes {
            plane.clear();
        }
    }

    /// Returns `true` if no plane holds any tile.
    pub fn is_empty(&self) -> bool {
        self.planes.iter().all(|p| p.is_empty())
    }

    /// Paints a tile onto the given plane, returning its key.
    ///
    /// Zero-area rectangles are ignored and return [`None`].
    pub fn paint(&mut self, plane: PlaneId, rect: Rect, ty: TileTypeId) -> Option<TileKey> {
        if rect.is_empty() {
            return None;
        }
        let tiles = &mut self.planes[plane.index()];
        tiles.push(Tile { rect, ty });
        Some(TileKey {
            plane,
            index: tiles.len() - 1,
        })
    }

    /// The tile with the given key.
    ///
    /// # Panics
    ///
    /// Panics if the key does not refer to a tile in this set.
    #[inline]
    pub fn tile(&self, key: TileKey) -> &Tile {
        &self.planes[key.plane.index()][key.index]
    }

    /// All tiles on one plane, in paint order.
    pub fn tiles(&self, plane: PlaneId) -> impl Iterator<Item = (TileKey, &Tile)> {
        self.planes[plane.index()]
            .iter()
            .enumerate()
            .map(move |(index, tile)| (TileKey { plane, index }, tile))
    }

    /// All tiles on all planes, planes in order, tiles in paint order.
    pub fn all_tiles(&self) -> impl Iterator<Item = (TileKey, &Tile)> {
        self.planes.iter().enumerate().flat_map(|(p, tiles)| {
            tiles.iter().enumerate().map(move |(index, tile)| {
                (
                    TileKey {
                        plane: PlaneId::new(p),
                        index,
                    },
                    tile,
                )
            })
        })
    }

    /// Tiles on `plane` whose rectangles touch `area` (overlap or abut,
    /// corners included).
    pub fn tiles_touching<'a>(
        &'a self,
        plane: PlaneId,
        area: Rect,
    ) -> impl Iterator<Item = (TileKey, &'a Tile)> {
        self.tiles(plane).filter(move |(_, t)| t.rect.touches(area))
    }

    /// Tiles on `plane` whose rectangles overlap `area` in nonzero area.
    pub fn tiles_overlapping<'a>(
        &'a self,
        plane: PlaneId,
        area: Rect,
    ) -> impl Iterator<Item = (TileKey, &'a Tile)> {
        self.tiles(plane).filter(move |(_, t)| t.rect.overlaps(area))
    }

    /// Copies every tile of `self` into `target`, transformed by `trans`
    /// and clipped to `clip` (given in target coordinates). Tiles clipped
    /// to zero area are dropped.
    pub fn copy_clipped(&self, target: &mut PlaneSet, trans: Transformation, clip: Rect) {
        for (key, tile) in self.all_tiles() {
            let r = tile.rect.transform(trans);
            if let Some(r) = r.intersection(clip) {
                if !r.is_empty() {
                    target.paint(key.plane, r, tile.ty);
                }
            }
        }
    }

    /// The bounding box of all tiles, or [`None`] if the set is empty.
    pub fn bbox(&self) -> Option<Rect> {
        let mut bbox: Option<Rect> = None;
        for (_, tile) in self.all_tiles() {
            bbox = Some(match bbox {
                Some(b) => b.union(tile.rect),
                None => tile.rect,
            });
        }
        bbox
    }
}

/// Half-open containment test for charging per-edge quantities against a
/// clip rectangle: an edge on the clip's upper boundary belongs to the
/// next chunk over, so adjacent clips never charge the same edge twice.
pub(crate) fn clip_contains(span: Span, coord: i64) -> bool {
    coord >= span.start() && coord < span.stop()
}

/// Splits `r` into the (up to four) rectangles covering the part of `r`
/// outside `cover`. Returns `r` whole if the two share no area.
pub(crate) fn subtract(r: Rect, cover: Rect) -> Vec<Rect> {
    let Some(ov) = r.intersection(cover) else {
        return vec![r];
    };
    if ov.is_empty() {
        return vec![r];
    }
    let mut out = Vec::new();
    if r.left() < ov.left() {
        out.push(Rect::from_sides(r.left(), r.bot(), ov.left(), r.top()));
    }
    if ov.right() < r.right() {
        out.push(Rect::from_sides(ov.right(), r.bot(), r.right(), r.top()));
    }
    if r.bot() < ov.bot() {
        out.push(Rect::from_sides(ov.left(), r.bot(), ov.right(), ov.bot()));
    }
    if ov.top() < r.top() {
        out.push(Rect::from_sides(ov.left(), ov.top(), ov.right(), r.top()));
    }
    out
}

/// Returns `true` if the two rectangles overlap in area or share an edge
/// segment of nonzero length. Touching only at a corner does not count.
pub(crate) fn abuts_or_overlaps(a: Rect, b: Rect) -> bool {
    match a.intersection(b) {
        Some(r) => r.width() > 0 || r.height() > 0,
        None => false,
    }
}
