// THEORY:
// The `CandidateExtractor` is the spatial grouping stage. It turns the binary
// occupancy mask into a list of rectangles, one per connected region, and keeps
// only the regions whose area is plausible for a discrete obstruction.
//
// Algorithm steps:
// 1.  **Foreground labelling**: an iterative flood fill (8-connected) assigns a
//     region label to every set pixel and accumulates its bounds and pixel count.
// 2.  **Hole labelling**: the clear pixels are flood filled too (4-connected, the
//     dual of 8-connected foreground). A clear region that never touches the
//     image border is a hole, the interior of an internal contour. Its area is
//     added to the region that encloses it, and the hole is reported as a region
//     of its own, the same way a contour tree lists inner contours.
// 3.  **Area filter**: a region is kept when its filled area lies in
//     `[min_area, max_area)`. The lower bound rejects leftover noise; the upper
//     bound rejects whole-scene collapses such as a camera bump.
// The bounding rectangle of a region's convex hull equals the bounding rectangle
// of the region itself, so the bounds gathered during the fill are final.
// Output order follows the raster scan and carries no meaning.

use crate::core_modules::candidate::{BoundingBox, CandidateBox};
use crate::core_modules::segmenter::OccupancyMask;

const UNLABELLED: u32 = 0;

/// Accumulated statistics for one labelled region.
#[derive(Debug, Clone)]
struct Region {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    pixel_count: u64,
    touches_border: bool,
    /// For holes: the foreground region directly above the first scanned pixel.
    enclosing: Option<u32>,
}

impl Region {
    fn seeded(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            pixel_count: 0,
            touches_border: false,
            enclosing: None,
        }
    }

    fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.min_x, self.min_y, self.max_x + 1, self.max_y + 1)
    }
}

#[derive(Debug, Clone)]
pub struct CandidateExtractor {
    min_area: u64,
    max_area: u64,
}

impl CandidateExtractor {
    pub fn new(min_area: u64, max_area: u64) -> Self {
        Self { min_area, max_area }
    }

    pub fn extract(&self, mask: &OccupancyMask) -> Vec<CandidateBox> {
        let (foreground_labels, mut objects) = label_regions(mask, true, None);
        let (_, holes) = label_regions(mask, false, Some(&foreground_labels));

        let mut candidates = Vec::new();
        for hole in holes.iter().filter(|h| !h.touches_border) {
            if let Some(label) = hole.enclosing {
                if let Some(owner) = objects.get_mut(label as usize - 1) {
                    owner.pixel_count += hole.pixel_count;
                }
            }
            if self.accepts(hole.pixel_count) {
                candidates.push(CandidateBox::new(hole.bounds(), hole.pixel_count));
            }
        }

        for object in &objects {
            if self.accepts(object.pixel_count) {
                candidates.push(CandidateBox::new(object.bounds(), object.pixel_count));
            }
        }
        candidates
    }

    fn accepts(&self, area: u64) -> bool {
        area >= self.min_area && area < self.max_area
    }
}

/// Flood fills every pixel whose state equals `foreground`.
///
/// Foreground uses 8-connectivity and background 4-connectivity. Labels start at
/// 1; region `n` lives at index `n - 1` of the returned list. When labelling
/// clear pixels, `owners` is the foreground labelling used to resolve which
/// region sits directly above each seed.
fn label_regions(mask: &OccupancyMask, foreground: bool, owners: Option<&[u32]>) -> (Vec<u32>, Vec<Region>) {
    let width = mask.width() as usize;
    let height = mask.height() as usize;
    let mut labels = vec![UNLABELLED; width * height];
    let mut regions: Vec<Region> = Vec::new();

    const EIGHT: [(i64, i64); 8] = [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)];
    const FOUR: [(i64, i64); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
    let neighbours: &[(i64, i64)] = if foreground { &EIGHT } else { &FOUR };

    let mut stack: Vec<(u32, u32)> = Vec::new();
    for y in 0..height as u32 {
        for x in 0..width as u32 {
            let index = y as usize * width + x as usize;
            if labels[index] != UNLABELLED || mask.is_set(x, y) != foreground {
                continue;
            }

            let label = regions.len() as u32 + 1;
            let mut region = Region::seeded(x, y);
            if let (Some(fg), true) = (owners, y > 0) {
                let above = fg[index - width];
                if above != UNLABELLED {
                    region.enclosing = Some(above);
                }
            }

            labels[index] = label;
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                region.pixel_count += 1;
                region.min_x = region.min_x.min(cx);
                region.min_y = region.min_y.min(cy);
                region.max_x = region.max_x.max(cx);
                region.max_y = region.max_y.max(cy);
                if cx == 0 || cy == 0 || cx as usize == width - 1 || cy as usize == height - 1 {
                    region.touches_border = true;
                }

                for (dx, dy) in neighbours {
                    let nx = cx as i64 + dx;
                    let ny = cy as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    let n_index = ny as usize * width + nx as usize;
                    if labels[n_index] == UNLABELLED && mask.is_set(nx as u32, ny as u32) == foreground {
                        labels[n_index] = label;
                        stack.push((nx as u32, ny as u32));
                    }
                }
            }
            regions.push(region);
        }
    }

    (labels, regions)
}
