//! Sort-tile-recursive packed R-tree over axis-aligned rectangles.

/// Axis-aligned bounding rectangle. Points have `min == max`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rectangle {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rectangle {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Rectangle from envelope coordinates: `[x, y]` or
    /// `[min_x, min_y, max_x, max_y]`. `None` for any other width or when a
    /// coordinate is NaN.
    pub fn from_coordinates(coordinates: &[f64]) -> Option<Self> {
        let rectangle = match *coordinates {
            [x, y] => Self::point(x, y),
            [min_x, min_y, max_x, max_y] => Self::new(min_x, min_y, max_x, max_y),
            _ => return None,
        };
        (!coordinates.iter().any(|value| value.is_nan())).then_some(rectangle)
    }

    pub fn is_point(&self) -> bool {
        self.min_x == self.max_x && self.min_y == self.max_y
    }

    pub fn intersects(&self, other: &Rectangle) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(&self, other: &Rectangle) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        self.intersects(other).then(|| {
            Rectangle::new(
                self.min_x.max(other.min_x),
                self.min_y.max(other.min_y),
                self.max_x.min(other.max_x),
                self.max_y.min(other.max_y),
            )
        })
    }

    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn expand(&self, distance: f64) -> Rectangle {
        Rectangle::new(
            self.min_x - distance,
            self.min_y - distance,
            self.max_x + distance,
            self.max_y + distance,
        )
    }

    /// Euclidean distance between the closest points of both rectangles.
    pub fn distance(&self, other: &Rectangle) -> f64 {
        let dx = (other.min_x - self.max_x).max(self.min_x - other.max_x).max(0.0);
        let dy = (other.min_y - self.max_y).max(self.min_y - other.max_y).max(0.0);
        dx.hypot(dy)
    }

    fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }
}

pub(crate) const NODE_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug)]
struct Node {
    bounds: Rectangle,
    /// Range of children in the level below, or of entries for leaves.
    start: usize,
    end: usize,
}

/// Immutable R-tree mapping rectangles to `usize` items.
#[derive(Clone, Debug, Default)]
pub(crate) struct PackedRTree {
    entries: Vec<(Rectangle, usize)>,
    /// `levels[0]` are the leaves; the last level holds the root.
    levels: Vec<Vec<Node>>,
}

impl PackedRTree {
    pub(crate) fn build(mut entries: Vec<(Rectangle, usize)>) -> Self {
        if entries.is_empty() {
            return Self::default();
        }
        str_order(&mut entries, |(rectangle, _)| rectangle.center());
        let mut levels = vec![pack(&entries, |(rectangle, _)| *rectangle)];
        while levels.last().is_some_and(|level| level.len() > 1) {
            let Some(below) = levels.last_mut() else {
                break;
            };
            str_order(below, |node| node.bounds.center());
            let level = pack(below, |node| node.bounds);
            levels.push(level);
        }
        Self { entries, levels }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn size_in_bytes(&self) -> usize {
        self.entries.capacity() * size_of::<(Rectangle, usize)>()
            + self
                .levels
                .iter()
                .map(|level| level.capacity() * size_of::<Node>())
                .sum::<usize>()
    }

    /// Items whose rectangle intersects `query`, in no particular order.
    pub(crate) fn query(&self, query: &Rectangle, mut visit: impl FnMut(&Rectangle, usize)) {
        let Some(root_level) = self.levels.len().checked_sub(1) else {
            return;
        };
        let mut stack: Vec<(usize, usize)> = (0..self.levels[root_level].len())
            .map(|node| (root_level, node))
            .collect();
        while let Some((level, node)) = stack.pop() {
            let node = self.levels[level][node];
            if !node.bounds.intersects(query) {
                continue;
            }
            if level == 0 {
                for (rectangle, item) in &self.entries[node.start..node.end] {
                    if rectangle.intersects(query) {
                        visit(rectangle, *item);
                    }
                }
            } else {
                stack.extend((node.start..node.end).map(|child| (level - 1, child)));
            }
        }
    }
}

/// Reorder `items` into STR tiles: vertical slices by x, then y within each.
fn str_order<T>(items: &mut [T], center: impl Fn(&T) -> (f64, f64)) {
    let leaves = items.len().div_ceil(NODE_CAPACITY);
    let slices = (leaves as f64).sqrt().ceil().max(1.0) as usize;
    let slice_len = NODE_CAPACITY * leaves.div_ceil(slices);
    items.sort_by(|a, b| center(a).0.total_cmp(&center(b).0));
    for slice in items.chunks_mut(slice_len.max(1)) {
        slice.sort_by(|a, b| center(a).1.total_cmp(&center(b).1));
    }
}

fn pack<T>(items: &[T], bounds_of: impl Fn(&T) -> Rectangle) -> Vec<Node> {
    items
        .chunks(NODE_CAPACITY)
        .enumerate()
        .map(|(chunk, children)| {
            let start = chunk * NODE_CAPACITY;
            let bounds = children
                .iter()
                .map(&bounds_of)
                .reduce(|a, b| a.union(&b))
                .unwrap_or(Rectangle::new(0.0, 0.0, 0.0, 0.0));
            Node {
                bounds,
                start,
                end: start + children.len(),
            }
        })
        .collect()
}
