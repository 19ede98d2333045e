//! Grid directions and relative shapes.
//!
//! Offsets are `(dy, dx)` with north being negative y.

use serde::{Deserialize, Serialize};

/// One of the four cardinal directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Towards row 0.
    North,
    /// Towards the last row.
    South,
    /// Towards the last column.
    East,
    /// Towards column 0.
    West,
}

impl Direction {
    /// All directions, clockwise from north.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit offset `(dy, dx)`.
    #[inline]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (-1, 0),
            Direction::South => (1, 0),
            Direction::East => (0, 1),
            Direction::West => (0, -1),
        }
    }

    /// Lowercase name, as used in commands.
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }

    /// Offset scaled by `n` tiles.
    #[inline]
    pub const fn scaled(self, n: i32) -> (i32, i32) {
        let (dy, dx) = self.offset();
        (dy * n, dx * n)
    }
}

/// A set of relative `(dy, dx)` offsets describing an area of effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape(pub Vec<(i32, i32)>);

impl Shape {
    /// The four orthogonal neighbours.
    pub fn cross() -> Self {
        Shape(vec![(1, 0), (-1, 0), (0, 1), (0, -1)])
    }

    /// Orthogonal neighbours at distance two.
    pub fn jump_cross() -> Self {
        Shape(vec![(2, 0), (-2, 0), (0, 2), (0, -2)])
    }

    /// The four diagonal neighbours.
    pub fn diagonals() -> Self {
        Shape(vec![(1, 1), (-1, 1), (1, -1), (-1, -1)])
    }

    /// Square of side `2 * radius + 1` centred on the origin, origin included.
    pub fn square(radius: i32) -> Self {
        let mut points = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                points.push((dy, dx));
            }
        }
        Shape(points)
    }

    /// Absolute coordinates around `(y, x)`. May contain negatives.
    pub fn around(&self, y: i32, x: i32) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.0.iter().map(move |(dy, dx)| (y + dy, x + dx))
    }

    /// Number of offsets in the shape.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the shape has no offsets.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_cancel() {
        let (ny, nx) = Direction::North.offset();
        let (sy, sx) = Direction::South.offset();
        assert_eq!((ny + sy, nx + sx), (0, 0));
        assert_eq!(Direction::East.scaled(11), (0, 11));
    }

    #[test]
    fn test_square_shape() {
        assert_eq!(Shape::square(0).len(), 1);
        assert_eq!(Shape::square(2).len(), 25);
        let around: Vec<_> = Shape::cross().around(5, 5).collect();
        assert!(around.contains(&(4, 5)));
        assert!(around.contains(&(5, 6)));
    }
}
