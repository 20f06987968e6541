// Map collision capability queried during dead reckoning.

use super::types::Point;

/// Collision query against the level geometry.
pub trait CollisionMap: Send + Sync {
    /// Surface normal at `point` if it lies inside solid geometry.
    fn collides(&self, point: Point) -> Option<Point>;
}

/// Map without any geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSpace;

impl CollisionMap for OpenSpace {
    fn collides(&self, _point: Point) -> Option<Point> {
        None
    }
}

/// Rectangular arena enclosed by axis-aligned walls.
#[derive(Debug, Clone, Copy)]
pub struct BoundedArena {
    pub min: Point,
    pub max: Point,
}

impl CollisionMap for BoundedArena {
    fn collides(&self, point: Point) -> Option<Point> {
        let nx = if point.x < self.min.x {
            1
        } else if point.x > self.max.x {
            -1
        } else {
            0
        };
        let ny = if point.y < self.min.y {
            1
        } else if point.y > self.max.y {
            -1
        } else {
            0
        };

        (nx != 0 || ny != 0).then_some(Point::new(nx, ny))
    }
}

/// Reflects the velocity components that point into the surface.
pub fn reflect(vel: Point, normal: Point) -> Point {
    let mut out = vel;
    if normal.x != 0 && vel.x.signum() == -normal.x.signum() {
        out.x = -vel.x;
    }
    if normal.y != 0 && vel.y.signum() == -normal.y.signum() {
        out.y = -vel.y;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_point_leaves_arena_then_normal_points_inwards() {
        let arena = BoundedArena {
            min: Point::new(-10, -10),
            max: Point::new(10, 10),
        };

        assert_eq!(arena.collides(Point::new(0, 0)), None);
        assert_eq!(arena.collides(Point::new(11, 0)), Some(Point::new(-1, 0)));
        assert_eq!(arena.collides(Point::new(-11, 12)), Some(Point::new(1, -1)));
    }

    #[test]
    fn when_reflecting_then_only_components_into_the_wall_flip() {
        assert_eq!(reflect(Point::new(5, 3), Point::new(-1, 0)), Point::new(-5, 3));
        assert_eq!(reflect(Point::new(-5, 3), Point::new(-1, 0)), Point::new(-5, 3));
        assert_eq!(reflect(Point::new(5, 3), Point::new(-1, -1)), Point::new(-5, -3));
    }
}
