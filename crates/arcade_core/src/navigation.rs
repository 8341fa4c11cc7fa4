use crate::Position;

/// Route provider consumed by guests. The search itself lives outside the
/// engine; a `None` route leaves the guest where it stands.
pub trait Navigator {
    /// Ordered waypoints from `from` to `to`, ending at (or next to) `to`.
    fn find_path(&self, from: Position, to: Position) -> Option<Vec<Position>>;
}

/// Open floor: walk straight to the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectNavigator;

impl Navigator for DirectNavigator {
    fn find_path(&self, _from: Position, to: Position) -> Option<Vec<Position>> {
        Some(vec![to])
    }
}

impl<F> Navigator for F
where
    F: Fn(Position, Position) -> Option<Vec<Position>>,
{
    fn find_path(&self, from: Position, to: Position) -> Option<Vec<Position>> {
        self(from, to)
    }
}
