use std::fmt;

/// Two-component value, used for image and capture sizes (`x` = width, `y` = height).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vec2<T> {
    pub x: T,
    pub y: T,
}

impl<T: fmt::Debug> fmt::Debug for Vec2<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vec2")
            .field("x", &self.x)
            .field("y", &self.y)
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for Vec2<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

impl<T: Default> Default for Vec2<T> {
    fn default() -> Self {
        Self {
            x: T::default(),
            y: T::default(),
        }
    }
}

impl<T> Vec2<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl Vec2<usize> {
    /// Number of cells covered, `None` on overflow.
    pub fn area(&self) -> Option<usize> {
        self.x.checked_mul(self.y)
    }

    pub fn is_empty(&self) -> bool {
        self.x == 0 || self.y == 0
    }
}

impl From<(u32, u32)> for Vec2<usize> {
    fn from((x, y): (u32, u32)) -> Self {
        Self::new(x as usize, y as usize)
    }
}
