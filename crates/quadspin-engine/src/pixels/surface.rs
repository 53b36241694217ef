/// Row-major `width x height` buffer of packed pixel values.
///
/// Allocated zero-filled at construction; the size never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![0; len],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Returns the pixel at `(x, y)`, or `None` outside the surface.
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Writes a pixel. Out-of-bounds writes are ignored and return `false`.
    pub fn set(&mut self, x: u32, y: u32, value: u32) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.pixels[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, value: u32) {
        self.pixels.fill(value);
    }

    pub fn clear(&mut self) {
        self.fill(0);
    }

    /// One row of pixels, or `None` when `y` is out of range.
    pub fn row(&self, y: u32) -> Option<&[u32]> {
        if y >= self.height {
            return None;
        }
        let w = self.width as usize;
        let start = y as usize * w;
        Some(&self.pixels[start..start + w])
    }

    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_zero_filled() {
        let s = PixelSurface::new(4, 3);
        assert_eq!(s.as_slice().len(), 12);
        assert!(s.as_slice().iter().all(|&p| p == 0));
    }

    #[test]
    fn set_then_get() {
        let mut s = PixelSurface::new(4, 3);
        assert!(s.set(3, 2, 0xff00ff00));
        assert_eq!(s.get(3, 2), Some(0xff00ff00));
        assert_eq!(s.as_slice()[2 * 4 + 3], 0xff00ff00);
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mut s = PixelSurface::new(2, 2);
        assert!(!s.set(2, 0, 1));
        assert!(!s.set(0, 2, 1));
        assert_eq!(s.get(2, 0), None);
        assert!(s.as_slice().iter().all(|&p| p == 0));
    }

    #[test]
    fn fill_and_clear() {
        let mut s = PixelSurface::new(3, 3);
        s.fill(7);
        assert!(s.as_slice().iter().all(|&p| p == 7));
        s.clear();
        assert!(s.as_slice().iter().all(|&p| p == 0));
    }

    #[test]
    fn row_slices_one_line() {
        let mut s = PixelSurface::new(3, 2);
        s.set(0, 1, 5);
        s.set(2, 1, 9);
        assert_eq!(s.row(1), Some(&[5, 0, 9][..]));
        assert_eq!(s.row(2), None);
    }

    #[test]
    fn zero_sized_surface() {
        let s = PixelSurface::new(0, 10);
        assert!(s.is_empty());
        assert_eq!(s.get(0, 0), None);
        assert_eq!(s.row(0), Some(&[][..]));
    }
}
