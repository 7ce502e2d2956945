//! Binary morphology with rectangular structuring elements

use segprompt_core::Mask;

#[derive(Clone, Copy)]
enum Op {
    Dilate,
    Erode,
}

/// Sliding min/max over a `size`-cell window along one axis, anchored at
/// `size / 2`. Dilation uses the reflected window so that opening and
/// closing do not shift regions for even sizes. Cells outside the grid are
/// ignored.
fn pass(src: &[bool], width: usize, height: usize, size: usize, horizontal: bool, op: Op) -> Vec<bool> {
    let anchor = size / 2;
    let mut out = vec![false; src.len()];
    let (len, lines) = if horizontal { (width, height) } else { (height, width) };
    let at = |line: usize, i: usize| {
        if horizontal {
            line * width + i
        } else {
            i * width + line
        }
    };

    for line in 0..lines {
        for i in 0..len {
            let (lo, hi) = match op {
                Op::Erode => (i.saturating_sub(anchor), (i + size - anchor).min(len)),
                Op::Dilate => (i.saturating_sub(size - 1 - anchor), (i + anchor + 1).min(len)),
            };
            let mut window = (lo..hi).map(|j| src[at(line, j)]);
            out[at(line, i)] = match op {
                Op::Dilate => window.any(|v| v),
                Op::Erode => window.all(|v| v),
            };
        }
    }
    out
}

fn apply(mask: &Mask, size: usize, op: Op) -> Mask {
    let (w, h) = (mask.width() as usize, mask.height() as usize);
    if size <= 1 || w == 0 || h == 0 {
        return mask.clone();
    }
    let rows = pass(mask.data(), w, h, size, true, op);
    let cols = pass(&rows, w, h, size, false, op);
    Mask::from_fn(mask.width(), mask.height(), |x, y| cols[y as usize * w + x as usize])
}

/// Dilation with a `size × size` rectangle.
pub fn dilate(mask: &Mask, size: usize) -> Mask {
    apply(mask, size, Op::Dilate)
}

/// Erosion with a `size × size` rectangle.
pub fn erode(mask: &Mask, size: usize) -> Mask {
    apply(mask, size, Op::Erode)
}

/// Dilation followed by erosion: fills gaps narrower than the element.
pub fn close(mask: &Mask, size: usize) -> Mask {
    erode(&dilate(mask, size), size)
}

/// Erosion followed by dilation: drops specks smaller than the element.
pub fn open(mask: &Mask, size: usize) -> Mask {
    dilate(&erode(mask, size), size)
}

/// Cosmetic cleanup applied before rendering: close 3×3, then open 8×8.
pub fn smooth(mask: &Mask) -> Mask {
    open(&close(mask, 3), 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dilate_grows_by_anchor() {
        let mask = Mask::from_rect(10, 10, 4, 4, 5, 5);
        let grown = dilate(&mask, 3);
        assert_eq!(grown, Mask::from_rect(10, 10, 3, 3, 6, 6));
    }

    #[test]
    fn test_erode_shrinks() {
        let mask = Mask::from_rect(10, 10, 2, 2, 7, 7);
        assert_eq!(erode(&mask, 3), Mask::from_rect(10, 10, 3, 3, 6, 6));
    }

    #[test]
    fn test_erode_ignores_outside_cells() {
        let full = Mask::from_rect(6, 6, 0, 0, 6, 6);
        assert_eq!(erode(&full, 3), full);
    }

    #[test]
    fn test_close_fills_single_pixel_hole() {
        let mask = Mask::from_fn(10, 10, |x, y| (2..8).contains(&x) && (2..8).contains(&y) && !(x == 4 && y == 4));
        let closed = close(&mask, 3);
        assert!(closed.get(4, 4));
        assert_eq!(closed.count(), 36);
    }

    #[test]
    fn test_open_removes_speck() {
        let mask = Mask::from_fn(30, 30, |x, y| {
            ((5..20).contains(&x) && (5..20).contains(&y)) || (x == 25 && y == 25)
        });
        let opened = open(&mask, 8);
        assert!(!opened.get(25, 25));
        assert_eq!(opened, Mask::from_rect(30, 30, 5, 5, 20, 20));
    }

    #[test]
    fn test_smooth_keeps_large_square() {
        let square = Mask::from_rect(40, 40, 10, 10, 30, 30);
        assert_eq!(smooth(&square), square);
    }

    #[test]
    fn test_smooth_drops_thin_noise() {
        let mask = Mask::from_fn(40, 40, |x, y| y == 3 && x < 30);
        assert!(smooth(&mask).is_empty());
    }
}
