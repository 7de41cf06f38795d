// Card grid arithmetic shared by the terminal pages.

use ratatui::layout::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridMove {
    Left,
    Right,
    Up,
    Down,
}

/// How many cards of `card_width` fit in `width` after removing `margin` on both sides.
/// Never less than one column.
pub fn grid_columns(width: u16, card_width: u16, spacing: u16, margin: u16) -> usize {
    let available = width.saturating_sub(margin.saturating_mul(2)) as usize;
    let per_card = (card_width as usize + spacing as usize).max(1);
    (available / per_card).max(1)
}

/// `(row, column)` of item `index` in a grid with `cols` columns.
pub fn grid_position(index: usize, cols: usize) -> (usize, usize) {
    let cols = cols.max(1);
    (index / cols, index % cols)
}

/// New selected index after moving one cell in `dir`. Moves that leave the grid are ignored.
pub fn grid_move(index: usize, len: usize, cols: usize, dir: GridMove) -> usize {
    if len == 0 {
        return 0;
    }
    let cols = cols.max(1);
    let index = index.min(len - 1);
    match dir {
        GridMove::Left => index.saturating_sub(1),
        GridMove::Right => (index + 1).min(len - 1),
        GridMove::Up => index.checked_sub(cols).unwrap_or(index),
        GridMove::Down => {
            if index + cols < len {
                index + cols
            } else {
                index
            }
        }
    }
}

/// Rect of at most `width` x `height` centered in `area`.
pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}
