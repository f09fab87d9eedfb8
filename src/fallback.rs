// File: fallback.rs
// Location: /src/fallback.rs
//
// Offline stand-in drawn when no encoder is available. It looks like a
// version 1 symbol but is not scannable.

use log::debug;

use crate::bitmap::Bitmap;
use crate::compositor;
use crate::error::CompositeError;
use crate::matrix::ModuleMatrix;

pub const FALLBACK_MODULES: usize = 21;

const FINDER_SIZE: usize = 7;
const RESERVED_SPAN: usize = 9;

/// Rolling hash over the UTF-16 code units of `text` with 32-bit wraparound.
pub fn text_hash(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |hash, code| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(code))
    })
}

pub fn is_reserved(row: usize, col: usize) -> bool {
    let far = FALLBACK_MODULES - RESERVED_SPAN;
    (row < RESERVED_SPAN && col < RESERVED_SPAN)
        || (row < RESERVED_SPAN && col > far)
        || (row > far && col < RESERVED_SPAN)
}

/// Fill rule for non-reserved cells.
pub fn cell_is_dark(hash: i32, row: usize, col: usize) -> bool {
    let offset = (row * FALLBACK_MODULES + col) as i64;
    // Truncating remainder: negative hashes never exceed 50.
    (i64::from(hash) + offset) % 100 > 50
}

fn finder_module(row: usize, col: usize, top: usize, left: usize) -> Option<bool> {
    if row < top || col < left || row >= top + FINDER_SIZE || col >= left + FINDER_SIZE {
        return None;
    }
    let ring = (row - top)
        .min(col - left)
        .min(top + FINDER_SIZE - 1 - row)
        .min(left + FINDER_SIZE - 1 - col);
    Some(ring != 1)
}

fn finder_origins() -> [(usize, usize); 3] {
    let far = FALLBACK_MODULES - FINDER_SIZE;
    [(0, 0), (0, far), (far, 0)]
}

/// Deterministic 21x21 matrix derived from `text`.
pub fn fallback_matrix(text: &str) -> ModuleMatrix {
    let hash = text_hash(text);
    let mut matrix = ModuleMatrix::new(FALLBACK_MODULES);

    for row in 0..FALLBACK_MODULES {
        for col in 0..FALLBACK_MODULES {
            let dark = if is_reserved(row, col) {
                finder_origins()
                    .iter()
                    .find_map(|&(top, left)| finder_module(row, col, top, left))
                    .unwrap_or(false)
            } else {
                cell_is_dark(hash, row, col)
            };
            matrix.set(row, col, dark);
        }
    }

    matrix
}

/// Paints the fallback pattern for `text` onto a `size x size` surface.
pub fn paint(text: &str, size: u32) -> Result<Bitmap, CompositeError> {
    debug!("Drawing fallback pattern ({}px) for text of {} chars", size, text.chars().count());
    let matrix = fallback_matrix(text);
    compositor::rasterize(&matrix, size).map(Bitmap::from_image)
}
