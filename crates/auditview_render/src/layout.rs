//! Column width allocation.
//!
//! Splits the printable width of the terminal between table columns. The
//! width is divided evenly; columns that need less than their share because
//! of a declared maximum are pinned to that maximum and their unused width is
//! shared among the remaining columns. Pinning repeats until a full pass pins
//! nothing new.
//!
//! When every column ends up pinned, the leftover width is split evenly
//! across all of them with integer division. The remainder of that division
//! is dropped, so the widths may sum to slightly less than the printable
//! width.

use crate::table::Column;

/// Spaces between two adjacent columns
pub const COLUMN_GAP: usize = 2;

/// Compute one width per column for a table `total_width` characters wide.
///
/// Widths are at least 1. For `total_width >= 3 * n - 2` the widths plus the
/// column gaps never exceed `total_width`.
#[must_use]
pub fn allocate_widths(total_width: usize, columns: &[Column]) -> Vec<usize> {
    let count = columns.len();
    if count == 0 {
        return Vec::new();
    }

    let mut widths: Vec<Option<usize>> = vec![None; count];
    let mut width_left = total_width.saturating_sub(COLUMN_GAP * (count - 1));
    let mut columns_left = count;
    let mut share = width_left / columns_left;

    loop {
        let mut pinned = false;
        for (width, column) in widths.iter_mut().zip(columns) {
            if width.is_some() {
                continue;
            }
            match column.max_width {
                Some(max) if max > 0 && max < share => {
                    *width = Some(max);
                    width_left -= max;
                    columns_left -= 1;
                    pinned = true;
                }
                _ => {}
            }
        }

        if columns_left == 0 {
            let extra = width_left / count;
            return widths
                .into_iter()
                .map(|width| (width.unwrap_or(0) + extra).max(1))
                .collect();
        }

        share = width_left / columns_left;
        if !pinned {
            break;
        }
    }

    widths
        .into_iter()
        .map(|width| width.unwrap_or(share).max(1))
        .collect()
}
