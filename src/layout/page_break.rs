//! # Page Break Decisions
//!
//! Given the space left on a page and the heights of a block's indivisible
//! units (wrapped lines of a paragraph, rows of a table), decide whether the
//! block goes here whole, moves to the next page, or splits between units.
//! Orphan and widow minimums keep splits from stranding a lone line.

/// Slack for accumulated floating-point error when summing heights.
const FIT_EPSILON: f64 = 1e-6;

/// What to do with a block at the current cursor position.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakDecision {
    /// Place the entire block on the current page (it fits).
    Place,
    /// Move the entire block to the next page.
    MoveToNextPage,
    /// Place the first units here and continue with the rest on the next page.
    Split {
        /// How many units (lines or rows) stay on the current page.
        items_on_current_page: usize,
    },
}

/// Whether `height` fits into `available`, with float tolerance.
pub fn fits(height: f64, available: f64) -> bool {
    height <= available + FIT_EPSILON
}

/// Decide how a block made of units with the given heights is placed into
/// `remaining_height`.
///
/// `min_orphan` is the fewest units allowed on the current page when
/// splitting, `min_widow` the fewest carried over. Values below 1 act as 1.
pub fn decide_break(
    remaining_height: f64,
    unit_heights: &[f64],
    is_breakable: bool,
    min_orphan: usize,
    min_widow: usize,
) -> BreakDecision {
    let total: f64 = unit_heights.iter().sum();
    if fits(total, remaining_height) {
        return BreakDecision::Place;
    }

    if !is_breakable || unit_heights.len() < 2 {
        return BreakDecision::MoveToNextPage;
    }

    let min_orphan = min_orphan.max(1);
    let min_widow = min_widow.max(1);

    let mut running = 0.0;
    let mut fit_count = 0;
    for &h in unit_heights {
        if !fits(running + h, remaining_height) {
            break;
        }
        running += h;
        fit_count += 1;
    }

    // Pull units back until enough are carried to the next page.
    let total_units = unit_heights.len();
    let carried = total_units - fit_count;
    if carried < min_widow {
        fit_count = fit_count.saturating_sub(min_widow - carried);
    }

    if fit_count == 0 || fit_count < min_orphan {
        return BreakDecision::MoveToNextPage;
    }

    BreakDecision::Split {
        items_on_current_page: fit_count,
    }
}
