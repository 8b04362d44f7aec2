//! Segment-level index checks shared by every operation.

use crate::error::ValidationError;
use crate::model::Segment;

/// An insertion point: at or above the segment minimum and strictly before
/// its end.
pub(crate) fn check_index(segment: &Segment, index: u32) -> Result<(), ValidationError> {
    let minimum = segment.min_index();
    if index < minimum {
        return Err(ValidationError::IndexBelowMinimum { index, minimum });
    }
    let end = segment.end();
    if index >= end {
        return Err(ValidationError::IndexPastEnd { index, end });
    }
    Ok(())
}

/// A non-empty range inside the segment. Ranges may end at the segment end
/// only when `allow_final` is set; deletions never may.
pub(crate) fn check_range(
    segment: &Segment,
    start: u32,
    end: u32,
    allow_final: bool,
) -> Result<(), ValidationError> {
    if start >= end {
        return Err(ValidationError::EmptyRange { start, end });
    }
    let minimum = segment.min_index();
    if start < minimum {
        return Err(ValidationError::IndexBelowMinimum {
            index: start,
            minimum,
        });
    }
    let segment_end = segment.end();
    if end > segment_end {
        return Err(ValidationError::IndexPastEnd {
            index: end,
            end: segment_end,
        });
    }
    if end == segment_end && !allow_final {
        return Err(ValidationError::DeletesFinalTerminator {
            start,
            end,
            terminator: segment_end - 1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse;
    use rstest::rstest;

    fn body() -> Segment {
        // "Hello\n" at 1..7
        parse("<p>Hello</p>").unwrap().tabs.remove(0).body
    }

    #[rstest]
    #[case(0, Err(ValidationError::IndexBelowMinimum { index: 0, minimum: 1 }))]
    #[case(1, Ok(()))]
    #[case(6, Ok(()))]
    #[case(7, Err(ValidationError::IndexPastEnd { index: 7, end: 7 }))]
    fn insertion_points(#[case] index: u32, #[case] expected: Result<(), ValidationError>) {
        assert_eq!(check_index(&body(), index), expected);
    }

    #[rstest]
    #[case(2, 2, false, Err(ValidationError::EmptyRange { start: 2, end: 2 }))]
    #[case(1, 6, false, Ok(()))]
    #[case(1, 7, false, Err(ValidationError::DeletesFinalTerminator { start: 1, end: 7, terminator: 6 }))]
    #[case(1, 7, true, Ok(()))]
    #[case(1, 8, true, Err(ValidationError::IndexPastEnd { index: 8, end: 7 }))]
    fn ranges(
        #[case] start: u32,
        #[case] end: u32,
        #[case] allow_final: bool,
        #[case] expected: Result<(), ValidationError>,
    ) {
        assert_eq!(check_range(&body(), start, end, allow_final), expected);
    }
}
