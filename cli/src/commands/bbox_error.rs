use std::ops::Range;

use geochunk_core::model::{BoundingBox, ParseBoundingBoxError};
use thiserror::Error;
use yansi::{Condition, Paint};

/// A bounding box given on the command line could not be parsed
#[derive(Error, Debug)]
pub enum BboxError {
    #[error("{0}")]
    Parse(String),
}

/// Parses a `west,south,east,north` argument. Errors point at the offending
/// part of the input.
pub fn parse_bbox(input: &str) -> Result<BoundingBox, BboxError> {
    input
        .parse::<BoundingBox>()
        .map_err(|err| to_bbox_error(err, input))
}

fn to_bbox_error(err: ParseBoundingBoxError, input: &str) -> BboxError {
    if input.trim().is_empty() {
        return BboxError::Parse("Bounding box must not be empty".to_string());
    }

    let (msg, span): (String, Range<usize>) = match err {
        ParseBoundingBoxError::InvalidNumber { start, end } => {
            ("Invalid number.".to_string(), start..end)
        }
        ParseBoundingBoxError::WrongComponentCount { found } => (
            format!("Expected 4 comma-separated bounds (west,south,east,north), found {found}."),
            0..input.len(),
        ),
    };
    let span = span.start.min(input.len())..span.end.min(input.len());

    let span_len = span.end - span.start;
    let center_prefix = ((span_len + 1) / 2).saturating_sub(1);
    let center_suffix = span_len / 2;
    BboxError::Parse(
        format!(
            "Unable to parse bounding box\n\n{}{}{}\n{}{}{}{}\n{}{}{}",
            &input[..span.start],
            input[span.clone()].red(),
            &input[span.end..],
            " ".repeat(span.start),
            "─".repeat(center_prefix).red(),
            (if span.end > span.start { "┬" } else { "│" }).red(),
            "─".repeat(center_suffix).red(),
            " ".repeat(span.start + center_prefix),
            "╰── ".red(),
            msg.red().bold()
        )
        .whenever(Condition::from(|| {
            Condition::stderr_is_tty() && Condition::clicolor() && Condition::no_color()
        }))
        .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use assertor::{assert_that, EqualityAssertion, ResultAssertion, StringAssertion};
    use geochunk_core::model::BoundingBox;

    use super::{parse_bbox, BboxError};

    fn message(input: &str) -> String {
        match parse_bbox(input) {
            Err(BboxError::Parse(msg)) => msg,
            Ok(bb) => panic!("unexpectedly parsed {bb}"),
        }
    }

    #[test]
    fn valid() {
        assert_that!(parse_bbox("13.4,52.5,13.5,52.6"))
            .has_ok(BoundingBox::from_bounds(13.4, 52.5, 13.5, 52.6));
    }

    #[test]
    fn invalid_number() {
        let msg = message("13.4,abc,13.5,52.6");
        assert_that!(msg).contains("Unable to parse bounding box");
        assert_that!(msg).contains("Invalid number.");
        assert_that!(msg).contains("╰── ");
    }

    #[test]
    fn wrong_count() {
        let msg = message("13.4,52.5,13.5");
        assert_that!(msg).contains("found 3.");
    }

    #[test]
    fn empty() {
        assert_that!(message("  ")).is_equal_to("Bounding box must not be empty".to_string());
    }
}
