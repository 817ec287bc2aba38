use std::ops::Range;

use crate::error::FluentDbError;

/// Column names marking where each entity of a joined row begins.
///
/// Accepts one marker per boundary, or a single marker reused at every boundary.
/// A string is split on commas, so `"Id"` and `"ProductId,CategoryId"` both work:
/// ```rust
/// use sql_fluent::prelude::*;
///
/// assert_eq!(SplitOn::from("ProductId, CategoryId").markers(), ["ProductId", "CategoryId"]);
/// assert_eq!(SplitOn::default().markers(), ["Id"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOn {
    markers: Vec<String>,
}

impl SplitOn {
    #[must_use]
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let markers: Vec<String> = markers
            .into_iter()
            .map(|marker| {
                let marker: String = marker.into();
                marker.trim().to_string()
            })
            .filter(|m| !m.is_empty())
            .collect();
        if markers.is_empty() {
            Self::default()
        } else {
            Self { markers }
        }
    }

    #[must_use]
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    fn marker_for(&self, boundary: usize, shapes: usize) -> Result<&str, FluentDbError> {
        match self.markers.len() {
            1 => Ok(&self.markers[0]),
            n if n + 1 == shapes => Ok(&self.markers[boundary]),
            n => Err(FluentDbError::Argument(format!(
                "split_on names {n} column(s) but {shapes} shapes need 1 or {}",
                shapes.saturating_sub(1)
            ))),
        }
    }
}

impl Default for SplitOn {
    fn default() -> Self {
        Self {
            markers: vec!["Id".to_string()],
        }
    }
}

impl From<&str> for SplitOn {
    fn from(value: &str) -> Self {
        Self::new(value.split(','))
    }
}

impl From<String> for SplitOn {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&[&str]> for SplitOn {
    fn from(value: &[&str]) -> Self {
        Self::new(value.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for SplitOn {
    fn from(value: [&str; N]) -> Self {
        Self::new(value)
    }
}

impl From<Vec<String>> for SplitOn {
    fn from(value: Vec<String>) -> Self {
        Self::new(value)
    }
}

/// Decompose a row's columns into `shapes` consecutive segments.
///
/// Columns are scanned left to right; segment `i + 1` starts at the first column after
/// the start of segment `i` whose name matches the `i`-th marker (case-insensitive).
/// The layout of a result set is the same for every row, so this runs once per set.
///
/// # Errors
/// `FluentDbError::Argument` when the marker count fits neither form, and
/// `FluentDbError::SplitColumnNotFound` when a marker is missing from the remaining columns.
pub fn plan_segments(
    columns: &[String],
    shapes: usize,
    split_on: &SplitOn,
) -> Result<Vec<Range<usize>>, FluentDbError> {
    if shapes == 0 {
        return Err(FluentDbError::Argument(
            "at least one shape is required".into(),
        ));
    }

    let mut segments = Vec::with_capacity(shapes);
    let mut start = 0;
    for boundary in 0..shapes - 1 {
        let marker = split_on.marker_for(boundary, shapes)?;
        let next = columns
            .iter()
            .enumerate()
            .skip(start + 1)
            .find(|(_, column)| column.eq_ignore_ascii_case(marker))
            .map(|(idx, _)| idx)
            .ok_or_else(|| FluentDbError::SplitColumnNotFound(marker.to_string()))?;
        segments.push(start..next);
        start = next;
    }
    segments.push(start..columns.len());
    Ok(segments)
}
