//! Contour detection and queries over the detected set.
//!
//! [`ContourSet::find`] runs Suzuki-Abe border following
//! (`imageproc::contours::find_contours`) on a single-channel image.
//! Any non-zero pixel counts as foreground.
//!
//! # Retrieval modes
//!
//! - [`RetrievalMode::External`] keeps only outer borders that have no
//!   parent, which is what document detection wants: the page outline,
//!   not the text inside it.
//! - [`RetrievalMode::List`] keeps every border, outer and hole, in
//!   detection order.
//!
//! # Approximation
//!
//! [`ApproximationMethod::Simple`] drops every point that continues a
//! straight horizontal, vertical, or diagonal run, so an axis-aligned
//! rectangle is described by its four corners.

use imageproc::contours::BorderType;
use imageproc::point::Point;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::corners::{self, CornerResult};
use crate::handle::ImageHandle;
use crate::types::{Dimensions, PipelineError};

/// Which borders [`ContourSet::find`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Top-level outer borders only.
    #[default]
    External,
    /// Every border in detection order.
    List,
}

/// How many boundary points each contour keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproximationMethod {
    /// Every boundary pixel.
    None,
    /// End points of straight runs only.
    #[default]
    Simple,
}

/// Options for [`ContourSet::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourOptions {
    pub mode: RetrievalMode,
    pub method: ApproximationMethod,
}

/// Whether a border encloses foreground or a hole in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContourKind {
    #[default]
    Outer,
    Hole,
}

/// One closed border.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour {
    /// Boundary points in tracing order; the last connects to the first.
    pub points: Vec<Point<i32>>,
    pub kind: ContourKind,
    /// Index of the enclosing border in the unfiltered detection order.
    pub parent: Option<usize>,
}

static EMPTY_CONTOUR: Contour = Contour {
    points: Vec::new(),
    kind: ContourKind::Outer,
    parent: None,
};

impl Contour {
    /// Number of boundary points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the contour has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Smallest upright rectangle covering every point, with inclusive
    /// pixel extents. `None` for an empty contour.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn bounding_rect(&self) -> Option<Rect> {
        let first = self.points.first()?;
        let (mut min, mut max) = (*first, *first);
        for p in &self.points {
            min = Point::new(min.x.min(p.x), min.y.min(p.y));
            max = Point::new(max.x.max(p.x), max.y.max(p.y));
        }
        let width = (max.x - min.x + 1) as u32;
        let height = (max.y - min.y + 1) as u32;
        Some(Rect::at(min.x, min.y).of_size(width, height))
    }

    /// Enclosed area by the shoelace formula (always non-negative).
    #[must_use]
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
            })
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let area = twice.unsigned_abs() as f64 / 2.0;
        area
    }

    /// Vertices of the minimum-area enclosing rectangle, or `None` for an
    /// empty contour.
    #[must_use]
    pub fn min_area_rect(&self) -> Option<[Point<i32>; 4]> {
        if self.points.is_empty() {
            return None;
        }
        Some(imageproc::geometry::min_area_rect(&self.points))
    }
}

/// The contours of one binary image.
#[derive(Debug, Clone, Default)]
pub struct ContourSet {
    contours: Vec<Contour>,
}

impl ContourSet {
    /// Detect contours in a single-channel image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if `binary` is not
    /// grayscale.
    pub fn find(binary: &ImageHandle, options: ContourOptions) -> Result<Self, PipelineError> {
        let gray = binary.as_gray().ok_or_else(|| {
            PipelineError::InvalidInput(format!(
                "contour detection needs a single-channel image, got {} channels",
                binary.channels()
            ))
        })?;

        let contours: Vec<Contour> = imageproc::contours::find_contours::<i32>(gray)
            .into_iter()
            .filter(|c| {
                options.mode == RetrievalMode::List
                    || (matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            })
            .map(|c| Contour {
                points: match options.method {
                    ApproximationMethod::None => c.points,
                    ApproximationMethod::Simple => compress_runs(&c.points),
                },
                kind: match c.border_type {
                    BorderType::Outer => ContourKind::Outer,
                    BorderType::Hole => ContourKind::Hole,
                },
                parent: c.parent,
            })
            .collect();

        tracing::debug!(count = contours.len(), ?options, "contours found");
        Ok(Self { contours })
    }

    /// Wrap already-traced contours.
    #[must_use]
    pub const fn from_contours(contours: Vec<Contour>) -> Self {
        Self { contours }
    }

    /// Every contour, in detection order.
    #[must_use]
    pub fn all(&self) -> &[Contour] {
        &self.contours
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contours.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// The contour at `index`, or an empty contour when out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> &Contour {
        self.contours.get(index).unwrap_or(&EMPTY_CONTOUR)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Contour> {
        self.contours.iter()
    }

    /// Call `callback` with each contour and its index, in detection
    /// order.
    pub fn iterate(&self, mut callback: impl FnMut(&Contour, usize)) -> &Self {
        for (index, contour) in self.contours.iter().enumerate() {
            callback(contour, index);
        }
        self
    }

    /// Upright bounding rectangle of `contour`.
    #[must_use]
    pub fn bounding_rect(&self, contour: &Contour) -> Option<Rect> {
        contour.bounding_rect()
    }

    /// The contour with the largest strictly positive area. Ties keep the
    /// earliest contour.
    #[must_use]
    pub fn largest_contour_area(&self) -> Option<&Contour> {
        let mut max_area = 0.0;
        let mut largest = None;
        for contour in &self.contours {
            let area = contour.area();
            if area > max_area {
                max_area = area;
                largest = Some(contour);
            }
        }
        largest
    }

    /// Corner points of `options.contour`, or of the largest contour when
    /// none is given, relative to `options.canvas`.
    #[must_use]
    pub fn corner_points(&self, options: CornerOptions<'_>) -> CornerResult {
        let contour = options.contour.or_else(|| self.largest_contour_area());
        corners::corner_points(contour, options.canvas)
    }

    /// Drop every contour. Calling this again is a no-op.
    pub fn destroy(&mut self) {
        self.contours = Vec::new();
    }
}

impl<'a> IntoIterator for &'a ContourSet {
    type Item = &'a Contour;
    type IntoIter = std::slice::Iter<'a, Contour>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Options for [`ContourSet::corner_points`].
#[derive(Debug, Clone, Copy)]
pub struct CornerOptions<'a> {
    /// Reference canvas the corners are clamped into.
    pub canvas: Dimensions,
    /// Contour to use; the largest one when `None`.
    pub contour: Option<&'a Contour>,
}

impl CornerOptions<'_> {
    /// Use the largest contour against `canvas`.
    #[must_use]
    pub const fn canvas(canvas: Dimensions) -> Self {
        Self {
            canvas,
            contour: None,
        }
    }
}

/// Keep only points where the step direction changes.
fn compress_runs(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let step = |a: Point<i32>, b: Point<i32>| ((b.x - a.x).signum(), (b.y - a.y).signum());
    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect()
}
