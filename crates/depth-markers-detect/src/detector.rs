use depth_markers_core::{FrameSize, RgbImageView, Texel, Texture};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::compact::{compact_corners, CompactCorner};
use crate::corners::{detect_corners, CornerTexel};
use crate::decode::{decode_markers, MarkerRecord};
use crate::direction::EdgeDirectionTable;
use crate::edges::{classify_edges, EdgeTexel};
use crate::error::{check_frame_size, DetectError};
use crate::links::{resolve_links, EdgeLink};
use crate::params::DetectParams;
use crate::refine::refine_corners;
use crate::threshold::{threshold, Shade};

/// Every intermediate buffer of one detection run.
#[derive(Clone, Debug)]
pub struct MarkerDetection {
    pub shades: Texture<Shade>,
    pub edges: Texture<EdgeTexel>,
    /// Unrefined corner candidates; the linker and decoder sample these.
    pub corners: Texture<CornerTexel>,
    pub refined: Texture<CornerTexel>,
    pub compact: Texture<Option<CompactCorner>>,
    pub links: Texture<Option<EdgeLink>>,
    /// One optional marker per 40×30 cell.
    pub markers: Texture<Option<MarkerRecord>>,
}

impl MarkerDetection {
    /// Decoded markers in row-major cell order.
    pub fn markers(&self) -> impl Iterator<Item = &MarkerRecord> + '_ {
        self.markers.as_slice().iter().flatten()
    }

    pub fn frame(&self) -> FrameSize {
        FrameSize::new(self.shades.width(), self.shades.height())
    }

    /// Each stage output packed as a float texture, in stage order.
    pub fn encode_all(&self) -> Vec<(&'static str, Texture<Texel>)> {
        let frame = self.frame();
        vec![
            ("threshold", self.shades.encode(frame)),
            ("edges", self.edges.encode(frame)),
            ("corners", self.corners.encode(frame)),
            ("refined", self.refined.encode(frame)),
            ("compact", self.compact.encode(frame)),
            ("links", self.links.encode(frame)),
            ("markers", self.markers.encode(frame)),
        ]
    }
}

/// Runs stages 1-7 on color frames.
#[derive(Clone, Debug)]
pub struct MarkerDetector {
    params: DetectParams,
    table: &'static EdgeDirectionTable,
}

impl MarkerDetector {
    pub fn new(params: DetectParams) -> Self {
        Self {
            params,
            table: EdgeDirectionTable::shared(),
        }
    }

    pub fn params(&self) -> &DetectParams {
        &self.params
    }

    /// Detect markers in an RGB frame.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(width = image.width, height = image.height))
    )]
    pub fn detect(&self, image: &RgbImageView<'_>) -> Result<MarkerDetection, DetectError> {
        check_frame_size(image.width, image.height)?;
        let shades = threshold(image, &self.params.threshold);
        Ok(self.run(shades))
    }

    /// Detect markers in an already thresholded frame.
    pub fn detect_shades(&self, shades: Texture<Shade>) -> Result<MarkerDetection, DetectError> {
        check_frame_size(shades.width(), shades.height())?;
        Ok(self.run(shades))
    }

    fn run(&self, shades: Texture<Shade>) -> MarkerDetection {
        let p = &self.params;
        let edges = classify_edges(&shades, self.table);
        let corners = detect_corners(&edges, &p.corners);
        let refined = refine_corners(&corners);
        let compact = compact_corners(&refined);
        let links = resolve_links(&compact, &corners, &p.links);
        let markers = decode_markers(&links, &corners, &p.decoder);

        let detection = MarkerDetection {
            shades,
            edges,
            corners,
            refined,
            compact,
            links,
            markers,
        };
        log::debug!(
            "detect {}x{}: {} corner maxima, {} closed links, {} markers",
            detection.shades.width(),
            detection.shades.height(),
            detection.compact.as_slice().iter().flatten().count(),
            detection
                .links
                .as_slice()
                .iter()
                .flatten()
                .filter(|l| l.next.is_some())
                .count(),
            detection.markers().count()
        );
        detection
    }
}

impl Default for MarkerDetector {
    fn default() -> Self {
        Self::new(DetectParams::default())
    }
}
