use std::collections::BTreeMap;
use std::path::Path;

use crate::canvas::Canvas;
use crate::chart;
use crate::compose::{self, ComposeInput};
use crate::error::ReportError;
use crate::model::{ReportDefaults, ReportRequest, StrengthSeries, fmt_date};
use crate::observations;
use crate::pdf;
use crate::photo;
use crate::types::{Size, mm};

/// Finished certificate bytes plus the page count the caller can assert on.
pub struct ReportArtifact {
    bytes: Vec<u8>,
    page_count: usize,
}

impl ReportArtifact {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Report generator bound to one set of form constants. Cheap to construct;
/// `generate` is a pure function of the request plus those constants.
pub struct ReportEngine {
    defaults: ReportDefaults,
}

impl ReportEngine {
    pub fn new(defaults: ReportDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &ReportDefaults {
        &self.defaults
    }

    /// Runs the whole pipeline: normalize observations, derive metrics,
    /// render the chart, prepare rasters, compose three pages, serialize.
    /// Missing core records fail fast; every per-item asset problem only
    /// degrades that slot.
    pub fn generate(&self, request: &ReportRequest) -> Result<ReportArtifact, ReportError> {
        let test_request = request
            .test_request
            .as_ref()
            .ok_or(ReportError::MissingData("test request record"))?;
        let customer = request
            .customer
            .as_ref()
            .ok_or(ReportError::MissingData("customer record"))?;
        let sample = request
            .sample
            .as_ref()
            .ok_or(ReportError::MissingData("sample summary record"))?;
        let reviewer = request.reviewer.as_ref().unwrap_or(&self.defaults.reviewer);

        let (mut cubes, series) = observations::normalize(sample, request.observations_raw.as_deref());
        observations::derive_metrics(&mut cubes);
        log::debug!(
            "composing certificate for job {:?}: {} specimen(s), {} photo(s)",
            test_request.job_number,
            cubes.len(),
            request.photos.len()
        );

        let chart = if series == StrengthSeries::default() {
            None
        } else {
            Some(chart::render_strength_chart(&series)?)
        };

        let mut canvas = Canvas::new(Size::a4());

        let logo_id = self
            .defaults
            .logo
            .as_deref()
            .and_then(|bytes| {
                photo::normalize_bytes(
                    bytes,
                    Size {
                        width: mm(40.0),
                        height: mm(25.0),
                    },
                )
            })
            .map(|image| canvas.register_image(image));
        let certification_id = self
            .defaults
            .certification_logo
            .as_deref()
            .and_then(|bytes| {
                photo::normalize_bytes(
                    bytes,
                    Size {
                        width: mm(25.0),
                        height: mm(25.0),
                    },
                )
            })
            .map(|image| canvas.register_image(image));
        let stamp_id = self
            .defaults
            .stamp
            .as_deref()
            .and_then(|bytes| {
                photo::normalize_bytes(
                    bytes,
                    Size {
                        width: mm(30.0),
                        height: mm(30.0),
                    },
                )
            })
            .map(|image| canvas.register_image(image));
        let chart_id = chart
            .as_ref()
            .map(|chart| canvas.register_image(chart.raster.clone()));

        // Out-of-range or undecodable photos drop out with a warning; the
        // composer prints the placeholder for any missing slot.
        let photo_cell = Size {
            width: mm(56.0),
            height: compose::photo_cell_height(cubes.len()) - mm(2.0),
        };
        let mut photo_ids: BTreeMap<_, String> = BTreeMap::new();
        for asset in &request.photos {
            if asset.specimen == 0 || asset.specimen as usize > cubes.len() {
                log::warn!(
                    "photo for specimen {} outside 1..={}, skipped",
                    asset.specimen,
                    cubes.len()
                );
                continue;
            }
            if let Some(image) = photo::normalize_photo(&asset.data, photo_cell) {
                let id = canvas.register_image(image);
                photo_ids.insert((asset.specimen, asset.slot), id);
            }
        }

        let report_date = match self.defaults.report_date {
            Some(date) => fmt_date(Some(date)),
            None => fmt_date(Some(time::OffsetDateTime::now_utc().date())),
        };

        let input = ComposeInput {
            defaults: &self.defaults,
            test_request,
            customer,
            sample,
            reviewer,
            cubes: &cubes,
            report_date,
            chart: chart.as_ref(),
            chart_id,
            logo_id,
            certification_id,
            stamp_id,
            photo_ids: &photo_ids,
        };
        compose::compose_report(&mut canvas, &input);

        let document = canvas.finish();
        let page_count = document.pages.len();
        let bytes = pdf::document_to_pdf(&document)?;
        log::debug!("certificate serialized: {} pages, {} bytes", page_count, bytes.len());
        Ok(ReportArtifact { bytes, page_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomerInfo, SampleSummary, TestRequestInfo};

    fn minimal_request() -> ReportRequest {
        ReportRequest {
            test_request: Some(TestRequestInfo::default()),
            customer: Some(CustomerInfo::default()),
            sample: Some(SampleSummary::default()),
            ..ReportRequest::default()
        }
    }

    fn request_with_cubes(count: u32) -> ReportRequest {
        ReportRequest {
            sample: Some(SampleSummary {
                num_of_cubes: count,
                ..SampleSummary::default()
            }),
            ..minimal_request()
        }
    }

    fn page_content(artifact: &ReportArtifact, index: usize) -> String {
        let loaded = lopdf::Document::load_mem(artifact.bytes()).expect("load pdf");
        let pages: Vec<_> = loaded.page_iter().collect();
        String::from_utf8_lossy(&loaded.get_page_content(pages[index]).expect("content"))
            .into_owned()
    }

    /// PDF-space y of the `Td` that positions the given string.
    fn text_y(content: &str, needle: &str) -> f64 {
        let marker = format!("({}) Tj", needle);
        let line = content
            .lines()
            .find(|line| line.contains(&marker))
            .unwrap_or_else(|| panic!("no draw of {:?}", needle));
        line.split(" Td ")
            .next()
            .expect("Td operator")
            .rsplit(' ')
            .next()
            .expect("y operand")
            .parse()
            .expect("numeric y operand")
    }

    #[test]
    fn missing_customer_fails_fast() {
        let engine = ReportEngine::new(ReportDefaults::default());
        let request = ReportRequest {
            customer: None,
            ..minimal_request()
        };
        match engine.generate(&request) {
            Err(ReportError::MissingData(what)) => assert!(what.contains("customer")),
            other => panic!("expected MissingData, got {:?}", other.map(|a| a.page_count())),
        }
    }

    #[test]
    fn minimal_request_yields_three_pages() {
        let engine = ReportEngine::new(ReportDefaults::default());
        let artifact = engine.generate(&minimal_request()).expect("generate");
        assert_eq!(artifact.page_count(), 3);
        assert!(artifact.bytes().starts_with(b"%PDF"));

        // With no photos every evidence cell carries the placeholder.
        let loaded = lopdf::Document::load_mem(artifact.bytes()).expect("load pdf");
        let pages: Vec<_> = loaded.page_iter().collect();
        let annexure =
            String::from_utf8_lossy(&loaded.get_page_content(pages[1]).expect("content"))
                .into_owned();
        assert!(annexure.contains("Missing"));
        assert!(annexure.contains("Page 2 of 3"));
    }

    #[test]
    fn populated_request_renders_all_sections() {
        use crate::model::{PhotoAsset, PhotoPayload, PhotoSlot};
        use image::{DynamicImage, RgbImage};

        let mut png = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, image::Rgb([90, 90, 90])))
            .write_to(&mut png, image::ImageFormat::Png)
            .expect("encode png");

        let raw = r#"{
            "cube_measurements": [
                {"cube_id": "C1", "dimension_length": 150, "dimension_width": 150,
                 "dimension_height": 150, "weight": 8.1, "crushing_load": 562.5,
                 "compressive_strength": 25.0},
                {"cube_id": "C2", "dimension_length": 150, "dimension_width": 150,
                 "dimension_height": 150, "weight": 8.2, "crushing_load": 570.0,
                 "compressive_strength": 25.3}
            ],
            "strength_data": {"required_28": 25, "actual_28": 27.5}
        }"#;
        let request = ReportRequest {
            sample: Some(SampleSummary {
                grade: Some("M25".to_string()),
                num_of_cubes: 2,
                average_strength: Some(25.2),
                ..SampleSummary::default()
            }),
            photos: vec![PhotoAsset {
                specimen: 1,
                slot: PhotoSlot::FrontFailure,
                data: PhotoPayload::Binary(png.into_inner()),
            }],
            observations_raw: Some(raw.to_string()),
            ..minimal_request()
        };

        let engine = ReportEngine::new(ReportDefaults::default());
        let artifact = engine.generate(&request).expect("generate");
        assert_eq!(artifact.page_count(), 3);

        let loaded = lopdf::Document::load_mem(artifact.bytes()).expect("load pdf");
        let pages: Vec<_> = loaded.page_iter().collect();
        assert_eq!(pages.len(), 3);
        let content_of = |index: usize| {
            String::from_utf8_lossy(&loaded.get_page_content(pages[index]).expect("content"))
                .into_owned()
        };
        assert!(content_of(0).contains("END OF REPORT"));
        assert!(content_of(0).contains("GRADE OF CONCRETE: M25"));
        assert!(content_of(1).contains("ANNEXURE - I"));
        assert!(content_of(1).contains("/Im") );
        assert!(content_of(2).contains("END OF OBSERVATIONS"));
    }

    #[test]
    fn page_count_is_invariant_in_specimen_count() {
        let engine = ReportEngine::new(ReportDefaults::default());
        for count in [1_u32, 3, 6, 10] {
            let artifact = engine.generate(&request_with_cubes(count)).expect("generate");
            assert_eq!(artifact.page_count(), 3, "count {}", count);

            // The specimen table still shows a row for every specimen.
            let content = page_content(&artifact, 0);
            assert!(content.contains(&format!("Cube {}", count)), "count {}", count);
        }
    }

    #[test]
    fn footer_position_is_invariant_in_specimen_count() {
        let engine = ReportEngine::new(ReportDefaults::default());
        let positions: Vec<f64> = [1_u32, 3, 6]
            .into_iter()
            .map(|count| {
                let artifact = engine.generate(&request_with_cubes(count)).expect("generate");
                text_y(&page_content(&artifact, 0), "Page 1 of 3")
            })
            .collect();
        assert!(
            positions.windows(2).all(|pair| pair[0] == pair[1]),
            "{:?}",
            positions
        );
    }

    #[test]
    fn signature_block_clears_the_footer_for_any_specimen_count() {
        let engine = ReportEngine::new(ReportDefaults::default());
        for count in [2_u32, 13, 30] {
            let artifact = engine.generate(&request_with_cubes(count)).expect("generate");
            let y = text_y(&page_content(&artifact, 0), "Reviewed by -");
            // 230 mm from the top edge in PDF space; below that the block
            // would run into the end marker and footer.
            assert!(y >= 189.8, "count {}: signature heading at y {}", count, y);
        }
    }

    #[test]
    fn evidence_grid_prints_a_row_per_specimen() {
        let engine = ReportEngine::new(ReportDefaults::default());
        let artifact = engine.generate(&request_with_cubes(4)).expect("generate");
        let annexure = page_content(&artifact, 1);
        for row in 1..=4 {
            assert!(annexure.contains(&format!("(Cube {})", row)), "row {}", row);
        }
        assert!(!annexure.contains("(Cube 5)"));
        // Every empty slot repeats the specimen label, one per column.
        assert_eq!(annexure.matches("(Cube 2) Tj").count(), 3);
    }
}
