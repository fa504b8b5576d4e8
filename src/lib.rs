mod canvas;
mod chart;
mod compose;
mod error;
mod layout;
mod metrics;
mod model;
mod observations;
mod pdf;
mod photo;
mod report;
mod types;

pub use canvas::{Canvas, Command, Document, EncodedImage, Page};
pub use error::ReportError;
pub use metrics::FontStyle;
pub use model::{
    CustomerInfo, Field, ObservationChecklist, PENDING_LABEL, PhotoAsset, PhotoPayload, PhotoSlot,
    ReportDefaults, ReportRequest, ReviewerInfo, SampleSummary, SignatoryBlock, SpecimenKind,
    StrengthSeries, TestRequestInfo, UNAVAILABLE_LABEL,
};
pub use observations::{CubeObservation, derive_metrics, normalize};
pub use report::{ReportArtifact, ReportEngine};
pub use types::{Color, Pt, Rect, Size, mm};
