use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;

/// Tri-state for every measurable cell on the certificate. `Pending` means
/// the specimen exists but has not been measured yet; `Unavailable` means
/// the source record never carried the value. The distinction survives all
/// the way to the rendered cell ("Pending Observation" vs "N/A") and keeps
/// derivation logic from confusing "not measured" with a real zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Field<T> {
    Measured(T),
    Pending,
    Unavailable,
}

impl<T> Field<T> {
    pub fn measured(&self) -> Option<&T> {
        match self {
            Field::Measured(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, Field::Measured(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Field::Pending)
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Unavailable
    }
}

pub const PENDING_LABEL: &str = "Pending Observation";
pub const UNAVAILABLE_LABEL: &str = "N/A";

impl Field<f64> {
    pub fn fmt_num(&self, decimals: usize) -> String {
        match self {
            Field::Measured(value) => format!("{:.*}", decimals, value),
            Field::Pending => PENDING_LABEL.to_string(),
            Field::Unavailable => UNAVAILABLE_LABEL.to_string(),
        }
    }
}

impl Field<String> {
    pub fn fmt_text(&self) -> String {
        match self {
            Field::Measured(value) if !value.trim().is_empty() => value.clone(),
            Field::Measured(_) | Field::Unavailable => UNAVAILABLE_LABEL.to_string(),
            Field::Pending => PENDING_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpecimenKind {
    #[default]
    #[serde(rename = "CC")]
    ConcreteCube,
    #[serde(rename = "MT")]
    MaterialTest,
    #[serde(rename = "NDT")]
    NonDestructive,
}

impl SpecimenKind {
    pub fn label(self) -> &'static str {
        match self {
            SpecimenKind::ConcreteCube => "Concrete Cube",
            SpecimenKind::MaterialTest => "Material Test",
            SpecimenKind::NonDestructive => "NDT",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestRequestInfo {
    pub job_number: Option<String>,
    pub ulr_number: Option<String>,
    pub receipt_date: Option<Date>,
    pub site_name: Option<String>,
    #[serde(default)]
    pub specimen_kind: SpecimenKind,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub contact: Option<String>,
}

impl CustomerInfo {
    /// Combined display name; synthesized from name parts when the record
    /// has no combined name.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref()
            && !name.trim().is_empty()
        {
            return name.trim().to_string();
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            UNAVAILABLE_LABEL.to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Page-3 observation checklist. Each slot is the operator's verdict for a
/// fixed row of the regulated form; unset slots render as "--".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationChecklist {
    pub strength_duration: Option<String>,
    pub results_within_spread: Option<String>,
    pub cube_weight: Option<String>,
    pub failure_pattern: Option<String>,
    pub bonding: Option<String>,
    pub acceptance_criteria: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleSummary {
    pub grade: Option<String>,
    pub test_method: Option<String>,
    pub machine_used: Option<String>,
    #[serde(default = "default_cube_count")]
    pub num_of_cubes: u32,
    pub location_nature: Option<String>,
    pub sample_code_number: Option<String>,
    pub age_in_days: Option<u32>,
    pub casting_date: Option<Date>,
    pub testing_date: Option<Date>,
    pub cube_condition: Option<String>,
    pub curing_condition: Option<String>,
    pub average_strength: Option<f64>,
    // Legacy single-specimen fields, still present on old summary records.
    // The normalizer reconstructs one cube entry from these when the
    // observations blob carries no per-cube list.
    pub id_mark: Option<String>,
    pub dimension_length: Option<f64>,
    pub dimension_width: Option<f64>,
    pub dimension_height: Option<f64>,
    pub weight: Option<f64>,
    pub crushing_load: Option<f64>,
    pub compressive_strength: Option<f64>,
    pub failure_type: Option<String>,
    #[serde(default)]
    pub observations: ObservationChecklist,
}

fn default_cube_count() -> u32 {
    1
}

impl SampleSummary {
    /// Specimen count driving every dynamic row count. Always at least 1.
    pub fn cube_count(&self) -> usize {
        self.num_of_cubes.max(1) as usize
    }

    pub fn has_legacy_observation(&self) -> bool {
        self.id_mark.is_some()
            || self.crushing_load.is_some()
            || self.compressive_strength.is_some()
            || self.dimension_length.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerInfo {
    pub name: String,
    pub designation: String,
    pub qualification: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoSlot {
    FrontFailure,
    DigitalReading,
    BackFailure,
}

impl PhotoSlot {
    pub const ALL: [PhotoSlot; 3] = [
        PhotoSlot::FrontFailure,
        PhotoSlot::DigitalReading,
        PhotoSlot::BackFailure,
    ];

    pub fn slot_name(self) -> &'static str {
        match self {
            PhotoSlot::FrontFailure => "front_failure",
            PhotoSlot::DigitalReading => "digital_reading",
            PhotoSlot::BackFailure => "back_failure",
        }
    }

    /// Two-line column header on the photographic annexure.
    pub fn header_lines(self) -> [&'static str; 2] {
        match self {
            PhotoSlot::FrontFailure => {
                ["Pictorial View of Front side", "failure of cube specimen"]
            }
            PhotoSlot::DigitalReading => {
                ["Digital reading of Load &", "Compressive Strength"]
            }
            PhotoSlot::BackFailure => {
                ["Pictorial View of Back side", "failure of Cube Specimen"]
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhotoPayload {
    Base64(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoAsset {
    /// 1-based specimen index the photo belongs to.
    pub specimen: u32,
    pub slot: PhotoSlot,
    pub data: PhotoPayload,
}

/// Immutable input bundle for one generation call. Customer and summary
/// records are the only parts that cannot be defaulted; everything else
/// degrades to placeholders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportRequest {
    pub test_request: Option<TestRequestInfo>,
    pub customer: Option<CustomerInfo>,
    pub sample: Option<SampleSummary>,
    pub reviewer: Option<ReviewerInfo>,
    #[serde(default)]
    pub photos: Vec<PhotoAsset>,
    /// Raw persisted observations blob, in either historical encoding.
    pub observations_raw: Option<String>,
}

/// Required vs actual strength at 7/14/28 days. Any subset may be absent;
/// absent values plot as zero and are never labeled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StrengthSeries {
    pub required_7: Option<f64>,
    pub required_14: Option<f64>,
    pub required_28: Option<f64>,
    pub actual_7: Option<f64>,
    pub actual_14: Option<f64>,
    pub actual_28: Option<f64>,
}

impl StrengthSeries {
    pub fn required(&self) -> [Option<f64>; 3] {
        [self.required_7, self.required_14, self.required_28]
    }

    pub fn actual(&self) -> [Option<f64>; 3] {
        [self.actual_7, self.actual_14, self.actual_28]
    }

    pub fn max_value(&self) -> f64 {
        self.required()
            .into_iter()
            .chain(self.actual())
            .flatten()
            .fold(0.0_f64, f64::max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatoryBlock {
    pub name: String,
    pub designation: String,
    pub qualifications: Vec<String>,
}

/// Process-wide form constants, passed explicitly instead of living as
/// ambient state. `Default` carries the laboratory's current issue of the
/// regulated form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDefaults {
    pub organization_name: String,
    pub organization_subtitle: String,
    /// Accreditation mark text under the certification logo, page 1 only.
    pub certification_mark: Option<String>,
    pub address_line: String,
    pub contact_line: String,
    pub document_control_id: String,
    pub issue_label: String,
    pub calibration_due: String,
    pub capacity_range: String,
    pub environmental_condition: String,
    pub default_machine: String,
    pub default_test_method: String,
    pub reviewer: ReviewerInfo,
    pub authorized: SignatoryBlock,
    pub terms: Vec<String>,
    #[serde(skip)]
    pub logo: Option<Vec<u8>>,
    #[serde(skip)]
    pub certification_logo: Option<Vec<u8>>,
    #[serde(skip)]
    pub stamp: Option<Vec<u8>>,
    /// Fixed report date for deterministic output; generation date if unset.
    pub report_date: Option<Date>,
}

impl Default for ReportDefaults {
    fn default() -> Self {
        Self {
            organization_name: "VITRAG ASSOCIATES LLP".to_string(),
            organization_subtitle: "(Construction Material Testing Laboratory)".to_string(),
            certification_mark: Some("TC-15756".to_string()),
            address_line: "34A/26 West, New Pachha Peth, Ashok Chowk, Solapur".to_string(),
            contact_line: "Mob. No.-9552529235, 8830263787, E-mail: vitragassociates3@gmail.com"
                .to_string(),
            document_control_id: "VA/TR/I-3/24".to_string(),
            issue_label: "Issue No. 03".to_string(),
            calibration_due: "01/07/2026".to_string(),
            capacity_range: "2000KN".to_string(),
            environmental_condition: "Not Applicable".to_string(),
            default_machine: "CTM (2000KN)".to_string(),
            default_test_method: "IS 516 (Part 1/Sec 1):2021".to_string(),
            reviewer: ReviewerInfo {
                name: "Lalita S. Dussa".to_string(),
                designation: "Quality Manager".to_string(),
                qualification: "B.Tech.(Civil)".to_string(),
            },
            authorized: SignatoryBlock {
                name: "Mr. Prakarsh A Sangave".to_string(),
                designation: "Chief Executive Officer".to_string(),
                qualifications: vec![
                    "M.E(Civil-Structures)".to_string(),
                    "MTech (Civil-Geotechnical), M.I.E, F.I.E.".to_string(),
                ],
            },
            terms: vec![
                "1) Samples were not drawn by Vitrag Associates LLP lab.".to_string(),
                "2) The Test Reports & Results pertain to Sample/ Samples of material received \
                 by Vitrag Associates LLP lab."
                    .to_string(),
                "3) The Test Report cannot be reproduced without the written approval of CEO/QM \
                 of Vitrag Associates LLP lab."
                    .to_string(),
                "4) Any change/ correction/ alteration to the Test Report shall be invalid."
                    .to_string(),
                "5) The role VAs is restricted to testing of the material sample as received in \
                 the laboratory. Vitrag Associates LLP lab or any of its employees shall not be \
                 liable for any dispute/ litigation arising between the customer & Third Party \
                 on account of test results. Vitrag Associates LLP lab shall not interact with \
                 any Third Party in this regard."
                    .to_string(),
                "6) The CEO of Vitrag Associates LLP lab may make necessary changes to the \
                 terms & conditions without any prior notice."
                    .to_string(),
            ],
            logo: None,
            certification_logo: None,
            stamp: None,
            report_date: None,
        }
    }
}

/// dd/mm/yyyy, the only date format the form uses.
pub fn fmt_date(date: Option<Date>) -> String {
    match date {
        Some(date) => date
            .format(format_description!("[day]/[month]/[year]"))
            .unwrap_or_else(|_| UNAVAILABLE_LABEL.to_string()),
        None => UNAVAILABLE_LABEL.to_string(),
    }
}

/// `value` or "N/A", the blanket fallback for optional text cells.
pub fn or_na(value: Option<&str>) -> String {
    match value {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => UNAVAILABLE_LABEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn display_name_synthesizes_from_parts() {
        let customer = CustomerInfo {
            first_name: Some("Asha".to_string()),
            last_name: Some("Kulkarni".to_string()),
            ..CustomerInfo::default()
        };
        assert_eq!(customer.display_name(), "Asha Kulkarni");

        let combined = CustomerInfo {
            name: Some(" M/s Shree Constructions ".to_string()),
            ..CustomerInfo::default()
        };
        assert_eq!(combined.display_name(), "M/s Shree Constructions");

        assert_eq!(CustomerInfo::default().display_name(), "N/A");
    }

    #[test]
    fn cube_count_never_below_one() {
        let sample = SampleSummary {
            num_of_cubes: 0,
            ..SampleSummary::default()
        };
        assert_eq!(sample.cube_count(), 1);
    }

    #[test]
    fn field_formatting_keeps_sentinels() {
        assert_eq!(Field::Measured(22500.0).fmt_num(2), "22500.00");
        assert_eq!(Field::<f64>::Pending.fmt_num(1), "Pending Observation");
        assert_eq!(Field::<f64>::Unavailable.fmt_num(1), "N/A");
    }

    #[test]
    fn dates_render_as_day_month_year() {
        assert_eq!(fmt_date(Some(date!(2026 - 07 - 01))), "01/07/2026");
        assert_eq!(fmt_date(None), "N/A");
    }

    #[test]
    fn request_deserializes_from_web_layer_json() {
        let raw = r#"{
            "test_request": {"job_number": "VA-1042", "ulr_number": "TC1575624000001042F",
                             "site_name": "Tower B", "specimen_kind": "CC"},
            "customer": {"name": "M/s Shree Constructions", "address": "Solapur"},
            "sample": {"grade": "M25", "num_of_cubes": 3},
            "photos": [{"specimen": 1, "slot": "front_failure", "data": [255, 216]}]
        }"#;
        let request: ReportRequest = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(request.sample.as_ref().unwrap().cube_count(), 3);
        assert!(matches!(
            request.photos[0].data,
            PhotoPayload::Binary(ref bytes) if bytes == &[255, 216]
        ));
    }
}
