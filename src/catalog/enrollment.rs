use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Settings;
use crate::error::CatalogError;

const ENROLLMENT_ACTION: &str = "get_latest_enrollment";
const SESSION_CODE: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentCourse {
    pub term: String,
    pub class_number: String,
    pub section: String,
}

/// Live seat counts for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentPayload {
    pub course: EnrollmentCourse,
    pub available: u32,
    pub total: u32,
    pub overfill: bool,
    pub percent: f64,
}

#[derive(Debug, Deserialize)]
struct EnrollmentResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<String>,
}

/// Parse the endpoint's `{success, data: "a/b"}` reply.
pub fn parse_enrollment_response(
    body: &str,
    course: EnrollmentCourse,
) -> crate::Result<EnrollmentPayload> {
    let response: EnrollmentResponse = serde_json::from_str(body)?;
    let seats = match response.data {
        Some(data) if response.success => data,
        _ => return Err(CatalogError::EnrollmentRejected(course.class_number)),
    };

    let mut parts = seats.split('/').map(|p| p.trim().parse::<u32>());
    let (available, total) = match (parts.next(), parts.next()) {
        (Some(Ok(a)), Some(Ok(t))) => (a, t),
        _ => return Err(CatalogError::EnrollmentRejected(course.class_number)),
    };

    Ok(EnrollmentPayload {
        course,
        available,
        total,
        overfill: available >= total,
        percent: seat_ratio(available, total),
    })
}

/// `available / total` rounded to two decimals, 0 for an empty section.
pub fn seat_ratio(available: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (available as f64 / total as f64 * 100.0).round() / 100.0
}

/// Query the enrollment endpoint. Any failure reads as `None`.
pub async fn fetch_enrollment(
    client: &reqwest::Client,
    settings: &Settings,
    term: &str,
    class_number: &str,
    section: &str,
) -> Option<EnrollmentPayload> {
    let course = EnrollmentCourse {
        term: term.to_string(),
        class_number: class_number.to_string(),
        section: section.to_string(),
    };

    match request(client, settings, course).await {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("Enrollment lookup for {} failed: {}", class_number, e);
            None
        }
    }
}

async fn request(
    client: &reqwest::Client,
    settings: &Settings,
    course: EnrollmentCourse,
) -> crate::Result<EnrollmentPayload> {
    let form = [
        ("action", ENROLLMENT_ACTION),
        ("term", course.term.as_str()),
        ("classNbr", course.class_number.as_str()),
        ("sessionCode", SESSION_CODE),
        ("classSection", course.section.as_str()),
    ];
    let body = client
        .post(&settings.enrollment_url)
        .form(&form)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_enrollment_response(&body, course)
}
