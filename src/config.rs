use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

/// Runtime settings. Defaults target the public catalog; every field can be
/// overridden through `CATALOG_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub institution: String,
    pub catalog_url: String,
    pub grad_catalog_url: String,
    pub course_search_url: String,
    pub enrollment_url: String,
    pub room_directory_host: String,
    pub ratings_endpoint: String,
    pub ratings_auth: String,
    pub mappings_path: String,
    pub index_path: String,
    pub resolve_concurrency: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Settings {
    pub fn load() -> crate::Result<Self> {
        let settings = Config::builder()
            .set_default("institution", "University of Connecticut")?
            .set_default(
                "catalog_url",
                "https://catalog.uconn.edu/directory-of-courses/course",
            )?
            .set_default(
                "grad_catalog_url",
                "https://gradcatalog.uconn.edu/course-descriptions/course",
            )?
            .set_default("course_search_url", "https://catalog.uconn.edu/course-search/")?
            .set_default(
                "enrollment_url",
                "https://catalog.uconn.edu/wp-content/plugins/uc-courses/soap.php",
            )?
            .set_default("room_directory_host", "classrooms.uconn.edu")?
            .set_default("ratings_endpoint", "https://www.ratemyprofessors.com/graphql")?
            .set_default("ratings_auth", "Basic dGVzdDp0ZXN0")?
            .set_default("mappings_path", "courses.json")?
            .set_default("index_path", "rmpIds.json")?
            .set_default("resolve_concurrency", 4)?
            .set_default("request_timeout_secs", 15)?
            .set_default("user_agent", concat!("catalog_scraper/", env!("CARGO_PKG_VERSION")))?
            .add_source(Environment::with_prefix("CATALOG").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            institution: "University of Connecticut".into(),
            catalog_url: "https://catalog.uconn.edu/directory-of-courses/course".into(),
            grad_catalog_url: "https://gradcatalog.uconn.edu/course-descriptions/course".into(),
            course_search_url: "https://catalog.uconn.edu/course-search/".into(),
            enrollment_url: "https://catalog.uconn.edu/wp-content/plugins/uc-courses/soap.php"
                .into(),
            room_directory_host: "classrooms.uconn.edu".into(),
            ratings_endpoint: "https://www.ratemyprofessors.com/graphql".into(),
            ratings_auth: "Basic dGVzdDp0ZXN0".into(),
            mappings_path: "courses.json".into(),
            index_path: "rmpIds.json".into(),
            resolve_concurrency: 4,
            request_timeout_secs: 15,
            user_agent: concat!("catalog_scraper/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}
