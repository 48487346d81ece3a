pub mod index;
pub mod remote;
pub mod resolver;
pub mod similarity;

use serde::{Deserialize, Deserializer, Serialize};

pub use index::{build_index, CampusListing, RatingIndex, RatingIndexEntry};
pub use remote::GraphQlRatings;
pub use resolver::{InstructorResolver, MatchTier, Resolution};
pub use similarity::{DiceSimilarity, Similarity, MATCH_THRESHOLD};

/// An instructor returned by a remote name search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub institution: String,
}

/// Remote ratings lookup.
#[allow(async_fn_in_trait)]
pub trait RatingsClient {
    async fn search(&self, name: &str) -> crate::Result<Vec<Candidate>>;

    /// `Ok(None)` when the id does not name an instructor.
    async fn report(&self, id: &str) -> crate::Result<Option<RatingReport>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingReport {
    pub first_name: String,
    pub last_name: String,
    pub avg_rating: f64,
    pub avg_difficulty_rounded: f64,
    /// The service reports -1 when nobody answered the question.
    pub would_take_again_percent: Option<f64>,
    pub num_ratings: u32,
    #[serde(default)]
    pub teacher_rating_tags: Vec<RatingTag>,
    #[serde(default)]
    pub course_codes: Vec<CourseCount>,
    #[serde(default, deserialize_with = "from_edges")]
    pub ratings: Vec<Review>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingTag {
    pub tag_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseCount {
    pub course_name: String,
    pub course_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub legacy_id: Option<u64>,
    #[serde(rename = "class", default)]
    pub course: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub date: String,
    pub difficulty_rating: Option<f64>,
    pub helpful_rating: Option<f64>,
    pub clarity_rating: Option<f64>,
    #[serde(default)]
    pub thumbs_up_total: i64,
    #[serde(default)]
    pub thumbs_down_total: i64,
    pub would_take_again: Option<i64>,
    pub attendance_mandatory: Option<String>,
    pub grade: Option<String>,
    pub is_for_credit: Option<bool>,
    pub is_for_online_class: Option<bool>,
    pub rating_tags: Option<String>,
}

impl RatingReport {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// GraphQL `{ edges: [{ node }] }` connection.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Edge<T> {
    pub node: T,
}

impl<T> Connection<T> {
    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|e| e.node).collect()
    }
}

fn from_edges<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let connection = Option::<Connection<T>>::deserialize(deserializer)?;
    Ok(connection.map(Connection::into_nodes).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Node {
        id: String,
    }

    #[test]
    fn connection_flattens_nodes() {
        let raw = r#"{"edges": [{"node": {"id": "a"}}, {"node": {"id": "b"}}]}"#;
        let connection: Connection<Node> = serde_json::from_str(raw).unwrap();
        let ids: Vec<_> = connection.into_nodes().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let empty: Connection<Node> = serde_json::from_str("{}").unwrap();
        assert!(empty.into_nodes().is_empty());
    }

    #[test]
    fn report_reviews_from_edges() {
        let raw = r#"{
            "firstName": "Jane", "lastName": "Doe",
            "avgRating": 4.5, "avgDifficultyRounded": 3.0,
            "wouldTakeAgainPercent": 80.0, "numRatings": 2,
            "ratings": {"edges": [{"node": {"id": "r1", "class": "CSE1010", "comment": "Great"}}]}
        }"#;
        let report: RatingReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.full_name(), "Jane Doe");
        assert_eq!(report.ratings.len(), 1);
        assert_eq!(report.ratings[0].course, "CSE1010");

        let raw = raw.replace(
            r#""ratings": {"edges": [{"node": {"id": "r1", "class": "CSE1010", "comment": "Great"}}]}"#,
            r#""ratings": null"#,
        );
        let report: RatingReport = serde_json::from_str(&raw).unwrap();
        assert!(report.ratings.is_empty());
    }
}
