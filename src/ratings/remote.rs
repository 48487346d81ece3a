use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{Candidate, Connection, RatingReport, RatingsClient};
use crate::config::Settings;
use crate::error::CatalogError;

const SEARCH_QUERY: &str = r#"
query AutocompleteSearchQuery($query: String!) {
    autocomplete(query: $query) {
        teachers {
            edges {
                node {
                    id
                    firstName
                    lastName
                    school {
                        name
                        id
                    }
                }
            }
        }
    }
}"#;

const REPORT_QUERY: &str = r#"
query TeacherReportQuery($id: ID!) {
    node(id: $id) {
        ... on Teacher {
            avgRating
            avgDifficultyRounded
            wouldTakeAgainPercent
            numRatings
            teacherRatingTags {
                tagName
            }
            courseCodes {
                courseName
                courseCount
            }
            firstName
            lastName
            ratings(first: 1000) {
                edges {
                    node {
                        id
                        legacyId
                        class
                        comment
                        date
                        difficultyRating
                        helpfulRating
                        clarityRating
                        thumbsUpTotal
                        thumbsDownTotal
                        wouldTakeAgain
                        attendanceMandatory
                        grade
                        isForCredit
                        isForOnlineClass
                        ratingTags
                    }
                }
            }
        }
    }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AutocompleteData {
    autocomplete: Option<Autocomplete>,
}

#[derive(Debug, Deserialize)]
struct Autocomplete {
    teachers: Option<Connection<TeacherNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeacherNode {
    id: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    school: Option<School>,
}

#[derive(Debug, Deserialize)]
struct School {
    name: String,
}

#[derive(Debug, Deserialize)]
struct NodeData {
    node: Option<Value>,
}

/// Ratings service spoken to over its public GraphQL endpoint.
#[derive(Clone)]
pub struct GraphQlRatings {
    client: reqwest::Client,
    endpoint: String,
    auth: String,
}

impl GraphQlRatings {
    pub fn new(client: reqwest::Client, settings: &Settings) -> Self {
        Self {
            client,
            endpoint: settings.ratings_endpoint.clone(),
            auth: settings.ratings_auth.clone(),
        }
    }

    async fn post(&self, query: &str, variables: Value) -> crate::Result<String> {
        let body = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, &self.auth)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

impl RatingsClient for GraphQlRatings {
    async fn search(&self, name: &str) -> crate::Result<Vec<Candidate>> {
        let body = self.post(SEARCH_QUERY, json!({ "query": name })).await?;
        let candidates = parse_candidates(&body)?;
        debug!("Ratings search for '{}' returned {} candidates", name, candidates.len());
        Ok(candidates)
    }

    async fn report(&self, id: &str) -> crate::Result<Option<RatingReport>> {
        let body = self.post(REPORT_QUERY, json!({ "id": id })).await?;
        parse_report(&body)
    }
}

fn unwrap_data<T: DeserializeOwned>(body: &str) -> crate::Result<Option<T>> {
    let response: GraphQlResponse<T> = serde_json::from_str(body)?;
    match (response.data, response.errors.first()) {
        (None, Some(err)) => Err(CatalogError::Ratings(err.message.clone())),
        (data, _) => Ok(data),
    }
}

/// Candidates from an autocomplete response body.
pub fn parse_candidates(body: &str) -> crate::Result<Vec<Candidate>> {
    let teachers = unwrap_data::<AutocompleteData>(body)?
        .and_then(|d| d.autocomplete)
        .and_then(|a| a.teachers)
        .map(Connection::into_nodes)
        .unwrap_or_default();

    Ok(teachers
        .into_iter()
        .map(|t| Candidate {
            id: t.id,
            name: format!("{} {}", t.first_name, t.last_name).trim().to_string(),
            institution: t.school.map(|s| s.name).unwrap_or_default(),
        })
        .collect())
}

/// Report from a node response body. Non-instructor nodes come back as an
/// empty object and read as `None`.
pub fn parse_report(body: &str) -> crate::Result<Option<RatingReport>> {
    let node = unwrap_data::<NodeData>(body)?.and_then(|d| d.node);
    let node = match node {
        Some(Value::Object(map)) if !map.is_empty() => Value::Object(map),
        _ => return Ok(None),
    };

    let mut report: RatingReport = serde_json::from_value(node)?;
    if report.would_take_again_percent.is_some_and(|p| p < 0.0) {
        report.would_take_again_percent = None;
    }
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_from_autocomplete() {
        let body = r#"{"data":{"autocomplete":{"teachers":{"edges":[
            {"node":{"id":"VGVhY2hlci0x","firstName":"John","lastName":"Smith","school":{"name":"University of Connecticut","id":"U2Nob29s"}}},
            {"node":{"id":"VGVhY2hlci0y","firstName":"John","lastName":"Smith","school":null}}
        ]}}}}"#;
        let candidates = parse_candidates(body).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "John Smith");
        assert_eq!(candidates[0].institution, "University of Connecticut");
        assert_eq!(candidates[1].institution, "");
    }

    #[test]
    fn missing_teachers_is_empty() {
        assert!(parse_candidates(r#"{"data":{"autocomplete":null}}"#).unwrap().is_empty());
    }

    #[test]
    fn graphql_errors_surface() {
        let err = parse_candidates(r#"{"errors":[{"message":"bad query"}]}"#).unwrap_err();
        assert!(matches!(err, CatalogError::Ratings(m) if m == "bad query"));
    }

    #[test]
    fn report_fields() {
        let body = r#"{"data":{"node":{
            "avgRating":4.2,"avgDifficultyRounded":3.1,"wouldTakeAgainPercent":-1,"numRatings":2,
            "teacherRatingTags":[{"tagName":"Caring"}],
            "courseCodes":[{"courseName":"CSE1010","courseCount":2}],
            "firstName":"John","lastName":"Smith",
            "ratings":{"edges":[{"node":{"id":"r1","legacyId":7,"class":"CSE1010","comment":"Great","date":"2024-01-01",
                "difficultyRating":3,"helpfulRating":5,"clarityRating":5,"thumbsUpTotal":1,"thumbsDownTotal":0,
                "wouldTakeAgain":1,"attendanceMandatory":"non mandatory","grade":"A","isForCredit":true,
                "isForOnlineClass":false,"ratingTags":"Caring"}}]}
        }}}"#;
        let report = parse_report(body).unwrap().unwrap();
        assert_eq!(report.full_name(), "John Smith");
        assert_eq!(report.num_ratings, 2);
        assert_eq!(report.would_take_again_percent, None);
        assert_eq!(report.teacher_rating_tags[0].tag_name, "Caring");
        assert_eq!(report.ratings.len(), 1);
        assert_eq!(report.ratings[0].course, "CSE1010");
    }

    #[test]
    fn empty_node_is_none() {
        assert!(parse_report(r#"{"data":{"node":{}}}"#).unwrap().is_none());
        assert!(parse_report(r#"{"data":{"node":null}}"#).unwrap().is_none());
    }
}
