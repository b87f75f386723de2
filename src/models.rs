use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user as stored. Responses go through `rest::UserResponse`
/// so the credential hash never leaves the server.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub reputation: i64,
    pub avatar: Option<String>,
}

/// A latitude/longitude pair as emitted by the map widget.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Optional user-drawn polygon overlaid on the map for a project.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Area {
    pub coordinates: Vec<LatLng>,
    pub color: String,
}

/// A community project document.
///
/// `votes` is a signed accumulator maintained transactionally by the vote
/// operation; it is never recomputed from vote records after the fact.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: LatLng,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Area>,
    pub status: String,
    pub user_id: u64,
    pub impact_score: i64,
    pub votes: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donation_requirement: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volunteer_requirement: Option<u32>,
}

/// One +1/-1 endorsement. At most one record per (user, project) pair;
/// never updated or deleted once written.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub user_id: u64,
    pub project_id: u64,
    pub value: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub content: String,
    pub user_id: u64,
    pub project_id: u64,
    pub created_at: DateTime<Utc>,
}

/// Client-supplied fields for a new project; everything else
/// (id, owner, status, counters, timestamp) is assigned by storage.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InsertProject {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: LatLng,
    #[serde(default)]
    pub area: Option<Area>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub donation_requirement: Option<f64>,
    #[serde(default)]
    pub volunteer_requirement: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InsertComment {
    pub content: String,
}

/// JWT claims attached to authenticated requests.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthPayload {
    pub sub: String, // username
    pub uid: u64,
    pub exp: usize,
}
