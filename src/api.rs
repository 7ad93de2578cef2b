use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::NetworkError;
use crate::models::{Candidate, Picture, Status};

pub const DEFAULT_API_URL: &str = "https://randomuser.me/api";
pub const DEFAULT_BATCH_SIZE: u32 = 10;

/// Somewhere new candidates come from.
pub trait CandidateSource {
    /// A batch of freshly generated candidates, none of which has an id yet.
    fn fetch_batch(&self) -> Result<Vec<Candidate>, NetworkError>;
}

// --- randomuser.me payload (partial) ---

#[derive(Debug, Deserialize)]
struct RandomUserResponse {
    results: Vec<RandomUser>,
}

#[derive(Debug, Deserialize)]
struct RandomUser {
    name: RandomUserName,
    #[serde(default)]
    picture: Picture,
    registered: RandomUserRegistered,
    #[serde(default)]
    location: RandomUserLocation,
    #[serde(default)]
    gender: String,
    dob: RandomUserDob,
}

#[derive(Debug, Deserialize)]
struct RandomUserName {
    first: String,
    last: String,
}

#[derive(Debug, Deserialize)]
struct RandomUserRegistered {
    date: String,
}

#[derive(Debug, Deserialize)]
struct RandomUserDob {
    age: u32,
}

#[derive(Debug, Default, Deserialize)]
struct RandomUserLocation {
    #[serde(default)]
    street: RandomUserStreet,
    city: Option<String>,
    state: Option<String>,
    postcode: Option<Postcode>,
}

#[derive(Debug, Default, Deserialize)]
struct RandomUserStreet {
    number: Option<i64>,
    name: Option<String>,
}

// randomuser.me sends numeric postcodes for some nationalities and strings ("9171 PJ") for others
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Postcode {
    Number(i64),
    Text(String),
}

impl From<RandomUser> for Candidate {
    fn from(user: RandomUser) -> Self {
        let location = format_location(&user.location);
        Candidate {
            id: None,
            status: Status::Pending,
            note: String::new(),
            name: [user.name.first, user.name.last].join(" "),
            picture: user.picture,
            application_date: user.registered.date,
            location,
            gender: user.gender,
            age: user.dob.age,
        }
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn format_location(location: &RandomUserLocation) -> String {
    let mut parts: Vec<String> = Vec::new();

    let number = location.street.number.filter(|n| *n != 0);
    if let (Some(number), Some(name)) = (number, non_empty(&location.street.name)) {
        parts.push(format!("{} {}", number, name));
    }

    if let (Some(city), Some(state)) = (non_empty(&location.city), non_empty(&location.state)) {
        parts.push(format!("{}, {}", city, state));
    }

    match &location.postcode {
        Some(Postcode::Number(n)) if *n != 0 => parts.push(n.to_string()),
        Some(Postcode::Text(s)) if !s.trim().is_empty() => parts.push(s.trim().to_string()),
        _ => {}
    }

    parts.join(" ")
}

fn parse_batch(url: &str, body: &str) -> Result<Vec<Candidate>, NetworkError> {
    let response: RandomUserResponse =
        serde_json::from_str(body).map_err(|e| NetworkError::Payload {
            url: url.to_string(),
            details: e.to_string(),
        })?;
    Ok(response.results.into_iter().map(Candidate::from).collect())
}

// --- HTTP client ---

#[derive(Debug)]
pub struct RandomUserClient {
    client: reqwest::blocking::Client,
    api_url: String,
    batch_size: u32,
}

impl RandomUserClient {
    pub fn new(api_url: impl Into<String>, batch_size: u32) -> Result<Self, NetworkError> {
        let api_url = api_url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|source| NetworkError::Request {
                url: api_url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            api_url,
            batch_size,
        })
    }
}

impl CandidateSource for RandomUserClient {
    fn fetch_batch(&self) -> Result<Vec<Candidate>, NetworkError> {
        let request_error = |source| NetworkError::Request {
            url: self.api_url.clone(),
            source,
        };

        debug!(url = %self.api_url, results = self.batch_size, "requesting candidates");
        let body = self
            .client
            .get(&self.api_url)
            .query(&[("results", self.batch_size)])
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(request_error)?;

        let batch = parse_batch(&self.api_url, &body)?;
        info!(count = batch.len(), "fetched candidates");
        Ok(batch)
    }
}
