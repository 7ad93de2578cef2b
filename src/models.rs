use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
        }
    }

    /// Toggle-to-undo: asking for the status a candidate already has resets it.
    pub fn toggled(self, requested: Status) -> Status {
        if self == requested {
            Status::Pending
        } else {
            requested
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown status '{0}' (expected pending, approved or rejected)")]
pub struct ParseStatusError(String);

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "approved" => Ok(Status::Approved),
            "rejected" => Ok(Status::Rejected),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    Pending,
    Approved,
    Rejected,
}

impl Filter {
    pub const ALL: [Filter; 4] = [
        Filter::All,
        Filter::Pending,
        Filter::Approved,
        Filter::Rejected,
    ];

    /// The status this filter restricts to, or `None` for `All`.
    pub fn status(&self) -> Option<Status> {
        match self {
            Filter::All => None,
            Filter::Pending => Some(Status::Pending),
            Filter::Approved => Some(Status::Approved),
            Filter::Rejected => Some(Status::Rejected),
        }
    }

    pub fn matches(&self, candidate: &Candidate) -> bool {
        self.status().is_none_or(|s| candidate.status == s)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Filter::All => "All",
            Filter::Pending => "Pending",
            Filter::Approved => "Approved",
            Filter::Rejected => "Rejected",
        }
    }
}

impl FromStr for Filter {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Filter::All);
        }
        Ok(match s.parse::<Status>()? {
            Status::Pending => Filter::Pending,
            Status::Approved => Filter::Approved,
            Status::Rejected => Filter::Rejected,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picture {
    pub thumbnail: String,
    pub medium: String,
    pub large: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Option<i64>, // assigned by the store on first save
    pub status: Status,
    pub note: String,
    pub name: String,
    pub picture: Picture,
    pub application_date: String, // RFC 3339, as delivered by the source
    pub location: String,
    pub gender: String,
    pub age: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_toggle() {
        assert_eq!(Status::Pending.toggled(Status::Approved), Status::Approved);
        assert_eq!(Status::Approved.toggled(Status::Approved), Status::Pending);
        assert_eq!(Status::Approved.toggled(Status::Rejected), Status::Rejected);
        assert_eq!(Status::Rejected.toggled(Status::Rejected), Status::Pending);
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!("all".parse::<Filter>().unwrap(), Filter::All);
        assert_eq!("Approved".parse::<Filter>().unwrap(), Filter::Approved);
        assert!("closed".parse::<Filter>().is_err());
        assert_eq!(Filter::All.status(), None);
        assert_eq!(Filter::Rejected.status(), Some(Status::Rejected));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&Status::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
    }
}
