use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of questions in every interview.
pub const INTERVIEW_LENGTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Technical,
    Project,
    Behavioral,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuestionKind::Technical => "technical",
            QuestionKind::Project => "project",
            QuestionKind::Behavioral => "behavioral",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub text: String,
}

impl Question {
    pub fn new(id: u32, kind: QuestionKind, text: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The roles offered by the backend out of the box.
pub fn default_roles() -> Vec<Role> {
    vec![
        Role::new("sde", "Software Development Engineer (SDE)"),
        Role::new("sales", "Sales Associate"),
    ]
}

// Resolves loosely typed role names ("software engineer") to a catalogue entry.
pub struct RoleCatalog {
    roles: Vec<Role>,
    matcher: SkimMatcherV2,
}

impl RoleCatalog {
    pub fn new(roles: Vec<Role>) -> Self {
        Self {
            roles,
            matcher: SkimMatcherV2::default(),
        }
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Exact id match first, then the best fuzzy match on the display name above `threshold`.
    pub fn find(&self, query: &str, threshold: i64) -> Option<&Role> {
        let query = query.trim().to_lowercase();
        if let Some(role) = self.roles.iter().find(|r| r.id.to_lowercase() == query) {
            return Some(role);
        }
        self.roles
            .iter()
            .filter_map(|role| {
                self.matcher
                    .fuzzy_match(&role.name.to_lowercase(), &query)
                    .filter(|score| *score > threshold)
                    .map(|score| (score, role))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, role)| role)
    }
}
