use serde::Serialize;
use std::fmt;

/// The display category assigned to a transcript sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleClass {
    User,
    Coder,
    Critic,
    /// No role keyword matched the sender label.
    Neutral,
}

/// Role keywords in priority order. The first one contained in the sender wins.
const ROLE_KEYWORDS: [(&str, RoleClass); 3] = [
    ("user", RoleClass::User),
    ("coder", RoleClass::Coder),
    ("critic", RoleClass::Critic),
];

impl RoleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleClass::User => "user",
            RoleClass::Coder => "coder",
            RoleClass::Critic => "critic",
            RoleClass::Neutral => "neutral",
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, RoleClass::Neutral)
    }
}

impl fmt::Display for RoleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a sender label by case-insensitive substring match.
///
/// `"the critic agent"` and `"CRITIC"` are both critics; a label such as
/// `"user-coder"` is a user because `user` is checked first.
pub fn classify(sender: &str) -> RoleClass {
    let lower = sender.to_lowercase();
    ROLE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, role)| *role)
        .unwrap_or(RoleClass::Neutral)
}
