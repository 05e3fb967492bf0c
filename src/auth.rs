use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Manager,
    Employee,
    /// Internal callers and open-mode deployments.
    Service,
}

impl FromStr for Role {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manager" => Ok(Role::Manager),
            "employee" => Ok(Role::Employee),
            "service" => Ok(Role::Service),
            other => Err(EngineError::Validation(format!("unknown role: {other}"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Manager => write!(f, "manager"),
            Role::Employee => write!(f, "employee"),
            Role::Service => write!(f, "service"),
        }
    }
}

/// What a principal is asking to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateOpening,
    ListOpenings,
    ViewOpening,
    FillOpening,
    WatchEvents,
}

/// The caller of a request, with a role claim resolved server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
}

impl Principal {
    pub fn new(subject: impl Into<String>, role: Role) -> Self {
        Self {
            subject: subject.into(),
            role,
        }
    }

    pub fn service() -> Self {
        Self::new("service", Role::Service)
    }

    pub fn can(&self, action: Action) -> bool {
        match action {
            Action::CreateOpening => matches!(self.role, Role::Manager | Role::Service),
            Action::FillOpening => true,
            Action::ListOpenings | Action::ViewOpening | Action::WatchEvents => true,
        }
    }

    pub fn authorize(&self, action: Action) -> Result<(), EngineError> {
        if self.can(action) {
            Ok(())
        } else {
            Err(EngineError::Forbidden(format!(
                "role {} may not perform {action:?}",
                self.role
            )))
        }
    }
}

/// API key → principal table. An empty directory is "open": every request
/// acts as the service principal.
#[derive(Debug, Clone, Default)]
pub struct PrincipalDirectory {
    keys: HashMap<String, Principal>,
}

impl PrincipalDirectory {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn insert(&mut self, api_key: impl Into<String>, principal: Principal) {
        self.keys.insert(api_key.into(), principal);
    }

    /// Parse `key=role:subject,key2=role2:subject2`. Blank input yields an open directory.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let mut dir = Self::open();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, claim) = entry
                .split_once('=')
                .ok_or_else(|| EngineError::Validation(format!("api key entry without '=': {entry}")))?;
            let (role, subject) = claim.split_once(':').unwrap_or((claim, ""));
            let role: Role = role.parse()?;
            let subject = if subject.trim().is_empty() {
                role.to_string()
            } else {
                subject.trim().to_string()
            };
            if key.trim().is_empty() {
                return Err(EngineError::Validation("empty api key".into()));
            }
            dir.insert(key.trim(), Principal::new(subject, role));
        }
        Ok(dir)
    }

    /// Resolve the bearer credential of a request.
    pub fn resolve(&self, bearer: Option<&str>) -> Result<Principal, EngineError> {
        if self.is_open() {
            return Ok(Principal::service());
        }
        let key = bearer.ok_or_else(|| EngineError::Authorization("missing api key".into()))?;
        self.keys
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::Authorization("unknown api key".into()))
    }
}
