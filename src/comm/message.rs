use serde::{Deserialize, Serialize};

/// Author sentinel for system lines and for authored lines whose name could not be resolved.
pub const SYSTEM_AUTHOR: &str = "SYSTEM";
/// Author sentinel for locally synthesized notices. Never persisted, never keyed.
pub const LOCAL_AUTHOR: &str = "LOCAL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_color: Option<String>,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub message: String,
}

impl Message {
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            id: None,
            username: SYSTEM_AUTHOR.to_string(),
            username_color: None,
            time: String::new(),
            message: message.into(),
        }
    }

    pub fn authored(
        username: impl Into<String>,
        time: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            username: username.into(),
            username_color: None,
            time: time.into(),
            message: message.into(),
        }
    }

    pub fn local_notice(message: impl Into<String>) -> Self {
        Self {
            id: None,
            username: LOCAL_AUTHOR.to_string(),
            username_color: None,
            time: String::new(),
            message: message.into(),
        }
    }

    #[cfg(test)]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.id = if id.is_empty() { None } else { Some(id) };
        self
    }

    /// Copy with the defaults the log stores: empty author becomes `SYSTEM`, empty id is dropped.
    pub fn normalized(&self) -> Self {
        let username = if self.username.is_empty() {
            SYSTEM_AUTHOR.to_string()
        } else {
            self.username.clone()
        };
        Self {
            id: self.id.clone().filter(|id| !id.is_empty()),
            username,
            username_color: self.username_color.clone().filter(|c| !c.is_empty()),
            time: self.time.clone(),
            message: self.message.clone(),
        }
    }

    pub fn dedup_key(&self) -> String {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.composite_key(),
        }
    }

    /// The id-independent identity; this is all a persisted entry can be keyed by.
    pub fn composite_key(&self) -> String {
        format!("{}||{}||{}", self.time, self.username, self.message)
    }

    pub fn is_system(&self) -> bool {
        self.username == SYSTEM_AUTHOR || self.username == LOCAL_AUTHOR
    }

    pub fn is_local(&self) -> bool {
        self.username == LOCAL_AUTHOR
    }
}

/// Trimmed, lowercased username used for friend keys and mention matching.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}
