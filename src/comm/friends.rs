use crate::comm::diagnostics::{Diagnostic, DiagnosticSink};
use crate::comm::message::normalize_name;
use crate::comm::store::KvStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Canonical map in the config store.
pub const FRIENDS_MAP_KEY: &str = "friendsMapV2";
/// Legacy flat list of names in the config store.
pub const FRIENDS_LIST_V1_KEY: &str = "friendsListV1";
/// Mirror of the canonical map kept in the local store.
pub const FRIENDS_MIRROR_KEY: &str = "commFriendsMapV2";

pub const DEFAULT_NAME_COLOR: &str = "#3aa0ff";
pub const DEFAULT_MSG_COLOR: &str = "#35ff6a";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friend {
    pub key: String,
    pub name: String,
    pub name_color: String,
    pub msg_color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFriend {
    name: String,
    name_color: String,
    msg_color: String,
}

#[derive(Debug, Clone, Default)]
pub struct FriendPatch {
    pub name: Option<String>,
    pub name_color: Option<String>,
    pub msg_color: Option<String>,
}

/// Reply text for a friend mutation, shown to the user as a local notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendReply {
    pub ok: bool,
    pub message: String,
}

impl FriendReply {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// `#rrggbb` passes through trimmed; anything else becomes `fallback`.
pub fn clamp_hex_color(raw: Option<&str>, fallback: &str) -> String {
    let value = raw.unwrap_or("").trim();
    let valid = value.len() == 7
        && value.starts_with('#')
        && value[1..].bytes().all(|b| b.is_ascii_hexdigit());
    if valid {
        value.to_string()
    } else {
        fallback.to_string()
    }
}

fn normalize_map(map: &Map<String, Value>) -> BTreeMap<String, Friend> {
    let mut out = BTreeMap::new();
    for (raw_key, value) in map {
        let key = normalize_name(raw_key);
        if key.is_empty() {
            continue;
        }
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(raw_key.trim())
            .to_string();
        let name_color = clamp_hex_color(
            value.get("nameColor").and_then(Value::as_str),
            DEFAULT_NAME_COLOR,
        );
        let msg_color = clamp_hex_color(
            value.get("msgColor").and_then(Value::as_str),
            DEFAULT_MSG_COLOR,
        );
        out.insert(
            key.clone(),
            Friend {
                key,
                name,
                name_color,
                msg_color,
            },
        );
    }
    out
}

fn normalize_list(list: &[Value]) -> BTreeMap<String, Friend> {
    let mut out = BTreeMap::new();
    for item in list {
        let raw = match item {
            Value::String(s) => s.clone(),
            Value::Null => continue,
            other => other.to_string(),
        };
        let key = normalize_name(&raw);
        if key.is_empty() {
            continue;
        }
        out.insert(
            key.clone(),
            Friend {
                key,
                name: raw.trim().to_string(),
                name_color: DEFAULT_NAME_COLOR.to_string(),
                msg_color: DEFAULT_MSG_COLOR.to_string(),
            },
        );
    }
    out
}

/// Case-insensitive registry of friends backed by the config store and a local mirror.
pub struct FriendRegistry {
    friends: BTreeMap<String, Friend>,
    config: Rc<dyn KvStore>,
    local: Rc<dyn KvStore>,
    sink: Rc<dyn DiagnosticSink>,
}

impl FriendRegistry {
    /// Loads the first usable shape (canonical map, legacy list, local mirror) and re-mirrors it.
    pub fn load(
        config: Rc<dyn KvStore>,
        local: Rc<dyn KvStore>,
        sink: Rc<dyn DiagnosticSink>,
    ) -> Self {
        let mut registry = Self {
            friends: BTreeMap::new(),
            config,
            local,
            sink,
        };

        let friends = if let Some(map) = registry.read_object(registry.config.as_ref(), FRIENDS_MAP_KEY) {
            normalize_map(&map)
        } else if let Some(list) = registry.read_array(registry.config.as_ref(), FRIENDS_LIST_V1_KEY) {
            normalize_list(&list)
        } else if let Some(map) = registry.read_object(registry.local.as_ref(), FRIENDS_MIRROR_KEY) {
            normalize_map(&map)
        } else {
            BTreeMap::new()
        };
        registry.friends = friends;
        registry.write_mirror(&registry.serialize());
        registry
    }

    fn read_value(&self, store: &dyn KvStore, key: &str) -> Option<Value> {
        let raw = match store.get(key) {
            Ok(raw) => raw?,
            Err(err) => {
                self.sink
                    .report(Diagnostic::storage("friends-load", format!("{key}: {err:#}")));
                return None;
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                self.sink
                    .report(Diagnostic::malformed("friends-load", format!("{key}: {err}")));
                None
            }
        }
    }

    fn read_object(&self, store: &dyn KvStore, key: &str) -> Option<Map<String, Value>> {
        match self.read_value(store, key)? {
            Value::Object(map) => Some(map),
            Value::Null => None,
            _ => {
                self.sink.report(Diagnostic::malformed(
                    "friends-load",
                    format!("{key}: expected an object"),
                ));
                None
            }
        }
    }

    fn read_array(&self, store: &dyn KvStore, key: &str) -> Option<Vec<Value>> {
        match self.read_value(store, key)? {
            Value::Array(list) => Some(list),
            Value::Null => None,
            _ => {
                self.sink.report(Diagnostic::malformed(
                    "friends-load",
                    format!("{key}: expected an array"),
                ));
                None
            }
        }
    }

    fn serialize(&self) -> BTreeMap<String, StoredFriend> {
        self.friends
            .iter()
            .map(|(key, f)| {
                (
                    key.clone(),
                    StoredFriend {
                        name: f.name.clone(),
                        name_color: f.name_color.clone(),
                        msg_color: f.msg_color.clone(),
                    },
                )
            })
            .collect()
    }

    fn write_mirror(&self, payload: &BTreeMap<String, StoredFriend>) {
        let result = serde_json::to_string(payload)
            .map_err(anyhow::Error::from)
            .and_then(|data| self.local.set(FRIENDS_MIRROR_KEY, &data));
        if let Err(err) = result {
            self.sink
                .report(Diagnostic::storage("friends-mirror", format!("{err:#}")));
        }
    }

    /// Mirror always; the config store only when its content differs.
    fn persist(&self) {
        let payload = self.serialize();
        self.write_mirror(&payload);

        let Ok(desired) = serde_json::to_value(&payload) else {
            return;
        };
        let current = match self.config.get(FRIENDS_MAP_KEY) {
            Ok(raw) => raw
                .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
                .filter(Value::is_object)
                .unwrap_or_else(|| Value::Object(Map::new())),
            Err(_) => Value::Object(Map::new()),
        };
        if current == desired {
            return;
        }
        if let Err(err) = self.config.set(FRIENDS_MAP_KEY, &desired.to_string()) {
            self.sink
                .report(Diagnostic::storage("friends-persist", format!("{err:#}")));
        }
    }

    pub fn len(&self) -> usize {
        self.friends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.friends.is_empty()
    }

    pub fn get(&self, username: &str) -> Option<&Friend> {
        let key = normalize_name(username);
        if key.is_empty() {
            return None;
        }
        self.friends.get(&key)
    }

    pub fn add(&mut self, raw_name: &str, patch: &FriendPatch) -> FriendReply {
        let raw = raw_name.trim();
        let key = normalize_name(raw);
        if key.is_empty() {
            return FriendReply::rejected("Usage: /friend <name>");
        }
        if self.friends.contains_key(&key) {
            return FriendReply::rejected(format!("{raw} is already in your friends list."));
        }
        self.friends.insert(
            key.clone(),
            Friend {
                key,
                name: raw.to_string(),
                name_color: clamp_hex_color(patch.name_color.as_deref(), DEFAULT_NAME_COLOR),
                msg_color: clamp_hex_color(patch.msg_color.as_deref(), DEFAULT_MSG_COLOR),
            },
        );
        self.persist();
        FriendReply::ok(format!("Added friend: {raw}"))
    }

    pub fn remove(&mut self, raw_name: &str) -> FriendReply {
        let raw = raw_name.trim();
        let key = normalize_name(raw);
        if key.is_empty() {
            return FriendReply::rejected("Usage: /unfriend <name>");
        }
        if self.friends.remove(&key).is_none() {
            return FriendReply::rejected(format!("{raw} was not in your friends list."));
        }
        self.persist();
        FriendReply::ok(format!("Removed friend: {raw}"))
    }

    /// Invalid colors keep the previous value; a blank name keeps the previous name.
    pub fn update(&mut self, raw_key: &str, patch: &FriendPatch) -> bool {
        let key = normalize_name(raw_key);
        let Some(friend) = self.friends.get_mut(&key) else {
            return false;
        };
        if let Some(name) = patch.name.as_deref() {
            let name = name.trim();
            if !name.is_empty() {
                friend.name = name.to_string();
            }
        }
        if let Some(color) = patch.name_color.as_deref() {
            friend.name_color = clamp_hex_color(Some(color), &friend.name_color);
        }
        if let Some(color) = patch.msg_color.as_deref() {
            friend.msg_color = clamp_hex_color(Some(color), &friend.msg_color);
        }
        self.persist();
        true
    }

    pub fn list_text(&self) -> String {
        if self.is_empty() {
            return "Friends: (none)\nUse: /friend <name> or the friends command.".to_string();
        }
        let mut names: Vec<&str> = self.friends.values().map(|f| f.name.as_str()).collect();
        names.sort_by_cached_key(|name| name.to_lowercase());
        let rows = names
            .iter()
            .map(|name| format!("- {name}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Friends ({}):\n{rows}", names.len())
    }
}
