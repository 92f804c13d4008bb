use crate::comm::friends::FriendRegistry;
use crate::comm::message::{Message, normalize_name};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderHints {
    pub is_system_line: bool,
    pub is_friend_line: bool,
    pub is_mention: bool,
    pub name_color: Option<String>,
    pub msg_color_override: Option<String>,
}

/// `@<self>` anywhere in the body, case-insensitive. Empty identity never matches.
pub fn mentions(body: &str, self_identity: &str) -> bool {
    let me = normalize_name(self_identity);
    if me.is_empty() {
        return false;
    }
    body.to_lowercase().contains(&format!("@{me}"))
}

pub fn annotate(message: &Message, friends: &FriendRegistry, self_identity: &str) -> RenderHints {
    let is_system_line = message.is_system();
    let friend = if is_system_line {
        None
    } else {
        friends.get(&message.username)
    };

    let (name_color, msg_color_override) = match friend {
        Some(f) => (Some(f.name_color.clone()), Some(f.msg_color.clone())),
        None => (message.username_color.clone(), None),
    };

    RenderHints {
        is_system_line,
        is_friend_line: friend.is_some(),
        is_mention: mentions(&message.message, self_identity),
        name_color,
        msg_color_override,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::diagnostics::RecordingSink;
    use crate::comm::friends::{DEFAULT_MSG_COLOR, DEFAULT_NAME_COLOR, FriendPatch};
    use crate::comm::store::memory::MemoryStore;
    use std::rc::Rc;

    fn registry_with(names: &[&str]) -> FriendRegistry {
        let mut registry = FriendRegistry::load(
            Rc::new(MemoryStore::default()),
            Rc::new(MemoryStore::default()),
            Rc::new(RecordingSink::default()),
        );
        for name in names {
            registry.add(name, &FriendPatch::default());
        }
        registry
    }

    #[test]
    fn mention_is_case_insensitive() {
        assert!(mentions("hey @alice how are you", "Alice"));
        assert!(!mentions("hey alice", "Alice"));
    }

    #[test]
    fn empty_identity_disables_mentions() {
        assert!(!mentions("hey @ everyone", ""));
        assert!(!mentions("@", "   "));
    }

    #[test]
    fn friend_colors_override_captured_color() {
        let registry = registry_with(&["Bob"]);
        let msg = Message {
            username_color: Some("rgb(9, 9, 9)".to_string()),
            ..Message::authored("bob", "1:00 PM", "yo")
        };
        let hints = annotate(&msg, &registry, "");
        assert!(hints.is_friend_line);
        assert_eq!(hints.name_color.as_deref(), Some(DEFAULT_NAME_COLOR));
        assert_eq!(hints.msg_color_override.as_deref(), Some(DEFAULT_MSG_COLOR));
    }

    #[test]
    fn strangers_keep_captured_color() {
        let registry = registry_with(&[]);
        let msg = Message {
            username_color: Some("rgb(9, 9, 9)".to_string()),
            ..Message::authored("Zed", "1:00 PM", "@me ping")
        };
        let hints = annotate(&msg, &registry, "ME");
        assert!(!hints.is_friend_line);
        assert!(hints.is_mention);
        assert_eq!(hints.name_color.as_deref(), Some("rgb(9, 9, 9)"));
        assert_eq!(hints.msg_color_override, None);
    }

    #[test]
    fn system_lines_never_match_friends() {
        let registry = registry_with(&["SYSTEM"]);
        let hints = annotate(&Message::system("restart"), &registry, "");
        assert!(hints.is_system_line);
        assert!(!hints.is_friend_line);
    }
}
