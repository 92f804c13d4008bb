use crate::comm::engine::Engine;
use crate::comm::export::write_export;
use crate::comm::friends::FriendPatch;
use std::path::Path;

pub const HELP_TEXT: &str = "Local commands:
/help            - show this help
/clear           - clear history in this window (and stored history)
/export          - export current history to CSV (Username, Time, Message)
/friend <name>   - add a friend (defaults)
/unfriend <name> - remove a friend
/friends         - list friends";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCommand {
    Help,
    Friends,
    Friend(String),
    Unfriend(String),
    Clear,
    Export,
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// Recognizes a local slash command; anything else belongs to the game.
pub fn parse(text: &str) -> Option<LocalCommand> {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    match lower.as_str() {
        "/help" => return Some(LocalCommand::Help),
        "/friends" => return Some(LocalCommand::Friends),
        "/clear" => return Some(LocalCommand::Clear),
        "/export" => return Some(LocalCommand::Export),
        _ => {}
    }
    if let Some(rest) = strip_prefix_ignore_case(trimmed, "/friend ") {
        return Some(LocalCommand::Friend(rest.trim().to_string()));
    }
    if let Some(rest) = strip_prefix_ignore_case(trimmed, "/unfriend ") {
        return Some(LocalCommand::Unfriend(rest.trim().to_string()));
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReply {
    pub command: LocalCommand,
    /// Text pushed into the transcript as a local notice, if any.
    pub notice: Option<String>,
    pub ok: bool,
}

/// Runs a local command against the engine. Returns `None` when `text` is not one.
pub fn handle(engine: &mut Engine, text: &str, exports_dir: &Path) -> Option<LocalReply> {
    let command = parse(text)?;
    let (notice, ok) = match &command {
        LocalCommand::Help => (Some(HELP_TEXT.to_string()), true),
        LocalCommand::Friends => (Some(engine.friends().list_text()), true),
        LocalCommand::Friend(name) => {
            let reply = engine.friends_mut().add(name, &FriendPatch::default());
            (Some(reply.message), reply.ok)
        }
        LocalCommand::Unfriend(name) => {
            let reply = engine.friends_mut().remove(name);
            (Some(reply.message), reply.ok)
        }
        LocalCommand::Clear => (None, engine.clear()),
        LocalCommand::Export => match write_export(exports_dir, engine.messages()) {
            Ok(out) => (
                Some(format!(
                    "Exported {} messages to CSV: {}",
                    out.rows,
                    out.path.display()
                )),
                true,
            ),
            Err(err) => (Some(format!("Export failed: {err:#}")), false),
        },
    };

    if let Some(text) = &notice {
        engine.push_local_notice(text.clone());
    }
    Some(LocalReply {
        command,
        notice,
        ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::diagnostics::RecordingSink;
    use crate::comm::message::{LOCAL_AUTHOR, Message};
    use crate::comm::store::memory::MemoryStore;
    use std::rc::Rc;
    use tempfile::tempdir;

    fn engine() -> Engine {
        Engine::new(
            Rc::new(MemoryStore::default()),
            Rc::new(MemoryStore::default()),
            1000,
            Rc::new(RecordingSink::default()),
        )
    }

    #[test]
    fn parse_is_case_insensitive_and_keeps_name_case() {
        assert_eq!(parse(" /HELP "), Some(LocalCommand::Help));
        assert_eq!(parse("/Friend  Bob "), Some(LocalCommand::Friend("Bob".to_string())));
        assert_eq!(parse("/unfriend bob"), Some(LocalCommand::Unfriend("bob".to_string())));
        assert_eq!(parse("/friend"), None);
        assert_eq!(parse("/shop"), None);
        assert_eq!(parse("hello"), None);
    }

    #[test]
    fn friend_reply_becomes_local_notice() {
        let tmp = tempdir().expect("tempdir");
        let mut e = engine();
        let reply = handle(&mut e, "/friend Bob", tmp.path()).expect("handled");
        assert!(reply.ok);
        assert_eq!(reply.notice.as_deref(), Some("Added friend: Bob"));
        let last = e.messages().last().expect("notice");
        assert_eq!(last.username, LOCAL_AUTHOR);
        assert!(e.friends().get("bob").is_some());
    }

    #[test]
    fn clear_leaves_no_notice() {
        let tmp = tempdir().expect("tempdir");
        let mut e = engine();
        e.merge(&[Message::system("boot")]);
        let reply = handle(&mut e, "/clear", tmp.path()).expect("handled");
        assert!(reply.ok);
        assert!(reply.notice.is_none());
        assert!(e.messages().is_empty());
    }

    #[test]
    fn export_writes_csv_and_reports_count() {
        let tmp = tempdir().expect("tempdir");
        let mut e = engine();
        e.merge(&[Message::authored("Alice", "1:00 PM", "hi")]);
        let reply = handle(&mut e, "/export", tmp.path()).expect("handled");
        assert!(reply.ok);
        assert!(reply.notice.expect("notice").starts_with("Exported 1 messages to CSV: "));
        let files: Vec<_> = std::fs::read_dir(tmp.path()).expect("read").collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn unknown_text_is_not_handled() {
        let tmp = tempdir().expect("tempdir");
        assert!(handle(&mut engine(), "/settings", tmp.path()).is_none());
    }
}
