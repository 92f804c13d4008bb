use crate::comm::annotate::RenderHints;
use crate::comm::message::Message;

/// One terminal line per message: `[time] name > text`, prefixed with markers.
///
/// `*` marks a friend, `@` a mention of the viewer, `~` a system line. Colors
/// are appended as `{name=..,msg=..}` so a downstream renderer can apply them.
pub fn render_line(msg: &Message, hints: &RenderHints) -> String {
    let mut markers = String::new();
    if hints.is_system_line {
        markers.push('~');
    }
    if hints.is_friend_line {
        markers.push('*');
    }
    if hints.is_mention {
        markers.push('@');
    }
    if markers.is_empty() {
        markers.push(' ');
    }

    let time = if msg.time.is_empty() {
        String::new()
    } else {
        format!("[{}] ", msg.time)
    };
    let body = msg.message.replace('\n', "\n    ");

    let mut colors = Vec::new();
    if let Some(color) = hints.name_color.as_deref() {
        colors.push(format!("name={color}"));
    }
    if let Some(color) = hints.msg_color_override.as_deref() {
        colors.push(format!("msg={color}"));
    }
    let colors = if colors.is_empty() {
        String::new()
    } else {
        format!(" {{{}}}", colors.join(","))
    };

    format!("{markers} {time}{} > {body}{colors}", msg.username)
}

pub fn empty_placeholder() -> &'static str {
    "No messages yet."
}
