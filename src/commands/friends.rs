use anyhow::Result;
use std::rc::Rc;

use crate::comm::config::load_config;
use crate::comm::diagnostics::WarnSink;
use crate::comm::engine::Engine;
use crate::comm::friends::{FriendPatch, FriendReply};
use crate::comm::paths::resolve_paths;
use crate::commands::CommandReport;

#[derive(Debug, Clone)]
pub enum FriendsAction {
    List,
    Add { name: String, patch: FriendPatch },
    Remove { name: String },
    Update { key: String, patch: FriendPatch },
}

fn apply_reply(report: &mut CommandReport, reply: FriendReply) {
    if reply.ok {
        report.detail(reply.message);
    } else {
        report.issue(reply.message);
    }
}

pub fn run(action: &FriendsAction) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut engine = Engine::open(&paths, &cfg, Rc::new(WarnSink));
    let mut report = CommandReport::new("friends");

    match action {
        FriendsAction::List => {
            for line in engine.friends().list_text().lines() {
                report.detail(line);
            }
        }
        FriendsAction::Add { name, patch } => {
            let reply = engine.friends_mut().add(name, patch);
            apply_reply(&mut report, reply);
        }
        FriendsAction::Remove { name } => {
            let reply = engine.friends_mut().remove(name);
            apply_reply(&mut report, reply);
        }
        FriendsAction::Update { key, patch } => {
            if engine.friends_mut().update(key, patch) {
                if let Some(friend) = engine.friends().get(key) {
                    report.detail(format!(
                        "updated {} name_color={} msg_color={}",
                        friend.name, friend.name_color, friend.msg_color
                    ));
                }
            } else {
                report.issue(format!("{} was not in your friends list.", key.trim()));
            }
        }
    }
    Ok(report)
}
