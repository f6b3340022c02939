// src/plugins/modlog/format.rs — Render moderation events as chat text
//
// Every formatter takes the inner event object and returns `None` when the
// payload lacks the data needed for a meaningful line.

use serde_json::Value;

pub const DEFAULT_SNIPPET_LIMIT: usize = 200;

/// Non-empty string field.
fn text<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn object<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| v.is_object())
}

fn is_channel_id(value: &str) -> bool {
    value.starts_with('C') || value.starts_with('G')
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn operator input into a storable channel identifier:
/// `<#C123|name>` → `C123`, ids and `#name` unchanged, bare names → `#name`.
pub fn normalize_channel_identifier(raw: &str) -> String {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return String::new();
    }
    if let Some(inner) = candidate
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        let id = inner.split_once('|').map_or(inner, |(id, _)| id);
        return id.trim().to_string();
    }
    if candidate.starts_with('#') || is_channel_id(candidate) {
        return candidate.to_string();
    }
    format!("#{candidate}")
}

/// Slack markup for a channel, falling back to a plain description.
pub fn format_channel_reference(channel_id: Option<&str>, fallback_name: Option<&str>) -> String {
    let Some(id) = channel_id.filter(|id| !id.is_empty()) else {
        return fallback_name.unwrap_or("an unknown channel").to_string();
    };
    if is_channel_id(id) {
        return match fallback_name {
            Some(name) => format!("<#{id}|{name}>"),
            None => format!("<#{id}>"),
        };
    }
    if id.starts_with('#') {
        return id.to_string();
    }
    format!("#{id}")
}

/// Whitespace-collapsed excerpt, cut to `limit` characters with an ellipsis.
pub fn make_snippet(value: Option<&str>, limit: usize) -> Option<String> {
    let value = value.filter(|v| !v.is_empty())?;
    let collapsed = collapse_whitespace(value);
    if collapsed.chars().count() <= limit {
        return Some(collapsed);
    }
    let mut cut: String = collapsed.chars().take(limit.saturating_sub(1)).collect();
    cut.push('…');
    Some(cut)
}

/// `<@U123> (label)` when a display or real name is known.
pub fn describe_user(user: &Value) -> String {
    let user_id = text(user, "id").or_else(|| text(user, "user"));
    let profile = object(user, "profile");
    let display_name = profile.and_then(|p| {
        text(p, "display_name").or_else(|| text(p, "display_name_normalized"))
    });
    let real_name = profile
        .and_then(|p| text(p, "real_name"))
        .or_else(|| text(user, "real_name"));
    let label = display_name.or(real_name);

    match (user_id, label) {
        (Some(id), Some(label)) if label != id => format!("<@{id}> ({label})"),
        (Some(id), _) => format!("<@{id}>"),
        (None, Some(label)) => label.to_string(),
        (None, None) => "Unknown user".to_string(),
    }
}

fn with_actor(mut line: String, word: &str, actor: Option<&str>) -> String {
    if let Some(actor) = actor {
        line.push_str(&format!(" {word} <@{actor}>"));
    }
    line
}

pub fn format_team_join_event(event: &Value) -> Option<String> {
    let user = object(event, "user")?;
    Some(format!(":tada: {} joined the workspace.", describe_user(user)))
}

pub fn format_user_change_event(event: &Value) -> Option<String> {
    let user = object(event, "user")?;
    let details: Vec<String> = object(user, "profile")
        .map(|profile| {
            [
                ("display_name", "display name"),
                ("title", "title"),
                ("status_text", "status"),
            ]
            .iter()
            .filter_map(|(key, label)| {
                text(profile, key).map(|v| format!("{label}: *{}*", collapse_whitespace(v)))
            })
            .collect()
        })
        .unwrap_or_default();

    let base = format!(":memo: Updated profile for {}.", describe_user(user));
    if details.is_empty() {
        Some(base)
    } else {
        Some(format!("{base} ({})", details.join("; ")))
    }
}

pub fn format_channel_created_event(event: &Value) -> Option<String> {
    let (channel_id, name, creator) = match object(event, "channel") {
        Some(channel) => (
            text(channel, "id").or_else(|| text(channel, "channel_id")),
            text(channel, "name"),
            text(channel, "creator"),
        ),
        None => (text(event, "channel"), None, text(event, "creator")),
    };
    let line = format!(
        ":sparkles: Channel created: {}",
        format_channel_reference(channel_id, name)
    );
    Some(with_actor(line, "by", creator))
}

pub fn format_channel_rename_event(event: &Value) -> Option<String> {
    let channel = object(event, "channel")?;
    let reference = format_channel_reference(text(channel, "id"), text(channel, "name"));
    match text(channel, "previous_name").or_else(|| text(event, "old_name")) {
        Some(previous) => Some(format!(
            ":label: Channel renamed: {reference} (was #{previous})."
        )),
        None => Some(format!(":label: Channel renamed: {reference}.")),
    }
}

pub fn format_channel_deleted_event(event: &Value) -> Option<String> {
    let channel_id = text(event, "channel").or_else(|| text(event, "channel_id"));
    let actor = text(event, "actor").or_else(|| text(event, "user"));
    let line = format!(
        ":no_entry_sign: Channel deleted: {}",
        format_channel_reference(channel_id, None)
    );
    Some(with_actor(line, "by", actor))
}

pub fn format_channel_archive_event(event: &Value, archived: bool) -> Option<String> {
    let channel_id = text(event, "channel").or_else(|| text(event, "channel_id"));
    let actor = text(event, "user").or_else(|| text(event, "actor"));
    let action = if archived { "archived" } else { "unarchived" };
    let line = format!(
        ":file_folder: Channel {action}: {}",
        format_channel_reference(channel_id, None)
    );
    Some(with_actor(line, "by", actor))
}

pub fn format_message_deleted_event(event: &Value) -> Option<String> {
    let previous = object(event, "previous_message");
    let actor = text(event, "user");
    let author = previous.and_then(|p| text(p, "user"));

    let mut line = format!(
        ":wastebasket: Message deleted in {}",
        format_channel_reference(text(event, "channel"), None)
    );
    line = with_actor(line, "from", author);
    if actor.is_some() && actor != author {
        line = with_actor(line, "by", actor);
    }

    let snippet = make_snippet(previous.and_then(|p| text(p, "text")), DEFAULT_SNIPPET_LIMIT);
    match snippet {
        Some(snippet) => Some(format!("{line}\n> {snippet}")),
        None => Some(line),
    }
}

pub fn format_message_changed_event(event: &Value) -> Option<String> {
    let message = object(event, "message");
    let previous = object(event, "previous_message");
    let author = message
        .and_then(|m| text(m, "user"))
        .or_else(|| previous.and_then(|p| text(p, "user")));
    let editor = message
        .and_then(|m| object(m, "edited"))
        .and_then(|e| text(e, "user"))
        .or_else(|| text(event, "user"));

    let mut header = format!(
        ":pencil2: Message edited in {}",
        format_channel_reference(text(event, "channel"), None)
    );
    header = with_actor(header, "by", author);
    if let Some(editor) = editor.filter(|e| Some(*e) != author) {
        header.push_str(&format!(" (edited by <@{editor}>)"));
    }

    let mut lines = vec![header];
    if let Some(before) = make_snippet(previous.and_then(|p| text(p, "text")), DEFAULT_SNIPPET_LIMIT) {
        lines.push(format!("> *Before:* {before}"));
    }
    if let Some(after) = make_snippet(message.and_then(|m| text(m, "text")), DEFAULT_SNIPPET_LIMIT) {
        lines.push(format!("> *After:* {after}"));
    }
    Some(lines.join("\n"))
}
