use crate::chat::ChatRoom;
use crate::identity::{GuardDecision, Identity};
use crate::notifications::NotificationState;

// Render rows as an ASCII table. Returns false (and prints nothing) when there are no rows.
pub fn print_table(cols: &[&str], rows: &[Vec<String>]) -> bool {
    if rows.is_empty() { return false; }
    let table = render_table(cols, rows);
    println!("{}", table);
    true
}

pub fn render_table(cols: &[&str], rows: &[Vec<String>]) -> String {
    let max_col_width: usize = 60; // cap to keep output readable
    let mut widths: Vec<usize> = cols.iter().map(|s| display_len(s).min(max_col_width)).collect();
    for r in rows {
        for (i, cell) in r.iter().enumerate().take(cols.len()) {
            let w = display_len(cell);
            if w > widths[i] { widths[i] = w.min(max_col_width); }
        }
    }
    let header: Vec<String> = cols.iter().map(|c| c.to_string()).collect();
    let sep = build_separator(&widths);
    let mut out = vec![sep.clone(), build_row(&header, &widths), sep.clone()];
    for r in rows {
        out.push(build_row(r, &widths));
    }
    out.push(sep);
    out.push(format!("rows: {}", rows.len()));
    out.join("\n")
}

pub fn print_identity(identity: &Identity) {
    let roles = identity.roles.iter().cloned().collect::<Vec<_>>().join(",");
    let rows = vec![
        vec!["id".to_string(), identity.id.clone()],
        vec!["name".to_string(), identity.display_name.clone()],
        vec!["email".to_string(), identity.email.clone().unwrap_or_default()],
        vec!["account_type".to_string(), identity.account_type.clone()],
        vec!["roles".to_string(), roles],
    ];
    print_table(&["field", "value"], &rows);
}

pub fn print_rooms(rooms: &[ChatRoom]) {
    let rows: Vec<Vec<String>> = rooms
        .iter()
        .map(|r| {
            let last = r.last_message.as_ref().and_then(|m| m.created_at.clone()).unwrap_or_default();
            vec![r.id.to_string(), r.title().to_string(), r.unread().to_string(), last]
        })
        .collect();
    if !print_table(&["id", "room", "unread", "last_message"], &rows) {
        println!("no chat rooms");
    }
}

pub fn print_notifications(state: &NotificationState) {
    let rows: Vec<Vec<String>> = state
        .notifications
        .iter()
        .map(|n| vec![n.id.to_string(), if n.is_read { "" } else { "*" }.to_string(), n.message.clone(), n.created_at.clone().unwrap_or_default()])
        .collect();
    print_table(&["id", "new", "message", "created_at"], &rows);
    println!("unread notifications: {}, unread messages: {}", state.unread_notifications, state.unread_messages);
}

pub fn print_decision(decision: &GuardDecision) {
    match decision {
        GuardDecision::Checking => println!("checking"),
        GuardDecision::Granted => println!("granted"),
        GuardDecision::DeniedUnauthenticated { redirect } => match &redirect.from {
            Some(from) => println!("denied (unauthenticated) -> {} (from {})", redirect.to, from),
            None => println!("denied (unauthenticated) -> {}", redirect.to),
        },
        GuardDecision::DeniedUnauthorized { redirect } => println!("denied (unauthorized) -> {}", redirect.to),
    }
}

fn display_len(s: &str) -> usize { s.chars().count() }

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let (text, align_right) = (truncate(&cell, *w), is_numeric_like(&cell));
        let pad = w.saturating_sub(display_len(&text));
        s.push(' ');
        if align_right {
            s.push_str(&" ".repeat(pad));
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&" ".repeat(pad));
        }
        s.push(' ');
        s.push('|');
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    // crude detection for aligning numbers to right
    let st = s.trim();
    !st.is_empty() && st.chars().all(|c| c.is_ascii_digit())
}
