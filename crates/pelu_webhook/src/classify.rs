//! Payload classification for WhatsApp list-reply ids:
//! `*_NEXT_<p>` is pure UI pagination, answered from a saved snapshot
//! without touching the engine; `*_P<p>_<i>` / `PEL_ANY` / `RID_<n>` is an
//! item selection, translated to its display label and forwarded to the
//! engine with `origin = list`.
//!
//! Snapshots hold the full candidate list for the current turn (the
//! engine's `all_choices` when the list spans more than one page, falling
//! back to `choices` otherwise), re-sliced here into `DISPATCH_PAGE_SIZE`
//! pages so `NEXT` can serve pages the first turn never rendered.

use pelu_dialogue::{Choice, UiDirective};
use pelu_kv::KvStore;
use serde::{Deserialize, Serialize};

const SNAPSHOT_TTL_SECONDS: u64 = 300;
const DISPATCH_PAGE_SIZE: usize = 10;

const PREFIXES: &[&str] = &["HORA", "SERV", "PEL", "RID"];

fn snapshot_key(session_id: &str, prefix: &str) -> String {
    let kind = match prefix {
        "HORA" => "hours",
        "SERV" => "services",
        "PEL" => "pelulist",
        "RID" => "reslist",
        _ => "list",
    };
    format!("{kind}:{session_id}")
}

fn ui_prefix(ui: UiDirective) -> Option<&'static str> {
    match ui {
        UiDirective::Hours => Some("HORA"),
        UiDirective::Services => Some("SERV"),
        UiDirective::Staff => Some("PEL"),
        UiDirective::ResList => Some("RID"),
        UiDirective::MainMenu => None,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    choices: Vec<SnapshotChoice>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotChoice {
    id: String,
    label: String,
}

/// Saves the list the engine just showed so a later `_NEXT_<p>` can be
/// answered without re-invoking the engine.
pub async fn save_snapshot(kv: &dyn KvStore, session_id: &str, ui: UiDirective, choices: &[Choice]) {
    let Some(prefix) = ui_prefix(ui) else { return };
    if choices.is_empty() {
        return;
    }
    let snapshot = Snapshot {
        choices: choices
            .iter()
            .map(|c| SnapshotChoice { id: c.id.clone(), label: c.label.clone() })
            .collect(),
    };
    let Ok(body) = serde_json::to_string(&snapshot) else { return };
    let key = snapshot_key(session_id, prefix);
    if let Err(e) = kv.setex(&key, SNAPSHOT_TTL_SECONDS, &body).await {
        tracing::warn!(session_id, %prefix, error = %e, "failed to persist list snapshot");
    }
}

pub enum Classified {
    /// Pure UI paging — answer directly from the saved snapshot, page `p`.
    Pagination { prefix: &'static str, page: usize },
    /// An item pick — `text` is what should be forwarded to the engine.
    Selection { text: String },
    /// Free text, a button id the engine understands on its own, or
    /// anything else — forward the raw payload unchanged.
    PlainText,
}

fn parse_next(payload: &str) -> Option<(&'static str, usize)> {
    for prefix in PREFIXES {
        if let Some(rest) = payload.strip_prefix(prefix).and_then(|r| r.strip_prefix("_NEXT_")) {
            if let Ok(page) = rest.parse::<usize>() {
                return Some((prefix, page));
            }
        }
    }
    None
}

/// `true` for ids the engine already parses natively (`SERV_P<p>_<i>`,
/// `PEL_P<p>_<i>`, `PEL_ANY`, `RID_<n>`) — these still count as a
/// selection for classification purposes, but forwarding the raw id is
/// just as good as translating it, so `resolve` only bothers to look up
/// a label for `HORA_*`, where the engine needs the actual hour string.
fn is_known_selection(payload: &str) -> bool {
    payload == "PEL_ANY"
        || PREFIXES.iter().any(|p| {
            payload
                .strip_prefix(p)
                .map(|rest| rest.starts_with("_P") || (*p == "RID" && rest.starts_with('_')))
                .unwrap_or(false)
        })
}

pub fn classify(payload: &str) -> Classified {
    if let Some((prefix, page)) = parse_next(payload) {
        return Classified::Pagination { prefix, page };
    }
    if is_known_selection(payload) {
        return Classified::Selection { text: payload.to_string() };
    }
    Classified::PlainText
}

/// Looks up the label for `payload` in the saved snapshot (only matters
/// for `HORA_P<p>_<i>`, since that's the one id the engine can't parse on
/// its own — see `classify`'s doc comment). Falls back to the raw payload
/// when no snapshot entry is found, so a stale or missing snapshot never
/// blocks the message.
pub async fn resolve_selection_text(kv: &dyn KvStore, session_id: &str, payload: &str) -> String {
    let Some(prefix) = PREFIXES.iter().find(|p| payload.starts_with(**p)) else {
        return payload.to_string();
    };
    let key = snapshot_key(session_id, prefix);
    let Ok(Some(raw)) = kv.get(&key).await else {
        return payload.to_string();
    };
    let Ok(snapshot) = serde_json::from_str::<Snapshot>(&raw) else {
        return payload.to_string();
    };
    snapshot
        .choices
        .iter()
        .find(|c| c.id == payload)
        .map(|c| c.label.clone())
        .unwrap_or_else(|| payload.to_string())
}

/// Builds the reply for a pure pagination request directly from the
/// snapshot, without touching the engine.
pub async fn paginate_reply(kv: &dyn KvStore, session_id: &str, prefix: &'static str, page: usize) -> (String, Vec<Choice>) {
    let key = snapshot_key(session_id, prefix);
    let Ok(Some(raw)) = kv.get(&key).await else {
        return ("Esa lista ya no está disponible. Escribe *menu* para empezar de nuevo.".to_string(), Vec::new());
    };
    let Ok(snapshot) = serde_json::from_str::<Snapshot>(&raw) else {
        return ("Esa lista ya no está disponible. Escribe *menu* para empezar de nuevo.".to_string(), Vec::new());
    };
    let pages: Vec<&[SnapshotChoice]> = snapshot.choices.chunks(DISPATCH_PAGE_SIZE).collect();
    match pages.get(page) {
        Some(items) if !items.is_empty() => {
            let choices = items
                .iter()
                .map(|c| Choice { id: c.id.clone(), label: c.label.clone() })
                .collect();
            ("Aquí tienes más opciones:".to_string(), choices)
        }
        _ => ("No hay más opciones disponibles.".to_string(), Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_pagination_directives() {
        match classify("HORA_NEXT_1") {
            Classified::Pagination { prefix, page } => {
                assert_eq!(prefix, "HORA");
                assert_eq!(page, 1);
            }
            _ => panic!("expected pagination"),
        }
    }

    #[test]
    fn classifies_item_selection() {
        assert!(matches!(classify("SERV_P0_2"), Classified::Selection { .. }));
        assert!(matches!(classify("PEL_ANY"), Classified::Selection { .. }));
        assert!(matches!(classify("RID_42"), Classified::Selection { .. }));
    }

    #[test]
    fn free_text_is_plain() {
        assert!(matches!(classify("quiero reservar"), Classified::PlainText));
    }
}
