//! Shared entry point for both transports: classifies a list-reply payload,
//! either answering pagination directly from a snapshot or forwarding the
//! (possibly translated) text to the dialogue engine, then saves a fresh
//! snapshot of whatever list the engine just returned. The snapshot prefers
//! the engine's `all_choices` (the full multi-page candidate list) over
//! `choices` (just the page rendered this turn), so later pagination
//! requests can serve pages the first turn never showed.

use pelu_config::ShopConfig;
use pelu_dialogue::{DialogueEngine, HandleResult, Origin, UiDirective};
use pelu_kv::KvStore;

use crate::classify::{classify, paginate_reply, resolve_selection_text, save_snapshot, Classified};

pub async fn dispatch(
    engine: &DialogueEngine,
    kv: &dyn KvStore,
    shop: &ShopConfig,
    session_id: &str,
    raw_message: &str,
    origin: Origin,
) -> HandleResult {
    if origin == Origin::List {
        match classify(raw_message) {
            Classified::Pagination { prefix, page } => {
                let (text, choices) = paginate_reply(kv, session_id, prefix, page).await;
                let ui = ui_for_prefix(prefix);
                let mut result = HandleResult::text(text);
                if let Some(ui) = ui {
                    result = result.with_ui(ui);
                }
                if !choices.is_empty() {
                    result = result.with_choices(choices);
                }
                return result;
            }
            Classified::Selection { text } => {
                let translated = resolve_selection_text(kv, session_id, &text).await;
                let reply = engine.handle(session_id, shop, &translated, origin).await;
                save_snapshot_from_reply(kv, session_id, &reply).await;
                return reply;
            }
            Classified::PlainText => {}
        }
    }

    let reply = engine.handle(session_id, shop, raw_message, origin).await;
    save_snapshot_from_reply(kv, session_id, &reply).await;
    reply
}

async fn save_snapshot_from_reply(kv: &dyn KvStore, session_id: &str, reply: &HandleResult) {
    let choices = reply.all_choices.as_ref().or(reply.choices.as_ref());
    if let (Some(ui), Some(choices)) = (reply.ui, choices) {
        save_snapshot(kv, session_id, ui, choices).await;
    }
}

fn ui_for_prefix(prefix: &str) -> Option<UiDirective> {
    match prefix {
        "HORA" => Some(UiDirective::Hours),
        "SERV" => Some(UiDirective::Services),
        "PEL" => Some(UiDirective::Staff),
        "RID" => Some(UiDirective::ResList),
        _ => None,
    }
}
