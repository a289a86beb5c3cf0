//! Text normalisation and the closed synonym tables for global commands and
//! intent detection, consulted before anything NL-interpreter-backed.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::session::Intent;

/// Lowercases, strips diacritics and a leading `/`, collapses surrounding
/// whitespace. Used both for command/intent matching and as the first step
/// of the service/professional name-matching pipeline.
pub fn normalize(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let stripped = lower.strip_prefix('/').unwrap_or(&lower);
    stripped.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Strips everything but alphanumerics and spaces, then collapses
/// whitespace — the second step of the service-matching pipeline, applied
/// on top of [`normalize`].
pub fn strip_non_alphanumeric(text: &str) -> String {
    let filtered: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_for_matching(text: &str) -> String {
    strip_non_alphanumeric(&normalize(text))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalCommand {
    Menu,
    Back,
}

const MENU_WORDS: &[&str] = &["menu", "inicio", "start", "home", "reiniciar", "reset"];
const EXIT_WORDS: &[&str] = &["salir", "parar", "cancelar flujo", "volver", "atras"];

/// Global commands are recognised on the normalized text before any
/// state-specific handling; both classes reset to `idle`.
pub fn detect_global_command(normalized: &str) -> Option<GlobalCommand> {
    if MENU_WORDS.iter().any(|w| normalized == *w) {
        return Some(GlobalCommand::Menu);
    }
    if EXIT_WORDS.iter().any(|w| normalized == *w) {
        return Some(GlobalCommand::Back);
    }
    None
}

const BOOK_WORDS: &[&str] = &[
    "reservar", "reserva", "cita", "book", "booking", "quiero reservar", "pedir cita",
];
const CANCEL_WORDS: &[&str] = &["cancelar", "anular", "cancel", "cancelar reserva", "anular cita"];
const FAQ_WORDS: &[&str] = &["info", "informacion", "pregunta", "horario", "ayuda", "faq"];

/// Cancellation keywords short-circuit to `Cancel` regardless of step, per
/// the dialogue engine's re-prompt policy.
pub fn is_cancellation_keyword(normalized: &str) -> bool {
    CANCEL_WORDS.iter().any(|w| normalized.contains(w))
}

/// Synonym-table intent lookup at `idle`, consulted before the NL
/// interpreter for free text (and exclusively for button/list origins).
pub fn detect_intent_keyword(normalized: &str) -> Option<Intent> {
    if is_cancellation_keyword(normalized) {
        return Some(Intent::Cancel);
    }
    if BOOK_WORDS.iter().any(|w| normalized.contains(w)) {
        return Some(Intent::Book);
    }
    if FAQ_WORDS.iter().any(|w| normalized.contains(w)) {
        return Some(Intent::Faq);
    }
    None
}

const YES_WORDS: &[&str] = &["si", "sí", "s", "yes", "claro", "vale", "correcto", "ok"];
const NO_WORDS: &[&str] = &["no", "n", "nope", "para nada"];

pub fn is_affirmative(normalized: &str) -> bool {
    YES_WORDS.contains(&normalized)
}

pub fn is_negative(normalized: &str) -> bool {
    NO_WORDS.contains(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_accents_and_case() {
        assert_eq!(normalize("Sí, CANCELAR"), "si, cancelar");
    }

    #[test]
    fn strips_leading_slash() {
        assert_eq!(normalize("/Menu"), "menu");
    }

    #[test]
    fn detects_menu_synonyms() {
        assert_eq!(detect_global_command("inicio"), Some(GlobalCommand::Menu));
        assert_eq!(detect_global_command("volver"), Some(GlobalCommand::Back));
        assert_eq!(detect_global_command("hola"), None);
    }

    #[test]
    fn detects_book_and_cancel_intents() {
        assert_eq!(detect_intent_keyword("quiero reservar hora"), Some(Intent::Book));
        assert_eq!(detect_intent_keyword("quiero anular mi cita"), Some(Intent::Cancel));
    }

    #[test]
    fn matching_pipeline_strips_punctuation() {
        assert_eq!(normalize_for_matching("Corte de Pelo (Señora)"), "corte de pelo senora");
    }
}
