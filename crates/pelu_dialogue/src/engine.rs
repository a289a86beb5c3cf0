//! The state machine itself. One `DialogueEngine` is built once per process
//! (holding pooled collaborators) and shared across sessions; all per-call
//! state lives in the `Session` loaded from and saved to the KV store.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;

use pelu_common::services::{BoxedError, CalendarService, NlpService};
use pelu_config::ShopConfig;
use pelu_committer::{cancel_reservation, commit_reservation, CancelOutcome, CommitOutcome, CommitRequest};
use pelu_db::error::DbError;
use pelu_db::models::{Professional, Service};
use pelu_db::repositories::{SqlProfessionalRepository, SqlReservationRepository, SqlServiceRepository};
use pelu_kv::KvStore;

use crate::date_parse::{check_date, parse_date, DateRejection};
use crate::matching::{match_name, parse_ordinal, parse_page_index_reply};
use crate::normalize::{
    detect_global_command, detect_intent_keyword, is_affirmative, is_cancellation_keyword,
    is_negative, normalize, normalize_for_matching, GlobalCommand,
};
use crate::reply::{Choice, HandleResult, UiDirective};
use crate::session::{DialogueState, Intent, Session, TimeOfDay};
use crate::time_parse::{am_pm_candidates, normalize_time, resolved_hour};
use crate::Origin;

const SESSION_TTL_SECONDS: u64 = 5 * 3600;
const HOURS_TTL_SECONDS: u64 = 120;
const HOURS_PAGE_SIZE: usize = 10;

#[derive(Debug, Error)]
enum EngineError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Commit(#[from] pelu_committer::CommitError),
    #[error("external collaborator error: {0}")]
    External(BoxedError),
    #[error("timezone {0} does not parse")]
    InvalidTimezone(String),
}

pub struct DialogueEngine {
    kv: Arc<dyn KvStore>,
    services: SqlServiceRepository,
    professionals: SqlProfessionalRepository,
    reservations: SqlReservationRepository,
    calendar: Option<Arc<dyn CalendarService<Error = BoxedError>>>,
    nlp: Option<Arc<dyn NlpService<Error = BoxedError>>>,
}

impl DialogueEngine {
    pub fn new(
        kv: Arc<dyn KvStore>,
        services: SqlServiceRepository,
        professionals: SqlProfessionalRepository,
        reservations: SqlReservationRepository,
        calendar: Option<Arc<dyn CalendarService<Error = BoxedError>>>,
        nlp: Option<Arc<dyn NlpService<Error = BoxedError>>>,
    ) -> Self {
        Self { kv, services, professionals, reservations, calendar, nlp }
    }

    async fn load_session(&self, session_id: &str) -> Session {
        match self.kv.get(&format!("state:{session_id}")).await {
            Ok(Some(raw)) => Session::from_json(session_id, &raw),
            _ => Session::new(session_id),
        }
    }

    async fn save_session(&self, session: &Session) {
        let key = format!("state:{}", session.session_id);
        if let Err(e) = self.kv.setex(&key, SESSION_TTL_SECONDS, &session.to_json()).await {
            tracing::warn!(session_id = %session.session_id, error = %e, "failed to persist session state");
        }
    }

    fn now_in_shop_tz(&self, shop: &ShopConfig) -> Result<chrono::DateTime<chrono_tz::Tz>, EngineError> {
        let tz: chrono_tz::Tz = shop.tz.parse().map_err(|_| EngineError::InvalidTimezone(shop.tz.clone()))?;
        Ok(Utc::now().with_timezone(&tz))
    }

    /// The one public operation: normalizes input, applies global commands,
    /// dispatches to the current step, persists the (possibly new) session.
    pub async fn handle(&self, session_id: &str, shop: &ShopConfig, message: &str, origin: Origin) -> HandleResult {
        let mut session = self.load_session(session_id).await;
        match self.handle_inner(&mut session, shop, message, origin).await {
            Ok(result) => {
                self.save_session(&session).await;
                result
            }
            Err(e) => {
                tracing::error!(session_id, shop_id = shop.id, error = %e, "dialogue engine error, resetting session");
                let mut fresh = Session::new(session_id);
                fresh.force_welcome = true;
                self.save_session(&fresh).await;
                HandleResult::text(
                    "Lo sentimos, ha ocurrido un error interno. Inténtalo de nuevo en unos minutos.",
                )
            }
        }
    }

    async fn handle_inner(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        message: &str,
        origin: Origin,
    ) -> Result<HandleResult, EngineError> {
        let normalized = normalize(message);

        if let Some(cmd) = detect_global_command(&normalized) {
            session.reset_to_idle();
            return Ok(match cmd {
                GlobalCommand::Menu => welcome_reply(shop),
                GlobalCommand::Back => welcome_reply(shop),
            });
        }
        if session.force_welcome {
            session.force_welcome = false;
        }
        if is_cancellation_keyword(&normalized) && !matches!(session.state, DialogueState::Idle) {
            session.intent = Some(Intent::Cancel);
            session.state = DialogueState::AskPhone;
            return Ok(HandleResult::text("De acuerdo, vamos a cancelar una reserva. ¿Cuál es tu número de teléfono?"));
        }

        let state = std::mem::replace(&mut session.state, DialogueState::Idle);
        match state {
            DialogueState::Idle => self.on_idle(session, shop, &normalized, origin).await,
            DialogueState::PickService => self.on_pick_service(session, shop, message, &normalized).await,
            DialogueState::PickStaff { service_id } => {
                self.on_pick_staff(session, shop, message, &normalized, service_id).await
            }
            DialogueState::PickDate { service_id, professional_id } => {
                self.on_pick_date(session, shop, message, &normalized, service_id, professional_id).await
            }
            DialogueState::PickTime { service_id, professional_id, date } => {
                self.on_pick_time(session, shop, message, &normalized, service_id, professional_id, date).await
            }
            DialogueState::DisambiguateAmPm { service_id, professional_id, date, am, pm } => {
                self.on_disambiguate(session, &normalized, service_id, professional_id, date, am, pm).await
            }
            DialogueState::CollectName { service_id, professional_id, date, time } => {
                self.on_collect_name(session, message, service_id, professional_id, date, time).await
            }
            DialogueState::CollectPhone { service_id, professional_id, date, time, name } => {
                self.on_collect_phone(session, shop, message, service_id, professional_id, date, time, name).await
            }
            DialogueState::ConfirmBooking { service_id, professional_id, date, time, name, phone } => {
                self.on_confirm_booking(
                    session, shop, &normalized, service_id, professional_id, date, time, name, phone,
                )
                .await
            }
            DialogueState::PostConfirmBooking => self.on_post_confirm(session, &normalized, true).await,
            DialogueState::AskPhone => self.on_ask_phone(session, shop, message).await,
            DialogueState::OfferRetryPhone => self.on_offer_retry_phone(session, shop, &normalized).await,
            DialogueState::PickReservation { candidates } => {
                self.on_pick_reservation(session, message, &normalized, candidates).await
            }
            DialogueState::ConfirmCancel { reservation_id } => {
                self.on_confirm_cancel(session, shop, &normalized, reservation_id).await
            }
            DialogueState::PostConfirmCancel => self.on_post_confirm(session, &normalized, false).await,
            DialogueState::Answering => self.on_answering(session, shop, message, &normalized).await,
            DialogueState::AskMore => self.on_ask_more(session, &normalized).await,
        }
    }

    async fn on_idle(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        normalized: &str,
        origin: Origin,
    ) -> Result<HandleResult, EngineError> {
        let mut intent = detect_intent_keyword(normalized);
        if intent.is_none() && matches!(origin, Origin::Text) {
            if let Some(nlp) = &self.nlp {
                let extracted = nlp
                    .extract(normalized, "intent", serde_json::json!({"shop_id": shop.id}))
                    .await
                    .map_err(EngineError::External)?;
                intent = match extracted.as_deref() {
                    Some("book") => Some(Intent::Book),
                    Some("cancel") => Some(Intent::Cancel),
                    Some("faq") => Some(Intent::Faq),
                    _ => None,
                };
            }
        }

        match intent {
            Some(Intent::Book) => {
                session.intent = Some(Intent::Book);
                let services = self.services.find_by_shop(shop.id).await?;
                if services.len() == 1 {
                    let service = &services[0];
                    return self.enter_pick_date_or_staff(session, shop, service.id.unwrap_or_default()).await;
                }
                session.state = DialogueState::PickService;
                Ok(services_prompt(&services))
            }
            Some(Intent::Cancel) => {
                session.intent = Some(Intent::Cancel);
                session.state = DialogueState::AskPhone;
                Ok(HandleResult::text("¿Cuál es el número de teléfono de la reserva?"))
            }
            Some(Intent::Faq) => {
                session.intent = Some(Intent::Faq);
                session.state = DialogueState::Answering;
                Ok(HandleResult::text("Claro, ¿qué te gustaría saber? (horarios, precios...)"))
            }
            None => Ok(welcome_reply(shop)),
        }
    }

    async fn enter_pick_date_or_staff(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        service_id: i64,
    ) -> Result<HandleResult, EngineError> {
        if shop.enable_staff_selection {
            session.state = DialogueState::PickStaff { service_id };
            let professionals = self.professionals.find_active_by_shop(shop.id).await?;
            Ok(staff_prompt(&professionals, shop.staff_selection_required))
        } else {
            session.state = DialogueState::PickDate { service_id, professional_id: None };
            Ok(HandleResult::text("¿Qué día te viene bien? (ej. 20/09/2025)"))
        }
    }

    async fn on_pick_service(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        message: &str,
        normalized: &str,
    ) -> Result<HandleResult, EngineError> {
        let services = self.services.find_by_shop(shop.id).await?;
        let index = resolve_selection(message, normalized, "SERV", &services.iter().map(|s| s.name.clone()).collect::<Vec<_>>());

        let Some(index) = index else {
            return Ok(services_prompt(&services));
        };
        let Some(service) = services.get(index) else {
            return Ok(services_prompt(&services));
        };
        self.enter_pick_date_or_staff(session, shop, service.id.unwrap_or_default()).await
    }

    async fn on_pick_staff(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        message: &str,
        normalized: &str,
        service_id: i64,
    ) -> Result<HandleResult, EngineError> {
        let professionals = self.professionals.find_active_by_shop(shop.id).await?;

        if normalized == "pel_any" || normalized.contains("cualquiera") {
            if shop.staff_selection_required {
                return Ok(staff_prompt(&professionals, true));
            }
            session.state = DialogueState::PickDate { service_id, professional_id: None };
            return Ok(HandleResult::text("¿Qué día te viene bien? (ej. 20/09/2025)"));
        }

        let names: Vec<String> = professionals.iter().map(|p| p.name.clone()).collect();
        let index = resolve_selection(message, normalized, "PEL", &names);
        let Some(index) = index.and_then(|i| professionals.get(i)) else {
            return Ok(staff_prompt(&professionals, shop.staff_selection_required));
        };
        session.state = DialogueState::PickDate { service_id, professional_id: index.id };
        Ok(HandleResult::text("¿Qué día te viene bien? (ej. 20/09/2025)"))
    }

    async fn on_pick_date(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        message: &str,
        normalized: &str,
        service_id: i64,
        professional_id: Option<i64>,
    ) -> Result<HandleResult, EngineError> {
        let now = self.now_in_shop_tz(shop)?;
        let today = now.date_naive();

        let mut date = parse_date(normalized, today);
        if date.is_none() {
            if let Some(nlp) = &self.nlp {
                let extracted = nlp
                    .extract(message, "date", serde_json::json!({"shop_id": shop.id}))
                    .await
                    .map_err(EngineError::External)?;
                date = extracted.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());
            }
        }

        let Some(date) = date else {
            session.state = DialogueState::PickDate { service_id, professional_id };
            return Ok(HandleResult::text(
                "No he entendido la fecha. ¿Puedes indicarla como DD/MM/AAAA?",
            ));
        };

        if let Err(rejection) = check_date(shop, date, today) {
            session.state = DialogueState::PickDate { service_id, professional_id };
            return Ok(HandleResult::text(date_rejection_message(rejection)));
        }

        self.enter_pick_time(session, shop, service_id, professional_id, date).await
    }

    async fn enter_pick_time(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        service_id: i64,
        professional_id: Option<i64>,
        date: NaiveDate,
    ) -> Result<HandleResult, EngineError> {
        let slots = self.compute_slots(shop, service_id, professional_id, date).await?;
        if slots.is_empty() {
            session.state = DialogueState::PickDate { service_id, professional_id };
            return Ok(HandleResult::text(
                "No quedan horas libres ese día. ¿Quieres probar con otra fecha?",
            ));
        }
        session.state = DialogueState::PickTime { service_id, professional_id, date: date.format("%Y-%m-%d").to_string() };
        Ok(hours_reply("Estas son las horas disponibles:", &slots))
    }

    async fn compute_slots(
        &self,
        shop: &ShopConfig,
        service_id: i64,
        professional_id: Option<i64>,
        date: NaiveDate,
    ) -> Result<Vec<String>, EngineError> {
        let service = self.services.find_by_id(service_id, shop.id).await?;
        let duration = service.map(|s| s.duration_minutes).unwrap_or(30);
        let date_str = date.format("%Y-%m-%d").to_string();

        if let Some(professional_id) = professional_id {
            let reservations = self
                .reservations
                .find_confirmed_by_shop_date_professional(shop.id, &date_str, professional_id)
                .await?;
            let busy = if let Some(calendar) = &self.calendar {
                let tz: chrono_tz::Tz = shop.tz.parse().map_err(|_| EngineError::InvalidTimezone(shop.tz.clone()))?;
                let day_start = tz
                    .from_local_datetime(&date.and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap()))
                    .single()
                    .ok_or_else(|| EngineError::InvalidTimezone(shop.tz.clone()))?
                    .with_timezone(&Utc);
                let day_end = day_start + chrono::Duration::days(1);
                calendar
                    .get_busy_times(&shop.calendar_id, day_start, day_end)
                    .await
                    .map_err(EngineError::External)?
                    .into_iter()
                    .map(|(s, e)| {
                        let s_local = s.with_timezone(&tz);
                        let e_local = e.with_timezone(&tz);
                        (s_local.hour_minutes(), e_local.hour_minutes())
                    })
                    .collect::<Vec<_>>()
            } else {
                Vec::new()
            };
            Ok(pelu_availability::available_slots_for_professional(
                shop,
                date,
                duration,
                Utc::now(),
                &busy,
                &reservations,
            ))
        } else {
            let cache_key = format!("hours:{}:{}:{}", shop.id, service_id, date_str);
            if let Ok(Some(raw)) = self.kv.get(&cache_key).await {
                if let Ok(slots) = serde_json::from_str::<Vec<String>>(&raw) {
                    return Ok(slots);
                }
            }
            let confirmed = self.reservations.find_confirmed_by_shop_date(shop.id, &date_str).await?;
            let slots = pelu_availability::available_slots(shop, date, duration, Utc::now(), &confirmed);
            if let Ok(json) = serde_json::to_string(&slots) {
                let _ = self.kv.setex(&cache_key, HOURS_TTL_SECONDS, &json).await;
            }
            Ok(slots)
        }
    }

    /// Purges the cached hours for every service at `shop_id` on `date_str`,
    /// not just the one just booked or cancelled: capacity is shop-wide when
    /// no professional is attached, so a single booking changes what every
    /// service can offer that day.
    async fn purge_hours_cache(&self, shop_id: i64, date_str: &str) {
        let services = match self.services.find_by_shop(shop_id).await {
            Ok(services) => services,
            Err(e) => {
                tracing::warn!(shop_id, error = %e, "failed to list services for hours cache purge");
                return;
            }
        };
        for service in &services {
            let Some(service_id) = service.id else { continue };
            let _ = self.kv.delete(&format!("hours:{shop_id}:{service_id}:{date_str}")).await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_pick_time(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        message: &str,
        normalized: &str,
        service_id: i64,
        professional_id: Option<i64>,
        date: String,
    ) -> Result<HandleResult, EngineError> {
        let naive_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive());
        let slots = self.compute_slots(shop, service_id, professional_id, naive_date).await?;

        let mut parsed = normalize_time(normalized);
        if parsed.is_none() {
            if let Some(nlp) = &self.nlp {
                let extracted = nlp
                    .extract(message, "time", serde_json::json!({"shop_id": shop.id}))
                    .await
                    .map_err(EngineError::External)?;
                parsed = extracted.and_then(|s| normalize_time(&normalize(&s)));
            }
        }

        let Some(parsed) = parsed else {
            session.state = DialogueState::PickTime { service_id, professional_id, date };
            return Ok(HandleResult::text("No he entendido la hora. ¿Puedes decirla como HH:MM?"));
        };

        if parsed.ambiguous {
            let (am_h, pm_h) = am_pm_candidates(parsed.h);
            let am_hhmm = format!("{:02}:{:02}", am_h, parsed.m);
            let pm_hhmm = format!("{:02}:{:02}", pm_h, parsed.m);
            let am_free = slots.contains(&am_hhmm);
            let pm_free = slots.contains(&pm_hhmm);
            return match (am_free, pm_free) {
                (true, false) => {
                    session.state = DialogueState::CollectName {
                        service_id,
                        professional_id,
                        date,
                        time: TimeOfDay { h: am_h, m: parsed.m },
                    };
                    Ok(HandleResult::text("Perfecto. ¿Cuál es tu nombre?"))
                }
                (false, true) => {
                    session.state = DialogueState::CollectName {
                        service_id,
                        professional_id,
                        date,
                        time: TimeOfDay { h: pm_h, m: parsed.m },
                    };
                    Ok(HandleResult::text("Perfecto. ¿Cuál es tu nombre?"))
                }
                (true, true) => {
                    session.state = DialogueState::DisambiguateAmPm {
                        service_id,
                        professional_id,
                        date,
                        am: TimeOfDay { h: am_h, m: parsed.m },
                        pm: TimeOfDay { h: pm_h, m: parsed.m },
                    };
                    Ok(HandleResult::text(format!(
                        "¿Por la mañana ({am_hhmm}) o por la tarde ({pm_hhmm})?"
                    )))
                }
                (false, false) => {
                    session.state = DialogueState::PickTime { service_id, professional_id, date };
                    Ok(closest_slots_reply(&slots, am_h * 60 + parsed.m))
                }
            };
        }

        let hour = resolved_hour(&parsed);
        let hhmm = format!("{:02}:{:02}", hour, parsed.m);
        if slots.contains(&hhmm) {
            session.state = DialogueState::CollectName {
                service_id,
                professional_id,
                date,
                time: TimeOfDay { h: hour, m: parsed.m },
            };
            Ok(HandleResult::text("Perfecto. ¿Cuál es tu nombre?"))
        } else {
            session.state = DialogueState::PickTime { service_id, professional_id, date };
            Ok(closest_slots_reply(&slots, hour * 60 + parsed.m))
        }
    }

    async fn on_disambiguate(
        &self,
        session: &mut Session,
        normalized: &str,
        service_id: i64,
        professional_id: Option<i64>,
        date: String,
        am: TimeOfDay,
        pm: TimeOfDay,
    ) -> Result<HandleResult, EngineError> {
        let chosen = if normalized.contains("manana") || normalized.contains("am") {
            Some(am)
        } else if normalized.contains("tarde") || normalized.contains("noche") || normalized.contains("pm") {
            Some(pm)
        } else {
            None
        };

        match chosen {
            Some(time) => {
                session.state = DialogueState::CollectName { service_id, professional_id, date, time };
                Ok(HandleResult::text("Perfecto. ¿Cuál es tu nombre?"))
            }
            None => {
                session.state = DialogueState::DisambiguateAmPm { service_id, professional_id, date, am, pm };
                Ok(HandleResult::text(format!(
                    "¿Por la mañana ({}) o por la tarde ({})?",
                    am.to_hhmm(),
                    pm.to_hhmm()
                )))
            }
        }
    }

    async fn on_collect_name(
        &self,
        session: &mut Session,
        message: &str,
        service_id: i64,
        professional_id: Option<i64>,
        date: String,
        time: TimeOfDay,
    ) -> Result<HandleResult, EngineError> {
        let name = message.trim();
        if name.len() < 2 || name.chars().all(|c| c.is_ascii_digit()) {
            session.state = DialogueState::CollectName { service_id, professional_id, date, time };
            return Ok(HandleResult::text("¿Cuál es tu nombre, por favor?"));
        }
        session.state = DialogueState::CollectPhone {
            service_id,
            professional_id,
            date,
            time,
            name: name.to_string(),
        };
        Ok(HandleResult::text("¿Y tu número de teléfono?"))
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_collect_phone(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        message: &str,
        service_id: i64,
        professional_id: Option<i64>,
        date: String,
        time: TimeOfDay,
        name: String,
    ) -> Result<HandleResult, EngineError> {
        let Some(phone) = crate::phone::parse_phone(message, &shop.country_code) else {
            session.state = DialogueState::CollectPhone { service_id, professional_id, date, time, name };
            return Ok(HandleResult::text(
                "Ese número no parece válido. ¿Puedes escribirlo de nuevo?",
            ));
        };
        let summary = format!(
            "Resumen: {} a las {} para {}. ¿Confirmas? (sí/no)",
            date,
            time.to_hhmm(),
            name
        );
        session.state = DialogueState::ConfirmBooking { service_id, professional_id, date, time, name, phone };
        Ok(HandleResult::text(summary))
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_confirm_booking(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        normalized: &str,
        service_id: i64,
        professional_id: Option<i64>,
        date: String,
        time: TimeOfDay,
        name: String,
        phone: String,
    ) -> Result<HandleResult, EngineError> {
        if is_negative(normalized) {
            session.reset_to_idle();
            return Ok(HandleResult::text("De acuerdo, no confirmamos la reserva. ¿Quieres algo más?"));
        }
        if !is_affirmative(normalized) {
            session.state = DialogueState::ConfirmBooking { service_id, professional_id, date, time, name, phone };
            return Ok(HandleResult::text("¿Confirmas la reserva? (sí/no)"));
        }

        let Some(calendar) = &self.calendar else {
            session.reset_to_idle();
            return Ok(HandleResult::text("El calendario no está disponible ahora mismo, inténtalo más tarde."));
        };

        let naive_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive());
        let naive_time = NaiveTime::from_hms_opt(time.h, time.m, 0).unwrap_or_default();
        let service = self.services.find_by_id(service_id, shop.id).await?;
        let duration = service.as_ref().map(|s| s.duration_minutes).unwrap_or(30);
        let professionals = self.professionals.find_active_by_shop(shop.id).await?;

        let request = CommitRequest {
            service_id,
            professional_id,
            customer_name: name.clone(),
            customer_phone: phone.clone(),
            date: naive_date,
            start_time: naive_time,
            duration_minutes: duration,
            summary: format!("{} - {}", shop.name, service.map(|s| s.name).unwrap_or_default()),
            description: Some(format!("Cliente: {name} · Tel: {phone}")),
        };

        let outcome = commit_reservation(
            &self.reservations,
            self.kv.as_ref(),
            calendar.as_ref(),
            shop,
            shop.num_staff as i64,
            &professionals,
            request,
        )
        .await?;

        self.purge_hours_cache(shop.id, &date).await;

        match outcome {
            CommitOutcome::Committed { .. } => {
                session.state = DialogueState::PostConfirmBooking;
                Ok(HandleResult::text("✅ Reserva confirmada, ¡te esperamos!")
                    .with_secondary("¿Quieres hacer algo más? (*si*/*no*)"))
            }
            CommitOutcome::NoSlot => {
                let fresh = self.compute_slots(shop, service_id, professional_id, naive_date).await?;
                session.state = DialogueState::PickTime { service_id, professional_id, date };
                Ok(hours_reply(
                    "Vaya, esa hora se ocuparon justo antes que tú. Elige otra:",
                    &fresh,
                ))
            }
        }
    }

    async fn on_post_confirm(
        &self,
        session: &mut Session,
        normalized: &str,
        _booking: bool,
    ) -> Result<HandleResult, EngineError> {
        if is_affirmative(normalized) {
            session.reset_to_idle();
            Ok(welcome_reply_bare().with_ui(UiDirective::MainMenu))
        } else if is_negative(normalized) {
            session.reset_to_idle();
            Ok(HandleResult::text("¡Gracias por tu visita! Hasta pronto."))
        } else {
            Ok(HandleResult::text("¿Quieres hacer algo más? (sí/no)"))
        }
    }

    async fn on_ask_phone(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        message: &str,
    ) -> Result<HandleResult, EngineError> {
        let Some(phone) = crate::phone::parse_phone(message, &shop.country_code) else {
            session.state = DialogueState::AskPhone;
            return Ok(HandleResult::text("Ese número no parece válido. ¿Puedes escribirlo de nuevo?"));
        };
        let today = self.now_in_shop_tz(shop)?.date_naive().format("%Y-%m-%d").to_string();
        let matches = self.reservations.find_confirmed_future_by_phone(shop.id, &phone, &today).await?;

        match matches.len() {
            0 => {
                session.state = DialogueState::OfferRetryPhone;
                Ok(HandleResult::text(
                    "No encuentro ninguna reserva con ese número. ¿Quieres probar con otro? (sí/no)",
                ))
            }
            1 => {
                let reservation_id = matches[0].id.unwrap_or_default();
                session.state = DialogueState::ConfirmCancel { reservation_id };
                Ok(HandleResult::text(format!(
                    "Encontré tu reserva del {} a las {}. ¿Confirmas la cancelación? (sí/no)",
                    matches[0].date, matches[0].start_time
                )))
            }
            _ => {
                let candidates: Vec<i64> = matches.iter().filter_map(|r| r.id).collect();
                let choices = matches
                    .iter()
                    .enumerate()
                    .map(|(i, r)| Choice { id: format!("RID_{}", r.id.unwrap_or_default()), label: format!("{} {} ({})", r.date, r.start_time, i + 1) })
                    .collect();
                session.state = DialogueState::PickReservation { candidates };
                Ok(HandleResult::text("Tienes varias reservas. ¿Cuál quieres cancelar?")
                    .with_ui(UiDirective::ResList)
                    .with_choices(choices))
            }
        }
    }

    async fn on_offer_retry_phone(
        &self,
        session: &mut Session,
        _shop: &ShopConfig,
        normalized: &str,
    ) -> Result<HandleResult, EngineError> {
        if is_affirmative(normalized) {
            session.state = DialogueState::AskPhone;
            Ok(HandleResult::text("Dime otro número de teléfono."))
        } else if is_negative(normalized) {
            session.reset_to_idle();
            Ok(welcome_reply_bare().with_ui(UiDirective::MainMenu))
        } else {
            session.state = DialogueState::OfferRetryPhone;
            Ok(HandleResult::text("¿Quieres probar con otro número? (sí/no)"))
        }
    }

    async fn on_pick_reservation(
        &self,
        session: &mut Session,
        message: &str,
        normalized: &str,
        candidates: Vec<i64>,
    ) -> Result<HandleResult, EngineError> {
        let chosen = normalized
            .strip_prefix("rid_")
            .and_then(|n| n.parse::<i64>().ok())
            .filter(|id| candidates.contains(id))
            .or_else(|| parse_ordinal(message).and_then(|i| candidates.get(i - 1).copied()));

        let Some(reservation_id) = chosen else {
            session.state = DialogueState::PickReservation { candidates };
            return Ok(HandleResult::text("No he reconocido esa reserva. Elige una de la lista.")
                .with_ui(UiDirective::ResList));
        };
        session.state = DialogueState::ConfirmCancel { reservation_id };
        Ok(HandleResult::text("¿Confirmas la cancelación de esa reserva? (sí/no)"))
    }

    async fn on_confirm_cancel(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        normalized: &str,
        reservation_id: i64,
    ) -> Result<HandleResult, EngineError> {
        if is_negative(normalized) {
            session.reset_to_idle();
            return Ok(HandleResult::text("De acuerdo, mantenemos tu reserva. ¿Algo más?"));
        }
        if !is_affirmative(normalized) {
            session.state = DialogueState::ConfirmCancel { reservation_id };
            return Ok(HandleResult::text("¿Confirmas la cancelación? (sí/no)"));
        }

        let reservation = self.reservations.find_by_id(reservation_id).await?;
        let Some(calendar) = &self.calendar else {
            session.reset_to_idle();
            return Ok(HandleResult::text("El calendario no está disponible ahora mismo, inténtalo más tarde."));
        };
        let outcome = cancel_reservation(&self.reservations, calendar.as_ref(), shop, reservation_id).await?;

        if let Some(reservation) = reservation {
            self.purge_hours_cache(shop.id, &reservation.date).await;
        }

        session.state = DialogueState::PostConfirmCancel;
        match outcome {
            CancelOutcome::Cancelled => {
                Ok(HandleResult::text("Reserva cancelada.").with_secondary("¿Quieres hacer algo más? (*si*/*no*)"))
            }
            CancelOutcome::NotFound | CancelOutcome::AlreadyCancelled => {
                Ok(HandleResult::text("Esa reserva ya no estaba activa.").with_secondary("¿Algo más? (sí/no)"))
            }
        }
    }

    async fn on_answering(
        &self,
        session: &mut Session,
        shop: &ShopConfig,
        message: &str,
        normalized: &str,
    ) -> Result<HandleResult, EngineError> {
        let answer = if normalized.contains("horario") || normalized.contains("hora") {
            format_hours_summary(shop)
        } else if normalized.contains("precio") {
            let services = self.services.find_by_shop(shop.id).await?;
            format_services_summary(&services)
        } else if let Some(nlp) = &self.nlp {
            nlp.extract(message, "faq_answer", serde_json::json!({"shop_id": shop.id}))
                .await
                .map_err(EngineError::External)?
                .unwrap_or_else(|| "No tengo esa información por ahora.".to_string())
        } else {
            "No tengo esa información por ahora.".to_string()
        };

        session.state = DialogueState::AskMore;
        Ok(HandleResult::text(answer).with_secondary("¿Alguna otra pregunta? (sí/no)"))
    }

    async fn on_ask_more(&self, session: &mut Session, normalized: &str) -> Result<HandleResult, EngineError> {
        if is_affirmative(normalized) {
            session.state = DialogueState::Answering;
            Ok(HandleResult::text("Dime, ¿qué más quieres saber?"))
        } else if is_negative(normalized) {
            session.reset_to_idle();
            Ok(HandleResult::text("¡Gracias por escribirnos! Hasta pronto."))
        } else {
            session.state = DialogueState::AskMore;
            Ok(HandleResult::text("¿Alguna otra pregunta? (sí/no)"))
        }
    }
}

trait HourMinute {
    fn hour_minutes(&self) -> i64;
}

impl HourMinute for chrono::DateTime<chrono_tz::Tz> {
    fn hour_minutes(&self) -> i64 {
        use chrono::Timelike;
        self.hour() as i64 * 60 + self.minute() as i64
    }
}

fn resolve_selection(raw_message: &str, normalized: &str, list_prefix: &str, names: &[String]) -> Option<usize> {
    if let Some((_, index)) = parse_page_index_reply(raw_message, list_prefix) {
        return Some(index);
    }
    if let Some(ordinal) = parse_ordinal(raw_message) {
        return Some(ordinal - 1);
    }
    let normalized_names: Vec<String> = names.iter().map(|n| normalize_for_matching(n)).collect();
    match_name(&normalized_names, normalized)
}

fn welcome_reply(shop: &ShopConfig) -> HandleResult {
    HandleResult::text(format!(
        "¡Hola! Bienvenido a {}. ¿Quieres reservar una cita, cancelar una reserva o tienes una pregunta?",
        shop.name
    ))
    .with_ui(UiDirective::MainMenu)
}

fn welcome_reply_bare() -> HandleResult {
    HandleResult::text("¿Quieres reservar, cancelar o preguntarnos algo?")
}

fn services_prompt(services: &[Service]) -> HandleResult {
    let choices = services
        .iter()
        .enumerate()
        .map(|(i, s)| Choice { id: format!("SERV_P0_{i}"), label: s.name.clone() })
        .collect();
    HandleResult::text("¿Qué servicio quieres reservar?").with_ui(UiDirective::Services).with_choices(choices)
}

fn staff_prompt(professionals: &[Professional], required: bool) -> HandleResult {
    let mut choices: Vec<Choice> = professionals
        .iter()
        .enumerate()
        .map(|(i, p)| Choice { id: format!("PEL_P0_{i}"), label: p.name.clone() })
        .collect();
    if !required {
        choices.push(Choice { id: "PEL_ANY".to_string(), label: "Cualquiera".to_string() });
    }
    HandleResult::text("¿Con quién prefieres la cita?").with_ui(UiDirective::Staff).with_choices(choices)
}

/// Builds the hours reply: `choices` carries only the first page (the one
/// actually rendered this turn), `all_choices` carries every page so the
/// dispatcher's snapshot can serve later `HORA_NEXT_<p>` pages without
/// discarding the slots beyond the first.
fn hours_reply(message: &str, slots: &[String]) -> HandleResult {
    let pages = pelu_availability::paginate(slots, HOURS_PAGE_SIZE);
    let all_choices: Vec<Choice> = pages
        .iter()
        .enumerate()
        .flat_map(|(page, items)| {
            items
                .iter()
                .enumerate()
                .map(move |(i, hhmm)| Choice { id: format!("HORA_P{page}_{i}"), label: hhmm.clone() })
        })
        .collect();
    let first_page: Vec<Choice> = pages
        .first()
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(i, hhmm)| Choice { id: format!("HORA_P0_{i}"), label: hhmm.clone() })
                .collect()
        })
        .unwrap_or_default();

    let mut result = HandleResult::text(message).with_ui(UiDirective::Hours).with_choices(first_page);
    if all_choices.len() > HOURS_PAGE_SIZE {
        result = result.with_all_choices(all_choices);
    }
    result
}

/// Suggests the 4 slots closest to `target_minutes`, distinguishing
/// before-first, after-last, or between in the lead-in message.
fn closest_slots_reply(slots: &[String], target_minutes: i64) -> HandleResult {
    if slots.is_empty() {
        return HandleResult::text("No quedan horas libres ese día. ¿Quieres probar con otra fecha?");
    }
    let to_minutes = |s: &String| -> i64 {
        let (h, m) = s.split_once(':').unwrap_or(("0", "0"));
        h.parse::<i64>().unwrap_or(0) * 60 + m.parse::<i64>().unwrap_or(0)
    };
    let mut ranked: Vec<&String> = slots.iter().collect();
    ranked.sort_by_key(|s| (to_minutes(s) - target_minutes).abs());
    let closest: Vec<String> = ranked.into_iter().take(4).cloned().collect();

    let first = to_minutes(&slots[0]);
    let last = to_minutes(&slots[slots.len() - 1]);
    let lead = if target_minutes < first {
        "Esa hora es antes de que abramos. Las primeras disponibles son:"
    } else if target_minutes > last {
        "Esa hora es después de que cerremos. Las últimas disponibles son:"
    } else {
        "Esa hora ya no está libre. Las más cercanas son:"
    };
    hours_reply(lead, &closest)
}

fn date_rejection_message(rejection: DateRejection) -> &'static str {
    match rejection {
        DateRejection::InPast => "Esa fecha ya ha pasado. ¿Puedes indicar otra?",
        DateRejection::ClosedWeekday => "Ese día de la semana estamos cerrados. ¿Puedes indicar otra fecha?",
        DateRejection::ClosedDate => "Ese día concreto estamos cerrados. ¿Puedes indicar otra fecha?",
        DateRejection::BeyondLeadWindow => "Esa fecha está demasiado lejos para reservar todavía.",
    }
}

fn format_hours_summary(shop: &ShopConfig) -> String {
    if shop.working_hours.is_empty() {
        return "No tenemos horario configurado todavía.".to_string();
    }
    let lines: Vec<String> = shop
        .working_hours
        .iter()
        .map(|(day, ranges)| format!("{}: {}", day, ranges.join(", ")))
        .collect();
    format!("Nuestro horario:\n{}", lines.join("\n"))
}

fn format_services_summary(services: &[Service]) -> String {
    if services.is_empty() {
        return "Todavía no tenemos servicios configurados.".to_string();
    }
    let lines: Vec<String> = services
        .iter()
        .map(|s| format!("{} - {:.2}", s.name, s.price))
        .collect();
    format!("Nuestros servicios:\n{}", lines.join("\n"))
}
