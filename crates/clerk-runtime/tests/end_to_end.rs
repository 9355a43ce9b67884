//! End-to-end flows through the router with faked collaborators.

use async_trait::async_trait;
use clerk_clients::ai::FieldExtractor;
use clerk_clients::defs::DefinitionCache;
use clerk_clients::doc_store::DocumentStore;
use clerk_clients::doc_text::TextExtractor;
use clerk_clients::error::{ClientError, status_is_retryable};
use clerk_clients::ticket::{
    FormDefinition, FormField, FormFieldDef, TicketBackend, TicketInstance,
};
use clerk_core::catalog::TicketKind;
use clerk_core::events::{InboundEvent, OutboundMessage};
use clerk_core::ids::{ArtifactId, UserId};
use clerk_runtime::deps::RouterDeps;
use clerk_runtime::notify::Notifier;
use clerk_runtime::router::EventRouter;
use clerk_store::store::SessionStore;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

// ── Fakes ───────────────────────────────────────────────────────────────────

struct FakeAi {
    replies: Mutex<VecDeque<Value>>,
}

impl FakeAi {
    fn scripted(replies: Vec<Value>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()) })
    }
}

#[async_trait]
impl FieldExtractor for FakeAi {
    async fn extract_json(&self, _system: Option<&str>, _prompt: &str) -> Result<Value, ClientError> {
        Ok(self
            .replies
            .lock()
            .pop_front()
            .expect("unexpected extra AI call"))
    }
}

struct FakeDocs {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    counter: AtomicU32,
}

impl FakeDocs {
    fn seeded(chat_artifacts: &[(&str, &[u8])]) -> Arc<Self> {
        Arc::new(Self {
            blobs: Mutex::new(
                chat_artifacts
                    .iter()
                    .map(|(id, bytes)| ((*id).to_string(), bytes.to_vec()))
                    .collect(),
            ),
            counter: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl DocumentStore for FakeDocs {
    async fn download(&self, artifact: &ArtifactId) -> Result<Vec<u8>, ClientError> {
        self.blobs
            .lock()
            .get(artifact.as_str())
            .cloned()
            .ok_or(ClientError::Api {
                status: 404,
                code: None,
                message: format!("no blob {artifact}"),
                retryable: status_is_retryable(404),
            })
    }

    async fn upload(&self, _name: &str, bytes: &[u8]) -> Result<ArtifactId, ClientError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("stored-{n}");
        let _ = self.blobs.lock().insert(id.clone(), bytes.to_vec());
        Ok(ArtifactId::new(id))
    }
}

struct FakeText;

#[async_trait]
impl TextExtractor for FakeText {
    async fn extract_text(&self, filename: &str, _bytes: &[u8]) -> Result<String, ClientError> {
        Ok(format!("text of {filename}"))
    }
}

struct FakeTickets {
    created: Mutex<Vec<(String, Vec<FormField>, Vec<ArtifactId>)>>,
    counter: AtomicU32,
    fail_next: AtomicBool,
}

impl FakeTickets {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            created: Mutex::new(Vec::new()),
            counter: AtomicU32::new(1),
            fail_next: AtomicBool::new(false),
        })
    }

    fn created(&self) -> Vec<(String, Vec<FormField>, Vec<ArtifactId>)> {
        self.created.lock().clone()
    }

    fn fail_next_create(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TicketBackend for FakeTickets {
    async fn create_ticket(
        &self,
        code: &str,
        fields: &[FormField],
        artifacts: &[ArtifactId],
    ) -> Result<TicketInstance, ClientError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ClientError::Api {
                status: 500,
                code: None,
                message: "backend unavailable".to_string(),
                retryable: true,
            });
        }
        self.created
            .lock()
            .push((code.to_string(), fields.to_vec(), artifacts.to_vec()));
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(TicketInstance { instance_id: format!("T-{n}") })
    }

    async fn fetch_definition(&self, code: &str) -> Result<FormDefinition, ClientError> {
        // Definition mirroring the catalog: backend ids match canonical ids.
        let kind = TicketKind::all()
            .iter()
            .find(|k| k.spec().code == code)
            .expect("unknown definition code");
        Ok(FormDefinition {
            fields: kind
                .spec()
                .fields
                .iter()
                .map(|f| FormFieldDef {
                    id: f.id.to_string(),
                    name: f.label.to_string(),
                    kind: "input".to_string(),
                    options: f.options.iter().map(ToString::to_string).collect(),
                })
                .collect(),
            approval_nodes: 1,
        })
    }
}

#[derive(Default)]
struct FakeNotifier {
    sent: Mutex<Vec<(UserId, OutboundMessage)>>,
}

impl FakeNotifier {
    fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    fn notices(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::Notice { text } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn options_count(&self) -> usize {
        self.messages()
            .iter()
            .filter(|m| matches!(m, OutboundMessage::Options { .. }))
            .count()
    }

    fn last_confirm_token(&self) -> Option<clerk_core::ids::ConfirmToken> {
        self.messages().into_iter().rev().find_map(|m| match m {
            OutboundMessage::Confirm { token, .. } => Some(token),
            _ => None,
        })
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(&self, user: &UserId, message: OutboundMessage) {
        self.sent.lock().push((user.clone(), message));
    }
}

// ── Rig ─────────────────────────────────────────────────────────────────────

struct Rig {
    router: EventRouter,
    notifier: Arc<FakeNotifier>,
    tickets: Arc<FakeTickets>,
}

fn rig(ai_replies: Vec<Value>, chat_artifacts: &[(&str, &[u8])]) -> Rig {
    rig_with_store(ai_replies, chat_artifacts, SessionStore::with_min_interval(0))
}

fn rig_with_store(
    ai_replies: Vec<Value>,
    chat_artifacts: &[(&str, &[u8])],
    store: SessionStore,
) -> Rig {
    let notifier = Arc::new(FakeNotifier::default());
    let tickets = FakeTickets::new();
    let deps = Arc::new(RouterDeps {
        store,
        notifier: notifier.clone(),
        ai: FakeAi::scripted(ai_replies),
        docs: FakeDocs::seeded(chat_artifacts),
        text: Arc::new(FakeText),
        tickets: tickets.clone(),
        defs: DefinitionCache::new(),
        portal_base: "https://portal.test".to_string(),
    });
    Rig { router: EventRouter::new(deps), notifier, tickets }
}

fn text(id: &str, user: &str, body: &str) -> InboundEvent {
    InboundEvent::Text { event_id: id.into(), user: user.into(), text: body.to_string() }
}

fn file(id: &str, user: &str, artifact: &str, name: &str) -> InboundEvent {
    InboundEvent::File {
        event_id: id.into(),
        user: user.into(),
        artifact: artifact.into(),
        display_name: name.to_string(),
    }
}

fn button(id: &str, user: &str, action: &str, payload: Value) -> InboundEvent {
    InboundEvent::Button {
        event_id: id.into(),
        user: user.into(),
        action: action.to_string(),
        payload,
    }
}

fn leave_reply() -> Value {
    json!({
        "ticket_kind": "leave",
        "fields": {
            "leave_type": "annual",
            "start_date": "2026-09-01",
            "end_date": "2026-09-03",
            "days": 3,
            "reason": "family trip"
        },
        "missing": [],
        "unclear": null
    })
}

// ── Generic flow ────────────────────────────────────────────────────────────

#[tokio::test]
async fn leave_request_files_a_ticket_end_to_end() {
    let r = rig(vec![leave_reply()], &[]);

    r.router.handle(text("e1", "u1", "3 days off in September please")).await;
    let token = r.notifier.last_confirm_token().expect("confirmation card");

    r.router
        .handle(button("e2", "u1", "confirm", json!({"token": token.as_str()})))
        .await;

    let created = r.tickets.created();
    assert_eq!(created.len(), 1);
    let (code, fields, artifacts) = &created[0];
    assert_eq!(code, "LEAVE-01");
    assert!(artifacts.is_empty());
    assert!(fields.iter().any(|f| f.id == "leave_type" && f.value == json!("annual")));

    let notices = r.notifier.notices();
    let success = notices.last().unwrap();
    assert!(success.contains("T-1"));
    // 3 days of leave gets the routine-approval note.
    assert!(success.contains("routine"));
}

#[tokio::test]
async fn missing_fields_prompt_then_complete() {
    let first = json!({
        "ticket_kind": "leave",
        "fields": {"leave_type": "sick", "reason": "flu"},
        "missing": ["start_date", "end_date", "days"],
        "unclear": null
    });
    let second = json!({
        "ticket_kind": "leave",
        "fields": {
            "start_date": "2026-09-01", "end_date": "2026-09-01", "days": 1,
            "leave_type": "sick", "reason": "flu"
        },
        "missing": [],
        "unclear": null
    });
    let r = rig(vec![first, second], &[]);

    r.router.handle(text("e1", "u1", "sick leave, I have the flu")).await;
    let notices = r.notifier.notices();
    assert!(notices.last().unwrap().contains("Start date"));

    r.router.handle(text("e2", "u1", "just tomorrow, one day")).await;
    assert!(r.notifier.last_confirm_token().is_some());
}

#[tokio::test]
async fn unclassifiable_text_gets_the_greeting() {
    let reply = json!({"ticket_kind": null, "fields": {}, "missing": [], "unclear": null});
    let r = rig(vec![reply], &[]);

    r.router.handle(text("e1", "u1", "hello there")).await;
    assert!(r.notifier.notices().last().unwrap().contains("approval tickets"));
}

#[tokio::test]
async fn link_only_kind_hands_off_to_the_portal() {
    let reply = json!({
        "ticket_kind": "onboarding",
        "fields": {},
        "missing": [],
        "unclear": null
    });
    let r = rig(vec![reply], &[]);

    r.router.handle(text("e1", "u1", "new hire starting Monday")).await;
    let opened = r.notifier.messages().into_iter().find_map(|m| match m {
        OutboundMessage::OpenExternally { url, .. } => Some(url),
        _ => None,
    });
    assert_eq!(opened.unwrap(), "https://portal.test/new?definition=ONBOARD-01");
    assert!(r.tickets.created().is_empty());
}

#[tokio::test]
async fn cancel_discards_the_session() {
    let first = json!({
        "ticket_kind": "leave",
        "fields": {"leave_type": "annual"},
        "missing": ["start_date", "end_date", "days", "reason"],
        "unclear": null
    });
    let r = rig(vec![first], &[]);

    r.router.handle(text("e1", "u1", "annual leave")).await;
    r.router.handle(text("e2", "u1", "cancel")).await;

    assert!(r.notifier.notices().last().unwrap().contains("Cancelled"));
    assert!(r.router.store().get(&"u1".into(), chrono::Utc::now()).is_none());
}

// ── Dedup and rate limiting ─────────────────────────────────────────────────

#[tokio::test]
async fn redelivered_event_is_handled_once() {
    // One scripted reply: a second classification would panic the fake.
    let r = rig(vec![leave_reply()], &[]);

    let ev = text("e1", "u1", "3 days off");
    r.router.handle(ev.clone()).await;
    r.router.handle(ev).await;

    let confirms = r
        .notifier
        .messages()
        .iter()
        .filter(|m| matches!(m, OutboundMessage::Confirm { .. }))
        .count();
    assert_eq!(confirms, 1);
}

#[tokio::test]
async fn rapid_messages_are_throttled() {
    let r = rig_with_store(vec![leave_reply()], &[], SessionStore::new());

    r.router.handle(text("e1", "u1", "3 days off")).await;
    r.router.handle(text("e2", "u1", "make it four")).await;

    assert!(r.notifier.notices().last().unwrap().contains("too quickly"));
}

// ── Seal flow ───────────────────────────────────────────────────────────────

fn seal_intent() -> Value {
    json!({"ticket_kind": "seal_usage", "fields": {}, "missing": [], "unclear": null})
}

fn seal_doc(doc_type: &str) -> Value {
    json!({"document_type": doc_type})
}

#[tokio::test(start_paused = true)]
async fn seal_batch_debounces_then_offers_choices_then_confirms() {
    let r = rig(
        vec![seal_intent(), seal_doc("contract"), seal_doc("agreement")],
        &[("chat-1", b"pdf1"), ("chat-2", b"pdf2")],
    );

    r.router.handle(text("e1", "u1", "I need two contracts stamped")).await;
    assert!(r.notifier.notices().last().unwrap().contains("upload"));

    r.router.handle(file("e2", "u1", "chat-1", "sales.pdf")).await;
    r.router.handle(file("e3", "u1", "chat-2", "nda.pdf")).await;

    // Second file extends the debounce to 8 seconds.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(r.notifier.options_count(), 0);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(r.notifier.options_count(), 1);

    let groups = r
        .notifier
        .messages()
        .into_iter()
        .find_map(|m| match m {
            OutboundMessage::Options { groups, .. } => Some(groups),
            _ => None,
        })
        .unwrap();
    // Two files x two explicit fields.
    assert_eq!(groups.len(), 4);

    // Answer every selection.
    let mut i = 0;
    for row in 0..2u64 {
        for (field, value) in [("review_flag", "yes"), ("delivery_method", "courier")] {
            i += 1;
            r.router
                .handle(button(
                    &format!("c{i}"),
                    "u1",
                    "choose",
                    json!({"field": field, "value": value, "row": row}),
                ))
                .await;
        }
    }

    let token = r.notifier.last_confirm_token().expect("confirmation card");
    r.router
        .handle(button("e9", "u1", "confirm", json!({"token": token.as_str()})))
        .await;

    let created = r.tickets.created();
    assert_eq!(created.len(), 1);
    let (code, _, artifacts) = &created[0];
    assert_eq!(code, "SEAL-01");
    assert_eq!(artifacts.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn first_file_alone_processes_after_two_seconds() {
    let r = rig(vec![seal_intent(), seal_doc("letter")], &[("chat-1", b"pdf1")]);

    r.router.handle(text("e1", "u1", "seal this please")).await;
    r.router.handle(file("e2", "u1", "chat-1", "letter.pdf")).await;

    tokio::time::sleep(Duration::from_millis(1_900)).await;
    assert_eq!(r.notifier.options_count(), 0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(r.notifier.options_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn done_closes_the_batch_immediately() {
    let r = rig(vec![seal_intent(), seal_doc("contract")], &[("chat-1", b"pdf1")]);

    r.router.handle(text("e1", "u1", "seal request")).await;
    r.router.handle(file("e2", "u1", "chat-1", "contract.pdf")).await;
    r.router.handle(text("e3", "u1", "done")).await;

    // No debounce wait: the selection matrix is already out.
    assert_eq!(r.notifier.options_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_debounce_timer_is_a_no_op() {
    let r = rig(
        vec![seal_intent(), seal_doc("contract"), seal_doc("letter")],
        &[("chat-1", b"p1"), ("chat-2", b"p2")],
    );

    r.router.handle(text("e1", "u1", "seal these")).await;
    r.router.handle(file("e2", "u1", "chat-1", "a.pdf")).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    r.router.handle(file("e3", "u1", "chat-2", "b.pdf")).await;

    // Past the first timer's deadline: it must not have fired.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(r.notifier.options_count(), 0);

    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(r.notifier.options_count(), 1);
}

#[tokio::test]
async fn double_confirm_files_exactly_one_ticket() {
    let r = rig(vec![leave_reply()], &[]);

    r.router.handle(text("e1", "u1", "3 days off")).await;
    let token = r.notifier.last_confirm_token().unwrap();

    r.router
        .handle(button("e2", "u1", "confirm", json!({"token": token.as_str()})))
        .await;
    r.router
        .handle(button("e3", "u1", "confirm", json!({"token": token.as_str()})))
        .await;

    assert_eq!(r.tickets.created().len(), 1);
    assert!(r.notifier.notices().last().unwrap().contains("already submitted"));
}

#[tokio::test]
async fn superseding_confirmation_retires_the_earlier_card() {
    let r = rig(vec![seal_intent(), seal_doc("contract")], &[("chat-1", b"pdf1")]);

    r.router.handle(text("e1", "u1", "seal request")).await;
    r.router.handle(file("e2", "u1", "chat-1", "contract.pdf")).await;
    r.router.handle(text("e3", "u1", "done")).await;

    r.router
        .handle(button("c1", "u1", "choose", json!({"field": "review_flag", "value": "yes", "row": 0})))
        .await;
    r.router
        .handle(button("c2", "u1", "choose", json!({"field": "delivery_method", "value": "courier", "row": 0})))
        .await;
    let first = r.notifier.last_confirm_token().expect("confirmation card");

    // A late correction re-finalizes with a fresh card.
    r.router
        .handle(button("c3", "u1", "choose", json!({"field": "delivery_method", "value": "pickup", "row": 0})))
        .await;
    let second = r.notifier.last_confirm_token().unwrap();
    assert_ne!(second, first);

    // The old card is dead; only the fresh one can file.
    r.router
        .handle(button("e4", "u1", "confirm", json!({"token": first.as_str()})))
        .await;
    assert!(r.tickets.created().is_empty());
    assert!(r.notifier.notices().last().unwrap().contains("expired"));

    r.router
        .handle(button("e5", "u1", "confirm", json!({"token": second.as_str()})))
        .await;
    assert_eq!(r.tickets.created().len(), 1);
}

#[tokio::test]
async fn backend_failure_hands_out_a_fresh_confirmation() {
    let r = rig(vec![leave_reply()], &[]);

    r.router.handle(text("e1", "u1", "3 days off")).await;
    let first = r.notifier.last_confirm_token().unwrap();

    r.tickets.fail_next_create();
    r.router
        .handle(button("e2", "u1", "confirm", json!({"token": first.as_str()})))
        .await;
    assert!(r.tickets.created().is_empty());

    // The failed attempt consumed the token, so a new card goes out and the
    // retry succeeds instead of hitting "already submitted".
    let second = r.notifier.last_confirm_token().unwrap();
    assert_ne!(second, first);
    r.router
        .handle(button("e3", "u1", "confirm", json!({"token": second.as_str()})))
        .await;
    assert_eq!(r.tickets.created().len(), 1);
    assert!(r.notifier.notices().last().unwrap().contains("T-1"));
}

#[tokio::test]
async fn seal_confirmation_waits_for_a_missing_document_type() {
    let follow_up = json!({
        "ticket_kind": "seal_usage",
        "fields": {"document_type": "contract"},
        "missing": [],
        "unclear": null
    });
    // The scan yields no inferable fields.
    let r = rig(vec![seal_intent(), json!({}), follow_up], &[("chat-1", b"pdf1")]);

    r.router.handle(text("e1", "u1", "seal request")).await;
    r.router.handle(file("e2", "u1", "chat-1", "scan.pdf")).await;
    r.router.handle(text("e3", "u1", "done")).await;

    r.router
        .handle(button("c1", "u1", "choose", json!({"field": "review_flag", "value": "yes", "row": 0})))
        .await;
    r.router
        .handle(button("c2", "u1", "choose", json!({"field": "delivery_method", "value": "pickup", "row": 0})))
        .await;

    // Every button is answered but the document type was never captured.
    assert!(r.notifier.last_confirm_token().is_none());
    assert!(r.notifier.notices().last().unwrap().contains("Document type"));

    r.router.handle(text("e4", "u1", "it's a contract")).await;
    assert!(r.notifier.last_confirm_token().is_some());
}

#[tokio::test]
async fn unreadable_replies_during_a_batch_earn_a_cancel_hint() {
    let r = rig(
        vec![seal_intent(), json!("??"), json!("??"), json!("??")],
        &[],
    );

    r.router.handle(text("e1", "u1", "seal request")).await;
    r.router.handle(text("e2", "u1", "asdfgh")).await;
    assert!(r.notifier.notices().last().unwrap().contains("didn't catch"));
    r.router.handle(text("e3", "u1", "qwerty")).await;
    assert!(r.notifier.notices().last().unwrap().contains("didn't catch"));
    r.router.handle(text("e4", "u1", "zxcvbn")).await;
    assert!(r.notifier.notices().last().unwrap().contains("cancel"));
}

#[tokio::test]
async fn malformed_button_payload_is_tolerated() {
    let r = rig(vec![], &[]);
    r.router.handle(button("e1", "u1", "choose", json!({"oops": true}))).await;
    assert!(r.notifier.notices().last().unwrap().contains("button"));
}

// ── Unattributed files ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unattributed_file_prompts_for_destination_then_routes_to_seal() {
    let r = rig(vec![seal_doc("contract")], &[("chat-1", b"pdf1")]);

    r.router.handle(file("e1", "u1", "chat-1", "mystery.pdf")).await;
    // The destination question waits three minutes for clarifying text.
    tokio::time::sleep(Duration::from_secs(179)).await;
    assert_eq!(r.notifier.options_count(), 0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(r.notifier.options_count(), 1);

    // And it is asked exactly once.
    tokio::time::sleep(Duration::from_secs(240)).await;
    assert_eq!(r.notifier.options_count(), 1);

    r.router
        .handle(button("e2", "u1", "route", json!({"value": "seal_usage"})))
        .await;

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    // The destination prompt plus the seal selection matrix.
    assert_eq!(r.notifier.options_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn clarifying_text_routes_the_stash_before_the_prompt() {
    let r = rig(vec![seal_doc("contract")], &[("chat-1", b"pdf1")]);

    r.router.handle(file("e1", "u1", "chat-1", "mystery.pdf")).await;
    r.router.handle(text("e2", "u1", "those are for a seal request")).await;

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    // Only the seal selection matrix; the destination question never fired.
    assert_eq!(r.notifier.options_count(), 1);
    tokio::time::sleep(Duration::from_secs(240)).await;
    assert_eq!(r.notifier.options_count(), 1);
}

// ── Invoice flow ────────────────────────────────────────────────────────────

#[tokio::test]
async fn invoice_collects_two_documents_then_user_fields() {
    let intent = json!({"ticket_kind": "invoice", "fields": {}, "missing": [], "unclear": null});
    let settlement_fields = json!({"amount": "1200.50", "settlement_no": "S-9"});
    let contract_fields = json!({"buyer_name": "Acme", "tax_id": "91310", "contract_no": "C-7"});
    let user_fields = json!({
        "ticket_kind": "invoice",
        "fields": {"invoice_type": "VAT special", "invoice_items": "software services"},
        "missing": [],
        "unclear": null
    });
    let r = rig(
        vec![intent, settlement_fields, contract_fields, user_fields],
        &[("chat-1", b"xlsx"), ("chat-2", b"pdf")],
    );

    r.router.handle(text("e1", "u1", "I need an invoice issued")).await;
    assert!(r.notifier.notices().last().unwrap().contains("settlement"));

    r.router.handle(file("e2", "u1", "chat-1", "q3-settlement.xlsx")).await;
    assert!(r.notifier.notices().last().unwrap().contains("waiting for the contract"));

    r.router.handle(file("e3", "u1", "chat-2", "sales-contract.pdf")).await;
    assert!(r.notifier.notices().last().unwrap().contains("Invoice type"));

    r.router.handle(text("e4", "u1", "VAT special, software services")).await;
    let token = r.notifier.last_confirm_token().expect("confirmation card");

    r.router
        .handle(button("e5", "u1", "confirm", json!({"token": token.as_str()})))
        .await;

    let created = r.tickets.created();
    assert_eq!(created.len(), 1);
    let (code, fields, artifacts) = &created[0];
    assert_eq!(code, "INVOICE-01");
    assert_eq!(artifacts.len(), 2);
    assert!(fields.iter().any(|f| f.id == "buyer_name" && f.value == json!("Acme")));
}

#[tokio::test]
async fn invoice_clarification_failures_are_counted() {
    let intent = json!({"ticket_kind": "invoice", "fields": {}, "missing": [], "unclear": null});
    let settlement_fields = json!({"amount": "1200.50", "settlement_no": "S-9"});
    let contract_fields = json!({"buyer_name": "Acme", "tax_id": "91310", "contract_no": "C-7"});
    let r = rig(
        vec![intent, settlement_fields, contract_fields, json!("??"), json!("??"), json!("??")],
        &[("chat-1", b"xlsx"), ("chat-2", b"pdf")],
    );

    r.router.handle(text("e1", "u1", "invoice please")).await;
    r.router.handle(file("e2", "u1", "chat-1", "q3-settlement.xlsx")).await;
    r.router.handle(file("e3", "u1", "chat-2", "sales-contract.pdf")).await;
    assert!(r.notifier.notices().last().unwrap().contains("Invoice type"));

    r.router.handle(text("e4", "u1", "asdfgh")).await;
    assert!(r.notifier.notices().last().unwrap().contains("didn't catch"));
    r.router.handle(text("e5", "u1", "qwerty")).await;
    r.router.handle(text("e6", "u1", "zxcvbn")).await;
    assert!(r.notifier.notices().last().unwrap().contains("cancel"));
    assert!(r.notifier.last_confirm_token().is_none());
}
