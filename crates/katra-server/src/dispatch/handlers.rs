//! One function per wire method, each matching `dispatch::HandlerFn`.
//!
//! Each handler deserializes its own params type, calls exactly one
//! `katra_core::Engine` method, and serializes the outcome. No handler here
//! touches the hot tier, index, or audit log directly — that stays behind
//! the engine's own method surface.

use serde::Deserialize;
use serde_json::{json, Value};

use katra_core::engine::Engine;
use katra_core::error::{EngineError, Result};
use katra_core::memory::{Isolation, PeriodType, RecallInput, RecordType, RememberInput};
use katra_core::session::Session;

fn parse<T: serde::de::DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| EngineError::InvalidInput(e.to_string()))
}

fn require_registered(session: &Session) -> Result<()> {
    if !session.registered {
        return Err(EngineError::InvalidInput("session is not registered".into()));
    }
    Ok(())
}

// --- remember / learn / decide -------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RememberParams {
    content: String,
    #[serde(default)]
    record_type: Option<RecordType>,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    component: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    emotion_intensity: f64,
    #[serde(default)]
    emotion_type: Option<String>,
    #[serde(default)]
    context_question: Option<String>,
    #[serde(default)]
    context_resolution: Option<String>,
    #[serde(default)]
    context_uncertainty: Option<String>,
    #[serde(default)]
    related_to: Vec<String>,
    #[serde(default)]
    marked_important: bool,
    #[serde(default)]
    isolation: Isolation,
    #[serde(default)]
    team_name: Option<String>,
}

impl From<RememberParams> for RememberInput {
    fn from(p: RememberParams) -> Self {
        RememberInput {
            content: p.content,
            record_type: p.record_type,
            importance: p.importance,
            response: p.response,
            context: p.context,
            component: p.component,
            tags: p.tags,
            emotion_intensity: p.emotion_intensity,
            emotion_type: p.emotion_type,
            context_question: p.context_question,
            context_resolution: p.context_resolution,
            context_uncertainty: p.context_uncertainty,
            related_to: p.related_to,
            marked_important: p.marked_important,
        }
    }
}

fn remember_with_default(
    engine: &Engine,
    session: &mut Session,
    params: Value,
    default_type: RecordType,
) -> Result<Value> {
    require_registered(session)?;
    let parsed: RememberParams = parse(params)?;
    let isolation = parsed.isolation;
    let team_name = parsed.team_name.clone();
    let outcome = engine.remember(session, parsed.into(), default_type, isolation, team_name)?;
    Ok(json!({ "record": outcome.record }))
}

pub fn remember(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    remember_with_default(engine, session, params, RecordType::Interaction)
}

pub fn learn(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    remember_with_default(engine, session, params, RecordType::Knowledge)
}

pub fn decide(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    remember_with_default(engine, session, params, RecordType::Decision)
}

// --- recall / recent / memory_digest ---------------------------------------

pub fn recall(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let input: RecallInput = parse(params)?;
    let requester_id = session.owner_id.clone();
    let outcome = engine.recall(session, &requester_id, input)?;
    Ok(json!({ "records": outcome.records }))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RecentParams {
    #[serde(default)]
    limit: u32,
    #[serde(default)]
    record_type: Option<RecordType>,
}

pub fn recent(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: RecentParams = parse(params)?;
    let requester_id = session.owner_id.clone();
    let outcome = engine.recent(
        session,
        &requester_id,
        katra_core::engine::RecentFilter { limit: p.limit, record_type: p.record_type },
    )?;
    Ok(json!({ "records": outcome.records }))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MemoryDigestParams {
    #[serde(default)]
    period_type: Option<PeriodType>,
    #[serde(default)]
    limit: u32,
}

pub fn memory_digest(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: MemoryDigestParams = parse(params)?;
    let digests = engine.memory_digest(&session.owner_id, p.period_type, p.limit)?;
    Ok(json!({ "digests": digests }))
}

// --- session lifecycle ------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RegisterParams {
    name: String,
    #[serde(default)]
    role: Option<String>,
}

pub fn register(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    let p: RegisterParams = parse(params)?;
    let outcome = engine.register(session, &p.name, p.role)?;
    Ok(json!({ "owner_id": outcome.owner_id, "onboarding": outcome.onboarding }))
}

fn status_json(outcome: &katra_core::engine::StatusOutcome) -> Value {
    json!({
        "chosen_name": outcome.chosen_name,
        "owner_id": outcome.owner_id,
        "registered": outcome.registered,
        "memories_added": outcome.memories_added,
        "queries_processed": outcome.queries_processed,
    })
}

pub fn whoami(engine: &Engine, session: &mut Session, _params: Value) -> Result<Value> {
    Ok(status_json(&engine.whoami(session)))
}

pub fn status(engine: &Engine, session: &mut Session, _params: Value) -> Result<Value> {
    Ok(status_json(&engine.status(session)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateMetadataParams {
    record_id: String,
    #[serde(default)]
    marked_important: Option<bool>,
    #[serde(default)]
    marked_forgettable: Option<bool>,
    #[serde(default)]
    archived_not_allowed: Option<bool>,
}

pub fn update_metadata(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: UpdateMetadataParams = parse(params)?;
    engine.update_metadata(
        &session.owner_id,
        &p.record_id,
        p.marked_important,
        p.marked_forgettable,
        p.archived_not_allowed,
    )?;
    Ok(json!({}))
}

pub fn review_turn(engine: &Engine, session: &mut Session, _params: Value) -> Result<Value> {
    let record_ids = engine.review_turn(session);
    Ok(json!({ "record_ids": record_ids }))
}

// --- teams -------------------------------------------------------------

fn team_summary_json(summary: &katra_core::engine::TeamSummary) -> Value {
    json!({ "team_name": summary.team_name, "members": summary.members })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TeamNameParams {
    team_name: String,
}

pub fn team_create(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: TeamNameParams = parse(params)?;
    Ok(team_summary_json(&engine.team_create(&session.owner_id, &p.team_name)?))
}

pub fn team_join(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: TeamNameParams = parse(params)?;
    Ok(team_summary_json(&engine.team_join(&session.owner_id, &p.team_name)?))
}

pub fn team_leave(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: TeamNameParams = parse(params)?;
    engine.team_leave(&session.owner_id, &p.team_name)?;
    Ok(json!({}))
}

pub fn team_list(engine: &Engine, _session: &mut Session, params: Value) -> Result<Value> {
    let p: TeamNameParams = parse(params)?;
    Ok(team_summary_json(&engine.team_list(&p.team_name)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SetIsolationParams {
    record_id: String,
    isolation: Isolation,
    #[serde(default)]
    team_name: Option<String>,
}

pub fn set_isolation(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: SetIsolationParams = parse(params)?;
    engine.set_isolation(&session.owner_id, &p.record_id, p.isolation, p.team_name)?;
    Ok(json!({}))
}

// --- mailbox -------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ShareWithParams {
    ci_ids: Vec<String>,
}

pub fn share_with(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: ShareWithParams = parse(params)?;
    engine.share_with(session, p.ci_ids);
    Ok(json!({}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SayParams {
    message: String,
}

pub fn say(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: SayParams = parse(params)?;
    engine.say(session, &p.message)?;
    Ok(json!({}))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct HearParams {
    #[serde(default)]
    last_seen_seq: u64,
}

pub fn hear(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: HearParams = parse(params)?;
    let outcome = engine.hear(&session.owner_id, p.last_seen_seq)?;
    Ok(json!({ "message": outcome.message }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct HearAllParams {
    #[serde(default = "default_max_count")]
    max_count: usize,
}

fn default_max_count() -> usize {
    20
}

pub fn hear_all(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: HearAllParams = parse(params)?;
    let outcome = engine.hear_all(&session.owner_id, p.max_count)?;
    Ok(json!({
        "messages": outcome.messages,
        "more_remain": outcome.more_remain,
        "lost_messages": outcome.lost_messages,
    }))
}

pub fn who_is_here(engine: &Engine, _session: &mut Session, _params: Value) -> Result<Value> {
    Ok(json!({ "owners": engine.who_is_here()? }))
}

// --- lifecycle -------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ArchiveParams {
    record_id: String,
    #[serde(default)]
    reason: String,
}

pub fn archive(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: ArchiveParams = parse(params)?;
    let changed = engine.archive(&session.owner_id, &p.record_id, &p.reason)?;
    Ok(json!({ "changed": changed }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FadeParams {
    record_id: String,
    target_importance: f64,
    #[serde(default)]
    reason: String,
}

pub fn fade(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: FadeParams = parse(params)?;
    let changed = engine.fade(&session.owner_id, &p.record_id, p.target_importance, &p.reason)?;
    Ok(json!({ "changed": changed }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ForgetParams {
    record_id: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    ci_consent: bool,
}

pub fn forget(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: ForgetParams = parse(params)?;
    let removed = engine.forget(&session.owner_id, &p.record_id, p.reason.as_deref(), p.ci_consent)?;
    Ok(json!({ "removed": removed }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ForgetByPatternParams {
    pattern: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    dry_run: bool,
}

pub fn forget_by_pattern(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: ForgetByPatternParams = parse(params)?;
    let outcome = engine.forget_by_pattern(&session.owner_id, &p.pattern, p.reason.as_deref(), p.dry_run)?;
    Ok(json!({ "record_ids": outcome.record_ids, "dry_run": outcome.dry_run }))
}

// --- consolidation -----------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConsolidationRunParams {
    #[serde(default)]
    dry_run: bool,
}

pub fn consolidation_run(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: ConsolidationRunParams = parse(params)?;
    let outcome = engine.consolidation_run(&session.owner_id, p.dry_run)?;
    Ok(json!({
        "orphans_recovered": outcome.orphans_recovered,
        "report": {
            "candidates_considered": outcome.report.candidates_considered,
            "records_archived": outcome.report.records_archived,
            "digests_written": outcome.report.digests_written,
            "files_compacted": outcome.report.files_compacted,
        },
    }))
}

pub fn consolidation_insights(engine: &Engine, session: &mut Session, _params: Value) -> Result<Value> {
    require_registered(session)?;
    let outcome = engine.consolidation_insights(&session.owner_id)?;
    Ok(json!({ "digests": outcome.digests }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConsolidationAcknowledgeParams {
    digest_id: String,
}

pub fn consolidation_acknowledge(engine: &Engine, session: &mut Session, params: Value) -> Result<Value> {
    require_registered(session)?;
    let p: ConsolidationAcknowledgeParams = parse(params)?;
    let acknowledged = engine.consolidation_acknowledge(&session.owner_id, &p.digest_id)?;
    Ok(json!({ "acknowledged": acknowledged }))
}
