use crate::consts::{
    DIALOG_WEBHOOK_PATH, GATHER_SPEECH_TIMEOUT_SECS, GATHER_TIMEOUT_SECS, MAX_SILENT_RETRIES,
    SAY_VOICE,
};
use crate::normalize::normalize;
use crate::store::CompletedRecord;
use crate::twilio_types::{
    GatherAction, GatherChild, HangupAction, ParameterElement, PauseAction, RedirectAction,
    Response, ResponseAction, SayAction,
};

use std::collections::HashMap;
use tracing::debug;

/// The two answers a call must produce before it can complete.  Name is
/// always solicited before job when both are missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Name,
    Job,
}

impl FieldKind {
    /// Accepted form keys for this field, in priority order.  The platform is
    /// inconsistent about spelling, so the first key carrying a non-empty
    /// value wins; key comparison ignores ASCII case.
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            FieldKind::Name => &["name", "user_name", "UserName"],
            FieldKind::Job => &["job", "current_job", "CurrentJob"],
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FieldKind::Name => "name",
            FieldKind::Job => "job",
        }
    }

    /// Pull this field's raw value out of a parsed form body.
    pub fn extract(self, params: &HashMap<String, String>) -> String {
        for alias in self.aliases() {
            for (key, value) in params {
                if key.eq_ignore_ascii_case(alias) && !value.is_empty() {
                    return value.clone();
                }
            }
        }
        String::new()
    }
}

/// Snapshot of one in-progress call, rebuilt every turn from echoed
/// parameters.  Nothing here survives on the server between turns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DialogState {
    pub name: Option<String>,
    pub job: Option<String>,
    pub call_sid: String,
}

impl DialogState {
    /// Reconstruct carried state from the no-input redirect's query
    /// parameters.  Values pass through `normalize` again, which is a no-op
    /// for anything we emitted ourselves.
    pub fn from_carried(params: &HashMap<String, String>, call_sid: String) -> Self {
        Self {
            name: params.get("name").and_then(|v| normalize(v)),
            job: params.get("job").and_then(|v| normalize(v)),
            call_sid,
        }
    }
}

/// Platform call metadata, passed through to the stored record untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallMeta {
    pub from: String,
    pub call_sid: String,
    pub account_sid: String,
    pub call_status: String,
    pub from_city: String,
    pub from_state: String,
    pub from_country: String,
}

impl CallMeta {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let field = |key: &str| params.get(key).cloned().unwrap_or_default();
        Self {
            from: field("From"),
            call_sid: field("CallSid"),
            account_sid: field("AccountSid"),
            call_status: field("CallStatus"),
            from_city: field("FromCity"),
            from_state: field("FromState"),
            from_country: field("FromCountry"),
        }
    }
}

/// What one turn produced: the TwiML to play, and, on the terminal turn, the
/// record to persist.  Persisting is the caller's job so this stays pure.
pub struct TurnOutcome {
    pub response: Response,
    pub record: Option<CompletedRecord>,
}

/// Decide one turn of the dialog.
///
/// Freshly normalized answers override carried values; an absent fresh answer
/// never downgrades a known one.  `retries` counts consecutive no-input
/// redirects; past the cap the call ends with a goodbye instead of looping
/// forever.
pub fn step(
    prior: DialogState,
    raw_name: &str,
    raw_job: &str,
    retries: u32,
    meta: &CallMeta,
) -> TurnOutcome {
    let name = normalize(raw_name).or(prior.name);
    let job = normalize(raw_job).or(prior.job);

    if retries >= MAX_SILENT_RETRIES {
        debug!(call_sid=%prior.call_sid, retries, "silent retry cap reached, giving up");
        return TurnOutcome {
            response: terminal(vec![
                "I wasn't able to hear you. Please call back when you're ready. Goodbye."
                    .to_string(),
            ]),
            record: None,
        };
    }

    match (name, job) {
        (None, None) => {
            debug!(call_sid=%prior.call_sid, "no fields known, starting over with name");
            TurnOutcome {
                response: gather(
                    "I didn't catch your information clearly. Let's start over. \
                     Please say your full name after the beep."
                        .to_string(),
                    FieldKind::Name,
                    &[],
                    retries,
                ),
                record: None,
            }
        }
        (None, Some(job)) => {
            debug!(call_sid=%prior.call_sid, "job known, asking for name");
            TurnOutcome {
                response: gather(
                    "I got your job title, but I didn't catch your name. \
                     Please say your full name after the beep."
                        .to_string(),
                    FieldKind::Name,
                    &[(FieldKind::Job, job.as_str())],
                    retries,
                ),
                record: None,
            }
        }
        (Some(name), None) => {
            debug!(call_sid=%prior.call_sid, "name known, asking for job");
            TurnOutcome {
                response: gather(
                    format!(
                        "Thank you {name}. I didn't catch your job title clearly. \
                         Please say your current job or profession after the beep."
                    ),
                    FieldKind::Job,
                    &[(FieldKind::Name, name.as_str())],
                    retries,
                ),
                record: None,
            }
        }
        (Some(name), Some(job)) => {
            debug!(call_sid=%prior.call_sid, %name, %job, "all fields collected");
            let response = terminal(vec![
                format!("Perfect! Thank you {name}. I've recorded that you work as {job}."),
                "Your information has been saved successfully. Have a wonderful day!".to_string(),
            ]);
            let record = CompletedRecord::new(name, job, meta);
            TurnOutcome {
                response,
                record: Some(record),
            }
        }
    }
}

/// TwiML that ends the call whatever happens.  Used for internal faults so a
/// caller never hears a raw error or a dead line.
pub fn apology() -> Response {
    terminal(vec![
        "I'm sorry, there was a technical error. Please try calling again later.".to_string(),
    ])
}

fn say(text: String) -> SayAction {
    SayAction {
        text,
        voice: Some(SAY_VOICE.to_string()),
        ..Default::default()
    }
}

fn terminal(messages: Vec<String>) -> Response {
    let mut actions = Vec::new();
    let count = messages.len();
    for (idx, message) in messages.into_iter().enumerate() {
        actions.push(ResponseAction::Say(say(message)));
        if idx + 1 < count {
            actions.push(ResponseAction::Pause(PauseAction {
                length: Some(1),
                ..Default::default()
            }));
        }
    }
    actions.push(ResponseAction::Hangup(HangupAction::default()));
    Response { actions }
}

/// Non-terminal turn: a Gather soliciting one field, hidden parameters
/// carrying everything already known, and a self-redirect for the no-input
/// timeout that bumps the retry count and carries the same known fields.
fn gather(prompt: String, solicit: FieldKind, carry: &[(FieldKind, &str)], retries: u32) -> Response {
    let mut children = vec![GatherChild::Say(say(prompt))];
    for (kind, value) in carry {
        children.push(GatherChild::Parameter(ParameterElement::new(
            kind.as_str(),
            value,
        )));
    }
    children.push(GatherChild::Parameter(ParameterElement::new(
        "gathering",
        solicit.as_str(),
    )));

    let gather = GatherAction {
        input: Some("speech".to_string()),
        timeout: Some(GATHER_TIMEOUT_SECS),
        speech_timeout: Some(GATHER_SPEECH_TIMEOUT_SECS),
        action: DIALOG_WEBHOOK_PATH.to_string(),
        method: Some("POST".to_string()),
        children,
    };

    Response {
        actions: vec![
            ResponseAction::Gather(gather),
            ResponseAction::Say(say(
                "I didn't hear anything. Let me try asking again.".to_string(),
            )),
            ResponseAction::Redirect(RedirectAction {
                url: retry_url(carry, retries + 1),
                ..Default::default()
            }),
        ],
    }
}

fn retry_url(carry: &[(FieldKind, &str)], next_retry: u32) -> String {
    let mut pairs: Vec<(&str, String)> = vec![("retry", next_retry.to_string())];
    for (kind, value) in carry {
        pairs.push((kind.as_str(), value.to_string()));
    }
    let query = serde_urlencoded::to_string(&pairs).unwrap_or_default();
    format!("{DIALOG_WEBHOOK_PATH}?{query}")
}
