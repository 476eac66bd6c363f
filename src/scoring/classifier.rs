use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::probe::executor::Outcome;
use crate::traffic::{catalog, BehaviorProfile, RequestSpec};

/// Test category; each one has its own acceptance policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Connectivity,
    HeadlessBot,
    SuspiciousAgent,
    RateLimit,
    Injection,
    HeaderSpoofing,
    PostVariant,
    ConcurrentLoad,
    Session,
    AdminAccess,
    LoadProfile,
}

/// Which status codes count as the defense behaving correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Each response is judged on its own.
    Codes(&'static [u16]),
    /// The burst passes if any response carries one of these codes.
    AnyInBurst(&'static [u16]),
    /// The group passes only if every response carries one of these codes;
    /// that one result applies to every member.
    AllInGroup(&'static [u16]),
}

impl Acceptance {
    fn is_group(self) -> bool {
        !matches!(self, Acceptance::Codes(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub acceptance: Acceptance,
    /// Codes that count when they appear in a transport error instead of a response.
    pub transport_codes: &'static [u16],
}

impl Category {
    pub fn policy(self) -> Policy {
        use Acceptance::*;
        let (acceptance, transport_codes): (Acceptance, &'static [u16]) = match self {
            Category::Connectivity => (Codes(&[200]), &[]),
            Category::HeadlessBot => (Codes(&[403]), &[403]),
            Category::SuspiciousAgent => (Codes(&[200, 403]), &[403]),
            Category::RateLimit => (AnyInBurst(&[429]), &[429]),
            Category::Injection => (Codes(&[400, 403, 404]), &[]),
            Category::HeaderSpoofing => (Codes(&[200, 400, 403]), &[]),
            Category::PostVariant => (Codes(&[200, 400, 404]), &[]),
            Category::ConcurrentLoad => (Codes(&[200]), &[]),
            Category::Session => (AllInGroup(&[200]), &[]),
            Category::AdminAccess => (Codes(&[401, 403]), &[]),
            Category::LoadProfile => (Codes(&[200, 403, 429]), &[403, 429]),
        };
        Policy { acceptance, transport_codes }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Connectivity => "connectivity",
            Category::HeadlessBot => "headless-bot",
            Category::SuspiciousAgent => "suspicious-agent",
            Category::RateLimit => "rate-limit",
            Category::Injection => "injection",
            Category::HeaderSpoofing => "header-spoofing",
            Category::PostVariant => "post-variant",
            Category::ConcurrentLoad => "concurrent-load",
            Category::Session => "session",
            Category::AdminAccess => "admin-access",
            Category::LoadProfile => "load-profile",
        }
    }

    /// Category a generated request is judged under.
    pub fn for_spec(spec: &RequestSpec) -> Category {
        match spec.profile {
            BehaviorProfile::Connectivity => Category::Connectivity,
            BehaviorProfile::SuspiciousAgents | BehaviorProfile::HeadlessAgents => {
                if is_headless_agent(spec.user_agent().unwrap_or_default()) {
                    Category::HeadlessBot
                } else {
                    Category::SuspiciousAgent
                }
            }
            BehaviorProfile::SqlInjection | BehaviorProfile::QueryProbes => Category::Injection,
            BehaviorProfile::HeaderSpoofing => Category::HeaderSpoofing,
            BehaviorProfile::PostVariants => Category::PostVariant,
            BehaviorProfile::RapidFire => Category::RateLimit,
            BehaviorProfile::AdminAccess => Category::AdminAccess,
            BehaviorProfile::Session => Category::Session,
            BehaviorProfile::NormalBrowsing | BehaviorProfile::BotBehavior | BehaviorProfile::Mixed => {
                Category::LoadProfile
            }
            BehaviorProfile::ConcurrentHealth => Category::ConcurrentLoad,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn is_headless_agent(user_agent: &str) -> bool {
    catalog::HEADLESS_MARKERS.iter().any(|m| user_agent.contains(m))
}

/// Pass/fail judgement of one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub category: Category,
    pub passed: bool,
    pub note: String,
}

static STATUS_IN_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([1-5]\d\d)\b").expect("static regex"));

/// First code from `codes` that appears as a standalone number in a transport error.
fn code_in_error(outcome: &Outcome, codes: &[u16]) -> Option<u16> {
    let text = outcome.error.as_deref()?;
    STATUS_IN_TEXT
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u16>().ok())
        .find(|code| codes.contains(code))
}

/// Whether this single outcome shows one of `codes`, directly or via a transport error.
fn shows_code(outcome: &Outcome, codes: &[u16], transport_codes: &[u16]) -> bool {
    if outcome.is_transport_failure() {
        code_in_error(outcome, transport_codes).is_some()
    } else {
        codes.contains(&outcome.status)
    }
}

fn failure_note(outcome: &Outcome, codes: &[u16]) -> String {
    match &outcome.error {
        Some(err) if outcome.is_transport_failure() => format!("transport failure: {}", err),
        _ => format!("status {} not in {:?}", outcome.status, codes),
    }
}

/// Judge one outcome. Group categories treat it as a group of one.
pub fn classify(outcome: Outcome, category: Category) -> Verdict {
    let policy = category.policy();
    let codes = match policy.acceptance {
        Acceptance::Codes(codes) => codes,
        Acceptance::AnyInBurst(_) | Acceptance::AllInGroup(_) => {
            let (passed, note) = group_result(std::slice::from_ref(&outcome), policy);
            return group_verdict(outcome, category, passed, &note);
        }
    };

    if outcome.status >= 500 {
        let note = format!("server error {}", outcome.status);
        return Verdict { outcome, category, passed: false, note };
    }

    let (passed, note) = if shows_code(&outcome, codes, policy.transport_codes) {
        let note = if outcome.is_transport_failure() {
            format!("blocked (code in transport error: {})", outcome.error.as_deref().unwrap_or_default())
        } else {
            format!("status {} accepted", outcome.status)
        };
        (true, note)
    } else {
        (false, failure_note(&outcome, codes))
    };
    Verdict { outcome, category, passed, note }
}

/// Judge a sequence sent as one group (a burst, or a session's request pair).
/// Returns one verdict per outcome, in order. Any 5xx member fails on its own.
pub fn classify_burst(outcomes: Vec<Outcome>, category: Category) -> Vec<Verdict> {
    let policy = category.policy();
    if !policy.acceptance.is_group() {
        return outcomes.into_iter().map(|o| classify(o, category)).collect();
    }
    let (passed, note) = group_result(&outcomes, policy);
    outcomes
        .into_iter()
        .map(|outcome| group_verdict(outcome, category, passed, &note))
        .collect()
}

/// Shared result and note of a group under a group policy.
fn group_result(outcomes: &[Outcome], policy: Policy) -> (bool, String) {
    let total = outcomes.len();
    match policy.acceptance {
        Acceptance::Codes(codes) => (false, format!("{:?} is not a group policy", codes)),
        Acceptance::AnyInBurst(codes) => {
            match outcomes.iter().position(|o| shows_code(o, codes, policy.transport_codes)) {
                Some(i) => (true, format!("{:?} triggered at request {} of {}", codes, i + 1, total)),
                None => (false, format!("no {:?} across {} requests", codes, total)),
            }
        }
        Acceptance::AllInGroup(codes) => {
            let miss = outcomes
                .iter()
                .position(|o| o.status >= 500 || !shows_code(o, codes, policy.transport_codes));
            match miss {
                None => (true, format!("all {} requests answered {:?}", total, codes)),
                Some(i) => (false, format!("request {} of {}: {}", i + 1, total, failure_note(&outcomes[i], codes))),
            }
        }
    }
}

fn group_verdict(outcome: Outcome, category: Category, passed: bool, note: &str) -> Verdict {
    if outcome.status >= 500 {
        let note = format!("server error {}", outcome.status);
        Verdict { outcome, category, passed: false, note }
    } else {
        Verdict { outcome, category, passed, note: note.to_string() }
    }
}

/// Judge a whole batch, choosing each outcome's category from its spec.
/// Outcomes of a group category are judged together, one group per category.
pub fn classify_all(outcomes: Vec<Outcome>) -> Vec<Verdict> {
    let mut groups: BTreeMap<Category, Vec<(usize, Outcome)>> = BTreeMap::new();
    let mut verdicts: Vec<(usize, Verdict)> = Vec::new();

    for (i, o) in outcomes.into_iter().enumerate() {
        let category = Category::for_spec(&o.spec);
        if category.policy().acceptance.is_group() {
            groups.entry(category).or_default().push((i, o));
        } else {
            verdicts.push((i, classify(o, category)));
        }
    }

    for (category, members) in groups {
        let (idx, members): (Vec<usize>, Vec<Outcome>) = members.into_iter().unzip();
        verdicts.extend(idx.into_iter().zip(classify_burst(members, category)));
    }
    verdicts.sort_by_key(|(i, _)| *i);
    verdicts.into_iter().map(|(_, v)| v).collect()
}
