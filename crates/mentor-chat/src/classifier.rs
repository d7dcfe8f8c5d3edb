//! Intent classification and slot extraction.
//!
//! A deterministic keyword pass decides most utterances. When no rule
//! fires, or the rules contradict each other, the caller asks the model to
//! pick one label and hands the reply back to [`IntentClassifier::from_model_reply`].

use chrono::Weekday;
use regex::Regex;
use std::sync::LazyLock;

use mentor_core::types::{Intent, Turn};
use mentor_llm::PromptContext;

use crate::response::{self, CLARIFY_EMPTY, CLARIFY_FACT, CLARIFY_FORGET};
use crate::types::{Classification, ClassificationSource, ForgetTarget, Request, Timeframe};

// =============================================================================
// Compiled regex sets (compiled once, reused across calls)
// =============================================================================

struct IntentPatterns {
    store: Vec<Regex>,
    declare: Vec<Regex>,
    recall: Vec<Regex>,
    forget: Vec<Regex>,
    calendar: Vec<Regex>,
}

static INTENT_PATTERNS: LazyLock<IntentPatterns> = LazyLock::new(|| {
    let mk = |pats: &[&str]| -> Vec<Regex> {
        pats.iter()
            .map(|p| Regex::new(p).expect("Invalid intent regex"))
            .collect()
    };

    IntentPatterns {
        store: mk(&[
            r"(?i)^\W*(?:please\s+)?remember\b",
            r"(?i)\bplease\s+remember\b",
            r"(?i)\bnote\s+that\b",
            r"(?i)\bkeep\s+in\s+mind\b",
            r"(?i)\b(?:don't|do\s+not)\s+forget\b",
        ]),
        // Statements of preference store a fact without an explicit request.
        declare: mk(&[r"(?i)\bI\s+prefer\b", r"(?i)\bmy\s+preference\s+is\b"]),
        recall: mk(&[
            r"(?i)\bwhat\s+do\s+you\s+(?:know|remember)\b",
            r"(?i)\bdo\s+you\s+remember\b",
            r"(?i)\bwhat\s+did\s+I\s+tell\s+you\b",
            r"(?i)\btell\s+me\s+about\s+(?:my|myself)\b",
            r"(?i)\bmy\s+preferences\b",
            r"(?i)\babout\s+me\b",
            r"(?i)\bwhat\s+do\s+I\s+(?:prefer|like)\b",
        ]),
        forget: mk(&[
            r"(?i)^\W*(?:please\s+)?forget\b",
            r"(?i)\b(?:delete|clear|erase|remove|wipe)\b.*\bmemor(?:y|ies)\b",
        ]),
        calendar: mk(&[
            r"(?i)\bmeetings?\b",
            r"(?i)\bschedule[sd]?\b",
            r"(?i)\bcalendar\b",
            r"(?i)\bevents?\b",
            r"(?i)\bappointments?\b",
            r"(?i)\bclass(?:es)?\b",
            r"(?i)\bexams?\b",
            r"(?i)\bwhat\s+do\s+I\s+have\b",
            r"(?i)\bam\s+I\s+(?:free|busy)\b",
            r"(?i)\bwhat(?:'s|\s+is)\s+on\s+(?:my\b|for\b|today|tonight|tomorrow|this\b|next\b|(?:mon|tues|wednes|thurs|fri|satur|sun)day)",
        ]),
    }
});

static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^\W*(?:what|which|who|when|where|how|do|does|did|can|could|tell)\b|\?\s*$)")
        .unwrap()
});

// Slot extraction
static FACT_TRIGGER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:remember(?:\s+that)?|note\s+that|keep\s+in\s+mind(?:\s+that)?|(?:don't|do\s+not)\s+forget(?:\s+that)?)\b\s*[:,]?\s*",
    )
    .unwrap()
});

static FORGET_ALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\W*(?:please\s+)?(?:forget|delete|clear|erase|remove|wipe)\s+(?:everything|all(?:\s+(?:of\s+)?my\s+memories)?|(?:all\s+)?(?:my|the)\s+memories|memories|what\s+you\s+know)(?:\s+(?:you\s+know\s+)?about\s+me)?\W*$",
    )
    .unwrap()
});

static FORGET_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\W*(?:please\s+)?(?:forget|(?:delete|clear|erase|remove|wipe)\s+(?:the\s+|my\s+)?memor(?:y|ies))\s*(?:that\s+|about\s+|of\s+)?",
    )
    .unwrap()
});

// Time extraction patterns
struct TimePatterns {
    iso_date: Regex,
    month_day: Regex,
    tomorrow: Regex,
    today: Regex,
    next_week: Regex,
    this_week: Regex,
    weekday: Regex,
}

static TIME_PATTERNS: LazyLock<TimePatterns> = LazyLock::new(|| TimePatterns {
    iso_date: Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap(),
    month_day: Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b",
    )
    .unwrap(),
    tomorrow: Regex::new(r"(?i)\btomorrow\b").unwrap(),
    today: Regex::new(r"(?i)\b(?:today|tonight|this\s+(?:morning|afternoon|evening))\b").unwrap(),
    next_week: Regex::new(r"(?i)\bnext\s+week\b").unwrap(),
    this_week: Regex::new(r"(?i)\bweek\b").unwrap(),
    weekday: Regex::new(r"(?i)\b(mon|tues|wednes|thurs|fri|satur|sun)day\b").unwrap(),
});

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(MEMORY_ADD|MEMORY_QUERY|MEMORY_DELETE|CALENDAR_QUERY|COMPOUND|GENERAL_CHAT)\b")
        .unwrap()
});

// Adverbs that may sit between "I" and its verb.
static ADVERBS: &[&str] = &[
    "also", "always", "usually", "often", "never", "still", "only", "sometimes", "generally",
    "mostly", "just",
];

// Verbs that keep their form in the third person.
static INVARIANT_VERBS: &[&str] = &[
    "can", "could", "will", "would", "should", "must", "might", "may", "shall", "did", "was",
    "had", "can't", "won't", "couldn't", "wouldn't", "shouldn't", "didn't", "wasn't",
];

// =============================================================================
// Signals
// =============================================================================

/// Which keyword families fired for an utterance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Signals {
    /// Explicit storage request ("remember that ...").
    pub store: bool,
    /// Preference statement ("I prefer ...").
    pub declare: bool,
    pub recall: bool,
    pub forget: bool,
    pub calendar: bool,
    pub question: bool,
}

impl Signals {
    pub fn detect(utterance: &str) -> Self {
        let pats = &*INTENT_PATTERNS;
        let any = |set: &[Regex]| set.iter().any(|re| re.is_match(utterance));
        Self {
            store: any(&pats.store),
            declare: any(&pats.declare),
            recall: any(&pats.recall),
            forget: any(&pats.forget),
            calendar: any(&pats.calendar),
            question: QUESTION_RE.is_match(utterance),
        }
    }
}

/// Outcome of the keyword pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Decided(Classification),
    /// No rule fired or the rules disagree; one model call should decide.
    AskModel,
}

// =============================================================================
// IntentClassifier
// =============================================================================

/// Rule-based intent classifier with an optional model tie-breaker.
#[derive(Clone, Debug)]
pub struct IntentClassifier {
    /// When false, undecided utterances become general chat without a model call.
    pub model_fallback: bool,
}

impl IntentClassifier {
    pub fn new(model_fallback: bool) -> Self {
        Self { model_fallback }
    }

    /// Run the keyword pass.
    ///
    /// Never touches a gateway. Returns `AskModel` only when the model
    /// fallback is enabled.
    pub fn classify(&self, utterance: &str) -> Verdict {
        let text = normalize(utterance);
        if text.is_empty() {
            return Verdict::Decided(Classification {
                request: Request::Chat {
                    clarify: Some(CLARIFY_EMPTY.to_string()),
                },
                source: ClassificationSource::Empty,
            });
        }

        let signals = Signals::detect(&text);
        let storing = signals.store || signals.declare;
        let intent = if signals.forget && signals.store {
            None
        } else if signals.forget {
            Some(Intent::MemoryDelete)
        } else if storing && signals.recall && signals.question {
            // A question about stored preferences ("what do I prefer?") is recall.
            Some(if signals.calendar {
                Intent::Compound
            } else {
                Intent::MemoryQuery
            })
        } else if storing && signals.calendar {
            // Store the fact and show the schedule it mentions.
            Some(Intent::Compound)
        } else if storing {
            Some(Intent::MemoryAdd)
        } else if signals.recall && signals.calendar {
            Some(Intent::Compound)
        } else if signals.calendar {
            Some(Intent::CalendarQuery)
        } else if signals.recall {
            Some(Intent::MemoryQuery)
        } else {
            None
        };

        let remember_too = storing && signals.calendar && !(signals.recall && signals.question);
        match intent {
            Some(intent) => {
                let mut request = request_for(intent, &text);
                if let Request::Compound { fact, .. } = &mut request {
                    if remember_too {
                        *fact = extract_fact(&text);
                    }
                }
                Verdict::Decided(Classification {
                    request,
                    source: ClassificationSource::Keyword,
                })
            }
            None if self.model_fallback => Verdict::AskModel,
            None => Verdict::Decided(general_chat(ClassificationSource::Default)),
        }
    }

    /// Prompt asking the model for a single intent label.
    pub fn model_prompt(&self, utterance: &str, recent: &[Turn]) -> PromptContext {
        response::classify_prompt(utterance.trim(), recent.to_vec())
    }

    /// Turn the model's answer into a classification.
    ///
    /// `None` (the call failed) or a reply without a known label yields
    /// general chat.
    pub fn from_model_reply(&self, utterance: &str, reply: Option<&str>) -> Classification {
        match reply.and_then(parse_label) {
            Some(intent) => Classification {
                request: request_for(intent, &normalize(utterance)),
                source: ClassificationSource::Model,
            },
            None => general_chat(ClassificationSource::Default),
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(true)
    }
}

/// The first intent label appearing in a model reply.
pub fn parse_label(reply: &str) -> Option<Intent> {
    let upper = reply.to_ascii_uppercase();
    LABEL_RE
        .find(&upper)
        .and_then(|m| m.as_str().parse::<Intent>().ok())
}

fn general_chat(source: ClassificationSource) -> Classification {
    Classification {
        request: Request::Chat { clarify: None },
        source,
    }
}

fn normalize(utterance: &str) -> String {
    utterance.trim().replace(['\u{2018}', '\u{2019}'], "'")
}

/// Build the request for `intent`, extracting its slots from `text`.
fn request_for(intent: Intent, text: &str) -> Request {
    match intent {
        Intent::MemoryAdd => match extract_fact(text) {
            Some(fact) => Request::Remember { fact },
            None => Request::Chat {
                clarify: Some(CLARIFY_FACT.to_string()),
            },
        },
        Intent::MemoryQuery => Request::Recall {
            query: text.to_string(),
        },
        Intent::MemoryDelete => match extract_forget_target(text) {
            Some(target) => Request::Forget { target },
            None => Request::Chat {
                clarify: Some(CLARIFY_FORGET.to_string()),
            },
        },
        Intent::CalendarQuery => Request::Calendar {
            timeframe: extract_timeframe(text),
        },
        Intent::Compound => Request::Compound {
            query: text.to_string(),
            timeframe: extract_timeframe(text),
            fact: None,
        },
        Intent::GeneralChat => Request::Chat { clarify: None },
    }
}

// =============================================================================
// Slot extraction
// =============================================================================

/// The fact to store, trigger phrase removed and rewritten in the third person.
pub fn extract_fact(text: &str) -> Option<String> {
    let body = match FACT_TRIGGER_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    };
    let body = body
        .trim()
        .trim_end_matches(['.', '!'])
        .trim();
    if body.is_empty() {
        return None;
    }
    Some(third_person(body))
}

/// Rewrite a leading first-person clause: "I prefer X" -> "prefers X".
pub fn third_person(fact: &str) -> String {
    let lower = fact.to_lowercase();
    const FIXED: &[(&str, &str)] = &[
        ("i am ", "is "),
        ("i'm ", "is "),
        ("i have ", "has "),
        ("i've ", "has "),
        ("i don't ", "doesn't "),
        ("i do not ", "does not "),
    ];
    for (prefix, replacement) in FIXED {
        if lower.starts_with(prefix) {
            if let Some(rest) = fact.get(prefix.len()..) {
                return format!("{}{}", replacement, rest.trim_start());
            }
        }
    }

    if !lower.starts_with("i ") {
        return fact.to_string();
    }
    let Some(rest) = fact.get(2..) else {
        return fact.to_string();
    };

    let mut words: Vec<String> = Vec::new();
    let mut conjugated = false;
    for word in rest.split_whitespace() {
        if !conjugated && !ADVERBS.contains(&word.to_lowercase().as_str()) {
            words.push(conjugate(word));
            conjugated = true;
        } else {
            words.push(word.to_string());
        }
    }
    words.join(" ")
}

fn conjugate(verb: &str) -> String {
    let lower = verb.to_lowercase();
    if INVARIANT_VERBS.contains(&lower.as_str()) || lower.ends_with("ed") {
        return verb.to_string();
    }
    match lower.as_str() {
        "am" => return "is".to_string(),
        "have" => return "has".to_string(),
        "do" => return "does".to_string(),
        "go" => return "goes".to_string(),
        _ => {}
    }

    let mut chars = lower.chars().rev();
    let last = chars.next();
    let before_last = chars.next();
    match (before_last, last) {
        (Some(b), Some('y')) if !"aeiou".contains(b) => {
            format!("{}ies", &verb[..verb.len() - 1])
        }
        (_, Some('s' | 'x' | 'z' | 'o')) => format!("{}es", verb),
        (Some('c' | 's'), Some('h')) => format!("{}es", verb),
        _ => format!("{}s", verb),
    }
}

/// What to forget. `None` when the request names nothing.
pub fn extract_forget_target(text: &str) -> Option<ForgetTarget> {
    if FORGET_ALL_RE.is_match(text) {
        return Some(ForgetTarget::All);
    }
    let rest = match FORGET_PREFIX_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    };
    let rest = rest
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim();
    if rest.is_empty() {
        None
    } else {
        Some(ForgetTarget::Matching(rest.to_string()))
    }
}

/// The timeframe mentioned in `text`, defaulting to the coming week.
pub fn extract_timeframe(text: &str) -> Timeframe {
    let tp = &*TIME_PATTERNS;

    if let Some(caps) = tp.iso_date.captures(text) {
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        if let (Some(year), Some(month), Some(day)) = (num(1), num(2), num(3)) {
            return Timeframe::Date {
                year: Some(year as i32),
                month,
                day,
            };
        }
    }

    if let Some(caps) = tp.month_day.captures(text) {
        let month = caps.get(1).and_then(|m| month_number(m.as_str()));
        let day = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
        if let (Some(month), Some(day)) = (month, day) {
            return Timeframe::Date {
                year: None,
                month,
                day,
            };
        }
    }

    if tp.tomorrow.is_match(text) {
        return Timeframe::Tomorrow;
    }
    if tp.today.is_match(text) {
        return Timeframe::Today;
    }
    if tp.next_week.is_match(text) {
        return Timeframe::NextWeek;
    }
    if tp.this_week.is_match(text) {
        return Timeframe::ThisWeek;
    }
    if let Some(caps) = tp.weekday.captures(text) {
        let weekday = match caps.get(1).map(|m| m.as_str().to_lowercase()).as_deref() {
            Some("mon") => Some(Weekday::Mon),
            Some("tues") => Some(Weekday::Tue),
            Some("wednes") => Some(Weekday::Wed),
            Some("thurs") => Some(Weekday::Thu),
            Some("fri") => Some(Weekday::Fri),
            Some("satur") => Some(Weekday::Sat),
            Some("sun") => Some(Weekday::Sun),
            _ => None,
        };
        if let Some(weekday) = weekday {
            return Timeframe::Weekday(weekday);
        }
    }

    Timeframe::Upcoming
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

// =============================================================================
// Tests
// =============================================================================
