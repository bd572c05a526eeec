//! Response clean-up: model-specific processors and the tripwire guard.

use serde::{Deserialize, Serialize};

use crate::responses::FAIL_RESPONSE;

/// Terms that must never reach a user.
pub const TRIPWIRE_TERMS: &[&str] = &["fraggle"];

/// Per-pipeline response processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseProcessor {
    #[default]
    None,
    Llama3,
}

const LLAMA3_PREFIXES: &[&str] = &["Based on the provided context,"];
const LLAMA3_LINE_STARTS: &[&str] = &["The provided context"];

impl ResponseProcessor {
    pub fn process(&self, response: &str) -> String {
        match self {
            Self::None => response.trim().to_string(),
            Self::Llama3 => llama3(response),
        }
    }
}

/// Drops boilerplate preambles and non-leading lines that talk about "the provided context".
fn llama3(response: &str) -> String {
    let mut out = response.to_string();
    for prefix in LLAMA3_PREFIXES {
        out = out.replace(prefix, "").trim().to_string();
    }

    let mut modified = false;
    let lines: Vec<&str> = out
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            if i > 0 && LLAMA3_LINE_STARTS.iter().any(|p| line.starts_with(p)) {
                modified = true;
                ""
            } else {
                line
            }
        })
        .collect();

    if modified {
        lines.join("\n").trim().to_string()
    } else {
        out
    }
}

/// Outcome of [`guard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guarded {
    pub response: String,
    pub tripwire_thrown: bool,
}

/// Trims the response; a tripped response is replaced by the fail sentence.
pub fn guard(response: &str) -> Guarded {
    let clean = response.trim();
    let tripwire_thrown = TRIPWIRE_TERMS.iter().any(|t| clean.contains(t));
    Guarded {
        response: if tripwire_thrown {
            FAIL_RESPONSE.to_string()
        } else {
            clean.to_string()
        },
        tripwire_thrown,
    }
}
