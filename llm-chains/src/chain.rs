//! The `Chain` seam: named inputs in, raw model text out.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use ai_llm_service::{BoxFuture, TextGenerator};
use tracing::{Instrument, debug, debug_span};

use crate::error::ChainError;

/// Named template inputs for one chain invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainInputs(BTreeMap<String, String>);

impl ChainInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// One prompt template bound to one model.
pub trait Chain: Send + Sync {
    fn invoke<'a>(&'a self, inputs: &'a ChainInputs) -> BoxFuture<'a, Result<String, ChainError>>;

    fn name(&self) -> &str;
}

/// Renders a template with `{name}` placeholders and sends it to a [`TextGenerator`].
pub struct PromptChain {
    name: String,
    template: String,
    generator: Arc<dyn TextGenerator>,
}

impl PromptChain {
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            generator,
        }
    }

    pub fn render(&self, inputs: &ChainInputs) -> Result<String, ChainError> {
        render_template(&self.template, inputs).map_err(|input| ChainError::MissingInput {
            chain: self.name.clone(),
            input,
        })
    }
}

impl Chain for PromptChain {
    fn invoke<'a>(&'a self, inputs: &'a ChainInputs) -> BoxFuture<'a, Result<String, ChainError>> {
        let span = debug_span!("chain", chain = %self.name, model = %self.generator.model_name());
        Box::pin(
            async move {
                let prompt = self.render(inputs)?;
                debug!(prompt_len = prompt.len(), "invoking chain");
                let out = self.generator.generate(&prompt).await?;
                debug!(response_len = out.len(), "chain returned");
                Ok(out)
            }
            .instrument(span),
        )
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Substitutes `{ident}` placeholders. `{{` and `}}` are literal braces; any
/// other brace is kept as-is. Returns the name of the first missing input.
fn render_template(template: &str, inputs: &ChainInputs) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
        } else {
            match placeholder(tail) {
                Some(name) => {
                    let value = inputs.get(name).ok_or_else(|| name.to_string())?;
                    out.push_str(value);
                    rest = &tail[name.len() + 2..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// `"{query} ..."` -> `Some("query")`.
fn placeholder(tail: &str) -> Option<&str> {
    let body = &tail[1..];
    let end = body.find('}')?;
    let name = &body[..end];
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

/* ---------------------------------------------------------------------- */
/* Scripted chain                                                          */
/* ---------------------------------------------------------------------- */

/// Chain that replays canned replies in order and records every invocation.
///
/// Used for offline runs and as a test double wherever a [`Chain`] is expected.
pub struct ScriptedChain {
    name: String,
    replies: Mutex<VecDeque<String>>,
    repeat_last: bool,
    calls: Mutex<Vec<ChainInputs>>,
}

impl ScriptedChain {
    pub fn new<I, S>(name: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            repeat_last: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `reply`.
    pub fn always(name: impl Into<String>, reply: impl Into<String>) -> Self {
        let mut chain = Self::new(name, [reply.into()]);
        chain.repeat_last = true;
        chain
    }

    pub fn calls(&self) -> Vec<ChainInputs> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Chain for ScriptedChain {
    fn invoke<'a>(&'a self, inputs: &'a ChainInputs) -> BoxFuture<'a, Result<String, ChainError>> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(inputs.clone());

        let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        let reply = if self.repeat_last && replies.len() == 1 {
            replies.front().cloned()
        } else {
            replies.pop_front()
        };
        let out = reply.ok_or_else(|| ChainError::Exhausted(self.name.clone()));
        Box::pin(async move { out })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
