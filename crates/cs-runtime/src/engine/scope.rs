use cs_core::EntityId;

use super::lifecycle::ScriptRuntime;
use crate::context::{FrameHandle, TargetHandle, ThreadHandle};

pub const SCOPE_SIGIL: char = '$';
pub const SCOPE_SEPARATOR: char = '#';
/// Read-only token naming the frame's most recent external result.
pub const RESULT_TOKEN: &str = "$$";
/// Reference token naming the entity an invocation runs on.
pub const SELF_TOKEN: &str = "$self";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarScope {
    Frame,
    Thread,
    Target,
    Global,
}

impl VarScope {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "local" => Some(Self::Frame),
            "thread" => Some(Self::Thread),
            "target" => Some(Self::Target),
            "global" => Some(Self::Global),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRef<'a> {
    Literal(&'a str),
    Variable { scope: VarScope, name: String },
    MostRecentResult,
    UnknownScope(&'a str),
}

/// Splits `$name` / `$scope#name` tokens. Variable names are
/// case-insensitive and come back lowercased.
pub fn classify_token(token: &str) -> TokenRef<'_> {
    if token == RESULT_TOKEN {
        return TokenRef::MostRecentResult;
    }
    let Some(body) = token.strip_prefix(SCOPE_SIGIL) else {
        return TokenRef::Literal(token);
    };

    match body.split_once(SCOPE_SEPARATOR) {
        None if body.is_empty() => TokenRef::Literal(token),
        None => TokenRef::Variable {
            scope: VarScope::Frame,
            name: body.to_lowercase(),
        },
        Some((_, name)) if name.is_empty() => TokenRef::Literal(token),
        Some((scope, name)) => match VarScope::from_name(scope) {
            Some(scope) => TokenRef::Variable {
                scope,
                name: name.to_lowercase(),
            },
            None => TokenRef::UnknownScope(token),
        },
    }
}

/// Where a token is being resolved from: an invocation, its current frame
/// if any, and a `script:line` tag for diagnostics.
#[derive(Debug, Clone)]
pub(crate) struct ScopeContext {
    pub thread: ThreadHandle,
    pub frame: Option<FrameHandle>,
    pub origin: String,
}

impl ScriptRuntime {
    fn target_of(&self, thread: ThreadHandle) -> Option<TargetHandle> {
        let target = self.threads.with(thread, |context| context.target)?;
        if !self.targets.contains(target) {
            log::error!("invocation {} points at dead target {}", thread, target);
            return None;
        }
        Some(target)
    }

    pub(crate) fn get_var(&self, scope: &ScopeContext, var: VarScope, name: &str) -> Option<String> {
        match var {
            VarScope::Frame => {
                let frame = scope.frame?;
                self.frames
                    .with(frame, |context| context.vars.get(name).cloned())
                    .flatten()
            }
            VarScope::Thread => self
                .threads
                .with(scope.thread, |context| context.vars.get(name).cloned())
                .flatten(),
            VarScope::Target => {
                let target = self.target_of(scope.thread)?;
                self.targets
                    .with(target, |context| context.vars.get(name).cloned())
                    .flatten()
            }
            VarScope::Global => self.globals.get(name),
        }
    }

    pub(crate) fn has_var(&self, scope: &ScopeContext, var: VarScope, name: &str) -> bool {
        match var {
            VarScope::Frame => scope
                .frame
                .and_then(|frame| self.frames.with(frame, |context| context.vars.contains_key(name)))
                .unwrap_or(false),
            VarScope::Thread => self
                .threads
                .with(scope.thread, |context| context.vars.contains_key(name))
                .unwrap_or(false),
            VarScope::Target => self
                .target_of(scope.thread)
                .and_then(|target| {
                    self.targets
                        .with(target, |context| context.vars.contains_key(name))
                })
                .unwrap_or(false),
            VarScope::Global => self.globals.has(name),
        }
    }

    /// Inserts or overwrites; returns the stored value, or `None` when the
    /// owning context is gone.
    pub(crate) fn set_var(
        &self,
        scope: &ScopeContext,
        var: VarScope,
        name: &str,
        value: String,
    ) -> Option<String> {
        let stored = match var {
            VarScope::Frame => {
                let frame = scope.frame?;
                self.frames.with_mut(frame, |context| {
                    context.vars.insert(name.to_string(), value.clone());
                })
            }
            VarScope::Thread => self.threads.with_mut(scope.thread, |context| {
                context.vars.insert(name.to_string(), value.clone());
            }),
            VarScope::Target => {
                let target = self.target_of(scope.thread)?;
                self.targets.with_mut(target, |context| {
                    context.vars.insert(name.to_string(), value.clone());
                })
            }
            VarScope::Global => {
                self.globals.set(name, value.clone());
                Some(())
            }
        };
        if stored.is_none() {
            log::error!("{}: variable \"{}\" has no live owner", scope.origin, name);
        }
        stored.map(|_| value)
    }

    fn most_recent_result(&self, scope: &ScopeContext) -> String {
        scope
            .frame
            .and_then(|frame| {
                self.frames
                    .with(frame, |context| context.most_recent_result.clone())
            })
            .unwrap_or_default()
    }

    /// Value of `token`: literals pass through the translator, variables read
    /// their map (unset reads as empty), `$$` reads the frame's last result.
    pub(crate) fn resolve_token(&self, scope: &ScopeContext, token: &str) -> String {
        match classify_token(token) {
            TokenRef::Literal(text) => self.translator.translate(text),
            TokenRef::Variable { scope: var, name } => {
                self.get_var(scope, var, &name).unwrap_or_default()
            }
            TokenRef::MostRecentResult => self.most_recent_result(scope),
            TokenRef::UnknownScope(text) => {
                log::warn!("{}: unknown variable scope in \"{}\"", scope.origin, text);
                text.to_string()
            }
        }
    }

    /// Like `resolve_token`, but literals are taken as written. Used for
    /// command names, labels, script names and numeric control operands.
    pub(crate) fn resolve_name(&self, scope: &ScopeContext, token: &str) -> String {
        match classify_token(token) {
            TokenRef::Literal(text) => text.to_string(),
            _ => self.resolve_token(scope, token),
        }
    }

    pub(crate) fn resolve_tokens(&self, scope: &ScopeContext, tokens: &[String]) -> Vec<String> {
        tokens
            .iter()
            .map(|token| self.resolve_token(scope, token))
            .collect()
    }

    /// Stores `value` into the variable named by `token`.
    pub(crate) fn assign_token(
        &self,
        scope: &ScopeContext,
        token: &str,
        value: String,
    ) -> Option<String> {
        match classify_token(token) {
            TokenRef::Variable { scope: var, name } => self.set_var(scope, var, &name, value),
            TokenRef::MostRecentResult => {
                log::warn!("{}: \"{}\" is read-only", scope.origin, RESULT_TOKEN);
                None
            }
            TokenRef::Literal(text) => {
                log::warn!("{}: \"{}\" is not a variable", scope.origin, text);
                None
            }
            TokenRef::UnknownScope(text) => {
                log::warn!("{}: unknown variable scope in \"{}\"", scope.origin, text);
                None
            }
        }
    }

    fn host_scope(&self, thread: ThreadHandle) -> Option<ScopeContext> {
        if !self.threads.contains(thread) {
            log::error!("invocation {} is not live", thread);
            return None;
        }
        Some(ScopeContext {
            thread,
            frame: self.frame_of(thread),
            origin: format!("invocation {}", thread),
        })
    }

    /// Resolves `token` as the invocation's current frame would.
    pub fn resolve_value(&self, thread: ThreadHandle, token: &str) -> String {
        self.host_scope(thread)
            .map(|scope| self.resolve_token(&scope, token))
            .unwrap_or_default()
    }

    /// Resolves `token` to an entity: `$self` is the invocation's own entity,
    /// anything else goes through the entity resolver after value
    /// resolution.
    pub fn resolve_external_reference(&self, thread: ThreadHandle, token: &str) -> Option<EntityId> {
        if token.eq_ignore_ascii_case(SELF_TOKEN) {
            let target = self.target_of(thread)?;
            return self.targets.with(target, |context| context.entity).flatten();
        }
        let text = self.resolve_value(thread, token);
        if text.is_empty() {
            return None;
        }
        self.entities.lookup(&text)
    }

    pub fn has_variable(&self, thread: ThreadHandle, token: &str) -> bool {
        let Some(scope) = self.host_scope(thread) else {
            return false;
        };
        match classify_token(token) {
            TokenRef::Variable { scope: var, name } => self.has_var(&scope, var, &name),
            _ => false,
        }
    }

    pub fn set_variable(&self, thread: ThreadHandle, token: &str, value: &str) -> Option<String> {
        let scope = self.host_scope(thread)?;
        self.assign_token(&scope, token, value.to_string())
    }
}
