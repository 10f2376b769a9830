//! Profile/role/predicate filtering of context actions.

use std::{collections::BTreeSet, fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::context_actions::{ContextAction, ContextTargetRef};

/// Active viewer for visibility checks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisibilityContext {
    pub profile: Option<String>,
    pub roles: BTreeSet<String>,
    /// Target the menu was opened for.
    pub target: Option<ContextTargetRef>,
}

impl VisibilityContext {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: Some(profile.into()),
            ..Self::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target(mut self, target: ContextTargetRef) -> Self {
        self.target = Some(target);
        self
    }
}

/// Custom visibility predicate. Compared by identity.
#[derive(Clone)]
pub struct VisibilityPredicate(Rc<dyn Fn(&VisibilityContext) -> bool>);

impl VisibilityPredicate {
    pub fn new(predicate: impl Fn(&VisibilityContext) -> bool + 'static) -> Self {
        Self(Rc::new(predicate))
    }

    pub fn test(&self, ctx: &VisibilityContext) -> bool {
        (self.0)(ctx)
    }
}

impl fmt::Debug for VisibilityPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VisibilityPredicate(..)")
    }
}

impl PartialEq for VisibilityPredicate {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// How an action that fails its policy is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnauthorizedBehavior {
    #[default]
    Hide,
    Disable,
}

/// Visibility policy of one action. Empty sets do not restrict.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionVisibility {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed_profiles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed_roles: BTreeSet<String>,
    #[serde(default)]
    pub unauthorized: UnauthorizedBehavior,
    #[serde(skip)]
    pub when: Option<VisibilityPredicate>,
}

impl ActionVisibility {
    pub fn profiles<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_profiles: profiles.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_roles: roles.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn when(predicate: impl Fn(&VisibilityContext) -> bool + 'static) -> Self {
        Self {
            when: Some(VisibilityPredicate::new(predicate)),
            ..Self::default()
        }
    }

    pub fn disable_when_unauthorized(mut self) -> Self {
        self.unauthorized = UnauthorizedBehavior::Disable;
        self
    }

    /// Returns whether `ctx` passes every restriction of this policy.
    pub fn permits(&self, ctx: &VisibilityContext) -> bool {
        let profile_ok = self.allowed_profiles.is_empty()
            || ctx
                .profile
                .as_ref()
                .is_some_and(|profile| self.allowed_profiles.contains(profile));
        let roles_ok = self.allowed_roles.is_empty()
            || self.allowed_roles.iter().any(|role| ctx.roles.contains(role));
        let predicate_ok = self.when.as_ref().map_or(true, |when| when.test(ctx));
        profile_ok && roles_ok && predicate_ok
    }
}

/// Applies each action's visibility policy, then collapses leading, trailing, and repeated
/// separators.
pub fn filter_actions(actions: Vec<ContextAction>, ctx: &VisibilityContext) -> Vec<ContextAction> {
    let visible = actions.into_iter().filter_map(|action| match action {
        ContextAction::Separator => Some(ContextAction::Separator),
        ContextAction::Item(mut item) => {
            let verdict = item
                .visibility
                .as_ref()
                .map(|policy| (policy.permits(ctx), policy.unauthorized));
            match verdict {
                None | Some((true, _)) => Some(ContextAction::Item(item)),
                Some((false, UnauthorizedBehavior::Hide)) => None,
                Some((false, UnauthorizedBehavior::Disable)) => {
                    item.disabled = true;
                    Some(ContextAction::Item(item))
                }
            }
        }
    });
    collapse_separators(visible)
}

/// Drops separators at either end and any separator directly following another.
pub fn collapse_separators(actions: impl IntoIterator<Item = ContextAction>) -> Vec<ContextAction> {
    let mut out: Vec<ContextAction> = Vec::new();
    for action in actions {
        if action.is_separator() && out.last().map_or(true, ContextAction::is_separator) {
            continue;
        }
        out.push(action);
    }
    if out.last().is_some_and(ContextAction::is_separator) {
        out.pop();
    }
    out
}
