//! Sandboxed handler programs.
//!
//! A handler is a serializable list of instructions. There are no loops and no calls, so a
//! program's cost is bounded by its instruction count, which the engine checks against the
//! configured budget before running anything.

use serde::{Deserialize, Serialize};

use crate::{
    descriptor::ActionDescriptor,
    expr::{is_truthy, ExprEnv, ValueExpr},
};

/// One instruction, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Instruction {
    /// Execute one action descriptor to completion.
    Run {
        /// Action to execute.
        action: ActionDescriptor,
    },
    /// Branch on a condition.
    If {
        /// Branch condition.
        when: Condition,
        /// Instructions run when the condition holds.
        then: Vec<Instruction>,
        /// Instructions run otherwise.
        #[serde(default, rename = "else", skip_serializing_if = "Vec::is_empty")]
        otherwise: Vec<Instruction>,
    },
    /// Run a nested block in order.
    Seq {
        /// Nested instructions.
        body: Vec<Instruction>,
    },
}

impl Instruction {
    fn count(&self) -> usize {
        match self {
            Self::Run { .. } => 1,
            Self::If {
                then, otherwise, ..
            } => 1 + count_all(then) + count_all(otherwise),
            Self::Seq { body } => 1 + count_all(body),
        }
    }
}

fn count_all(instructions: &[Instruction]) -> usize {
    instructions.iter().map(Instruction::count).sum()
}

/// Condition over resolved values, tagged by `test`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "kebab-case")]
pub enum Condition {
    /// The value is truthy.
    Truthy {
        /// Tested value.
        value: ValueExpr,
    },
    /// Both values resolve to equal JSON.
    Eq {
        /// Left operand.
        left: ValueExpr,
        /// Right operand.
        right: ValueExpr,
    },
    /// Negation.
    Not {
        /// Negated condition.
        condition: Box<Condition>,
    },
    /// Every condition holds (true when empty).
    All {
        /// Conditions.
        conditions: Vec<Condition>,
    },
    /// At least one condition holds (false when empty).
    Any {
        /// Conditions.
        conditions: Vec<Condition>,
    },
}

impl Condition {
    /// Evaluates the condition against `env`.
    pub fn holds(&self, env: &impl ExprEnv) -> bool {
        match self {
            Self::Truthy { value } => is_truthy(&value.resolve(env)),
            Self::Eq { left, right } => left.resolve(env) == right.resolve(env),
            Self::Not { condition } => !condition.holds(env),
            Self::All { conditions } => conditions.iter().all(|condition| condition.holds(env)),
            Self::Any { conditions } => conditions.iter().any(|condition| condition.holds(env)),
        }
    }
}

/// An event handler body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerProgram(pub Vec<Instruction>);

impl HandlerProgram {
    /// Total instructions, counting both branches of every `if`.
    pub fn instruction_count(&self) -> usize {
        count_all(&self.0)
    }

    /// Top-level instructions.
    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }
}

impl From<Vec<ActionDescriptor>> for HandlerProgram {
    fn from(actions: Vec<ActionDescriptor>) -> Self {
        Self(
            actions
                .into_iter()
                .map(|action| Instruction::Run { action })
                .collect(),
        )
    }
}
