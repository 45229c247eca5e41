use crate::{core::Scheduler, Action, ContextPatch, VariableContext};

/// Entry points of an [`Editor`](crate::Editor).
///
/// Live edits and URL navigation go through the same actions.
pub struct EditorActions {
    /// New text of the expression input.
    pub expression_change: Action<String>,

    /// Edit of one variable's settings.
    pub context_change: Action<(String, ContextPatch)>,

    /// Replace the whole context.
    pub context_set: Action<VariableContext>,

    /// The user finished editing a variable.
    pub context_commit: Action<()>,

    /// A variable is being dragged; preview it without persisting.
    pub context_vary: Action<String>,

    /// The persisted fragment changed outside the editor.
    pub encoded_state_change: Action<String>,
}

impl EditorActions {
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            expression_change: Action::new("expression_change", scheduler),
            context_change: Action::new("context_change", scheduler),
            context_set: Action::new("context_set", scheduler),
            context_commit: Action::new("context_commit", scheduler),
            context_vary: Action::new("context_vary", scheduler),
            encoded_state_change: Action::new("encoded_state_change", scheduler),
        }
    }
}
