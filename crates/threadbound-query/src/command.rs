// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The staged (not yet submitted) command of a query handle.

use threadbound_core::{Binding, Command, Direction, NamedBinding, Value};

/// Statement text and bindings being assembled by a query handle.
///
/// Submitting takes a snapshot; the staged values stay in place so the same
/// statement can be executed again. The first bind after a submission starts
/// a fresh binding list.
#[derive(Debug, Clone, Default)]
pub(crate) struct StagedCommand {
    statement: String,
    positional: Vec<Binding>,
    named: Vec<NamedBinding>,
    rebind: bool,
}

impl StagedCommand {
    pub(crate) fn prepare(&mut self, statement: String) {
        *self = Self {
            statement,
            ..Self::default()
        };
    }

    pub(crate) fn statement(&self) -> &str {
        &self.statement
    }

    pub(crate) fn bind_positional(&mut self, value: Value, direction: Direction) {
        self.start_rebind();
        self.positional.push(Binding { value, direction });
    }

    /// Bind a named placeholder. Binding the same name twice replaces the
    /// earlier value.
    pub(crate) fn bind_named(&mut self, placeholder: &str, value: Value, direction: Direction) {
        self.start_rebind();
        let placeholder = normalize_placeholder(placeholder);
        match self.named.iter_mut().find(|b| b.placeholder == placeholder) {
            Some(existing) => {
                existing.value = value;
                existing.direction = direction;
            }
            None => self.named.push(NamedBinding {
                placeholder,
                value,
                direction,
            }),
        }
    }

    pub(crate) fn clear_bindings(&mut self) {
        self.positional.clear();
        self.named.clear();
        self.rebind = false;
    }

    pub(crate) fn positional_value(&self, index: usize) -> Option<&Value> {
        self.positional.get(index).map(|b| &b.value)
    }

    pub(crate) fn named_value(&self, placeholder: &str) -> Option<&Value> {
        let placeholder = normalize_placeholder(placeholder);
        self.named
            .iter()
            .find(|b| b.placeholder == placeholder)
            .map(|b| &b.value)
    }

    pub(crate) fn binding_count(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// Freeze the staged state into a command carrying `sequence`.
    pub(crate) fn snapshot(&mut self, sequence: u64, batch: bool) -> Command {
        self.rebind = true;
        Command {
            sequence,
            statement: self.statement.clone(),
            positional: self.positional.clone(),
            named: self.named.clone(),
            batch,
        }
    }

    fn start_rebind(&mut self) {
        if self.rebind {
            self.clear_bindings();
        }
    }
}

/// `name` and `:name` address the same placeholder; `@name` and `$name` are
/// kept as written.
fn normalize_placeholder(placeholder: &str) -> String {
    if placeholder.starts_with([':', '@', '$']) {
        placeholder.to_string()
    } else {
        format!(":{placeholder}")
    }
}
