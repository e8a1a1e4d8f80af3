// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered child storage for composite containers.

use crate::operator::Operator;

/// Named child containers in insertion order.
///
/// Each child is owned by exactly one slot, so a child can never be
/// registered under two names of the same parent.
#[derive(Default)]
pub struct Children {
    entries: Vec<(String, Box<dyn Operator>)>,
}

impl Children {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a child, replacing (in place) any child with the same name.
    ///
    /// Returns the replaced child, if there was one.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        child: Box<dyn Operator>,
    ) -> Option<Box<dyn Operator>> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, child)),
            None => {
                self.entries.push((name, child));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Operator> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, child)| child.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Operator + 'static)> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, child)| child.as_mut())
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Operator>> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Child names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Operator)> {
        self.entries
            .iter()
            .map(|(n, child)| (n.as_str(), child.as_ref()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut (dyn Operator + 'static))> {
        self.entries
            .iter_mut()
            .map(|(n, child)| (n.as_str(), child.as_mut()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Children {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(n, _)| n)).finish()
    }
}
