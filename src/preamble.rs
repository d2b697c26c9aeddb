//! Global and document-local LaTeX preambles.
//!
//! The global preamble lives in [`RenderConfig`](crate::RenderConfig). Local
//! fragments, such as macros declared in one document's metadata, are
//! collected in a [`LocalPreambles`] buffer owned by the caller and layered on
//! top of the global preamble.
//!
//! Fragments stay in the buffer until [`LocalPreambles::reset`] is called. A
//! host that renders many documents with one buffer must reset it between
//! documents, or use [`LocalPreambles::scope`] which does so on drop.

use std::ops::{Deref, DerefMut};

/// Ordered buffer of document-local preamble fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalPreambles {
    fragments: Vec<String>,
}

impl LocalPreambles {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment.
    pub fn push(&mut self, text: impl Into<String>) {
        self.fragments.push(text.into());
    }

    /// Drop all fragments.
    pub fn reset(&mut self) {
        self.fragments.clear();
    }

    /// Fragments in push order.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// The local contribution: all fragments joined by newlines.
    pub fn joined(&self) -> Option<String> {
        if self.fragments.is_empty() {
            None
        } else {
            Some(self.fragments.join("\n"))
        }
    }

    /// The preamble to hand to a backend, given the global preamble.
    pub fn effective(&self, global: Option<&str>) -> Option<String> {
        effective_preamble(global, self)
    }

    /// Push `text` and reset the buffer when the returned guard is dropped.
    ///
    /// The guard dereferences to the buffer, so more fragments can be pushed
    /// while it is alive. Everything in the buffer is cleared on drop,
    /// including fragments pushed before the scope was opened.
    pub fn scope(&mut self, text: impl Into<String>) -> PreambleScope<'_> {
        self.push(text);
        PreambleScope { preambles: self }
    }
}

impl<S: Into<String>> Extend<S> for LocalPreambles {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.fragments.extend(iter.into_iter().map(Into::into));
    }
}

/// Guard returned by [`LocalPreambles::scope`].
#[derive(Debug)]
pub struct PreambleScope<'a> {
    preambles: &'a mut LocalPreambles,
}

impl Deref for PreambleScope<'_> {
    type Target = LocalPreambles;

    fn deref(&self) -> &LocalPreambles {
        self.preambles
    }
}

impl DerefMut for PreambleScope<'_> {
    fn deref_mut(&mut self) -> &mut LocalPreambles {
        self.preambles
    }
}

impl Drop for PreambleScope<'_> {
    fn drop(&mut self) {
        self.preambles.reset();
    }
}

/// Combine the global preamble with the local fragments.
///
/// Global text comes first. Empty parts are skipped and two non-empty parts
/// are joined by a single newline. Returns `None` when there is nothing to
/// prepend.
pub fn effective_preamble(global: Option<&str>, local: &LocalPreambles) -> Option<String> {
    let global = global.filter(|g| !g.is_empty());
    let local = local.joined().filter(|l| !l.is_empty());

    match (global, local) {
        (None, None) => None,
        (Some(global), None) => Some(global.to_string()),
        (None, Some(local)) => Some(local),
        (Some(global), Some(local)) => Some(format!("{global}\n{local}")),
    }
}
