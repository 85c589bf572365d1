//! # Queue Manager
//!
//! Ordered media ids plus a cursor. The cursor is always a valid index
//! unless the queue is empty, and it never wraps: moving past either end
//! reports "no item" and leaves the cursor where it was.

/// Ordered playlist with a current position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueManager {
    items: Vec<String>,
    cursor: usize,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue; the cursor moves to the first item.
    pub fn set_items(&mut self, items: Vec<String>) {
        self.items = items;
        self.cursor = 0;
    }

    /// Point the cursor at `id`, appending it if the queue lacks it.
    pub fn set_current(&mut self, id: &str) {
        match self.items.iter().position(|item| item == id) {
            Some(index) => self.cursor = index,
            None => {
                self.items.push(id.to_string());
                self.cursor = self.items.len() - 1;
            }
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.items.get(self.cursor).map(String::as_str)
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.items.is_empty()).then_some(self.cursor)
    }

    pub fn has_next(&self) -> bool {
        self.cursor + 1 < self.items.len()
    }

    pub fn has_previous(&self) -> bool {
        !self.items.is_empty() && self.cursor > 0
    }

    /// Advance and return the new current id, or `None` at the end.
    pub fn next(&mut self) -> Option<&str> {
        if !self.has_next() {
            return None;
        }
        self.cursor += 1;
        self.current()
    }

    /// Step back and return the new current id, or `None` at the start.
    pub fn previous(&mut self) -> Option<&str> {
        if !self.has_previous() {
            return None;
        }
        self.cursor -= 1;
        self.current()
    }

    /// Move to the first item (used when repeating the whole queue).
    pub fn first(&mut self) -> Option<&str> {
        self.cursor = 0;
        self.current()
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = 0;
    }
}
