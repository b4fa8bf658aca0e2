//! Bidirectional sync between structured state and the navigation location.
//!
//! Writes are gated on string inequality of the formatted query, which is
//! what keeps state -> URL -> state round trips from looping.

use tracing::debug;

use super::schema::{ParamMap, QueryParamSchema};

/// External navigation interface (the browser history, in production).
pub trait Navigator {
    /// Query string currently reflected in the location, without `?`.
    fn current_query(&self) -> String;
    fn push(&mut self, query: &str);
    fn replace(&mut self, query: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationMode {
    #[default]
    Push,
    Replace,
}

// == Memory Navigator ==
/// In-memory history stack with back/forward.
#[derive(Debug, Clone)]
pub struct MemoryNavigator {
    entries: Vec<String>,
    index: usize,
    pushes: usize,
    replaces: usize,
}

impl MemoryNavigator {
    pub fn new(initial: &str) -> Self {
        Self {
            entries: vec![normalize(initial).to_string()],
            index: 0,
            pushes: 0,
            replaces: 0,
        }
    }

    /// Steps back one entry. Returns false at the start of history.
    pub fn back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    pub fn forward(&mut self) -> bool {
        if self.index + 1 >= self.entries.len() {
            return false;
        }
        self.index += 1;
        true
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn push_count(&self) -> usize {
        self.pushes
    }

    pub fn replace_count(&self) -> usize {
        self.replaces
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("")
    }
}

impl Navigator for MemoryNavigator {
    fn current_query(&self) -> String {
        self.entries.get(self.index).cloned().unwrap_or_default()
    }

    fn push(&mut self, query: &str) {
        self.entries.truncate(self.index + 1);
        self.entries.push(normalize(query).to_string());
        self.index = self.entries.len() - 1;
        self.pushes += 1;
    }

    fn replace(&mut self, query: &str) {
        let query = normalize(query).to_string();
        match self.entries.get_mut(self.index) {
            Some(entry) => *entry = query,
            None => self.entries.push(query),
        }
        self.replaces += 1;
    }
}

fn normalize(query: &str) -> &str {
    query.strip_prefix('?').unwrap_or(query)
}

// == Query Sync ==
#[derive(Debug)]
pub struct QuerySync<N> {
    schema: QueryParamSchema,
    navigator: N,
    mode: NavigationMode,
}

impl<N: Navigator> QuerySync<N> {
    pub fn new(schema: QueryParamSchema, navigator: N, mode: NavigationMode) -> Self {
        Self {
            schema,
            navigator,
            mode,
        }
    }

    pub fn schema(&self) -> &QueryParamSchema {
        &self.schema
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut N {
        &mut self.navigator
    }

    /// Parses the location the navigator currently shows, over defaults.
    pub fn read_location(&self) -> ParamMap {
        self.schema.parse(&self.navigator.current_query())
    }

    /// Reflects `params` into the location using the configured mode.
    /// Returns whether navigation happened.
    pub fn write(&mut self, params: &ParamMap) -> bool {
        self.write_with(params, self.mode)
    }

    pub fn write_with(&mut self, params: &ParamMap, mode: NavigationMode) -> bool {
        let next = self.schema.format(params);
        let current = self.navigator.current_query();
        if normalize(&current) == next {
            debug!(query = %next, "Location already up to date");
            return false;
        }

        debug!(from = %current, to = %next, ?mode, "Updating location");
        match mode {
            NavigationMode::Push => self.navigator.push(&next),
            NavigationMode::Replace => self.navigator.replace(&next),
        }
        true
    }
}
