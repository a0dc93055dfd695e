//! Call accounting for staged remote work.
//!
//! A [`Meter`] sits beside a sequence of dependent gateway calls and adds up
//! the requests each one spent, so the total survives a failure part way
//! through.

use anyhow::Result;

use crate::types::Counted;

#[derive(Debug, Default)]
pub struct Meter {
    calls: usize,
}

impl Meter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Books the calls spent by one stage and hands back its result.
    pub fn record<T>(&mut self, counted: Counted<T>) -> Result<T> {
        self.calls += counted.calls;
        counted.result
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}
