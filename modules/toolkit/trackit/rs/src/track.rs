use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use derive_getters::Getters;

use readscope_io_rs::alignment::Connector;

/// One alignment data set shown or analysed as a unit.
#[derive(Clone, Getters)]
pub struct Track {
    id: usize,
    name: String,
    connector: Arc<dyn Connector>,
}

impl Track {
    pub fn new(id: usize, name: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            id,
            name: name.into(),
            connector,
        }
    }
}

impl Debug for Track {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("source", &self.connector.describe())
            .finish()
    }
}
