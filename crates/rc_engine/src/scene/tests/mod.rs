//! Scene-level scenarios spanning nodes, objects and queues

pub(crate) mod support;

mod hierarchy;
mod skinning;
