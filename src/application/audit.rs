//! Records content mutations as structured log events and counters.

use metrics::counter;
use tracing::info;

pub const METRIC_CONTENT_MUTATIONS: &str = "quire_content_mutations_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Post,
    Tag,
}

impl Entity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Tag => "tag",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

pub fn record_mutation(actor: &str, entity: Entity, action: Action, slug: &str) {
    info!(
        target = "quire::application::audit",
        actor,
        entity = entity.as_str(),
        action = action.as_str(),
        slug,
        "content mutated"
    );

    counter!(
        METRIC_CONTENT_MUTATIONS,
        "entity" => entity.as_str(),
        "action" => action.as_str()
    )
    .increment(1);
}
