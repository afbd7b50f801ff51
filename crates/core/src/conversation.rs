//! Conversation-related types.

use scout_model::ModelMessage;

use crate::tool::{ToolObservation, ToolRequest};

/// One entry in the conversation record.
#[derive(Clone, Debug, PartialEq)]
pub enum Turn {
    /// Text from the user, or a note the agent sent on the user's behalf.
    User(String),
    /// Text from the assistant.
    AssistantText(String),
    /// A tool call requested by the assistant.
    ToolRequest(ToolRequest),
    /// The outcome of a tool call.
    ToolObservation(ToolObservation),
}

/// An item in the conversation.
#[derive(Clone, Debug)]
pub struct Item {
    turn: Turn,
    pub(crate) msg: ModelMessage,
}

impl Item {
    /// Returns the turn this item records.
    #[inline]
    pub fn turn(&self) -> &Turn {
        &self.turn
    }
}

/// Represents a conversation.
///
/// Each item pairs the turn with the message sent to the model for it, so
/// the exact wording the model saw is kept alongside the structured turn.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    items: Vec<Item>,
}

impl Conversation {
    /// Returns the items in order.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns the turns in order.
    #[inline]
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.items.iter().map(Item::turn)
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the observations recorded so far.
    pub fn observations(&self) -> impl Iterator<Item = &ToolObservation> {
        self.turns().filter_map(|turn| match turn {
            Turn::ToolObservation(observation) => Some(observation),
            _ => None,
        })
    }

    pub(crate) fn push(&mut self, turn: Turn, msg: ModelMessage) {
        self.items.push(Item { turn, msg });
    }

    pub(crate) fn push_item(&mut self, item: Item) {
        self.items.push(item);
    }

    pub(crate) fn has_user_turn(&self) -> bool {
        self.turns().any(|turn| matches!(turn, Turn::User(_)))
    }

    pub(crate) fn messages(&self) -> impl Iterator<Item = &ModelMessage> {
        self.items.iter().map(|item| &item.msg)
    }
}
