use crate::errors::{ParseError, TreeError};
use crate::event_tree::Tree;
use crate::nhx::TaggedNode;
use crate::synteny::{Segment, Synteny, NO_SEGMENT};
use std::fmt;

const EVENT_KEY: &str = "event";
const SEGMENT_KEY: &str = "segment";

/// Kinds of events occurring at the nodes of a synteny tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventKind {
    /// No event: this is a leaf carrying an observed synteny.
    #[default]
    None,

    /// Both children belong to the same species and were created by
    /// duplicating a segment of the current synteny.
    Duplication,

    /// The children belong to two species that evolved from this
    /// common ancestor.
    Speciation,

    /// With an empty synteny, a full loss of the ancestral synteny;
    /// otherwise, a segment of the current synteny was lost in the
    /// child.
    Loss,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::None => write!(f, "None"),
            EventKind::Duplication => write!(f, "Duplication"),
            EventKind::Speciation => write!(f, "Speciation"),
            EventKind::Loss => write!(f, "Loss"),
        }
    }
}

/// An event at a node of a synteny tree.
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub kind: EventKind,

    /// Synteny inferred or observed at this node.
    pub synteny: Synteny,

    /// Segment of `synteny` involved in the event. Only significant
    /// for duplications (the duplicated interval) and segmental losses
    /// (the lost interval).
    pub segment: Segment,
}

impl Event {
    pub fn leaf(synteny: Synteny) -> Self {
        Event { kind: EventKind::None, synteny, segment: NO_SEGMENT }
    }

    pub fn internal(kind: EventKind, synteny: Synteny) -> Self {
        Event { kind, synteny, segment: NO_SEGMENT }
    }

    fn segment_is_significant(&self) -> bool {
        matches!(self.kind, EventKind::Duplication | EventKind::Loss)
    }
}

/// Events compare equal when their kinds and syntenies match; the
/// segment is only taken into account where it is significant.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind {
            return false;
        }

        if self.segment_is_significant() && self.segment != other.segment {
            return false;
        }

        self.synteny == other.synteny
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{kind={}, synteny=\"{}\"", self.kind, self.synteny)?;

        if self.segment_is_significant() && self.segment != NO_SEGMENT {
            write!(f, ", segment=[{}, {})", self.segment.0, self.segment.1)?;
        }

        write!(f, "}}")
    }
}

fn parse_segment(text: &str) -> Result<Segment, ParseError> {
    let invalid = || ParseError::Segment(text.to_owned());

    let (first, second) = text.split_once('-').ok_or_else(invalid)?;
    let first = first.trim().parse::<usize>().map_err(|_| invalid())?;
    let second = second.trim().parse::<usize>().map_err(|_| invalid())?;

    if first > second {
        return Err(invalid());
    }

    Ok((first, second))
}

fn format_segment((first, second): Segment) -> String {
    format!("{} - {}", first, second)
}

/// Interpret a tagged node as an event.
///
/// The node name is the synteny, as a whitespace-separated list of
/// gene tokens; an unnamed leaf without an event tag is a full loss. A
/// duplication without a `segment` tag covers its whole synteny.
pub fn event_from_tagged(node: &TaggedNode) -> Result<Event, ParseError> {
    let mut event = Event::default();

    if let Some(kind) = node.tags.get(EVENT_KEY) {
        event.kind = match kind.as_str() {
            "duplication" => EventKind::Duplication,
            "speciation" => EventKind::Speciation,
            "loss" => EventKind::Loss,
            _ => EventKind::None,
        };
    }

    event.synteny = node.name.split_whitespace().collect();

    if event.kind == EventKind::None && event.synteny.is_empty() {
        event.kind = EventKind::Loss;
    }

    if event.segment_is_significant() && !event.synteny.is_empty() {
        match node.tags.get(SEGMENT_KEY) {
            Some(text) => event.segment = parse_segment(text)?,
            None if event.kind == EventKind::Duplication => {
                event.segment = (0, event.synteny.len());
            }
            None => {}
        }
    }

    Ok(event)
}

/// Render an event back into a tagged node.
pub fn event_to_tagged(event: &Event) -> TaggedNode {
    let mut node = TaggedNode::default();

    match event.kind {
        EventKind::None => {}
        EventKind::Duplication => {
            node.tags.insert(EVENT_KEY.to_owned(), "duplication".to_owned());
        }
        EventKind::Speciation => {
            node.tags.insert(EVENT_KEY.to_owned(), "speciation".to_owned());
        }
        EventKind::Loss => {
            node.tags.insert(EVENT_KEY.to_owned(), "loss".to_owned());
        }
    }

    if !event.synteny.is_empty() {
        node.name = event.synteny.to_string();
    }

    if event.segment_is_significant()
        && !event.synteny.is_empty()
        && event.segment != NO_SEGMENT
    {
        node.tags
            .insert(SEGMENT_KEY.to_owned(), format_segment(event.segment));
    }

    node
}

/// Convert a parsed tagged tree into an event tree.
pub fn event_tree_from_tagged(
    tree: &Tree<TaggedNode>,
) -> Result<Tree<Event>, ParseError> {
    tree.try_map(event_from_tagged)
}

/// Convert an event tree back into a tagged tree for serialization.
pub fn event_tree_to_tagged(tree: &Tree<Event>) -> Tree<TaggedNode> {
    tree.map(event_to_tagged)
}

impl Tree<Event> {
    /// Total number of duplication and loss events in the tree.
    pub fn dl_score(&self) -> usize {
        self.preorder()
            .iter()
            .filter(|&&n| {
                matches!(
                    self[n].value.kind,
                    EventKind::Duplication | EventKind::Loss
                )
            })
            .count()
    }

    /// Check that every internal node is binary, per the input
    /// contract of both reconciliation engines.
    pub fn check_binary(&self) -> Result<(), TreeError> {
        for n in self.preorder() {
            if self.number_of_children(n) == 1 {
                return Err(TreeError::UnaryNode);
            }
        }

        Ok(())
    }
}
