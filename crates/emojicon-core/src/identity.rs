use std::fmt;

/// Stable identifier of the account that issued a render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequesterId(pub u64);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a message is sent and what a render lock is keyed by.
///
/// Shared community channels and private conversations are distinct
/// destinations even when their numeric ids collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Destination {
    /// A channel addressed by its channel id.
    Channel(u64),
    /// A private conversation addressed by the recipient's user id.
    Direct(u64),
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channel(_) => "channel",
            Self::Direct(_) => "direct",
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Self::Channel(id) | Self::Direct(id) => *id,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.as_str(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_destination_display_includes_kind_and_id() {
        assert_eq!(Destination::Channel(7).to_string(), "channel:7");
        assert_eq!(Destination::Direct(9).to_string(), "direct:9");
    }

    #[test]
    fn regression_channel_and_direct_with_same_id_are_distinct() {
        assert_ne!(Destination::Channel(1), Destination::Direct(1));
    }
}
