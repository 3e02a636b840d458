use palaver_wire::Name;

/// Identity half of one connection's server-side state.
///
/// The framing half (line assembly, binary residual) lives in the
/// connection's decoder; both are owned by the same task.
#[derive(Debug, Default, Clone)]
pub struct Session {
    registered: bool,
    name: Name,
    room: Name,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Adopts the identity from a validated `/join`.
    pub fn set_identity(&mut self, name: Name, room: Name) {
        self.name = name;
        self.room = room;
    }

    pub fn mark_registered(&mut self) {
        self.registered = true;
    }
}
