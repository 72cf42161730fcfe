//! Per-write options: TTL, timestamp and insert conditions.
//!
//! Options are layered. A query-level setting overrides a model-level one,
//! and an explicit [`Ttl::Clear`] at an inner scope drops a TTL set further out.

/// TTL requested for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use whatever the enclosing scope says
    #[default]
    Inherit,
    /// Explicitly no TTL, even if an outer scope set one
    Clear,
    Seconds(u32),
}

/// An explicit `None` means "no TTL here" and maps to [`Ttl::Clear`]; an
/// unspecified TTL is [`Ttl::default`], which inherits.
impl From<Option<u32>> for Ttl {
    fn from(ttl: Option<u32>) -> Self {
        match ttl {
            Some(seconds) => Ttl::Seconds(seconds),
            None => Ttl::Clear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    pub ttl: Ttl,

    /// Write timestamp in microseconds since the epoch
    pub timestamp: Option<i64>,

    /// Only honored on inserts
    pub if_not_exists: bool,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, seconds: u32) -> Self {
        self.ttl = Ttl::Seconds(seconds);
        self
    }

    pub fn clear_ttl(mut self) -> Self {
        self.ttl = Ttl::Clear;
        self
    }

    pub fn timestamp(mut self, micros: i64) -> Self {
        self.timestamp = Some(micros);
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Resolve these options against an enclosing scope.
    pub fn layered_over(self, outer: WriteOptions) -> WriteOptions {
        WriteOptions {
            ttl: match self.ttl {
                Ttl::Inherit => outer.ttl,
                explicit => explicit,
            },
            timestamp: self.timestamp.or(outer.timestamp),
            if_not_exists: self.if_not_exists || outer.if_not_exists,
        }
    }

    /// TTL to render, if any. Zero means no TTL.
    pub fn effective_ttl(&self) -> Option<u32> {
        match self.ttl {
            Ttl::Seconds(seconds) if seconds > 0 => Some(seconds),
            _ => None,
        }
    }
}
