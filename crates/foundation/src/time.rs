/// Host-supplied monotonic clock reading in milliseconds.
///
/// The core never reads a wall clock; the host advances time explicitly so
/// timer behavior stays deterministic and replayable.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Self = Self(0);

    pub fn after(self, delay_ms: u64) -> Self {
        Self(self.0.saturating_add(delay_ms))
    }

    pub fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Millis;

    #[test]
    fn after_saturates() {
        assert_eq!(Millis(10).after(5), Millis(15));
        assert_eq!(Millis(u64::MAX).after(1), Millis(u64::MAX));
    }

    #[test]
    fn since_never_underflows() {
        assert_eq!(Millis(3).since(Millis(10)), 0);
        assert_eq!(Millis(10).since(Millis(3)), 7);
    }
}
