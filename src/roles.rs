//! Read/write role assignment for pairs of identically shaped resources.
//!
//! Both the particle state buffers and the trail textures exist in pairs.
//! At any instant one member of a pair is the *read* role and the other the
//! *write* role; [`PingPong::swap`] exchanges them. The pair owns both
//! members, so handing out the two roles always yields two distinct objects.

/// Fixed identity of one member of a pair.
///
/// Slots never change; roles do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    /// The other member of the pair.
    #[inline]
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Slot::A => "A",
            Slot::B => "B",
        }
    }
}

/// A pair of resources plus a one-bit role selector.
///
/// Slot A starts in the read role.
#[derive(Debug)]
pub struct PingPong<T> {
    items: [T; 2],
    read: Slot,
}

impl<T> PingPong<T> {
    /// Build a pair from its two members.
    pub fn new(a: T, b: T) -> Self {
        Self {
            items: [a, b],
            read: Slot::A,
        }
    }

    /// Build a pair by constructing each member from its slot.
    pub fn try_from_fn<E>(mut make: impl FnMut(Slot) -> Result<T, E>) -> Result<Self, E> {
        let a = make(Slot::A)?;
        let b = make(Slot::B)?;
        Ok(Self::new(a, b))
    }

    /// Member currently in the read role.
    #[inline]
    pub fn read(&self) -> &T {
        &self.items[self.read.index()]
    }

    /// Member currently in the write role.
    #[inline]
    pub fn write(&self) -> &T {
        &self.items[self.read.other().index()]
    }

    #[inline]
    pub fn read_slot(&self) -> Slot {
        self.read
    }

    #[inline]
    pub fn write_slot(&self) -> Slot {
        self.read.other()
    }

    /// Both roles at once, as `(read, write)`.
    #[inline]
    pub fn split(&self) -> (&T, &T) {
        (self.read(), self.write())
    }

    /// Member by fixed identity, ignoring roles.
    #[inline]
    pub fn get(&self, slot: Slot) -> &T {
        &self.items[slot.index()]
    }

    /// Exchange the read and write roles.
    #[inline]
    pub fn swap(&mut self) {
        self.read = self.read.other();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_start_distinct() {
        let pair = PingPong::new("a", "b");
        assert_eq!(pair.read_slot(), Slot::A);
        assert_eq!(pair.write_slot(), Slot::B);
        let (read, write) = pair.split();
        assert_eq!(*read, "a");
        assert_eq!(*write, "b");
    }

    #[test]
    fn test_roles_never_alias() {
        let mut pair = PingPong::new(0u8, 1u8);
        for _ in 0..17 {
            let (read, write) = pair.split();
            assert!(!std::ptr::eq(read, write));
            assert_ne!(pair.read_slot(), pair.write_slot());
            pair.swap();
        }
    }

    #[test]
    fn test_swap_is_involution() {
        let mut pair = PingPong::new(10, 20);
        let before = (pair.read_slot(), *pair.read(), *pair.write());
        pair.swap();
        assert_eq!(*pair.read(), 20);
        assert_eq!(*pair.write(), 10);
        pair.swap();
        assert_eq!((pair.read_slot(), *pair.read(), *pair.write()), before);
    }

    #[test]
    fn test_get_ignores_roles() {
        let mut pair = PingPong::new('x', 'y');
        pair.swap();
        assert_eq!(*pair.get(Slot::A), 'x');
        assert_eq!(*pair.get(Slot::B), 'y');
    }

    #[test]
    fn test_try_from_fn_sees_both_slots() {
        let pair: PingPong<Slot> = PingPong::try_from_fn(Ok::<_, ()>).unwrap();
        assert_eq!(*pair.get(Slot::A), Slot::A);
        assert_eq!(*pair.get(Slot::B), Slot::B);

        let failed: Result<PingPong<u8>, &str> =
            PingPong::try_from_fn(|slot| if slot == Slot::B { Err("b") } else { Ok(1) });
        assert_eq!(failed.unwrap_err(), "b");
    }

    #[test]
    fn test_slot_other() {
        assert_eq!(Slot::A.other(), Slot::B);
        assert_eq!(Slot::B.other().other(), Slot::B);
    }
}
