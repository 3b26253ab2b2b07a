//! The workspace string pool.
//!
//! All DSL string contents live in one append-only byte arena. A string is
//! identified by a [`StrId`], the byte offset of its first character; the
//! byte at `offset + len` is always NUL, mirroring the C layout the build
//! manifest writer grew up with. Strings are never shortened. Appending to a
//! string that is not already at the arena tail first relocates its bytes to
//! the tail and updates the caller's handle in place.
//!
//! Offset 0 is reserved: `StrId::NONE` denotes "absent" (for example a
//! project with no subproject name). The arena starts with a single NUL byte
//! so that no real string can ever receive offset 0.

use std::fmt::Arguments;

/// Offset-handle into the string pool. 0 denotes absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StrId(u32);

impl StrId {
    /// The reserved "absent" handle.
    pub const NONE: Self = Self(0);

    /// Returns true if this handle denotes an actual string.
    #[must_use]
    pub fn is_some(self) -> bool {
        self.0 != 0
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Append-only NUL-terminated string arena.
#[derive(Debug)]
pub(crate) struct StrPool {
    buf: Vec<u8>,
}

impl StrPool {
    pub fn new() -> Self {
        // Reserve offset 0 for StrId::NONE.
        Self { buf: vec![0] }
    }

    /// Appends `s` to the arena and returns its handle.
    pub fn push(&mut self, s: &str) -> StrId {
        debug_assert!(!s.as_bytes().contains(&0), "pool strings are NUL-free");
        let id = StrId(u32::try_from(self.buf.len()).expect("string pool exceeds u32 range"));
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        id
    }

    /// Appends the first `n` bytes of `s`.
    pub fn pushn(&mut self, s: &str, n: usize) -> StrId {
        self.push(&s[..n])
    }

    /// Appends `s` with leading and trailing spaces and newlines removed.
    pub fn push_stripped(&mut self, s: &str) -> StrId {
        let stripped = s.trim_matches([' ', '\n']);
        self.push(stripped)
    }

    /// Formats directly into the arena.
    pub fn pushf(&mut self, args: Arguments<'_>) -> StrId {
        self.push(&std::fmt::format(args))
    }

    /// Returns the string for a handle. The NONE handle yields `""`.
    pub fn get(&self, id: StrId) -> &str {
        let start = id.index();
        let end = self.buf[start..]
            .iter()
            .position(|b| *b == 0)
            .map_or(self.buf.len(), |n| start + n);
        // The pool only ever receives &str content, so the run is valid UTF-8.
        std::str::from_utf8(&self.buf[start..end]).expect("string pool holds UTF-8")
    }

    /// Appends `s` to the string at `*id`, relocating it to the arena tail
    /// when it is not already there. The handle is updated in place.
    pub fn app(&mut self, id: &mut StrId, s: &str) {
        let cur = self.get(*id);
        let cur_len = cur.len();
        let run_end = id.index() + cur_len + 1;

        if run_end != self.buf.len() {
            // Relocate to the tail so the append can extend in place.
            let moved = StrId(u32::try_from(self.buf.len()).expect("string pool exceeds u32 range"));
            self.buf.extend_from_within(id.index()..run_end);
            *id = moved;
        }

        // Drop the trailing NUL, extend, re-terminate.
        let nul = self.buf.pop();
        debug_assert_eq!(nul, Some(0));
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// Formatted append; same relocation behavior as [`StrPool::app`].
    pub fn appf(&mut self, id: &mut StrId, args: Arguments<'_>) {
        self.app(id, &std::fmt::format(args));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_get_round_trip() {
        let mut pool = StrPool::new();
        let a = pool.push("hello");
        let b = pool.push("");
        let c = pool.push("world");
        assert_eq!(pool.get(a), "hello");
        assert_eq!(pool.get(b), "");
        assert_eq!(pool.get(c), "world");
        assert!(a.is_some() && b.is_some() && c.is_some());
        assert_eq!(pool.get(StrId::NONE), "");
    }

    #[test]
    fn handles_are_stable_across_later_pushes() {
        let mut pool = StrPool::new();
        let a = pool.push("first");
        for i in 0..100 {
            pool.push(&format!("filler-{i}"));
        }
        assert_eq!(pool.get(a), "first");
    }

    #[test]
    fn append_at_tail_extends_in_place() {
        let mut pool = StrPool::new();
        let mut a = pool.push("ab");
        let before = a;
        pool.app(&mut a, "cd");
        assert_eq!(a, before, "tail string must not relocate");
        assert_eq!(pool.get(a), "abcd");
    }

    #[test]
    fn append_relocates_when_not_at_tail() {
        let mut pool = StrPool::new();
        let mut a = pool.push("ab");
        let b = pool.push("zz");
        pool.app(&mut a, "cd");
        assert_eq!(pool.get(a), "abcd");
        // The old string bytes are untouched; the unrelated string survives.
        assert_eq!(pool.get(b), "zz");
    }

    #[test]
    fn append_equals_intern_of_concatenation() {
        let mut pool = StrPool::new();
        let mut a = pool.push("foo");
        pool.push("interleaved");
        pool.app(&mut a, "bar");
        let direct = pool.push("foobar");
        assert_eq!(pool.get(a), pool.get(direct));
    }

    #[test]
    fn push_stripped_removes_spaces_and_newlines_only() {
        let mut pool = StrPool::new();
        let id = pool.push_stripped("  x  \n");
        assert_eq!(pool.get(id), "x");
        let id = pool.push_stripped("\n\n a b \n");
        assert_eq!(pool.get(id), "a b");
        let id = pool.push_stripped("\tx");
        assert_eq!(pool.get(id), "\tx", "tabs are not stripped");
    }

    #[test]
    fn pushf_formats_into_pool() {
        let mut pool = StrPool::new();
        let id = pool.pushf(format_args!("-I{} ", "/src"));
        assert_eq!(pool.get(id), "-I/src ");
    }
}
