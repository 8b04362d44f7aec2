/// A byte cursor over snapshot text with absolute position tracking.
///
/// `base` is added to the local index so fragments scanned out of a larger
/// input still report offsets into the original text.
#[derive(Clone)]
pub struct Cursor<'a> {
    /// The text being scanned.
    pub s: &'a str,
    /// Offset of `s` within the original input.
    pub base: usize,
    /// Current local index into `s`.
    pub i: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(s: &'a str, base: usize) -> Self {
        Self { s, base, i: 0 }
    }

    /// Current absolute byte position.
    pub fn pos(&self) -> usize {
        self.base + self.i
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.s.as_bytes().get(self.i).copied()
    }

    pub fn starts_with(&self, pat: &[u8]) -> bool {
        self.s.as_bytes()[self.i.min(self.s.len())..].starts_with(pat)
    }

    pub fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.i += 1;
        Some(b)
    }

    /// Advances by `n` bytes. The caller keeps `i` on a char boundary.
    pub fn bump_n(&mut self, n: usize) {
        self.i += n;
    }

    /// Unconsumed input.
    pub fn rest(&self) -> &'a str {
        self.s.get(self.i..).unwrap_or("")
    }

    /// Text from `from` (a local index) to the current position.
    pub fn since(&self, from: usize) -> &'a str {
        self.s.get(from..self.i).unwrap_or("")
    }

    pub fn skip_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.i += 1;
        }
    }

    pub fn skip_ws(&mut self) {
        self.skip_while(|b| b.is_ascii_whitespace());
    }

    /// Consumes up to and including `pat`, returning the text before it.
    /// Leaves the cursor untouched when `pat` never occurs.
    pub fn take_until(&mut self, pat: &str) -> Option<&'a str> {
        let found = self.rest().find(pat)?;
        let taken = &self.rest()[..found];
        self.i += found + pat.len();
        Some(taken)
    }

    /// A short excerpt starting at the current position, for error messages.
    pub fn fragment(&self) -> String {
        excerpt(self.rest())
    }
}

/// First few characters of `s`, for error messages.
pub fn excerpt(s: &str) -> String {
    s.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_basics() {
        let mut cur = Cursor::new("<p>", 10);
        assert_eq!(cur.pos(), 10);
        assert_eq!(cur.peek(), Some(b'<'));
        assert_eq!(cur.bump(), Some(b'<'));
        assert_eq!(cur.pos(), 11);
        assert!(cur.starts_with(b"p>"));
    }

    #[test]
    fn starts_with_at_eof() {
        let mut cur = Cursor::new("ab", 0);
        cur.bump_n(2);
        assert!(cur.eof());
        assert!(cur.starts_with(b""));
        assert!(!cur.starts_with(b"a"));
        assert_eq!(cur.bump(), None);
    }

    #[test]
    fn take_until_consumes_pattern() {
        let mut cur = Cursor::new("abc-->rest", 0);
        assert_eq!(cur.take_until("-->"), Some("abc"));
        assert_eq!(cur.rest(), "rest");
        assert_eq!(cur.take_until("zz"), None);
        assert_eq!(cur.rest(), "rest");
    }

    #[test]
    fn since_and_skip() {
        let mut cur = Cursor::new("  name=", 0);
        cur.skip_ws();
        let from = cur.i;
        cur.skip_while(|b| b.is_ascii_alphabetic());
        assert_eq!(cur.since(from), "name");
        assert_eq!(cur.peek(), Some(b'='));
    }

    #[test]
    fn fragment_is_bounded() {
        let long = "x".repeat(100);
        let cur = Cursor::new(&long, 0);
        assert_eq!(cur.fragment().len(), 40);
    }
}
