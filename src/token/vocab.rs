//! Token vocabulary: a small set of fixed structural ids (add/delete/newline/bos/eos/extra-id
//! markers) plus a deterministic hash-based fallback for arbitrary source text, standing in
//! for a real learned model vocabulary (exact ids are an internal implementation detail; all
//! that matters is that they stay internally consistent). Grounded on a preference for
//! content-hash keyed lookups over an identity/arena scheme, carried forward into
//! `token::cache`.

/// Structural and text token ids produced by [`TokenVocab`].
pub type TokenId = u32;

/// A stateless tokenizer/id-assigner. There is no learned vocabulary to load: every source
/// token is mapped to an id via a stable hash, so the same text always tokenizes to the same
/// ids across runs — packing the same problem twice must produce identical output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenVocab;

impl TokenVocab {
    pub const ADD: TokenId = 0;
    pub const DEL: TokenId = 1;
    pub const NEWLINE: TokenId = 2;
    pub const BOS: TokenId = 3;
    pub const EOS: TokenId = 4;

    /// Extra-id markers (the span-corruption sentinels used to key an edit location in the
    /// input back to its content in the output) occupy a fixed, config-independent band of
    /// ids so `max_lines_to_edit` can change without renumbering the structural tokens.
    const EXTRA_BASE: TokenId = 5;
    const EXTRA_CAP: TokenId = 512;
    const TEXT_BASE: TokenId = Self::EXTRA_BASE + Self::EXTRA_CAP;

    /// The sentinel id for edit-location marker `k`, wrapping if `k` exceeds the reserved
    /// band (a query chunk larger than the band is already pathological, not a valid input).
    pub fn extra_id(k: usize) -> TokenId {
        Self::EXTRA_BASE + (k as u32 % Self::EXTRA_CAP)
    }

    /// Splits `text` into identifier/number runs and individual punctuation characters,
    /// mapping each to a token id. Whitespace (other than as a separator) is dropped; callers
    /// that need explicit line structure insert [`TokenVocab::NEWLINE`] themselves.
    pub fn encode(&self, text: &str) -> Vec<TokenId> {
        tokenize_words(text).iter().map(|w| self.token_id(w)).collect()
    }

    fn token_id(&self, word: &str) -> TokenId {
        Self::TEXT_BASE + (fnv1a(word) % 1_000_000) as TokenId
    }
}

fn tokenize_words(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else if c.is_alphanumeric() || c == '_' {
            current.push(c);
        } else {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            out.push(c.to_string());
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// FNV-1a over UTF-8 bytes. Deterministic across runs and platforms, unlike `ahash`'s default
/// randomized state, which matters here: two tokenizations of the same text must agree.
fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
