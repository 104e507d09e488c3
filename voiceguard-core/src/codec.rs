//! Error-correcting codes for the watermark payload.
//!
//! The embedder and detector only talk to [`ErrorCorrection`], so a stronger
//! code can replace [`Repetition`] without touching either of them.

/// Default repetition factor.
pub const DEFAULT_REDUNDANCY: usize = 3;

/// One received coded bit, as seen by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// A bit recovered from a matched frame.
    Reliable(bool),
    /// A position with no reliable observation. Carries the raw received
    /// value if any frame mapped to it at all.
    Erased(Option<bool>),
}

/// Result of decoding a coded bit stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decoded {
    pub bits: Vec<bool>,
    /// Coded bits that disagreed with the value finally chosen for their group.
    pub corrected: usize,
    /// Groups whose value could not be established (ties or total erasure).
    pub uncorrectable: usize,
}

/// A replaceable channel code.
pub trait ErrorCorrection: Send + Sync {
    /// Coded bits produced per data bit.
    fn expansion(&self) -> usize;

    fn encode(&self, bits: &[bool]) -> Vec<bool>;

    /// Hard-decision decode.
    fn decode(&self, coded: &[bool]) -> Decoded;

    /// Decode where some positions are erased. Erasures abstain from voting.
    fn decode_symbols(&self, symbols: &[Symbol]) -> Decoded;
}

/// Repetition code: every bit is sent `redundancy` times in a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repetition {
    redundancy: usize,
}

impl Repetition {
    pub fn new(redundancy: usize) -> Self {
        Self {
            redundancy: redundancy.max(1),
        }
    }
}

impl Default for Repetition {
    fn default() -> Self {
        Self::new(DEFAULT_REDUNDANCY)
    }
}

/// Majority of a set of votes. `None` on an exact tie or no votes.
fn majority(votes: impl Iterator<Item = bool>) -> Option<bool> {
    let (ones, total) = votes.fold((0usize, 0usize), |(o, t), v| (o + v as usize, t + 1));
    let zeros = total - ones;
    match ones.cmp(&zeros) {
        std::cmp::Ordering::Greater => Some(true),
        std::cmp::Ordering::Less => Some(false),
        std::cmp::Ordering::Equal => None,
    }
}

impl ErrorCorrection for Repetition {
    fn expansion(&self) -> usize {
        self.redundancy
    }

    fn encode(&self, bits: &[bool]) -> Vec<bool> {
        bits.iter()
            .flat_map(|&b| std::iter::repeat_n(b, self.redundancy))
            .collect()
    }

    fn decode(&self, coded: &[bool]) -> Decoded {
        let mut out = Decoded::default();
        for group in coded.chunks_exact(self.redundancy) {
            let bit = match majority(group.iter().copied()) {
                Some(bit) => bit,
                None => {
                    out.uncorrectable += 1;
                    group[0]
                }
            };
            out.corrected += group.iter().filter(|&&b| b != bit).count();
            out.bits.push(bit);
        }
        out
    }

    fn decode_symbols(&self, symbols: &[Symbol]) -> Decoded {
        let mut out = Decoded::default();
        for group in symbols.chunks_exact(self.redundancy) {
            let reliable = || {
                group.iter().filter_map(|s| match s {
                    Symbol::Reliable(b) => Some(*b),
                    Symbol::Erased(_) => None,
                })
            };
            let received = || {
                group.iter().filter_map(|s| match s {
                    Symbol::Reliable(b) => Some(*b),
                    Symbol::Erased(raw) => *raw,
                })
            };

            let bit = if reliable().next().is_some() {
                // Ties among reliable votes are broken by everything received.
                majority(reliable()).or_else(|| majority(received()))
            } else {
                majority(received())
            };
            let bit = match bit {
                Some(bit) => bit,
                None => {
                    out.uncorrectable += 1;
                    received().next().unwrap_or(false)
                }
            };
            out.corrected += reliable().filter(|&b| b != bit).count();
            out.bits.push(bit);
        }
        out
    }
}

/// Repeat each bit `redundancy` times.
pub fn encode(bits: &[bool], redundancy: usize) -> Vec<bool> {
    Repetition::new(redundancy).encode(bits)
}

/// Majority-decode a repetition-coded stream, returning the data bits and
/// the number of corrected coded bits.
pub fn decode(coded: &[bool], redundancy: usize) -> (Vec<bool>, usize) {
    let decoded = Repetition::new(redundancy).decode(coded);
    (decoded.bits, decoded.corrected)
}
