use crate::cost::Cost;
use crate::errors::SyntenyError;
use itertools::Itertools;
use std::fmt;

/// A gene family identifier. Total order and equality are all that is
/// ever required of it.
pub type Gene = String;

/// A half-open interval `[first, second)` of positions in a synteny.
pub type Segment = (usize, usize);

/// Marker for events that do not involve any segment.
pub const NO_SEGMENT: Segment = (0, 0);

/// An ordered block of gene families. Insertion order is significant
/// and the same family may appear several times.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Synteny(Vec<Gene>);

impl Synteny {
    pub fn new() -> Self {
        Synteny(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn genes(&self) -> &[Gene] {
        &self.0
    }

    pub fn push(&mut self, gene: Gene) {
        self.0.push(gene);
    }

    pub fn swap(&mut self, i: usize, j: usize) {
        self.0.swap(i, j);
    }

    /// Copy of the `[first, second)` slice of this synteny.
    pub fn segment(&self, (first, second): Segment) -> Synteny {
        Synteny(self.0[first..second].to_vec())
    }

    /// Copy of this synteny with the `[first, second)` slice removed.
    pub fn without_segment(&self, (first, second): Segment) -> Synteny {
        let mut genes = self.0[..first].to_vec();
        genes.extend_from_slice(&self.0[second..]);
        Synteny(genes)
    }

    /// Generate a synteny of the given length made of incrementing
    /// alphabetic gene families (`a`, `b`, ..., `z`, `aa`, `ab`, ...).
    pub fn dummy(length: usize) -> Synteny {
        let mut result = Vec::with_capacity(length);
        let mut current = vec![b'a'];

        for _ in 0..length {
            result.push(String::from_utf8(current.clone()).unwrap());

            let mut pos = current.len();
            loop {
                if pos == 0 {
                    current.insert(0, b'a');
                    break;
                }

                if current[pos - 1] == b'z' {
                    current[pos - 1] = b'a';
                    pos -= 1;
                } else {
                    current[pos - 1] += 1;
                    break;
                }
            }
        }

        Synteny(result)
    }

    /// Enumerate every ordered subsequence of this synteny, including
    /// the empty one. The result has `2^n` entries.
    pub fn subsequences(&self) -> Vec<Synteny> {
        let mut result = vec![Synteny::new()];

        for gene in self.0.iter().rev() {
            let mut extended = Vec::with_capacity(result.len() * 2);

            for sub in result {
                extended.push(sub.clone());

                let mut with_gene = Synteny(Vec::with_capacity(sub.len() + 1));
                with_gene.0.push(gene.clone());
                with_gene.0.extend_from_slice(&sub.0);
                extended.push(with_gene);
            }

            result = extended;
        }

        result
    }

    /// Minimum number of segmental losses needed to turn this synteny
    /// into the `target` subsequence.
    ///
    /// When `substring` is set, initial and terminal losses are not
    /// counted; the result is then the minimum number of losses needed
    /// to turn a substring of this synteny into `target`.
    pub fn distance_to(
        &self,
        target: &Synteny,
        substring: bool,
    ) -> Result<usize, SyntenyError> {
        Ok(self.reconcile(target, substring, Cost::PosInf)?.len())
    }

    /// Find the segments that are lost when turning this synteny into
    /// the `target` subsequence, reporting at most `max` of them. The
    /// returned intervals are relative to this synteny.
    ///
    /// With `substring` set, segments that touch the start or the end
    /// of this synteny are dropped from the count, mirroring
    /// [`Synteny::distance_to`].
    pub fn reconcile(
        &self,
        target: &Synteny,
        substring: bool,
        max: Cost,
    ) -> Result<Vec<Segment>, SyntenyError> {
        let source = &self.0;
        let wanted = &target.0;

        let mut segments: Vec<Segment> = Vec::new();
        let mut i = 0;
        let mut j = 0;

        // Both syntenies are walked in lock-step; a mismatch opens a
        // lost segment in the source which closes on the next match.
        let mut coincides = true;
        let mut start = 0;

        while Cost::from(segments.len()) < max && i < source.len() && j < wanted.len() {
            if source[i] != wanted[j] {
                if coincides {
                    coincides = false;
                    start = i;
                }

                i += 1;
            } else if coincides {
                i += 1;
                j += 1;
            } else {
                // End of a lost segment: in substring mode, segments
                // that abut the start of the source do not count
                if !substring || start != 0 {
                    segments.push((start, i));
                }

                coincides = true;
                i += 1;
                j += 1;
            }
        }

        if i == source.len() && j != wanted.len() {
            return Err(SyntenyError::NotASubsequence {
                from_seq: self.to_string(),
                target: target.to_string(),
            });
        }

        // A trailing tail in the source is one more lost segment,
        // counted unless substring mode is enabled
        if i != source.len() && j == wanted.len() {
            let tail_start = if coincides { i } else { start };

            if !substring && Cost::from(segments.len()) < max {
                segments.push((tail_start, source.len()));
            }
        }

        Ok(segments)
    }
}

impl FromIterator<Gene> for Synteny {
    fn from_iter<I: IntoIterator<Item = Gene>>(iter: I) -> Self {
        Synteny(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for Synteny {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Synteny(iter.into_iter().map(|g| g.to_owned()).collect())
    }
}

impl fmt::Display for Synteny {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join(" "))
    }
}
