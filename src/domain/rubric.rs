use std::fmt;

pub(crate) const DEFAULT_MARKER: u8 = b'A';

/// One `question,marker` line of the persisted rubric. `question` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RubricEntry {
    pub(crate) question: usize,
    pub(crate) marker: u8,
}

/// Per-question grade markers shared by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rubric {
    markers: Vec<u8>,
}

impl Rubric {
    pub(crate) fn new(question_count: usize) -> Self {
        Self { markers: vec![DEFAULT_MARKER; question_count] }
    }

    pub(crate) fn len(&self) -> usize {
        self.markers.len()
    }

    pub(crate) fn marker(&self, question: usize) -> u8 {
        self.markers[question]
    }

    pub(crate) fn set(&mut self, question: usize, marker: u8) {
        self.markers[question] = marker;
    }

    /// Advances the marker of `question` by one step, returning the old and new values.
    pub(crate) fn bump(&mut self, question: usize) -> (u8, u8) {
        let old = self.markers[question];
        let new = old.wrapping_add(1);
        self.markers[question] = new;
        (old, new)
    }

    /// Applies persisted entries, ignoring indices outside `1..=len`. Returns how many applied.
    pub(crate) fn apply(&mut self, entries: &[RubricEntry]) -> usize {
        let mut applied = 0;
        for entry in entries {
            if entry.question == 0 || entry.question > self.markers.len() {
                continue;
            }
            self.markers[entry.question - 1] = entry.marker;
            applied += 1;
        }
        applied
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.markers.len() * 4);
        for (idx, marker) in self.markers.iter().enumerate() {
            out.extend_from_slice(format!("{},", idx + 1).as_bytes());
            out.push(*marker);
            out.push(b'\n');
        }
        out
    }
}

impl fmt::Display for Rubric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for marker in &self.markers {
            write!(f, "{}", char::from(*marker))?;
        }
        Ok(())
    }
}

pub(crate) fn parse_entries(contents: &[u8]) -> Vec<RubricEntry> {
    contents
        .split(|byte| *byte == b'\n')
        .filter_map(|line| {
            let comma = line.iter().position(|byte| *byte == b',')?;
            let question = std::str::from_utf8(&line[..comma]).ok()?.trim().parse().ok()?;
            let marker = *line.get(comma + 1)?;
            if marker == b'\r' {
                return None;
            }
            Some(RubricEntry { question, marker })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_entries_skips_malformed_lines() {
        let entries = parse_entries(b"1,A\r\n2,B\nnot a line\n3,\n x ,C\n4,D");
        assert_eq!(
            entries,
            vec![
                RubricEntry { question: 1, marker: b'A' },
                RubricEntry { question: 2, marker: b'B' },
                RubricEntry { question: 4, marker: b'D' },
            ]
        );
    }

    #[test]
    fn apply_ignores_out_of_range_questions() {
        let mut rubric = Rubric::new(3);
        let applied = rubric.apply(&[
            RubricEntry { question: 0, marker: b'Z' },
            RubricEntry { question: 2, marker: b'C' },
            RubricEntry { question: 4, marker: b'Z' },
        ]);
        assert_eq!(applied, 1);
        assert_eq!(rubric.to_string(), "ACA");
    }

    #[test]
    fn bump_steps_one_marker() {
        let mut rubric = Rubric::new(2);
        assert_eq!(rubric.bump(1), (b'A', b'B'));
        assert_eq!(rubric.bump(1), (b'B', b'C'));
        assert_eq!(rubric.to_string(), "AC");
    }

    #[test]
    fn serialized_rubric_parses_back() {
        let mut rubric = Rubric::new(5);
        rubric.bump(4);
        let mut reloaded = Rubric::new(5);
        reloaded.apply(&parse_entries(&rubric.to_bytes()));
        assert_eq!(reloaded, rubric);
        assert_eq!(rubric.to_bytes(), b"1,A\n2,A\n3,A\n4,A\n5,B\n".to_vec());
    }
}
