use crate::domain::vocab::Vocab;

/// Role of one tag in the BIO scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkTag {
    /// `B-X`: starts a chunk of type X
    Begin(usize),
    /// `I-X`: continues a chunk of type X
    Inside(usize),
    Outside,
}

/// A labelled span `[start, end)` over token positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Chunk {
    pub label: usize,
    pub start: usize,
    pub end:   usize,
}

/// Maps tag indices to BIO roles so chunks can be read off index sequences.
#[derive(Debug, Clone)]
pub struct TagScheme {
    roles:  Vec<ChunkTag>,
    labels: Vec<String>,
}

impl TagScheme {
    /// Every tag of the form `B-X` / `I-X` is a chunk tag for type X;
    /// anything else (including `O` and reserved tokens) is outside.
    pub fn from_vocab(tag_vocab: &Vocab) -> Self {
        let mut labels: Vec<String> = Vec::new();
        let mut label_of = |name: &str| match labels.iter().position(|l| l == name) {
            Some(i) => i,
            None => {
                labels.push(name.to_string());
                labels.len() - 1
            }
        };

        let roles = tag_vocab
            .tokens()
            .iter()
            .map(|tag| match tag.split_once('-') {
                Some(("B", label)) => ChunkTag::Begin(label_of(label)),
                Some(("I", label)) => ChunkTag::Inside(label_of(label)),
                _ => ChunkTag::Outside,
            })
            .collect();

        Self { roles, labels }
    }

    pub fn role(&self, tag: usize) -> ChunkTag {
        self.roles.get(tag).copied().unwrap_or(ChunkTag::Outside)
    }

    pub fn label(&self, chunk: &Chunk) -> &str {
        &self.labels[chunk.label]
    }
}
