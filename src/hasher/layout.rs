use bytes::Bytes;

use crate::constants::PIECE_HASH_LEN;

/// The piece length and the SHA-1 digest of every piece of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceLayout {
    piece_length: u64,
    pieces: Vec<[u8; 20]>,
}

impl PieceLayout {
    pub fn new(piece_length: u64, pieces: Vec<[u8; 20]>) -> Self {
        Self {
            piece_length,
            pieces,
        }
    }

    /// Splits a concatenated `pieces` blob into digests.
    ///
    /// Returns `None` if the blob length is not a multiple of 20.
    pub fn from_blob(piece_length: u64, blob: &[u8]) -> Option<Self> {
        if blob.len() % PIECE_HASH_LEN != 0 {
            return None;
        }

        let pieces = blob
            .chunks_exact(PIECE_HASH_LEN)
            .map(|chunk| {
                let mut arr = [0u8; 20];
                arr.copy_from_slice(chunk);
                arr
            })
            .collect();

        Some(Self::new(piece_length, pieces))
    }

    pub fn piece_length(&self) -> u64 {
        self.piece_length
    }

    pub fn num_pieces(&self) -> usize {
        self.pieces.len()
    }

    pub fn pieces(&self) -> &[[u8; 20]] {
        &self.pieces
    }

    pub fn hash(&self, index: usize) -> Option<&[u8; 20]> {
        self.pieces.get(index)
    }

    /// Concatenates all digests into the `pieces` blob.
    pub fn to_blob(&self) -> Bytes {
        Bytes::from(self.pieces.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_roundtrip() {
        let layout = PieceLayout::new(16384, vec![[1u8; 20], [2u8; 20]]);
        let blob = layout.to_blob();
        assert_eq!(blob.len(), 40);
        assert_eq!(PieceLayout::from_blob(16384, &blob), Some(layout));
    }

    #[test]
    fn test_from_blob_rejects_partial_digest() {
        assert!(PieceLayout::from_blob(16384, &[0u8; 21]).is_none());
        assert_eq!(PieceLayout::from_blob(16384, &[]).map(|l| l.num_pieces()), Some(0));
    }
}
