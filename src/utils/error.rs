use thiserror::Error;

/// Errors produced while decoding or encoding a world save stream.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save stream ended early (wanted {wanted} bits, {left} left)")]
    UnexpectedEof { wanted: u32, left: u64 },

    #[error("bit field width {0} exceeds 32")]
    FieldTooWide(u32),

    #[error("unsupported save version {0:#x}")]
    UnsupportedVersion(u32),

    #[error("malformed legacy save: {0}")]
    MalformedLegacy(String),

    #[error("palette index {index} out of range (palette size {size})")]
    PaletteIndex { index: usize, size: usize },
}

/// Errors surfaced by world-level operations.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("save data rejected: {0}")]
    Save(#[from] SaveError),

    #[error("no edit history for player {0}")]
    NoHistory(String),
}

pub type SaveResult<T> = std::result::Result<T, SaveError>;
