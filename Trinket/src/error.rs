//! Error types for `Trinket`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `Trinket` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A read ran past the end of the buffer.
    #[error("unexpected end of data at offset 0x{offset:x} (needed {needed} bytes)")]
    UnexpectedEof {
        /// Absolute offset of the failed read.
        offset: usize,
        /// Number of bytes requested.
        needed: usize,
    },

    // ==================== BCH Container Errors ====================
    /// The file is not a BCH container (missing `BCH\0` magic).
    #[error("invalid BCH magic: expected BCH\\0, found {0:?}")]
    InvalidBchMagic([u8; 4]),

    /// A section offset or length lies outside the container.
    #[error("BCH section '{section}' out of bounds (offset 0x{offset:x}, length 0x{length:x})")]
    BchSectionOutOfBounds {
        /// Section name.
        section: &'static str,
        /// Section offset from the header.
        offset: u32,
        /// Section length from the header.
        length: u32,
    },

    // ==================== GPU Command Errors ====================
    /// Vertex attribute layout is incomplete or inconsistent.
    #[error("invalid vertex attribute layout: {message}")]
    InvalidAttributeLayout {
        /// Description of what is invalid.
        message: String,
    },

    /// A vertex references a bone slot that is not in the face's node list.
    #[error("bone slot {slot} out of range for node list of {len}")]
    BoneSlotOutOfRange {
        /// The slot value read from the vertex.
        slot: usize,
        /// Length of the face's node list.
        len: usize,
    },

    /// A bone's parent does not precede it in the bone list.
    #[error("bone {bone} has invalid parent {parent}")]
    InvalidBoneParent {
        /// Index of the offending bone.
        bone: usize,
        /// The parent id it declares.
        parent: i32,
    },

    // ==================== BNTX Texture Errors ====================
    /// The file is not a BNTX container.
    #[error("invalid BNTX magic: expected BNTX, found {0:?}")]
    InvalidBntxMagic([u8; 4]),

    /// A texture record did not start with `BRTI`.
    #[error("invalid texture record at 0x{offset:x}: expected BRTI, found {found:?}")]
    InvalidTextureRecord {
        /// Absolute offset of the record.
        offset: usize,
        /// The magic that was found instead.
        found: [u8; 4],
    },

    /// The texture's pixel format is not known.
    #[error("unknown pixel format 0x{0:04x}")]
    UnknownPixelFormat(u32),

    /// Texture dimensions are zero or overflow.
    #[error("invalid texture dimensions {width}x{height}x{depth}")]
    InvalidTextureDimensions {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// Depth in slices.
        depth: u32,
    },

    /// The external BC6H decoder reported a failure.
    #[error("BC6H decoder failed: {message}")]
    Bc6hDecodeFailed {
        /// The decoder's message.
        message: String,
    },

    // ==================== Trinity Descriptor Errors ====================
    /// A flatbuffer descriptor could not be read.
    #[error("invalid {kind} descriptor: {message}")]
    InvalidDescriptor {
        /// Descriptor kind (`trmdl`, `trmsh`, ...).
        kind: &'static str,
        /// Description of what is invalid.
        message: String,
    },

    /// A Trinity vertex attribute uses an unsupported encoding.
    #[error("unsupported vertex attribute type 0x{0:x}")]
    UnsupportedVertexType(u32),

    // ==================== Archive Errors ====================
    /// The archive root does not exist or is not a directory.
    #[error("archive not found: {path}")]
    ArchiveNotFound {
        /// The archive path given.
        path: PathBuf,
    },

    /// A file required by the caller is missing from the archive.
    #[error("file not found in archive: {0}")]
    FileNotFoundInArchive(String),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),

    // ==================== Export Errors ====================
    /// The model descriptor type is not supported by the exporter.
    #[error("unsupported model descriptor: {0}")]
    UnsupportedModel(String),

    /// The model decoded to nothing exportable.
    #[error("model '{0}' contains no meshes")]
    EmptyModel(String),

    /// Failed to encode PNG image.
    #[error("failed to encode PNG: {message}")]
    PngEncodeFailed {
        /// The encoding error message.
        message: String,
    },

    /// Failed to parse an options file.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // ==================== Parsing Errors ====================
    /// XML serialization error.
    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid file path.
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::PngEncodeFailed {
            message: err.to_string(),
        }
    }
}

/// A specialized Result type for `Trinket` operations.
pub type Result<T> = std::result::Result<T, Error>;
