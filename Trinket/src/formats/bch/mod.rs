//! BCH (3DS) model container.
//!
//! Loading copies the input into an owned buffer, applies the relocation
//! table once, then decodes models and texture descriptors from the
//! relocated bytes.
//!
//! ```no_run
//! use trinket::formats::bch::BchContainer;
//!
//! let bytes = std::fs::read("pm0025_00.bch")?;
//! let scene = BchContainer::load(&bytes)?.decode();
//! for model in &scene.models {
//!     println!("{}: {} meshes", model.name, model.meshes.len());
//! }
//! # Ok::<(), trinket::Error>(())
//! ```

pub mod commands;
pub mod header;
pub mod material;
pub mod model;
pub mod names;
pub mod relocation;
pub mod vertex;

use tracing::{debug, info, warn};

pub use commands::{
    AttributeFormat, AttributeLayout, GpuCommandInterpreter, IndexBuffer, IndexFormat,
    TextureUnit, UniformStack, VertexAttribute, VertexSemantic, VertexUniforms,
};
pub use header::{BchHeader, ContentHeader, PointerTable};
pub use relocation::{RelocationEntry, relocate};
pub use vertex::VertexAssembler;

use crate::error::Result;
use crate::scene::SceneModel;
use crate::utils::ByteReader;
use crate::utils::reader::check_table;

/// Texture descriptor recovered from a texture's command block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BchTexture {
    pub name: String,
    pub address: u32,
    /// PICA200 format id; see [`commands::texture_format_name`].
    pub format: u32,
    pub width: u32,
    pub height: u32,
}

/// Everything decoded from one container.
#[derive(Debug, Clone, Default)]
pub struct BchScene {
    pub models: Vec<SceneModel>,
    pub textures: Vec<BchTexture>,
    /// Models or textures that failed to decode.
    pub warnings: Vec<String>,
}

/// A relocated BCH container.
///
/// The only constructor is [`BchContainer::load`], so every instance has had
/// its relocation table applied exactly once.
#[derive(Debug, Clone)]
pub struct BchContainer {
    header: BchHeader,
    content: ContentHeader,
    data: Vec<u8>,
}

impl BchContainer {
    /// Parse the header and relocate a private copy of `source`.
    ///
    /// # Errors
    /// Returns an error if the header is invalid or a relocation target lies
    /// outside the file.
    pub fn load(source: &[u8]) -> Result<Self> {
        let header = BchHeader::read(source)?;
        debug!(
            backward_compatibility = header.backward_compatibility,
            version = header.version,
            "Read BCH header"
        );
        let data = relocate(&header, source.to_vec())?;
        let content = ContentHeader::read(&data, header.main_header_offset as usize)?;
        Ok(Self {
            header,
            content,
            data,
        })
    }

    #[must_use]
    pub fn header(&self) -> &BchHeader {
        &self.header
    }

    #[must_use]
    pub fn content(&self) -> &ContentHeader {
        &self.content
    }

    /// Relocated bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn model_count(&self) -> usize {
        self.content.models.entries as usize
    }

    /// Decode model `index` of the models table.
    ///
    /// # Errors
    /// Returns an error if the model is truncated or inconsistent.
    pub fn decode_model(&self, index: usize) -> Result<SceneModel> {
        let offset = self.content.models.entry_offset(&self.data, index)?;
        model::decode_model(&self.data, &self.header, offset)
    }

    /// Decode texture descriptor `index` of the textures table.
    ///
    /// # Errors
    /// Returns an error if the descriptor or its command block is truncated.
    pub fn decode_texture(&self, index: usize) -> Result<BchTexture> {
        let offset = self.content.textures.entry_offset(&self.data, index)?;
        let mut reader = ByteReader::at(&self.data, offset);
        let commands_offset = reader.read_u32()? as usize;
        let commands_words = reader.read_u32()? as usize;
        // command blocks of units 1 and 2, then a reserved word
        reader.skip(0x14);
        let name = reader.read_string_ptr()?;

        let commands = GpuCommandInterpreter::run(&self.data, commands_offset, commands_words)?;
        let unit = commands.texture_unit(0);
        Ok(BchTexture {
            name,
            address: unit.address,
            format: unit.format,
            width: unit.width,
            height: unit.height,
        })
    }

    /// Decode every model and texture descriptor. A failing entry is logged
    /// and recorded in [`BchScene::warnings`]; the remaining entries are
    /// still decoded.
    #[must_use]
    pub fn decode(&self) -> BchScene {
        let mut scene = BchScene::default();

        let models = self.table_entries(&self.content.models, "models", &mut scene.warnings);
        for index in 0..models {
            match self.decode_model(index) {
                Ok(model) => {
                    info!(
                        "Decoded BCH model '{}' ({} meshes, {} bones)",
                        model.name,
                        model.meshes.len(),
                        model.bones.len()
                    );
                    scene.models.push(model);
                }
                Err(e) => {
                    warn!("Failed to decode BCH model {index}: {e}");
                    scene.warnings.push(format!("model {index}: {e}"));
                }
            }
        }

        let textures = self.table_entries(&self.content.textures, "textures", &mut scene.warnings);
        for index in 0..textures {
            match self.decode_texture(index) {
                Ok(texture) => scene.textures.push(texture),
                Err(e) => {
                    warn!("Failed to decode BCH texture {index}: {e}");
                    scene.warnings.push(format!("texture {index}: {e}"));
                }
            }
        }

        scene
    }

    /// Entry count of `table`, or zero with a warning when the pointer table
    /// does not fit in the container.
    fn table_entries(
        &self,
        table: &PointerTable,
        label: &str,
        warnings: &mut Vec<String>,
    ) -> usize {
        let entries = table.entries as usize;
        match check_table(&self.data, table.offset as usize, entries, 4) {
            Ok(()) => entries,
            Err(e) => {
                warn!("BCH {label} table lists {entries} entries: {e}");
                warnings.push(format!("{label} table lists {entries} entries: {e}"));
                0
            }
        }
    }
}
